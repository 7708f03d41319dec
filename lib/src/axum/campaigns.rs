use axum::body::Bytes;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use http::StatusCode;

use crate::campaign::{self, NewCampaign, RunResults};
use crate::{routes, stats, ErrorKind, NotificationKind, Result};

use super::{ConfigExt, DbExt, MailerExt, NotifierExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::CAMPAIGNS, get(list).post(create))
        .route(routes::CAMPAIGN_STATS, get(statistics))
        .route(routes::CAMPAIGN_RUN, post(run))
}

pub async fn list(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(campaign::list(&db)?))
}

pub async fn create(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Json(new): Json<NewCampaign>,
) -> Result<impl IntoResponse> {
    let campaign = campaign::create(&db, new)?;
    notifier.publish(NotificationKind::Campaign);
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn statistics(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(stats::campaign_stats(&db)?))
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub day: Option<u32>,
    #[serde(alias = "batchSize")]
    pub batch_size: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
    pub results: RunResults,
}

impl RunRequest {
    /// Parses the request body. An empty body stands for all defaults,
    /// anything else has to be a valid request object.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ErrorKind::BadInput(format!("invalid run request: {e}")).into())
    }
}

/// Triggers a run of one day of the sequence. Both the day and the batch
/// size are optional, the body may be missing altogether.
pub async fn run(
    Extension(db): DbExt,
    Extension(config): ConfigExt,
    Extension(mailer): MailerExt,
    Extension(notifier): NotifierExt,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request = RunRequest::from_body(&body)?;
    let day = request.day.unwrap_or(1);
    let batch_size = request
        .batch_size
        .unwrap_or(config.campaign.default_batch_size);

    let results = campaign::run(&db, mailer.as_ref(), &config, &notifier, day, batch_size).await?;

    let message = if results.total == 0 {
        "No eligible subscribers found".to_string()
    } else {
        format!("Campaign {day} sent successfully")
    };
    Ok(Json(RunResponse {
        success: true,
        message,
        results,
    }))
}
