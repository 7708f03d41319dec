use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Extension;
use uuid::Uuid;

use crate::{routes, subscriber, ErrorKind, NotificationKind, Result};

use super::{DbExt, NotifierExt, Router};

pub fn router() -> Router {
    Router::new().route(routes::UNSUBSCRIBE, get(unsubscribe))
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnsubscribeQuery {
    pub email: Option<String>,
    pub token: Option<String>,
}

/// Target of the unsubscribe links embedded in every campaign email.
pub async fn unsubscribe(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<impl IntoResponse> {
    let not_found = || ErrorKind::NotFound("Subscriber not found".to_string());
    let email = query.email.ok_or_else(not_found)?;
    let token = query
        .token
        .as_deref()
        .and_then(|t| Uuid::parse_str(t).ok())
        .ok_or_else(not_found)?;

    let sub = subscriber::unsubscribe(&db, &email, token)?;
    tracing::info!(email = %sub.email, "subscriber unsubscribed");
    notifier.publish(NotificationKind::Subscriber);

    Ok(format!(
        "{} has been unsubscribed and won't receive any more emails.",
        sub.email
    ))
}
