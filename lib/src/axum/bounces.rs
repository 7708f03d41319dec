use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Extension, Json};
use http::StatusCode;
use uuid::Uuid;

use crate::{bounce, routes, stats, NotificationKind, Result};

use super::{DbExt, NotifierExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::BOUNCES, get(list))
        .route(routes::BOUNCE_STATS, get(statistics))
        .route(routes::BOUNCE, delete(remove))
}

pub async fn list(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(bounce::list(&db)?))
}

pub async fn statistics(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(stats::bounce_stats(&db)?))
}

pub async fn remove(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    bounce::delete(&db, id)?;
    notifier.publish(NotificationKind::Bounce);
    Ok(StatusCode::NO_CONTENT)
}
