use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};

use crate::{routes, stats, Result};

use super::{DbExt, Router};

pub fn router() -> Router {
    Router::new().route(routes::DASHBOARD, get(summary))
}

pub async fn summary(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(stats::dashboard(&db)?))
}
