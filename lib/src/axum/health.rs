use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use http::StatusCode;

use crate::routes;

use super::{DbExt, Router};

pub fn router() -> Router {
    Router::new().route(routes::HEALTH, get(health))
}

pub async fn health(Extension(db): DbExt) -> impl IntoResponse {
    let (code, status, database) = if db.is_healthy() {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error", "disconnected")
    };
    (
        code,
        Json(serde_json::json!({
            "status": status,
            "timestamp": Utc::now(),
            "database": database,
        })),
    )
}
