//! Open and click tracking endpoints plus the activity statistics built on
//! top of them.
//!
//! The pixel and redirect endpoints are hit by mail clients, so they always
//! answer successfully. Failures to record the event only end up in the logs.

use axum::extract::{Path, Query};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use http::{header, HeaderValue, StatusCode};

use crate::activity::{self, Action};
use crate::{routes, stats, NotificationKind, Result};

use super::{DbExt, NotifierExt, Router};

/// Transparent 1x1 gif.
pub const PIXEL: [u8; 42] = [
    71, 73, 70, 56, 57, 97, 1, 0, 1, 0, 128, 0, 0, 0, 0, 0, 255, 255, 255, 33, 249, 4, 1, 0, 0, 0,
    0, 44, 0, 0, 0, 0, 1, 0, 1, 0, 0, 2, 1, 68, 0, 59,
];

/// Number of events returned by the events listing.
pub const EVENTS_LIMIT: usize = 100;

pub fn router() -> Router {
    Router::new()
        .route(routes::TRACK_OPEN, get(track_open))
        .route(routes::TRACK_CLICK, get(track_click))
        .route(routes::TRACKING_EVENTS, get(events))
        .route(routes::TRACKING_TIMELINE, get(timeline))
        .route(routes::TRACKING_BY_DAY, get(by_day))
}

fn record(db: &crate::Database, notifier: &crate::Notifier, action: Action, id: &str) {
    match activity::record(db, action, id) {
        Ok(event) => {
            tracing::debug!(tracking_id = id, email = ?event.email, "recorded {action}");
            notifier.publish(NotificationKind::Activity);
        }
        Err(e) => tracing::error!(tracking_id = id, "failed recording {action}: {e}"),
    }
}

pub async fn track_open(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Path(id): Path<String>,
) -> impl IntoResponse {
    record(&db, &notifier, Action::Opened, &id);
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, private",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        PIXEL.to_vec(),
    )
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClickQuery {
    pub url: Option<String>,
}

pub async fn track_click(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Path(id): Path<String>,
    Query(query): Query<ClickQuery>,
) -> impl IntoResponse {
    record(&db, &notifier, Action::Clicked, &id);
    let location = HeaderValue::try_from(redirect_target(query.url.as_deref()))
        .unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

/// Only absolute http(s) urls and site-relative paths are followed,
/// everything else lands on the home page.
pub fn redirect_target(url: Option<&str>) -> String {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return "/".to_string();
    };
    if url.starts_with('/') && !url.starts_with("//") {
        return url.to_string();
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed.to_string(),
        _ => "/".to_string(),
    }
}

pub async fn events(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(activity::latest(&db, EVENTS_LIMIT)?))
}

pub async fn timeline(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(stats::timeline(&db)?))
}

pub async fn by_day(Extension(db): DbExt) -> Result<impl IntoResponse> {
    Ok(Json(stats::by_day(&db)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_targets() {
        assert_eq!(redirect_target(None), "/");
        assert_eq!(redirect_target(Some("")), "/");
        assert_eq!(redirect_target(Some("/menu")), "/menu");
        assert_eq!(redirect_target(Some("//evil.com")), "/");
        assert_eq!(redirect_target(Some("https://x.com/a?b=c")), "https://x.com/a?b=c");
        assert_eq!(redirect_target(Some("javascript:alert(1)")), "/");
        assert_eq!(redirect_target(Some("not a url")), "/");
    }
}
