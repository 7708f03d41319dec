use axum::extract::{Path, Query};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use http::StatusCode;
use uuid::Uuid;

use crate::subscriber::{self, NewSubscriber, Status, SubscriberUpdate};
use crate::{routes, NotificationKind, Result};

use super::{DbExt, NotifierExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::SUBSCRIBERS, get(list).post(create))
        .route(routes::SUBSCRIBER, get(fetch).put(update).delete(delete))
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<Status>,
    pub limit: Option<usize>,
}

pub async fn list(
    Extension(db): DbExt,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(subscriber::list(&db, query.status, query.limit)?))
}

pub async fn fetch(Extension(db): DbExt, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    Ok(Json(db.get::<subscriber::Subscriber>(id)?))
}

pub async fn create(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Json(new): Json<NewSubscriber>,
) -> Result<impl IntoResponse> {
    let sub = subscriber::create(&db, new)?;
    notifier.publish(NotificationKind::Subscriber);
    Ok((StatusCode::CREATED, Json(sub)))
}

pub async fn update(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Path(id): Path<Uuid>,
    Json(update): Json<SubscriberUpdate>,
) -> Result<impl IntoResponse> {
    let sub = subscriber::update(&db, id, update)?;
    notifier.publish(NotificationKind::Subscriber);
    Ok(Json(sub))
}

pub async fn delete(
    Extension(db): DbExt,
    Extension(notifier): NotifierExt,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    subscriber::delete(&db, id)?;
    notifier.publish(NotificationKind::Subscriber);
    Ok(StatusCode::NO_CONTENT)
}
