//! Server-sent change notifications.
//!
//! Every published [`Notification`] is forwarded as an event named after its
//! kind, with the sequence number as event id. A receiver that lagged behind
//! gets a `resync` event and should refetch everything it displays.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use axum::routing::get;
use axum::Extension;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::notify::Notification;
use crate::routes;

use super::{NotifierExt, Router};

pub fn router() -> Router {
    Router::new().route(routes::STREAM, get(stream))
}

pub async fn stream(
    Extension(notifier): NotifierExt,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(notifier.subscribe())
        .map(|item| Ok::<_, Infallible>(to_event(item)));
    Sse::new(stream).keep_alive(keep_alive())
}

fn to_event(item: std::result::Result<Notification, BroadcastStreamRecvError>) -> Event {
    match item {
        Ok(notification) => {
            let data = serde_json::to_string(&notification).unwrap_or_default();
            Event::default()
                .event(notification.kind.to_string())
                .id(notification.seq.to_string())
                .data(data)
        }
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::debug!(missed, "notification stream lagged");
            Event::default()
                .event("resync")
                .data(serde_json::json!({ "missed": missed }).to_string())
        }
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("keep-alive")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::NotificationKind;

    // Events only expose their encoded form through `Debug`.
    fn encoded(event: Event) -> String {
        format!("{event:?}")
    }

    #[test]
    fn notification_is_named_after_kind() {
        let event = to_event(Ok(Notification {
            seq: 42,
            kind: NotificationKind::Bounce,
            time: Utc::now(),
        }));
        let encoded = encoded(event);
        assert!(encoded.contains("event: bounce"), "{encoded}");
        assert!(encoded.contains("id: 42"), "{encoded}");
    }

    #[test]
    fn lag_turns_into_resync() {
        let encoded = encoded(to_event(Err(BroadcastStreamRecvError::Lagged(7))));
        assert!(encoded.contains("event: resync"), "{encoded}");
        assert!(encoded.contains("missed"), "{encoded}");
        assert!(!encoded.contains("id:"), "{encoded}");
    }
}
