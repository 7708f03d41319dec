//! Change notifications for live dashboards.
//!
//! Each store mutation worth showing on the dashboard gets published with a
//! monotonically increasing sequence number. Receivers that fall behind the
//! channel capacity lose messages; they are expected to notice the gap in
//! sequence numbers (or the lag reported by the channel) and refetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Number of notifications buffered per receiver.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Activity,
    Subscriber,
    Bounce,
    Campaign,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub seq: u64,
    pub kind: NotificationKind,
    pub time: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    seq: Arc<AtomicU64>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes a notification. Having no listeners is not an error.
    pub fn publish(&self, kind: NotificationKind) -> Notification {
        let notification = Notification {
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            kind,
            time: Utc::now(),
        };
        let _ = self.sender.send(notification.clone());
        notification
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Sequence number of the most recent notification.
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }
}
