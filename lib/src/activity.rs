//! Append-only log of email activity.
//!
//! Every send produces a `sent` event and a [`Tracking`] entry keyed by the
//! tracking id embedded in the email. Opens and clicks later carry the same
//! tracking id and get resolved back to the subscriber and day through it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Sent,
    Opened,
    Clicked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,

    pub subscriber: Option<Uuid>,
    pub email: Option<String>,
    pub day: Option<u32>,

    pub action: Action,
    /// Tracking id as found in the request. Kept as text so that opens and
    /// clicks with mangled ids are still counted.
    pub tracking_id: String,

    pub time: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(action: Action, tracking_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber: None,
            email: None,
            day: None,
            action,
            tracking_id: tracking_id.into(),
            time: Utc::now(),
        }
    }

    /// Fills in the origin of the event from the tracking entry.
    pub fn with_tracking(mut self, tracking: &Tracking) -> Self {
        self.subscriber = Some(tracking.subscriber);
        self.email = Some(tracking.email.clone());
        self.day = Some(tracking.day);
        self
    }
}

impl Collectable for ActivityEvent {
    fn get_collection_name() -> &'static str {
        "email_activity"
    }
}

impl Identifiable for ActivityEvent {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Origin of a single sent email, addressed by its tracking id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub id: Uuid,
    pub subscriber: Uuid,
    pub email: String,
    pub day: u32,
    pub sent_at: DateTime<Utc>,
}

impl Collectable for Tracking {
    fn get_collection_name() -> &'static str {
        "tracking"
    }
}

impl Identifiable for Tracking {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Records an open or click for the given raw tracking id.
///
/// Unknown or malformed ids are still recorded, just without the origin
/// information.
pub fn record(db: &Database, action: Action, tracking_id: &str) -> Result<ActivityEvent> {
    let mut event = ActivityEvent::new(action, tracking_id);
    if let Ok(id) = Uuid::parse_str(tracking_id) {
        if let Some(tracking) = db.try_get::<Tracking>(id)? {
            event = event.with_tracking(&tracking);
        }
    }
    db.set(&event)?;
    Ok(event)
}

/// Returns up to `limit` events, newest first.
pub fn latest(db: &Database, limit: usize) -> Result<Vec<ActivityEvent>> {
    let mut events = db.get_collection::<ActivityEvent>()?;
    events.sort_by(|a, b| b.time.cmp(&a.time));
    events.truncate(limit);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_resolves_known_tracking_id() {
        let db = Database::temporary().unwrap();
        let tracking = Tracking {
            id: Uuid::new_v4(),
            subscriber: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            day: 3,
            sent_at: Utc::now(),
        };
        db.set(&tracking).unwrap();

        let event = record(&db, Action::Opened, &tracking.id.to_string()).unwrap();
        assert_eq!(event.subscriber, Some(tracking.subscriber));
        assert_eq!(event.day, Some(3));
        assert_eq!(db.len::<ActivityEvent>().unwrap(), 1);
    }

    #[test]
    fn record_keeps_unknown_ids() {
        let db = Database::temporary().unwrap();
        let event = record(&db, Action::Clicked, "track-garbage").unwrap();
        assert_eq!(event.tracking_id, "track-garbage");
        assert_eq!(event.day, None);
        assert_eq!(latest(&db, 10).unwrap(), vec![event]);
    }

    #[test]
    fn latest_is_newest_first_and_limited() {
        let db = Database::temporary().unwrap();
        let now = Utc::now();
        for n in 0..5 {
            let mut event = ActivityEvent::new(Action::Sent, format!("t{n}"));
            event.time = now - chrono::Duration::minutes(n);
            db.set(&event).unwrap();
        }
        let events = latest(&db, 2).unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.tracking_id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1"]);
    }
}
