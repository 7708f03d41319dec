//! Outbox entries guarding against duplicate sends.
//!
//! Before anything is sent to a subscriber for a given day, a [`Delivery`]
//! keyed by (subscriber, day) gets reserved. The reservation is an atomic
//! insert, so two runs racing for the same day cannot both win it. Once the
//! email is out the reservation is confirmed together with the activity
//! records, see [`super::runner`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum DeliveryState {
    /// Claimed by a run, sending may or may not have happened yet.
    Reserved,
    Sent { tracking_id: Uuid },
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub subscriber: Uuid,
    pub day: u32,
    pub state: DeliveryState,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Deterministic id of the delivery of `day` to `subscriber`.
    pub fn key(subscriber: Uuid, day: u32) -> Uuid {
        Uuid::new_v5(&subscriber, &day.to_be_bytes())
    }

    pub fn new(subscriber: Uuid, day: u32, state: DeliveryState) -> Self {
        Self {
            id: Self::key(subscriber, day),
            subscriber,
            day,
            state,
            updated_at: Utc::now(),
        }
    }

    /// Only failed deliveries may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.state, DeliveryState::Failed { .. })
    }
}

impl Collectable for Delivery {
    fn get_collection_name() -> &'static str {
        "delivery"
    }
}

impl Identifiable for Delivery {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Outcome of trying to reserve a delivery.
#[derive(Clone, Debug, PartialEq)]
pub enum Reservation {
    Acquired(Delivery),
    /// Someone already reserved or completed this delivery.
    Taken(Delivery),
}

/// Claims the delivery of `day` to `subscriber` for the calling run.
pub fn reserve(db: &Database, subscriber: Uuid, day: u32) -> Result<Reservation> {
    let delivery = Delivery::new(subscriber, day, DeliveryState::Reserved);
    match db.swap_unless(&delivery, Delivery::is_retryable)? {
        None => Ok(Reservation::Acquired(delivery)),
        Some(existing) => Ok(Reservation::Taken(existing)),
    }
}

/// Marks a reserved delivery as failed, allowing a later run to retry it.
pub fn fail(db: &Database, subscriber: Uuid, day: u32, reason: &str) -> Result<()> {
    let delivery = Delivery::new(
        subscriber,
        day,
        DeliveryState::Failed {
            reason: reason.to_string(),
        },
    );
    db.set(&delivery)
}

/// Deliveries stuck in the reserved state, i.e. runs that were interrupted
/// between claiming and confirming a send.
pub fn in_doubt(db: &Database) -> Result<Vec<Delivery>> {
    let mut deliveries = db.get_collection::<Delivery>()?;
    deliveries.retain(|d| d.state == DeliveryState::Reserved);
    deliveries.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
    Ok(deliveries)
}
