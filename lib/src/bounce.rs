use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable};
use crate::{ErrorKind, Result};

/// Longest bounce reason kept, in characters.
pub const MAX_REASON_LEN: usize = 255;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BounceType {
    Hard,
    Soft,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BounceRecord {
    pub id: Uuid,
    pub email: String,
    pub bounce_type: BounceType,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl BounceRecord {
    pub fn new(email: impl Into<String>, bounce_type: BounceType, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            bounce_type,
            reason: reason.chars().take(MAX_REASON_LEN).collect(),
            timestamp: Utc::now(),
        }
    }
}

impl Collectable for BounceRecord {
    fn get_collection_name() -> &'static str {
        "email_bounces"
    }
}

impl Identifiable for BounceRecord {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Lists bounces, newest first.
pub fn list(db: &Database) -> Result<Vec<BounceRecord>> {
    let mut bounces = db.get_collection::<BounceRecord>()?;
    bounces.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(bounces)
}

pub fn delete(db: &Database, id: Uuid) -> Result<BounceRecord> {
    db.remove::<BounceRecord>(id)?
        .ok_or_else(|| ErrorKind::NotFound("Bounce not found".to_string()).into())
}
