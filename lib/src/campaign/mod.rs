//! Drip campaigns.
//!
//! The automated sequence is driven by [`runner::run`]. Campaigns created
//! through the api are only recorded for the dashboard, nothing dispatches
//! them.

pub mod delivery;
pub mod runner;
pub mod template;

pub use delivery::{Delivery, DeliveryState};
pub use runner::{run, RunResults};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::db::{Collectable, Database, Identifiable};
use crate::{ErrorKind, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Scheduled,
    Sent,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub content: String,
    pub sender_name: String,
    pub sender_email: String,
    pub status: CampaignStatus,
    /// Unset until the campaign is actually sent.
    pub sent_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Collectable for Campaign {
    fn get_collection_name() -> &'static str {
        "email_campaigns"
    }
}

impl Identifiable for Campaign {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NewCampaign {
    #[serde(alias = "campaign_name")]
    pub name: String,
    pub subject: String,
    pub content: String,
    pub sender_name: String,
    pub sender_email: String,
}

pub fn create(db: &Database, new: NewCampaign) -> Result<Campaign> {
    if [&new.name, &new.subject, &new.content, &new.sender_email]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(
            ErrorKind::BadInput("Please fill in all required fields".to_string()).into(),
        );
    }
    if !new.sender_email.validate_email() {
        return Err(ErrorKind::BadInput(format!("invalid email: {}", new.sender_email)).into());
    }

    let campaign = Campaign {
        id: Uuid::new_v4(),
        name: new.name,
        subject: new.subject,
        content: new.content,
        sender_name: new.sender_name,
        sender_email: new.sender_email,
        status: CampaignStatus::Scheduled,
        sent_date: None,
        created_at: Utc::now(),
    };
    db.set(&campaign)?;
    Ok(campaign)
}

/// Lists campaigns, newest first.
pub fn list(db: &Database) -> Result<Vec<Campaign>> {
    let mut campaigns = db.get_collection::<Campaign>()?;
    campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(campaigns)
}
