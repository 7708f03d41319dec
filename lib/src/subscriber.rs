//! Campaign subscribers.
//!
//! A subscriber walks through the drip sequence one day at a time. The
//! `current_day` cursor marks the last step they received, `last_email_sent`
//! is absent until the very first send.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::db::{Collectable, Database, Identifiable};
use crate::{ErrorKind, Result};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Bounced,
    Unsubscribed,
}

impl Status {
    /// Subscribers only ever leave the active state. Writing the current
    /// status again is allowed.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Active, Bounced) | (Active, Unsubscribed) | (Bounced, Unsubscribed) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscriber {
    pub id: Uuid,

    /// Always stored lower-cased.
    pub email: String,
    #[serde(alias = "name")]
    pub first_name: Option<String>,
    pub bar_name: Option<String>,

    pub status: Status,

    /// Last step of the sequence this subscriber received.
    pub current_day: u32,
    pub last_email_sent: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// Secret embedded in unsubscribe links.
    pub unsubscribe_token: Uuid,
}

impl Default for Subscriber {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            first_name: None,
            bar_name: None,
            status: Status::Active,
            current_day: 0,
            last_email_sent: None,
            created_at: Utc::now(),
            unsubscribe_token: Uuid::new_v4(),
        }
    }
}

impl Subscriber {
    pub fn new(email: impl AsRef<str>) -> Self {
        Self {
            email: normalize_email(email.as_ref()),
            ..Default::default()
        }
    }

    /// Checks whether the subscriber should receive the given day of the
    /// sequence.
    pub fn is_eligible_for(&self, day: u32) -> bool {
        if self.status != Status::Active {
            return false;
        }
        if day <= 1 {
            self.last_email_sent.is_none()
        } else {
            self.current_day == day - 1
        }
    }
}

impl Collectable for Subscriber {
    fn get_collection_name() -> &'static str {
        "subscriber"
    }
}

impl Identifiable for Subscriber {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input for creating a subscriber.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NewSubscriber {
    pub email: Option<String>,
    #[serde(alias = "name")]
    pub first_name: Option<String>,
    pub bar_name: Option<String>,
    pub status: Option<Status>,
}

/// Partial update, absent fields are left as they are.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SubscriberUpdate {
    pub email: Option<String>,
    #[serde(alias = "name")]
    pub first_name: Option<String>,
    pub bar_name: Option<String>,
    pub status: Option<Status>,
}

/// Lists subscribers, most recently created first.
pub fn list(db: &Database, status: Option<Status>, limit: Option<usize>) -> Result<Vec<Subscriber>> {
    let mut subscribers = db.get_collection::<Subscriber>()?;
    if let Some(status) = status {
        subscribers.retain(|s| s.status == status);
    }
    subscribers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if let Some(limit) = limit {
        subscribers.truncate(limit);
    }
    Ok(subscribers)
}

pub fn find_by_email(db: &Database, email: &str) -> Result<Option<Subscriber>> {
    let email = normalize_email(email);
    db.find::<Subscriber, _>(|s| s.email == email)
}

fn validate_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ErrorKind::BadInput("Email is required".to_string()).into());
    }
    if !email.validate_email() {
        return Err(ErrorKind::BadInput(format!("invalid email: {email}")).into());
    }
    Ok(email)
}

pub fn create(db: &Database, new: NewSubscriber) -> Result<Subscriber> {
    let email = validate_email(new.email.as_deref().unwrap_or_default())?;

    if find_by_email(db, &email)?.is_some() {
        return Err(ErrorKind::Conflict(format!("subscriber already exists: {email}")).into());
    }

    let subscriber = Subscriber {
        email,
        first_name: new.first_name,
        bar_name: new.bar_name,
        status: new.status.unwrap_or_default(),
        ..Default::default()
    };
    db.set(&subscriber)?;

    Ok(subscriber)
}

/// Applies a partial update. Fields written by the campaign runner, like
/// `current_day` and `last_email_sent`, are taken from the latest stored
/// record rather than from an earlier read.
pub fn update(db: &Database, id: Uuid, update: SubscriberUpdate) -> Result<Subscriber> {
    let email = update.email.as_deref().map(validate_email).transpose()?;
    if let Some(email) = &email {
        if find_by_email(db, email)?.is_some_and(|other| other.id != id) {
            return Err(ErrorKind::Conflict(format!("subscriber already exists: {email}")).into());
        }
    }

    db.update::<Subscriber, _>(id, |mut subscriber| {
        if let Some(email) = &email {
            subscriber.email = email.clone();
        }
        if let Some(first_name) = &update.first_name {
            subscriber.first_name = Some(first_name.clone());
        }
        if let Some(bar_name) = &update.bar_name {
            subscriber.bar_name = Some(bar_name.clone());
        }
        if let Some(status) = update.status {
            if !subscriber.status.can_transition_to(status) {
                return Err(ErrorKind::BadInput(format!(
                    "cannot change status from {} to {}",
                    subscriber.status, status
                ))
                .into());
            }
            subscriber.status = status;
        }
        Ok(subscriber)
    })?
    .ok_or_else(|| ErrorKind::NotFound("Subscriber not found".to_string()).into())
}

pub fn delete(db: &Database, id: Uuid) -> Result<Subscriber> {
    db.remove::<Subscriber>(id)?
        .ok_or_else(|| ErrorKind::NotFound("Subscriber not found".to_string()).into())
}

/// Selects the subscribers due to receive the given day of the sequence,
/// oldest first, capped at `batch_size`.
pub fn eligible_for_day(db: &Database, day: u32, batch_size: usize) -> Result<Vec<Subscriber>> {
    let mut subscribers = db.get_collection::<Subscriber>()?;
    subscribers.retain(|s| s.is_eligible_for(day));
    subscribers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    subscribers.truncate(batch_size);
    Ok(subscribers)
}

/// Marks the subscriber as unsubscribed if the token matches the one
/// embedded in their unsubscribe link.
pub fn unsubscribe(db: &Database, email: &str, token: Uuid) -> Result<Subscriber> {
    let not_found = || ErrorKind::NotFound("Subscriber not found".to_string());
    let subscriber = find_by_email(db, email)?
        .filter(|s| s.unsubscribe_token == token)
        .ok_or_else(not_found)?;
    db.update::<Subscriber, _>(subscriber.id, |mut subscriber| {
        subscriber.status = Status::Unsubscribed;
        Ok(subscriber)
    })?
    .ok_or_else(|| not_found().into())
}
