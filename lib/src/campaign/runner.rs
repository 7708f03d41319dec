//! Sends one day of the drip sequence to a batch of subscribers.
//!
//! Recipients are processed one after another. For each of them the run
//! reserves a [`Delivery`], sends the email and then confirms everything in
//! a single transaction: the `sent` activity event, the tracking entry, the
//! advanced subscriber cursor and the delivery state. Failed sends are
//! classified and may turn into bounces. A failing recipient never stops the
//! rest of the batch.

use ::sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, Transactional,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::{Action, ActivityEvent, Tracking};
use crate::bounce::{BounceRecord, BounceType};
use crate::campaign::delivery::{self, Delivery, DeliveryState, Reservation};
use crate::campaign::template;
use crate::config::{Config, SequenceDay};
use crate::db::{decode, set_in, Database};
use crate::email::{self, DeliveryError, Mailer};
use crate::notify::{NotificationKind, Notifier};
use crate::subscriber::{self, Status, Subscriber};
use crate::{ErrorKind, Result};

/// Per-run totals. `total` counts the selected subscribers, `skipped` the
/// ones whose delivery for the day was already claimed by another run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResults {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub bounced: usize,
    pub skipped: usize,
}

/// Loads the template file for the given day of the sequence.
pub async fn load_template(config: &Config, day: u32) -> Result<(SequenceDay, String)> {
    let not_found = || ErrorKind::NotFound(format!("Template for day {day} not found"));

    let entry = config.campaign.day(day).ok_or_else(not_found)?.clone();
    let path = config.campaign.templates.join(&entry.template);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok((entry, html)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found().into()),
        Err(e) => Err(e.into()),
    }
}

/// Runs the given day of the sequence for up to `batch_size` subscribers.
pub async fn run(
    db: &Database,
    mailer: &dyn Mailer,
    config: &Config,
    notifier: &Notifier,
    day: u32,
    batch_size: usize,
) -> Result<RunResults> {
    let (entry, template) = load_template(config, day).await?;
    let subscribers = subscriber::eligible_for_day(db, day, batch_size)?;

    info!(day, batch_size, eligible = subscribers.len(), "starting campaign run");

    let mut results = RunResults {
        total: subscribers.len(),
        ..Default::default()
    };

    for sub in subscribers {
        match delivery::reserve(db, sub.id, day)? {
            Reservation::Acquired(_) => (),
            Reservation::Taken(existing) => {
                debug!(email = %sub.email, day, state = ?existing.state, "delivery already claimed");
                results.skipped += 1;
                continue;
            }
        }

        let tracking_id = Uuid::new_v4();
        match send_one(mailer, config, &entry, &template, &sub, tracking_id).await {
            Ok(()) => {
                results.sent += 1;
                info!(email = %sub.email, day, %tracking_id, "campaign email sent");
                if let Err(e) = confirm(db, &sub, day, tracking_id) {
                    // The email is out, the delivery stays reserved so it
                    // won't be sent again.
                    error!(email = %sub.email, day, "failed recording sent email: {e}");
                }
                notifier.publish(NotificationKind::Activity);
            }
            Err(e) => {
                results.failed += 1;
                let bounce_type = e.bounce_type();
                warn!(email = %sub.email, day, bounced = bounce_type.is_some(), "campaign email failed: {e}");
                if let Some(bounce_type) = bounce_type {
                    results.bounced += 1;
                    notifier.publish(NotificationKind::Bounce);
                    if let Err(err) = record_bounce(db, &sub, bounce_type, &e) {
                        error!(email = %sub.email, "failed recording bounce: {err}");
                    }
                }
                if let Err(err) = delivery::fail(db, sub.id, day, &e.to_string()) {
                    error!(email = %sub.email, day, "failed releasing delivery: {err}");
                }
            }
        }
    }

    info!(
        day,
        sent = results.sent,
        failed = results.failed,
        bounced = results.bounced,
        skipped = results.skipped,
        "campaign run finished"
    );

    Ok(results)
}

async fn send_one(
    mailer: &dyn Mailer,
    config: &Config,
    entry: &SequenceDay,
    template: &str,
    sub: &Subscriber,
    tracking_id: Uuid,
) -> std::result::Result<(), DeliveryError> {
    let html = template::prepare(template, sub, config.base_url(), &tracking_id.to_string());
    let message = email::html_message(&config.email, &sub.email, &entry.subject, html)
        .map_err(|e| DeliveryError::Other(e.kind.to_string()))?;
    mailer.send(message).await
}

/// Records a successful send atomically.
fn confirm(db: &Database, sub: &Subscriber, day: u32, tracking_id: Uuid) -> Result<()> {
    let now = Utc::now();
    let event = ActivityEvent {
        id: Uuid::new_v4(),
        subscriber: Some(sub.id),
        email: Some(sub.email.clone()),
        day: Some(day),
        action: Action::Sent,
        tracking_id: tracking_id.to_string(),
        time: now,
    };
    let tracking = Tracking {
        id: tracking_id,
        subscriber: sub.id,
        email: sub.email.clone(),
        day,
        sent_at: now,
    };
    let delivery = Delivery::new(sub.id, day, DeliveryState::Sent { tracking_id });

    let activities = db.tree::<ActivityEvent>()?;
    let trackings = db.tree::<Tracking>()?;
    let subscribers = db.tree::<Subscriber>()?;
    let deliveries = db.tree::<Delivery>()?;

    (&activities, &trackings, &subscribers, &deliveries).transaction(
        |(a, t, s, d)| -> ConflictableTransactionResult<(), crate::Error> {
            set_in(a, &event)?;
            set_in(t, &tracking)?;
            set_in(d, &delivery)?;
            // Re-read the subscriber so edits made during the send survive. A
            // subscriber deleted in the meantime is not brought back.
            if let Some(bytes) = s.get(sub.id.as_bytes())? {
                let mut current: Subscriber =
                    decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                current.current_day = day;
                current.last_email_sent = Some(now);
                set_in(s, &current)?;
            }
            Ok(())
        },
    )?;

    Ok(())
}

fn record_bounce(
    db: &Database,
    sub: &Subscriber,
    bounce_type: BounceType,
    err: &DeliveryError,
) -> Result<()> {
    let reason = match err {
        DeliveryError::Other(message) => message.clone(),
        other => other.to_string(),
    };
    db.set(&BounceRecord::new(&sub.email, bounce_type, &reason))?;

    db.update::<Subscriber, _>(sub.id, |mut current| {
        if current.status.can_transition_to(Status::Bounced) {
            current.status = Status::Bounced;
        }
        Ok(current)
    })?;
    Ok(())
}
