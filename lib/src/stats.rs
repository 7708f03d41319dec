//! Aggregated statistics for the dashboard.
//!
//! The `*_from` functions are pure and work on already loaded rows, the
//! remaining ones load what they need from the database first.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::activity::{Action, ActivityEvent};
use crate::bounce::{BounceRecord, BounceType};
use crate::campaign::Campaign;
use crate::db::Database;
use crate::subscriber::{self, Subscriber};
use crate::Result;

/// Percentage of `num` in `den`, rounded to two decimals. Zero when there is
/// nothing to divide by.
pub fn rate(num: usize, den: usize) -> f64 {
    if den == 0 {
        return 0.0;
    }
    (num as f64 / den as f64 * 100.0 * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Counts {
    sent: usize,
    opened: usize,
    clicked: usize,
}

impl Counts {
    fn add(&mut self, action: Action) {
        match action {
            Action::Sent => self.sent += 1,
            Action::Opened => self.opened += 1,
            Action::Clicked => self.clicked += 1,
        }
    }
}

fn count<'a>(events: impl IntoIterator<Item = &'a ActivityEvent>) -> Counts {
    let mut counts = Counts::default();
    for event in events {
        counts.add(event.action);
    }
    counts
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_sent: usize,
    pub total_opens: usize,
    pub total_clicks: usize,
    pub total_bounces: usize,
    pub total_subscribers: usize,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

pub fn campaign_stats_from(
    events: &[ActivityEvent],
    bounces: usize,
    subscribers: usize,
) -> CampaignStats {
    let counts = count(events);
    CampaignStats {
        total_sent: counts.sent,
        total_opens: counts.opened,
        total_clicks: counts.clicked,
        total_bounces: bounces,
        total_subscribers: subscribers,
        open_rate: rate(counts.opened, counts.sent),
        click_rate: rate(counts.clicked, counts.opened),
        bounce_rate: rate(bounces, counts.sent),
    }
}

pub fn campaign_stats(db: &Database) -> Result<CampaignStats> {
    let events = db.get_collection::<ActivityEvent>()?;
    Ok(campaign_stats_from(
        &events,
        db.len::<BounceRecord>()?,
        db.len::<Subscriber>()?,
    ))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BounceTypes {
    pub hard: usize,
    pub soft: usize,
    pub other: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BounceStats {
    pub total_bounces: usize,
    pub bounce_rate: f64,
    pub bounce_types: BounceTypes,
}

pub fn bounce_stats_from(bounces: &[BounceRecord], sent: usize) -> BounceStats {
    let mut types = BounceTypes::default();
    for bounce in bounces {
        match bounce.bounce_type {
            BounceType::Hard => types.hard += 1,
            BounceType::Soft => types.soft += 1,
            BounceType::Other => types.other += 1,
        }
    }
    BounceStats {
        total_bounces: bounces.len(),
        bounce_rate: rate(bounces.len(), sent),
        bounce_types: types,
    }
}

pub fn bounce_stats(db: &Database) -> Result<BounceStats> {
    let bounces = db.get_collection::<BounceRecord>()?;
    let events = db.get_collection::<ActivityEvent>()?;
    Ok(bounce_stats_from(&bounces, count(&events).sent))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    /// `None` collects events that can't be attributed to a day.
    pub day: Option<u32>,
    pub sent: usize,
    pub opens: usize,
    pub clicks: usize,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// Groups activity by sequence day. Unattributed events come first.
pub fn by_day_from(events: &[ActivityEvent]) -> Vec<DayStats> {
    let mut days: BTreeMap<Option<u32>, Counts> = BTreeMap::new();
    for event in events {
        days.entry(event.day).or_default().add(event.action);
    }
    days.into_iter()
        .map(|(day, c)| DayStats {
            day,
            sent: c.sent,
            opens: c.opened,
            clicks: c.clicked,
            open_rate: rate(c.opened, c.sent),
            click_rate: rate(c.clicked, c.opened),
        })
        .collect()
}

pub fn by_day(db: &Database) -> Result<Vec<DayStats>> {
    Ok(by_day_from(&db.get_collection::<ActivityEvent>()?))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DateStats {
    pub date: NaiveDate,
    pub sent: usize,
    pub opened: usize,
    pub clicked: usize,
}

/// Groups activity by calendar date (utc), oldest first.
pub fn timeline_from(events: &[ActivityEvent]) -> Vec<DateStats> {
    let mut dates: BTreeMap<NaiveDate, Counts> = BTreeMap::new();
    for event in events {
        dates
            .entry(event.time.date_naive())
            .or_default()
            .add(event.action);
    }
    dates
        .into_iter()
        .map(|(date, c)| DateStats {
            date,
            sent: c.sent,
            opened: c.opened,
            clicked: c.clicked,
        })
        .collect()
}

pub fn timeline(db: &Database) -> Result<Vec<DateStats>> {
    Ok(timeline_from(&db.get_collection::<ActivityEvent>()?))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub subscribers: usize,
    pub campaigns: usize,
    pub activity: usize,
    pub bounces: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecentSubscriber {
    pub email: String,
    pub first_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub table_stats: TableStats,
    pub recent_subscribers: Vec<RecentSubscriber>,
    pub last_updated: DateTime<Utc>,
}

/// Number of subscribers listed on the dashboard summary.
pub const RECENT_SUBSCRIBERS: usize = 5;

pub fn dashboard(db: &Database) -> Result<Dashboard> {
    let table_stats = TableStats {
        subscribers: db.len::<Subscriber>()?,
        campaigns: db.len::<Campaign>()?,
        activity: db.len::<ActivityEvent>()?,
        bounces: db.len::<BounceRecord>()?,
    };
    let recent_subscribers = subscriber::list(db, None, Some(RECENT_SUBSCRIBERS))?
        .into_iter()
        .map(|s| RecentSubscriber {
            email: s.email,
            first_name: s.first_name,
            created_at: s.created_at,
        })
        .collect();

    Ok(Dashboard {
        table_stats,
        recent_subscribers,
        last_updated: Utc::now(),
    })
}
