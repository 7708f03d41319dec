//! Drip-campaign email dashboard backend.
//!
//! Stores subscribers, sends a fixed multi-day sequence of templated emails,
//! records opens and clicks through tracking endpoints and aggregates the
//! resulting activity into statistics served over a JSON api.

#[macro_use]
extern crate serde_derive;

pub mod activity;
pub mod bounce;
pub mod campaign;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod notify;
pub mod routes;
pub mod stats;
pub mod subscriber;
pub mod tracing;

#[cfg(feature = "axum")]
pub mod axum;

pub use activity::{Action, ActivityEvent, Tracking};
pub use bounce::{BounceRecord, BounceType};
pub use campaign::{Campaign, Delivery, DeliveryState, RunResults};
pub use config::Config;
pub use db::Database;
pub use email::{DeliveryError, Mailer, SmtpMailer};
pub use error::{Error, ErrorKind, Result};
pub use notify::{Notification, NotificationKind, Notifier};
pub use subscriber::{Status, Subscriber};
