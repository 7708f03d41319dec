//! Runs the server against a temporary database with a mailer that only
//! logs what it would send. Handy for poking at the dashboard api locally.

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use lettre::Message;

use dripline::{Config, Database, DeliveryError, Mailer, Notifier, Subscriber};

struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        let to = message.envelope().to().iter().map(|a| a.to_string()).collect::<Vec<_>>();
        tracing::info!(?to, bytes = message.formatted().len(), "would send email");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config {
        address: "127.0.0.1:8001".parse()?,
        base_url: "http://localhost:8001".to_string(),
        campaign: dripline::config::Campaign {
            templates: format!("{}/../templates", env!("CARGO_MANIFEST_DIR")).into(),
            ..Default::default()
        },
        ..Default::default()
    };

    let db = Database::temporary()?;
    for email in ["ann@example.com", "bob@example.com"] {
        db.set(&Subscriber::new(email))?;
    }

    // custom routes live next to the built-in ones
    let router = dripline::axum::router().route("/", get(|| async { "dripline quick example" }));

    dripline::axum::start_with(db, Arc::new(LogMailer), Notifier::new(), router, config).await?;

    Ok(())
}
