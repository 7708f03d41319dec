//! HTTP surface built on axum.

pub mod bounces;
pub mod campaigns;
pub mod dashboard;
pub mod health;
pub mod mailing;
pub mod stream;
pub mod subscribers;
pub mod tracking;

mod error;

use std::sync::Arc;

use axum::Extension;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::email::{Mailer, SmtpMailer};
use crate::Result;
use crate::{Config, Database, Notifier};

pub type Router = axum::Router;

pub type ConfigExt = Extension<Arc<Config>>;
pub type DbExt = Extension<Arc<Database>>;
pub type MailerExt = Extension<Arc<dyn Mailer>>;
pub type NotifierExt = Extension<Notifier>;

/// Collects all application routes.
pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(tracking::router())
        .merge(mailing::router())
        .merge(subscribers::router())
        .merge(bounces::router())
        .merge(campaigns::router())
        .merge(dashboard::router())
        .merge(stream::router())
}

/// Attaches shared state and the common middleware to the router.
pub fn layer(
    router: Router,
    config: Arc<Config>,
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    notifier: Notifier,
) -> Router {
    router
        .layer(Extension(config))
        .layer(Extension(db))
        .layer(Extension(mailer))
        .layer(Extension(notifier))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Opens the database and smtp transport as configured and starts the web
/// server.
pub async fn start(config: Config) -> Result<()> {
    let db = Database::new(&config.db)?;
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&config.email)?);
    start_with(db, mailer, Notifier::new(), router(), config).await
}

pub async fn start_with(
    db: Database,
    mailer: Arc<dyn Mailer>,
    notifier: Notifier,
    router: Router,
    config: Config,
) -> Result<()> {
    crate::tracing::init(&config).unwrap_or_else(|e| {
        log::warn!("failed to initialize tracing (perhaps it was already initialized?): {e}")
    });

    let addr = config.address;
    let db = Arc::new(db);

    let stuck = crate::campaign::delivery::in_doubt(&db)?;
    if !stuck.is_empty() {
        tracing::warn!(
            count = stuck.len(),
            "found deliveries reserved by an interrupted run, they won't be retried automatically"
        );
    }

    let router = layer(router, Arc::new(config), db.clone(), mailer, notifier);

    tracing::info!("starting server at {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped, flushing database");
    db.flush().await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed listening for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
