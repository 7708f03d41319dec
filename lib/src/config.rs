use std::net::SocketAddr;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use crate::Result;

pub static CONFIG_FILE: &'static str = "dripline.toml";
/// Prefix of environment variables overriding config values.
pub const ENV_PREFIX: &str = "DRIPLINE";

/// Application configuration.
///
/// # Sensible defaults
///
/// `Config::default()` yields a setup usable for local development: the api
/// is served on `127.0.0.1:3001`, data lives in `./db` and templates are read
/// from `./templates`. Using the *struct update syntax* one can change just a
/// few entries.
///
/// ```ignore
/// let cfg = Config {
///     base_url: "https://mail.example.com".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub version: String,

    /// Address on which to serve the application.
    pub address: SocketAddr,
    /// Publicly reachable url of the application. Used to construct
    /// tracking and unsubscribe links embedded in outgoing emails.
    pub base_url: String,

    pub db: Db,
    pub email: Email,
    pub campaign: Campaign,
    pub tracing: Tracing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            address: SocketAddr::from(([127, 0, 0, 1], 3001)),
            base_url: "http://localhost:3001".to_string(),
            db: Db::default(),
            email: Email::default(),
            campaign: Campaign::default(),
            tracing: Tracing::default(),
        }
    }
}

impl Config {
    /// Base url without the trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Loads application config from toml file at default location.
pub fn load<T: DeserializeOwned>() -> Result<T> {
    load_from(CONFIG_FILE)
}

/// Loads application config from toml file at provided path.
///
/// For example for `name` == `dripline.toml` we will load both
/// `dripline.toml` and `secret.dripline.toml`, then apply overrides from
/// environment variables, e.g. `DRIPLINE__EMAIL__SMTP_PASSWORD`.
pub fn load_from<T: DeserializeOwned>(name: impl AsRef<str>) -> Result<T> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(name.as_ref()).required(false))
        .add_source(config::File::with_name(&format!("secret.{}", name.as_ref())).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .prefix_separator("__"),
        )
        .build()?;

    let config: T = config.try_deserialize()?;

    Ok(config)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Db {
    /// Directory holding the database files.
    pub path: PathBuf,
    /// Keep everything in a temporary location removed on exit.
    pub temporary: bool,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./db"),
            temporary: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Email {
    /// Display name used in the `From` header.
    pub from_name: String,
    /// Address that campaign emails are sent from.
    pub from_address: String,

    // Smtp server and credentials.
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    /// Use STARTTLS when talking to the smtp server. Disable only for local
    /// development relays.
    pub smtp_tls: bool,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            from_name: "EZDrink".to_string(),
            from_address: "hello@localhost".to_string(),
            smtp_server: "localhost".to_string(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_tls: true,
        }
    }
}

/// Single step of the drip sequence.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SequenceDay {
    pub day: u32,
    /// Template file name, relative to the templates directory.
    pub template: String,
    pub subject: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Campaign {
    /// Directory with the html templates of the sequence.
    pub templates: PathBuf,
    /// Batch size used when a run request doesn't specify one.
    pub default_batch_size: usize,
    pub sequence: Vec<SequenceDay>,
}

impl Campaign {
    pub fn day(&self, day: u32) -> Option<&SequenceDay> {
        self.sequence.iter().find(|d| d.day == day)
    }
}

impl Default for Campaign {
    fn default() -> Self {
        let sequence = [
            (1, "cash-finder.html", "Unlock $21K+ in Profits in 30 Seconds"),
            (
                2,
                "cash-finder-plus.html",
                "The Cash Finder Report that's shocking bar owners...",
            ),
            (
                3,
                "risk-reduction.html",
                "Your bar is leaking $7,400/month (here's how to plug it)",
            ),
            (
                4,
                "customer-loyalty.html",
                "This loyalty trick brings 34% more repeat customers",
            ),
            (
                5,
                "operational-efficiency.html",
                "Bar owners who work 65+ hours: Read immediately",
            ),
            (
                6,
                "crew-cash-finder.html",
                "How your bartenders can generate an extra $657K yearly",
            ),
            (
                7,
                "bar-never-sleeps.html",
                "Your bar makes money while you sleep (here's how)",
            ),
            (
                8,
                "final-call-to-action.html",
                "LAST DAY: Your EZDrink discount vanishes at midnight",
            ),
        ]
        .into_iter()
        .map(|(day, template, subject)| SequenceDay {
            day,
            template: template.to_string(),
            subject: subject.to_string(),
        })
        .collect();

        Self {
            templates: PathBuf::from("./templates"),
            default_batch_size: 50,
            sequence,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Tracing {
    pub enabled: bool,

    pub mode: crate::tracing::Mode,
    pub level: crate::tracing::Level,

    pub loki_address: String,
}

impl Default for Tracing {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: crate::tracing::Mode::default(),
            level: crate::tracing::Level::default(),
            loki_address: "".to_string(),
        }
    }
}
