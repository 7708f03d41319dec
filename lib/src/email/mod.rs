//! Outgoing email.
//!
//! Sending goes through the [`Mailer`] trait so that the campaign runner can
//! be driven by a real smtp relay in production and by a recording mailer in
//! tests. Failures are reported as [`DeliveryError`], keeping the smtp status
//! class around for bounce classification.

use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        response::{Response, Severity},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::bounce::BounceType;
use crate::{Error, ErrorKind, Result};

/// Words that mark an otherwise unclassified failure as a bounce.
const BOUNCE_MARKERS: [&str; 3] = ["bounce", "rejected", "invalid"];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The server refused the message for good (5xx).
    #[error("permanent failure ({code}): {message}")]
    Permanent { code: String, message: String },
    /// The server asked to try again later (4xx).
    #[error("transient failure ({code}): {message}")]
    Transient { code: String, message: String },
    /// Anything without an smtp status, e.g. connection problems.
    #[error("{0}")]
    Other(String),
}

impl DeliveryError {
    /// Decides whether the failure means the address bounced.
    ///
    /// Permanent smtp failures are hard bounces, transient ones are not
    /// bounces at all. Failures that carry no smtp status fall back to
    /// looking for well known words in the error text.
    pub fn bounce_type(&self) -> Option<BounceType> {
        match self {
            DeliveryError::Permanent { .. } => Some(BounceType::Hard),
            DeliveryError::Transient { .. } => None,
            DeliveryError::Other(message) => BOUNCE_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
                .then_some(BounceType::Hard),
        }
    }
}

impl From<lettre::transport::smtp::Error> for DeliveryError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        let code = e.status().map(|c| c.to_string()).unwrap_or_default();
        if e.is_permanent() {
            DeliveryError::Permanent {
                code,
                message: e.to_string(),
            }
        } else if e.is_transient() {
            DeliveryError::Transient {
                code,
                message: e.to_string(),
            }
        } else {
            DeliveryError::Other(e.to_string())
        }
    }
}

impl From<&Response> for DeliveryError {
    fn from(response: &Response) -> Self {
        let code = response.code().to_string();
        let message = response.message().collect::<Vec<_>>().join(" ");
        match response.code().severity {
            Severity::PermanentNegativeCompletion => DeliveryError::Permanent { code, message },
            Severity::TransientNegativeCompletion => DeliveryError::Transient { code, message },
            _ => DeliveryError::Other(format!("unexpected smtp response {code}: {message}")),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: Message) -> std::result::Result<(), DeliveryError>;
}

/// Mailer talking to an smtp relay. The transport is built once and reused
/// for every message.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &crate::config::Email) -> Result<Self> {
        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

        let builder = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
        };

        let mut builder = builder.port(config.smtp_port);
        if !config.smtp_user.is_empty() {
            builder = builder.credentials(creds);
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: Message) -> std::result::Result<(), DeliveryError> {
        let response = self.transport.send(message).await?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(DeliveryError::from(&response))
        }
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e: AddressError| Error::new(ErrorKind::EmailParseError(e.to_string())))
}

/// Builds an html email from the configured sender.
pub fn html_message(
    config: &crate::config::Email,
    to: &str,
    subject: &str,
    html: String,
) -> Result<Message> {
    let message = Message::builder()
        .from(parse_mailbox(&format!(
            "{} <{}>",
            config.from_name, config.from_address
        ))?)
        .to(parse_mailbox(to)?)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html)?;
    Ok(message)
}
