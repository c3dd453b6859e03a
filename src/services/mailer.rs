//! Outbound mail transports.
//!
//! [`Mailer`] is the seam between the API and whatever actually delivers
//! messages: [`SmtpMailer`] in production, [`LogMailer`] when no SMTP relay
//! is configured. Callers never deal with transports directly; they go
//! through [`crate::services::notifications::Notifier`].

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("mail transport is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("failed to send email: {0}")]
    Transport(String),
}

/// A fully rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Cheap address check used before handing anything to a transport.
pub fn is_valid_address(address: &str) -> bool {
    address.trim().parse::<lettre::Address>().is_ok()
}

/// SMTP delivery through lettre. `secure` selects implicit TLS (465),
/// otherwise STARTTLS is negotiated.
#[derive(Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    secure: bool,
    credentials: Option<Credentials>,
    from: String,
    from_name: String,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let host = config.smtp_host.clone().ok_or(MailError::NotConfigured("SMTP_HOST"))?;
        let from = config.sender().ok_or(MailError::NotConfigured("SMTP_FROM"))?.to_string();
        if !is_valid_address(&from) {
            return Err(MailError::InvalidAddress(from));
        }

        let credentials = match (&config.smtp_user, &config.smtp_password) {
            (Some(user), Some(password)) => Some(Credentials::new(user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            host,
            port: config.smtp_port,
            secure: config.smtp_secure,
            credentials,
            from,
            from_name: config.site_name.clone(),
        })
    }

    /// New transport per message to avoid holding stale connections.
    fn build_transport(&self) -> Result<SmtpTransport, MailError> {
        let builder = if self.secure {
            SmtpTransport::relay(&self.host)
        } else {
            SmtpTransport::starttls_relay(&self.host)
        }
        .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
        .port(self.port);

        let builder = match &self.credentials {
            Some(credentials) => builder.credentials(credentials.clone()),
            None => builder,
        };
        Ok(builder.build())
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|e| MailError::Build(format!("invalid from address: {e}")))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| MailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| MailError::Build(e.to_string()))?;

        let transport = self.build_transport()?;

        tokio::task::spawn_blocking(move || {
            transport
                .send(&message)
                .map_err(|e| MailError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Transport(format!("email task failed: {e}")))?
        .map(|_| ())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if !is_valid_address(&email.to) {
            return Err(MailError::InvalidAddress(email.to));
        }
        info!(
            to = %email.to,
            subject = %email.subject,
            bytes = email.html.len(),
            "email not sent (no SMTP relay configured)"
        );
        Ok(())
    }
}
