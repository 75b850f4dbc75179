//! Outbound mail: message construction from built-in templates and delivery.

mod smtp;
mod templates;

pub use smtp::SmtpMailer;
pub use templates::{CreatedMailContext, ExpiryMailContext, InviteMailContext};

use crate::services::states::config::SmtpConfig;
use async_trait::async_trait;
use lobby_macros::LobbyBusinessError;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error, LobbyBusinessError)]
pub enum MailError {
    #[error("failed to construct message: {0}")]
    Construct(String),
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error("invalid mail configuration: {0}")]
    InvalidConfig(String),
}

pub type MailResult<T> = Result<T, MailError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn construct_invite(&self, ctx: &InviteMailContext) -> MailResult<EmailMessage> {
        templates::invite(ctx)
    }

    fn construct_created(&self, ctx: &CreatedMailContext) -> MailResult<EmailMessage> {
        templates::created(ctx)
    }

    fn construct_expiry(&self, ctx: &ExpiryMailContext) -> MailResult<EmailMessage> {
        templates::expiry(ctx)
    }

    fn construct_deleted(&self, reason: &str) -> MailResult<EmailMessage> {
        templates::deleted(reason)
    }

    async fn send(&self, address: &str, msg: &EmailMessage) -> MailResult<()>;
}

/// Stand-in used when no SMTP host is configured: messages are logged, never sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, address: &str, msg: &EmailMessage) -> MailResult<()> {
        tracing::info!(
            "SMTP is not configured, dropping \"{}\" to {}",
            msg.subject,
            address
        );
        tracing::debug!("Dropped message body:\n{}", msg.text);
        Ok(())
    }
}

pub fn create_mailer(cfg: &SmtpConfig) -> MailResult<Arc<dyn Mailer>> {
    match &cfg.host {
        Some(host) => {
            tracing::info!("Sending mail through {}:{}", host, cfg.port);
            Ok(Arc::new(SmtpMailer::new(host, cfg)?))
        }
        None => {
            tracing::warn!("No SMTP host configured, outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
