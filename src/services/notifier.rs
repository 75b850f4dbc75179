use crate::models::invite::Invite;
use crate::services::mailer::{
    CreatedMailContext, EmailMessage, ExpiryMailContext, MailResult, Mailer,
};
use std::sync::Arc;

/// Fire-and-forget delivery of invite and account notices. Every recipient gets its
/// own task holding its own copies of the inputs; nothing is reported back.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.mailer
    }

    fn spawn_one<F>(&self, label: String, address: String, what: &'static str, build: F)
    where
        F: FnOnce(&dyn Mailer) -> MailResult<EmailMessage> + Send + 'static,
    {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let msg = match build(mailer.as_ref()) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("{}: Failed to construct {}", label, what);
                    tracing::debug!("{}: Error: {}", label, e);
                    return;
                }
            };
            match mailer.send(&address, &msg).await {
                Ok(()) => tracing::info!("{}: Sent {} to {}", label, what, address),
                Err(e) => {
                    tracing::error!("{}: Failed to send {} to {}", label, what, address);
                    tracing::debug!("{}: Error: {}", label, e);
                }
            }
        });
    }

    /// Notifies every address subscribed to the expiry of `invite`.
    pub fn dispatch_expiry(&self, invite: &Invite, expired_at: &str) -> usize {
        let mut spawned = 0;
        for address in invite.expiry_subscribers() {
            let ctx = ExpiryMailContext {
                code: invite.code.clone(),
                expired_at: expired_at.to_owned(),
            };
            self.spawn_one(
                invite.code.clone(),
                address.to_owned(),
                "expiry notification",
                move |m| m.construct_expiry(&ctx),
            );
            spawned += 1;
        }
        if spawned > 0 {
            tracing::debug!("{}: Dispatched {} expiry notification(s)", invite.code, spawned);
        }
        spawned
    }

    /// Notifies every address subscribed to redemptions of `invite`.
    pub fn dispatch_creation(
        &self,
        invite: &Invite,
        username: &str,
        user_address: &str,
        created_at: &str,
    ) -> usize {
        let mut spawned = 0;
        for address in invite.creation_subscribers() {
            let ctx = CreatedMailContext {
                code: invite.code.clone(),
                username: username.to_owned(),
                address: user_address.to_owned(),
                created_at: created_at.to_owned(),
            };
            self.spawn_one(
                invite.code.clone(),
                address.to_owned(),
                "user creation notification",
                move |m| m.construct_created(&ctx),
            );
            spawned += 1;
        }
        spawned
    }

    /// Tells each `(user id, address)` pair that its account is gone.
    pub fn dispatch_deleted(&self, targets: &[(String, String)], reason: &str) -> usize {
        for (user_id, address) in targets {
            let reason = reason.to_owned();
            self.spawn_one(
                user_id.clone(),
                address.clone(),
                "account deletion email",
                move |m| m.construct_deleted(&reason),
            );
        }
        targets.len()
    }
}
