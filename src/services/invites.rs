//! The invite lifecycle: generation, validity checks, consumption, expiry and listing.

pub mod store;

use crate::errors::{LobbyError, LobbyResult};
use crate::models::const_val::DEFAULT_PROFILE;
use crate::models::invite::{
    GenerateInviteReq, Invite, InviteList, InviteSummary, NotifyFlags, Uses,
};
use crate::models::settings::{AdminEmail, InviteEmailsEnabled, JellyfinLogin, NotificationsEnabled};
use crate::services::mailer::InviteMailContext;
use crate::services::notifier::Notifier;
use crate::services::states::LobbyState;
use crate::services::states::db::LobbyDatabaseExecutor;
use crate::utils::short_code;
use crate::utils::time_fmt::{DateTimeFormatter, calendar_diff};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use store::InviteStore;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Outcome of looking an invite up.
#[derive(Debug, Clone, PartialEq)]
pub enum InviteCheck {
    Missing,
    Expired,
    /// The invite as it stood right after this call, before any removal.
    Valid(Invite),
}

impl InviteCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_invite(self) -> Option<Invite> {
        match self {
            Self::Valid(inv) => Some(inv),
            _ => None,
        }
    }
}

pub struct InviteService {
    state: Arc<LobbyState>,
    store: Mutex<InviteStore>,
    notifier: Notifier,
}

impl InviteService {
    pub fn new(state: Arc<LobbyState>, notifier: Notifier) -> Self {
        let reload_window = Duration::from_millis(state.config.invites.reload_window_ms);
        let store = InviteStore::new(state.db.clone(), reload_window);
        Self {
            state,
            store: Mutex::new(store),
            notifier,
        }
    }

    async fn formatter(&self) -> LobbyResult<DateTimeFormatter> {
        self.state
            .settings
            .formatter(self.state.config.display.utc_offset_minutes)
            .await
    }

    async fn profile_exists(&self, name: &str) -> LobbyResult<bool> {
        let mut conn = self.state.db.acquire().await?;
        Ok(LobbyDatabaseExecutor::new(&mut *conn)
            .profiles()
            .profile_exists(name)
            .await?)
    }

    fn invite_link(&self, code: &str) -> String {
        let base = self.state.config.invites.public_url.as_ref();
        match Url::parse(base) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(code);
                }
                url.to_string()
            }
            Err(_) => format!("{}/{}", base.trim_end_matches('/'), code),
        }
    }

    /// Sends the invite email. On failure returns the diagnostic to record in the
    /// invite's `email` field instead of the address.
    async fn send_invite_email(
        &self,
        code: &str,
        address: &str,
        valid_till: OffsetDateTime,
        formatter: &DateTimeFormatter,
    ) -> Option<String> {
        let ctx = InviteMailContext {
            code: code.to_owned(),
            url: self.invite_link(code),
            expires_at: formatter.format(valid_till),
        };
        let mailer = self.notifier.mailer();
        let sent = match mailer.construct_invite(&ctx) {
            Ok(msg) => mailer.send(address, &msg).await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => {
                tracing::info!("{}: Sent invite email to {}", code, address);
                None
            }
            Err(e) => {
                let diagnostic = format!("Failed to send to {address}");
                tracing::error!("{}: {}", code, diagnostic);
                tracing::debug!("{}: Error: {}", code, e);
                Some(diagnostic)
            }
        }
    }

    pub async fn generate(&self, req: GenerateInviteReq) -> LobbyResult<Invite> {
        if req.days == 0 && req.hours == 0 && req.minutes == 0 {
            return Err(LobbyError::validation("invite duration must not be zero"));
        }
        let uses = match (req.multiple_uses, req.no_limit) {
            (false, _) => Uses::SINGLE,
            (true, true) => Uses::Unlimited,
            (true, false) => NonZeroU32::new(req.remaining_uses)
                .map(Uses::Limited)
                .ok_or_else(|| LobbyError::validation("remaining uses must be at least 1"))?,
        };
        let profile = match req.profile.as_deref().map(str::trim) {
            None | Some("") => String::new(),
            Some(name) => {
                if self.profile_exists(name).await? {
                    name.to_owned()
                } else if self.profile_exists(DEFAULT_PROFILE).await? {
                    tracing::debug!(
                        "Profile \"{}\" not found, using \"{}\"",
                        name,
                        DEFAULT_PROFILE
                    );
                    DEFAULT_PROFILE.to_owned()
                } else {
                    return Err(LobbyError::not_found("no default profile exists"));
                }
            }
        };
        let formatter = self.formatter().await?;
        let send_email = self.state.settings.get::<InviteEmailsEnabled>().await?;

        let created = OffsetDateTime::now_utc();
        let valid_till = [
            time::Duration::days(req.days.into()),
            time::Duration::hours(req.hours.into()),
            time::Duration::minutes(req.minutes.into()),
        ]
        .into_iter()
        .try_fold(created, OffsetDateTime::checked_add)
        .ok_or_else(|| LobbyError::validation("invite duration is out of range"))?;
        let address = req
            .email
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && send_email);

        let mut invite = {
            let mut store = self.store.lock().await;
            store.load().await?;
            let code = short_code::generate(|c| store.contains(c));
            tracing::debug!("{}: Creating new invite", code);
            let invite = Invite {
                code,
                created,
                valid_till,
                uses,
                email: address.map(str::to_owned),
                profile,
                used_by: Vec::new(),
                notify: BTreeMap::new(),
            };
            store.put(invite.clone());
            store.persist().await?;
            invite
        };
        tracing::info!("{}: New invite created", invite.code);

        let Some(address) = address else {
            return Ok(invite);
        };
        let Some(diagnostic) = self
            .send_invite_email(&invite.code, address, valid_till, &formatter)
            .await
        else {
            return Ok(invite);
        };
        let mut store = self.store.lock().await;
        store.load().await?;
        if let Some(stored) = store.get_mut(&invite.code) {
            stored.email = Some(diagnostic.clone());
            store.persist().await?;
        }
        invite.email = Some(diagnostic);
        Ok(invite)
    }

    /// Checks `code` and, when `consumer` is given, takes one use on their behalf.
    ///
    /// Expired invites are removed on sight. A consumption that exhausts a limited
    /// invite removes it; the returned snapshot still carries the new `used_by` entry.
    pub async fn validate_and_consume(
        &self,
        code: &str,
        consumer: Option<&str>,
    ) -> LobbyResult<InviteCheck> {
        let formatter = self.formatter().await?;
        let notify = self.state.settings.get::<NotificationsEnabled>().await?;

        let mut store = self.store.lock().await;
        store.load().await?;
        let now = OffsetDateTime::now_utc();
        let Some(invite) = store.get(code).cloned() else {
            return Ok(InviteCheck::Missing);
        };
        if invite.is_expired(now) {
            store.remove(code);
            store.persist().await?;
            drop(store);
            tracing::info!("{}: Invite expired", code);
            if notify {
                self.notifier
                    .dispatch_expiry(&invite, &formatter.format(invite.valid_till));
            }
            return Ok(InviteCheck::Expired);
        }
        let Some(username) = consumer else {
            return Ok(InviteCheck::Valid(invite));
        };

        let mut snapshot = invite;
        snapshot
            .used_by
            .push((username.to_owned(), formatter.format(now)));
        match snapshot.uses.consume() {
            Some(left) => {
                let mut kept = snapshot.clone();
                kept.uses = left;
                store.put(kept);
            }
            None => {
                store.remove(code);
                tracing::debug!("{}: Last use taken, invite removed", code);
            }
        }
        store.persist().await?;
        tracing::info!("{}: Invite used by {}", code, username);
        Ok(InviteCheck::Valid(snapshot))
    }

    /// Gives back the use `username` took, where `taken` is the snapshot their
    /// consumption returned. An invite that consumption removed is put back unless
    /// it has since expired.
    pub async fn release(&self, taken: &Invite, username: &str) -> LobbyResult<()> {
        let code = taken.code.as_str();
        let mut store = self.store.lock().await;
        store.load().await?;
        match store.get_mut(code) {
            Some(invite) => {
                if let Some(pos) = invite.used_by.iter().rposition(|(u, _)| u == username) {
                    invite.used_by.remove(pos);
                }
                invite.uses = invite.uses.give_back();
            }
            None if taken.uses.consume().is_none()
                && !taken.is_expired(OffsetDateTime::now_utc()) =>
            {
                let mut restored = taken.clone();
                if let Some(pos) = restored.used_by.iter().rposition(|(u, _)| u == username) {
                    restored.used_by.remove(pos);
                }
                store.put(restored);
            }
            None => {
                tracing::warn!("{}: Invite gone, use by {} not returned", code, username);
                return Ok(());
            }
        }
        store.persist().await?;
        tracing::info!("{}: Use by {} returned", code, username);
        Ok(())
    }

    /// Removes every expired invite, notifying subscribers of each one.
    pub async fn sweep_expired(&self) -> LobbyResult<usize> {
        let formatter = self.formatter().await?;
        let notify = self.state.settings.get::<NotificationsEnabled>().await?;

        let mut store = self.store.lock().await;
        store.load().await?;
        let now = OffsetDateTime::now_utc();
        let expired = store
            .iter()
            .filter(|inv| inv.is_expired(now))
            .map(|inv| inv.code.clone())
            .collect::<Vec<_>>();
        if expired.is_empty() {
            return Ok(0);
        }
        let purged = expired
            .iter()
            .filter_map(|code| store.remove(code))
            .collect::<Vec<_>>();
        store.persist().await?;
        drop(store);

        for invite in &purged {
            tracing::debug!("Housekeeping: Deleted old invite {}", invite.code);
            if notify {
                self.notifier
                    .dispatch_expiry(invite, &formatter.format(invite.valid_till));
            }
        }
        Ok(purged.len())
    }

    pub async fn set_profile(&self, code: &str, profile: &str) -> LobbyResult<()> {
        if !profile.is_empty() && !self.profile_exists(profile).await? {
            return Err(LobbyError::not_found("profile not found"));
        }
        let mut store = self.store.lock().await;
        store.load().await?;
        let invite = store
            .get_mut(code)
            .ok_or_else(|| LobbyError::not_found(format!("invite {code} not found")))?;
        invite.profile = profile.to_owned();
        store.persist().await?;
        tracing::info!("{}: Profile set to \"{}\"", code, profile);
        Ok(())
    }

    pub async fn set_notify(
        &self,
        code: &str,
        address: &str,
        flags: NotifyFlags,
    ) -> LobbyResult<bool> {
        self.set_notify_batch(address, BTreeMap::from([(code.to_owned(), flags)]))
            .await
    }

    /// Applies every update for `address` and persists once. Nothing is applied when
    /// any code is unknown. Returns whether anything changed.
    pub async fn set_notify_batch(
        &self,
        address: &str,
        updates: BTreeMap<String, NotifyFlags>,
    ) -> LobbyResult<bool> {
        let mut store = self.store.lock().await;
        store.load().await?;
        if let Some(code) = updates.keys().find(|code| !store.contains(code)) {
            return Err(LobbyError::not_found(format!("invite {code} not found")));
        }
        let mut changed = false;
        for (code, update) in updates {
            let Some(invite) = store.get_mut(&code) else {
                continue;
            };
            let mut flags = invite.notify.get(address).copied().unwrap_or_default();
            if flags.merge(update) {
                invite.notify.insert(address.to_owned(), flags);
                tracing::debug!("{}: Notification preferences of {} changed", code, address);
                changed = true;
            }
        }
        if changed {
            store.persist().await?;
        }
        Ok(changed)
    }

    pub async fn delete(&self, code: &str) -> LobbyResult<()> {
        let mut store = self.store.lock().await;
        store.load().await?;
        if store.remove(code).is_none() {
            return Err(LobbyError::not_found(format!("invite {code} not found")));
        }
        store.persist().await?;
        tracing::info!("{}: Invite deleted", code);
        Ok(())
    }

    /// The address notification preferences are kept under for the calling admin.
    pub async fn requester_address(&self, user_id: Option<&str>) -> LobbyResult<Option<String>> {
        if self.state.settings.get::<JellyfinLogin>().await? {
            let Some(user_id) = user_id else {
                return Ok(None);
            };
            let mut conn = self.state.db.acquire().await?;
            return Ok(LobbyDatabaseExecutor::new(&mut *conn)
                .emails()
                .get_address(user_id)
                .await?);
        }
        let address = self.state.settings.get::<AdminEmail>().await?;
        Ok(Some(address).filter(|a| !a.is_empty()))
    }

    /// Every live invite plus the profile names, after expired invites are swept.
    pub async fn list(&self, requester: Option<&str>) -> LobbyResult<InviteList> {
        self.sweep_expired().await?;
        let formatter = self.formatter().await?;
        let profiles = {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .profiles()
                .list_names()
                .await?
        };

        let mut store = self.store.lock().await;
        store.load().await?;
        let now = OffsetDateTime::now_utc();
        let invites = store
            .iter()
            .filter(|inv| !inv.is_expired(now))
            .map(|inv| {
                let left = calendar_diff(inv.valid_till, now);
                let flags = requester
                    .and_then(|addr| inv.notify.get(addr))
                    .copied()
                    .unwrap_or_default();
                InviteSummary {
                    code: inv.code.clone(),
                    years: left.years,
                    months: left.months,
                    days: left.days,
                    hours: left.hours,
                    minutes: left.minutes,
                    created: formatter.format(inv.created),
                    profile: inv.profile.clone(),
                    used_by: inv.used_by.clone(),
                    no_limit: inv.uses.is_unlimited(),
                    remaining_uses: inv.uses.display_count(),
                    email: inv.email.clone(),
                    notify_expiry: flags.expiry,
                    notify_creation: flags.creation,
                }
            })
            .collect();
        Ok(InviteList { profiles, invites })
    }

    /// Runs `sweep_expired` every `interval` until `cancel` fires. A zero interval
    /// disables the task.
    pub fn spawn_housekeeping(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            tracing::info!("Periodic invite sweep disabled");
            return None;
        }
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => match self.sweep_expired().await {
                        Ok(0) => tracing::trace!("Housekeeping: nothing expired"),
                        Ok(n) => tracing::info!("Housekeeping: purged {} expired invite(s)", n),
                        Err(e) => tracing::error!("Housekeeping sweep failed: {}", e),
                    },
                }
            }
            tracing::info!("Invite housekeeping stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::Profile;
    use crate::services::testing::{
        FakeMailer, SentMail, recv_all, seed_profile, template, test_state,
    };
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn service() -> (Arc<InviteService>, UnboundedReceiver<SentMail>) {
        let state = test_state().await;
        let (mailer, rx) = FakeMailer::new();
        let svc = InviteService::new(state, Notifier::new(Arc::new(mailer)));
        (Arc::new(svc), rx)
    }

    fn hours(n: u32) -> GenerateInviteReq {
        GenerateInviteReq {
            hours: n,
            ..Default::default()
        }
    }

    async fn plant_expired(svc: &InviteService, code: &str, notify: &[(&str, bool)]) {
        let now = OffsetDateTime::now_utc();
        let invite = Invite {
            code: code.into(),
            created: now - time::Duration::days(2),
            valid_till: now - time::Duration::days(1),
            uses: Uses::SINGLE,
            email: None,
            profile: String::new(),
            used_by: vec![],
            notify: notify
                .iter()
                .map(|&(addr, expiry)| {
                    (
                        addr.to_owned(),
                        NotifyFlags {
                            expiry: Some(expiry),
                            creation: None,
                        },
                    )
                })
                .collect(),
        };
        let mut store = svc.store.lock().await;
        store.load().await.unwrap();
        store.put(invite);
        store.persist().await.unwrap();
    }

    #[tokio::test]
    async fn single_use_is_removed_after_one_consumption() {
        let (svc, _rx) = service().await;
        let inv = svc.generate(hours(1)).await.unwrap();
        assert_eq!(inv.uses, Uses::SINGLE);
        assert!(!inv.code.starts_with(|c: char| c.is_ascii_digit()));

        let first = svc
            .validate_and_consume(&inv.code, Some("alice"))
            .await
            .unwrap();
        assert!(first.is_match());
        let snapshot = first.into_invite().unwrap();
        assert_eq!(snapshot.used_by.len(), 1);
        assert_eq!(snapshot.used_by[0].0, "alice");

        assert_eq!(
            svc.validate_and_consume(&inv.code, None).await.unwrap(),
            InviteCheck::Missing
        );
        assert!(
            !svc.validate_and_consume(&inv.code, Some("bob"))
                .await
                .unwrap()
                .is_match()
        );
    }

    #[tokio::test]
    async fn three_uses_then_gone() {
        let (svc, _rx) = service().await;
        let inv = svc
            .generate(GenerateInviteReq {
                days: 1,
                multiple_uses: true,
                remaining_uses: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        for user in ["a", "b", "c"] {
            assert!(
                svc.validate_and_consume(&inv.code, Some(user))
                    .await
                    .unwrap()
                    .is_match()
            );
        }
        assert!(
            !svc.validate_and_consume(&inv.code, Some("d"))
                .await
                .unwrap()
                .is_match()
        );
        assert!(svc.list(None).await.unwrap().invites.is_empty());
    }

    #[tokio::test]
    async fn unlimited_is_never_decremented() {
        let (svc, _rx) = service().await;
        let inv = svc
            .generate(GenerateInviteReq {
                minutes: 30,
                multiple_uses: true,
                no_limit: true,
                remaining_uses: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        for i in 0..10 {
            let user = format!("user{i}");
            let check = svc
                .validate_and_consume(&inv.code, Some(&user))
                .await
                .unwrap();
            assert_eq!(check.into_invite().unwrap().uses, Uses::Unlimited);
        }
        let listed = svc.list(None).await.unwrap();
        assert_eq!(listed.invites.len(), 1);
        let summary = &listed.invites[0];
        assert!(summary.no_limit);
        assert_eq!(summary.remaining_uses, 1);
        assert_eq!(summary.used_by.len(), 10);
    }

    #[tokio::test]
    async fn generate_rejects_bad_input() {
        let (svc, _rx) = service().await;
        assert!(matches!(
            svc.generate(GenerateInviteReq::default()).await,
            Err(LobbyError::Validation(_))
        ));
        assert!(matches!(
            svc.generate(GenerateInviteReq {
                hours: 1,
                multiple_uses: true,
                ..Default::default()
            })
            .await,
            Err(LobbyError::Validation(_))
        ));
        assert!(matches!(
            svc.generate(GenerateInviteReq {
                hours: 1,
                profile: Some("Nope".into()),
                ..Default::default()
            })
            .await,
            Err(LobbyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_profile_falls_back_to_default() {
        let (svc, _rx) = service().await;
        let profile = Profile {
            policy: template(json!({"IsAdministrator": false})),
            configuration: None,
            displayprefs: None,
        };
        seed_profile(&svc.state.db, DEFAULT_PROFILE, &profile).await;
        let inv = svc
            .generate(GenerateInviteReq {
                hours: 1,
                profile: Some("Missing".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(inv.profile, DEFAULT_PROFILE);

        svc.set_profile(&inv.code, "").await.unwrap();
        assert!(matches!(
            svc.set_profile(&inv.code, "Missing").await,
            Err(LobbyError::NotFound(_))
        ));
        let listed = svc.list(None).await.unwrap();
        assert_eq!(listed.profiles, vec![DEFAULT_PROFILE.to_owned()]);
        assert_eq!(listed.invites[0].profile, "");
    }

    #[tokio::test]
    async fn invite_email_failure_is_recorded() {
        let state = test_state().await;
        state
            .settings
            .set::<InviteEmailsEnabled>(&true)
            .await
            .unwrap();
        let (mailer, mut rx) = FakeMailer::failing_for(["bad@example.com"]);
        let svc = InviteService::new(state, Notifier::new(Arc::new(mailer)));

        let ok = svc
            .generate(GenerateInviteReq {
                hours: 1,
                email: Some("good@example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ok.email.as_deref(), Some("good@example.com"));
        let bad = svc
            .generate(GenerateInviteReq {
                hours: 1,
                email: Some("bad@example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(bad.email.as_deref(), Some("Failed to send to bad@example.com"));

        let sent = recv_all(&mut rx, 2).await;
        assert_eq!(sent[0].address, "bad@example.com");
        assert!(!sent[0].delivered);
        assert!(sent[1].delivered);
        assert!(svc.validate_and_consume(&bad.code, None).await.unwrap().is_match());

        let listed = svc.list(None).await.unwrap();
        let stored = listed.invites.iter().find(|i| i.code == bad.code).unwrap();
        assert_eq!(stored.email.as_deref(), Some("Failed to send to bad@example.com"));
    }

    #[tokio::test]
    async fn oversized_duration_is_rejected() {
        let (svc, _rx) = service().await;
        assert!(matches!(
            svc.generate(GenerateInviteReq {
                days: 4_000_000_000,
                ..Default::default()
            })
            .await,
            Err(LobbyError::Validation(_))
        ));
        assert!(svc.list(None).await.unwrap().invites.is_empty());
    }

    #[tokio::test]
    async fn released_use_is_returned() {
        let (svc, _rx) = service().await;
        let multi = svc
            .generate(GenerateInviteReq {
                hours: 1,
                multiple_uses: true,
                remaining_uses: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let taken = svc
            .validate_and_consume(&multi.code, Some("alice"))
            .await
            .unwrap()
            .into_invite()
            .unwrap();
        svc.release(&taken, "alice").await.unwrap();

        let single = svc.generate(hours(1)).await.unwrap();
        let taken_single = svc
            .validate_and_consume(&single.code, Some("bob"))
            .await
            .unwrap()
            .into_invite()
            .unwrap();
        assert_eq!(
            svc.validate_and_consume(&single.code, None).await.unwrap(),
            InviteCheck::Missing
        );
        svc.release(&taken_single, "bob").await.unwrap();

        let listed = svc.list(None).await.unwrap();
        assert_eq!(listed.invites.len(), 2);
        for summary in &listed.invites {
            assert!(summary.used_by.is_empty());
        }
        let restored = |code: &str| {
            listed
                .invites
                .iter()
                .find(|i| i.code == code)
                .map(|i| i.remaining_uses)
        };
        assert_eq!(restored(&multi.code), Some(3));
        assert_eq!(restored(&single.code), Some(1));
    }

    async fn set_invites_writable(svc: &InviteService, writable: bool) {
        let sql = if writable {
            "DROP TRIGGER invites_no_insert; DROP TRIGGER invites_no_delete;"
        } else {
            "CREATE TRIGGER invites_no_insert BEFORE INSERT ON invites \
                 BEGIN SELECT RAISE(ABORT, 'invites are read-only'); END; \
             CREATE TRIGGER invites_no_delete BEFORE DELETE ON invites \
                 BEGIN SELECT RAISE(ABORT, 'invites are read-only'); END;"
        };
        sqlx::raw_sql(sql)
            .execute(svc.state.db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_write_keeps_last_committed_state() {
        let (svc, _rx) = service().await;
        let multi = svc
            .generate(GenerateInviteReq {
                hours: 1,
                multiple_uses: true,
                remaining_uses: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let single = svc.generate(hours(1)).await.unwrap();

        set_invites_writable(&svc, false).await;
        assert!(matches!(
            svc.validate_and_consume(&multi.code, Some("alice")).await,
            Err(LobbyError::DataBase(_))
        ));
        assert!(matches!(
            svc.delete(&single.code).await,
            Err(LobbyError::DataBase(_))
        ));
        set_invites_writable(&svc, true).await;

        let listed = svc.list(None).await.unwrap();
        assert_eq!(listed.invites.len(), 2);
        let kept = listed
            .invites
            .iter()
            .find(|i| i.code == multi.code)
            .unwrap();
        assert_eq!(kept.remaining_uses, 3);
        assert!(kept.used_by.is_empty());
    }

    #[tokio::test]
    async fn listing_sweeps_and_notifies_expiry_subscribers() {
        let (svc, mut rx) = service().await;
        plant_expired(
            &svc,
            "Gone",
            &[("a@example.com", true), ("b@example.com", false)],
        )
        .await;
        let live = svc.generate(hours(2)).await.unwrap();

        let listed = svc.list(None).await.unwrap();
        assert_eq!(listed.invites.len(), 1);
        assert_eq!(listed.invites[0].code, live.code);

        let sent = recv_all(&mut rx, 1).await;
        assert_eq!(sent[0].address, "a@example.com");
        assert!(sent[0].subject.contains("Gone"));

        assert_eq!(svc.sweep_expired().await.unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn expired_code_is_removed_on_validation() {
        let (svc, mut rx) = service().await;
        plant_expired(&svc, "Old", &[("a@example.com", true)]).await;
        assert_eq!(
            svc.validate_and_consume("Old", Some("alice")).await.unwrap(),
            InviteCheck::Expired
        );
        assert_eq!(
            svc.validate_and_consume("Old", None).await.unwrap(),
            InviteCheck::Missing
        );
        assert_eq!(recv_all(&mut rx, 1).await.len(), 1);
    }

    #[tokio::test]
    async fn expiry_notices_respect_global_switch() {
        let (svc, mut rx) = service().await;
        svc.state
            .settings
            .set::<NotificationsEnabled>(&false)
            .await
            .unwrap();
        plant_expired(&svc, "Quiet", &[("a@example.com", true)]).await;
        assert_eq!(svc.sweep_expired().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_preferences_merge_and_show_for_requester() {
        let (svc, _rx) = service().await;
        let inv = svc.generate(hours(1)).await.unwrap();
        let on = NotifyFlags {
            expiry: None,
            creation: Some(true),
        };
        assert!(svc.set_notify(&inv.code, "a@example.com", on).await.unwrap());
        assert!(!svc.set_notify(&inv.code, "a@example.com", on).await.unwrap());
        assert!(matches!(
            svc.set_notify_batch(
                "a@example.com",
                BTreeMap::from([
                    (inv.code.clone(), NotifyFlags::default()),
                    ("Nope".to_owned(), on),
                ])
            )
            .await,
            Err(LobbyError::NotFound(_))
        ));

        let mine = svc.list(Some("a@example.com")).await.unwrap();
        assert_eq!(mine.invites[0].notify_creation, Some(true));
        assert_eq!(mine.invites[0].notify_expiry, None);
        let theirs = svc.list(Some("b@example.com")).await.unwrap();
        assert_eq!(theirs.invites[0].notify_creation, None);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let (svc, _rx) = service().await;
        let inv = svc.generate(hours(1)).await.unwrap();
        svc.delete(&inv.code).await.unwrap();
        assert!(matches!(
            svc.delete(&inv.code).await,
            Err(LobbyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn requester_address_follows_login_mode() {
        let (svc, _rx) = service().await;
        assert_eq!(svc.requester_address(Some("u1")).await.unwrap(), None);
        svc.state
            .settings
            .set::<AdminEmail>(&"admin@example.com".to_owned())
            .await
            .unwrap();
        assert_eq!(
            svc.requester_address(None).await.unwrap().as_deref(),
            Some("admin@example.com")
        );

        svc.state.settings.set::<JellyfinLogin>(&true).await.unwrap();
        {
            let mut conn = svc.state.db.acquire().await.unwrap();
            LobbyDatabaseExecutor::new(&mut *conn)
                .emails()
                .upsert_address("u1", "u1@example.com")
                .await
                .unwrap();
        }
        assert_eq!(
            svc.requester_address(Some("u1")).await.unwrap().as_deref(),
            Some("u1@example.com")
        );
        assert_eq!(svc.requester_address(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn housekeeping_stops_on_cancel() {
        let (svc, _rx) = service().await;
        assert!(
            svc.clone()
                .spawn_housekeeping(Duration::ZERO, CancellationToken::new())
                .is_none()
        );
        plant_expired(&svc, "Tick", &[]).await;
        let cancel = CancellationToken::new();
        let handle = svc
            .clone()
            .spawn_housekeeping(Duration::from_millis(10), cancel.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(
            svc.validate_and_consume("Tick", None).await.unwrap(),
            InviteCheck::Missing
        );
    }
}
