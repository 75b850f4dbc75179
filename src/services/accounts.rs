//! Account-level flows: redeeming invites, admin user management and profiles.

use crate::errors::{LobbyError, LobbyResult};
use crate::models::const_val::{DEFAULT_PROFILE, OMBI_TEMPLATE_KIND};
use crate::models::profile::{
    ApplySettingsReq, ApplySource, Profile, ProfileSummary, SetDefaultsReq, Template,
};
use crate::models::settings::{NotificationsEnabled, OmbiEnabled, PasswordResetsEnabled};
use crate::models::users::{
    DeleteUsersReq, EmailUpdates, NewUserReq, OmbiUserSummary, UserSummary,
};
use crate::services::invites::{InviteCheck, InviteService};
use crate::services::media::MediaServer;
use crate::services::notifier::Notifier;
use crate::services::ombi::OmbiService;
use crate::services::password::{PasswordValidation, PasswordValidator};
use crate::services::provisioner::{ApplyReport, BatchErrors, Provisioner};
use crate::services::states::LobbyState;
use crate::services::states::db::{DataBaseError, LobbyDatabaseExecutor, SqliteBaseResultExt};
use crate::utils::time_fmt::DateTimeFormatter;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug)]
pub struct RedeemOutcome {
    pub user_id: String,
    pub validation: PasswordValidation,
    pub profile: ApplyReport,
}

pub struct AccountService {
    state: Arc<LobbyState>,
    invites: Arc<InviteService>,
    media: Arc<dyn MediaServer>,
    ombi: Arc<dyn OmbiService>,
    provisioner: Provisioner,
    notifier: Notifier,
    validator: PasswordValidator,
}

impl AccountService {
    pub fn new(
        state: Arc<LobbyState>,
        invites: Arc<InviteService>,
        media: Arc<dyn MediaServer>,
        ombi: Arc<dyn OmbiService>,
        notifier: Notifier,
    ) -> Self {
        let validator = PasswordValidator::from_config(&state.config.password_validation);
        Self {
            provisioner: Provisioner::new(media.clone()),
            state,
            invites,
            media,
            ombi,
            notifier,
            validator,
        }
    }

    async fn formatter(&self) -> LobbyResult<DateTimeFormatter> {
        self.state
            .settings
            .formatter(self.state.config.display.utc_offset_minutes)
            .await
    }

    async fn load_profile(&self, name: &str) -> LobbyResult<Option<Profile>> {
        let row = {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .profiles()
                .get_profile(name)
                .await?
        };
        row.map(|r| serde_json::from_str::<Profile>(&r.payload))
            .transpose()
            .map_err(|e| DataBaseError::from(e).into())
    }

    async fn save_profile(&self, name: &str, profile: &Profile) -> LobbyResult<()> {
        let payload = serde_json::to_string(profile).map_err(DataBaseError::from)?;
        let mut conn = self.state.db.acquire().await?;
        LobbyDatabaseExecutor::new(&mut *conn)
            .profiles()
            .upsert_profile(name, &payload)
            .await?;
        Ok(())
    }

    async fn store_email(&self, user_id: &str, address: &str) -> LobbyResult<()> {
        let mut conn = self.state.db.acquire().await?;
        LobbyDatabaseExecutor::new(&mut *conn)
            .emails()
            .upsert_address(user_id, address)
            .await?;
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str) -> LobbyResult<()> {
        if username.trim().is_empty() {
            return Err(LobbyError::validation("username must not be empty"));
        }
        if self.media.user_by_name(username).await?.is_some() {
            return Err(LobbyError::AlreadyExists(format!(
                "User already exists named {username}"
            )));
        }
        Ok(())
    }

    /// Applies `name`, or the default profile when `name` is gone. An empty name applies nothing.
    async fn apply_named_profile(&self, user_id: &str, name: &str) -> LobbyResult<ApplyReport> {
        if name.is_empty() {
            return Ok(ApplyReport::default());
        }
        let profile = match self.load_profile(name).await? {
            Some(p) => Some(p),
            None => {
                tracing::debug!("Profile \"{}\" not found, using \"{}\"", name, DEFAULT_PROFILE);
                self.load_profile(DEFAULT_PROFILE).await?
            }
        };
        let Some(profile) = profile else {
            tracing::warn!("No profile to apply to {}, skipping", user_id);
            return Ok(ApplyReport::default());
        };
        tracing::debug!("Applying profile \"{}\" to {}", name, user_id);
        Ok(self.provisioner.apply_profile(user_id, &profile).await)
    }

    /// Creates the matching Ombi user when enabled and a template is stored. Ombi
    /// failures are logged only.
    async fn mirror_to_ombi(&self, username: &str, password: &str, email: &str) -> LobbyResult<()> {
        if !self.state.settings.get::<OmbiEnabled>().await? {
            return Ok(());
        }
        let raw = {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .templates()
                .get_template(OMBI_TEMPLATE_KIND)
                .await?
        };
        let template: Template = match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(DataBaseError::from)?,
            None => Template::new(),
        };
        if template.is_empty() {
            tracing::debug!("No Ombi template stored, not creating Ombi user {}", username);
            return Ok(());
        }
        match self
            .ombi
            .create_user(username, password, email, &template)
            .await
        {
            Ok(()) => tracing::info!("Created Ombi user {}", username),
            Err(e) => {
                tracing::info!("Failed to create Ombi user {}", username);
                tracing::debug!("Errors reported by Ombi: {}", e);
            }
        }
        Ok(())
    }

    /// Creates an account from an invite.
    ///
    /// The use is taken before the account is created and given back if creation
    /// fails. Provisioning runs off the snapshot returned by that consumption.
    pub async fn redeem(&self, req: NewUserReq) -> LobbyResult<RedeemOutcome> {
        let code = req.code.as_str();
        if !self
            .invites
            .validate_and_consume(code, None)
            .await?
            .is_match()
        {
            tracing::info!("{}: New user attempt with invalid code", code);
            return Err(LobbyError::not_found("invite code is invalid or has expired"));
        }
        let validation = self.validator.validate(&req.password);
        if !validation.is_valid() {
            tracing::info!("{}: New user failed: Invalid password", code);
            return Err(LobbyError::WeakPassword(validation));
        }
        self.ensure_username_free(&req.username).await?;

        let InviteCheck::Valid(invite) = self
            .invites
            .validate_and_consume(code, Some(&req.username))
            .await?
        else {
            tracing::info!("{}: Invite ran out before {} was created", code, req.username);
            return Err(LobbyError::not_found("invite code is invalid or has expired"));
        };

        let user = match self.media.create_user(&req.username, &req.password).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("{}: Failed to create user {}: {}", code, req.username, e);
                if let Err(re) = self.invites.release(&invite, &req.username).await {
                    tracing::error!("{}: Failed to return use: {}", code, re);
                }
                return Err(e.into());
            }
        };
        tracing::info!("{}: Created user {}", code, req.username);

        if self.state.settings.get::<NotificationsEnabled>().await? {
            let created_at = self.formatter().await?.format(OffsetDateTime::now_utc());
            self.notifier
                .dispatch_creation(&invite, &req.username, &req.email, &created_at);
        }
        let profile = self.apply_named_profile(&user.id, &invite.profile).await?;
        if self.state.settings.get::<PasswordResetsEnabled>().await? && !req.email.is_empty() {
            self.store_email(&user.id, &req.email).await?;
        }
        self.mirror_to_ombi(&req.username, &req.password, &req.email)
            .await?;
        self.media.invalidate_user_cache().await;
        Ok(RedeemOutcome {
            user_id: user.id,
            validation,
            profile,
        })
    }

    /// Creates an account without an invite and applies the default profile.
    pub async fn create_user_admin(&self, req: NewUserReq) -> LobbyResult<String> {
        self.ensure_username_free(&req.username).await?;
        let user = self
            .media
            .create_user(&req.username, &req.password)
            .await
            .inspect_err(|e| tracing::error!("Failed to create user {}: {}", req.username, e))?;
        tracing::info!("Created user {}", req.username);
        let report = self.apply_named_profile(&user.id, DEFAULT_PROFILE).await?;
        if !report.is_clean() {
            tracing::debug!("Default profile partly applied to {}: {:?}", user.id, report);
        }
        if self.state.settings.get::<PasswordResetsEnabled>().await? && !req.email.is_empty() {
            self.store_email(&user.id, &req.email).await?;
        }
        self.mirror_to_ombi(&req.username, &req.password, &req.email)
            .await?;
        self.media.invalidate_user_cache().await;
        Ok(user.id)
    }

    /// Deletes each user in turn. Deletion notices go only to accounts actually removed.
    pub async fn delete_users(&self, req: DeleteUsersReq) -> LobbyResult<()> {
        if req.users.is_empty() {
            return Err(LobbyError::validation("no users given"));
        }
        let addresses = if req.notify {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .emails()
                .get_all()
                .await?
        } else {
            Default::default()
        };
        let mut errors = BTreeMap::new();
        let mut first_error = None;
        let mut notices = Vec::new();
        for id in &req.users {
            match self.media.delete_user(id).await {
                Ok(()) => {
                    tracing::info!("Deleted user {}", id);
                    if let Some(address) = addresses.get(id) {
                        notices.push((id.clone(), address.clone()));
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to delete user {}: {}", id, e);
                    errors.insert(id.clone(), format!("{}: {}", e.status(), e));
                    first_error.get_or_insert(e);
                }
            }
        }
        self.notifier.dispatch_deleted(&notices, &req.reason);
        self.media.invalidate_user_cache().await;
        match first_error {
            None => Ok(()),
            Some(e) if errors.len() == req.users.len() => Err(e.into()),
            Some(_) => Err(LobbyError::PartialBatch(errors)),
        }
    }

    pub async fn list_users(&self) -> LobbyResult<Vec<UserSummary>> {
        let users = self.media.list_users().await?;
        let addresses = {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .emails()
                .get_all()
                .await?
        };
        let formatter = self.formatter().await?;
        Ok(users
            .into_iter()
            .map(|u| UserSummary {
                email: addresses.get(&u.id).cloned(),
                last_active: u
                    .last_activity_date
                    .map(|t| formatter.format(t))
                    .unwrap_or_else(|| "n/a".to_owned()),
                admin: u.is_admin(),
                id: u.id,
                name: u.name,
            })
            .collect())
    }

    /// Stores addresses for ids the media server knows; unknown ids are skipped.
    pub async fn modify_emails(&self, updates: EmailUpdates) -> LobbyResult<usize> {
        let users = self.media.list_users().await?;
        let mut tx = self.state.db.begin().await?;
        let mut written = 0;
        {
            let mut exec = LobbyDatabaseExecutor::new(&mut *tx);
            for user in &users {
                if let Some(address) = updates.get(&user.id) {
                    exec.emails().upsert_address(&user.id, address).await?;
                    written += 1;
                }
            }
        }
        tx.commit().await.resolve()?;
        tracing::info!("Email list modified, {} address(es) written", written);
        Ok(written)
    }

    /// Copies a user's policy, and with `homescreen` their layout, into a profile.
    pub async fn set_defaults(&self, req: SetDefaultsReq) -> LobbyResult<()> {
        let user = self.media.user_by_id(&req.id).await?;
        let mut profile = self.load_profile(&req.profile).await?.unwrap_or_default();
        profile.policy = user.policy;
        if req.homescreen {
            let prefs = self.media.get_display_preferences(&req.id).await?;
            profile.configuration = Some(user.configuration);
            profile.displayprefs = Some(prefs);
        }
        self.save_profile(&req.profile, &profile).await?;
        tracing::info!("Profile \"{}\" updated from user {}", req.profile, req.id);
        Ok(())
    }

    /// Pushes a profile or a live user's settings onto every target. The caller decides
    /// how to report a batch where every target failed.
    pub async fn apply_settings(&self, req: ApplySettingsReq) -> LobbyResult<BatchErrors> {
        if req.apply_to.is_empty() {
            return Err(LobbyError::validation("no users to apply settings to"));
        }
        let (policy, homescreen) = match req.from {
            ApplySource::Template => {
                let profile = self.load_profile(&req.profile).await?.ok_or_else(|| {
                    LobbyError::not_found(format!("profile \"{}\" not found", req.profile))
                })?;
                if profile.policy.is_empty() {
                    return Err(LobbyError::validation("no policy template available"));
                }
                let homescreen = match (req.homescreen, profile.homescreen()) {
                    (false, _) => None,
                    (true, Some((c, d))) => Some((c.clone(), d.clone())),
                    (true, None) => {
                        return Err(LobbyError::validation("no homescreen template available"));
                    }
                };
                (profile.policy, homescreen)
            }
            ApplySource::User => {
                let id = req
                    .id
                    .as_deref()
                    .ok_or_else(|| LobbyError::validation("source user id is required"))?;
                let user = self.media.user_by_id(id).await?;
                let homescreen = if req.homescreen {
                    let prefs = self.media.get_display_preferences(id).await?;
                    Some((user.configuration, prefs))
                } else {
                    None
                };
                (user.policy, homescreen)
            }
        };
        tracing::info!("Applying settings to {} user(s)", req.apply_to.len());
        let errors = self
            .provisioner
            .apply_to_users(
                &req.apply_to,
                &policy,
                homescreen.as_ref().map(|(c, d)| (c, d)),
            )
            .await;
        self.media.invalidate_user_cache().await;
        Ok(errors)
    }

    pub async fn list_profiles(&self) -> LobbyResult<Vec<ProfileSummary>> {
        let rows = {
            let mut conn = self.state.db.acquire().await?;
            LobbyDatabaseExecutor::new(&mut *conn)
                .profiles()
                .list_all()
                .await?
        };
        rows.into_iter()
            .map(|row| {
                let profile: Profile =
                    serde_json::from_str(&row.payload).map_err(DataBaseError::from)?;
                Ok::<_, LobbyError>(ProfileSummary {
                    homescreen: profile.homescreen().is_some(),
                    name: row.name,
                })
            })
            .collect()
    }

    pub async fn delete_profile(&self, name: &str) -> LobbyResult<()> {
        let mut conn = self.state.db.acquire().await?;
        match LobbyDatabaseExecutor::new(&mut *conn)
            .profiles()
            .delete_profile(name)
            .await
        {
            Ok(()) => {
                tracing::info!("Profile \"{}\" deleted", name);
                Ok(())
            }
            Err(DataBaseError::NoAffectedRows) => {
                Err(LobbyError::not_found(format!("profile \"{name}\" not found")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn ombi_users(&self) -> LobbyResult<Vec<OmbiUserSummary>> {
        Ok(self.ombi.list_users().await?)
    }

    /// Stores an Ombi user's settings as the template for future Ombi users.
    pub async fn set_ombi_defaults(&self, ombi_id: &str) -> LobbyResult<()> {
        let template = self.ombi.template_by_id(ombi_id).await?;
        let payload = serde_json::to_string(&template).map_err(DataBaseError::from)?;
        let mut conn = self.state.db.acquire().await?;
        LobbyDatabaseExecutor::new(&mut *conn)
            .templates()
            .set_template(OMBI_TEMPLATE_KIND, &payload)
            .await?;
        tracing::info!("Ombi template set from user {}", ombi_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invite::{GenerateInviteReq, NotifyFlags};
    use crate::services::media::MediaError;
    use crate::services::testing::{
        FakeMailer, FakeMediaServer, FakeOmbi, MediaCall, SentMail, recv_all, seed_profile,
        template, test_state,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        svc: AccountService,
        invites: Arc<InviteService>,
        state: Arc<LobbyState>,
        media: Arc<FakeMediaServer>,
        ombi: Arc<FakeOmbi>,
        rx: UnboundedReceiver<SentMail>,
    }

    async fn harness_with(media: FakeMediaServer, ombi: FakeOmbi) -> Harness {
        let state = test_state().await;
        let (mailer, rx) = FakeMailer::new();
        let notifier = Notifier::new(Arc::new(mailer));
        let invites = Arc::new(InviteService::new(state.clone(), notifier.clone()));
        let media = Arc::new(media);
        let ombi = Arc::new(ombi);
        let svc = AccountService::new(
            state.clone(),
            invites.clone(),
            media.clone(),
            ombi.clone(),
            notifier,
        );
        Harness {
            svc,
            invites,
            state,
            media,
            ombi,
            rx,
        }
    }

    async fn harness() -> Harness {
        harness_with(FakeMediaServer::default(), FakeOmbi::default()).await
    }

    fn new_user(name: &str, code: &str) -> NewUserReq {
        NewUserReq {
            username: name.into(),
            password: "Passw0rdish".into(),
            email: format!("{name}@example.com"),
            code: code.into(),
        }
    }

    async fn invite(h: &Harness, profile: Option<&str>) -> String {
        h.invites
            .generate(GenerateInviteReq {
                hours: 1,
                profile: profile.map(str::to_owned),
                ..Default::default()
            })
            .await
            .unwrap()
            .code
    }

    fn full_profile() -> Profile {
        Profile {
            policy: template(json!({"EnableDownloads": false})),
            configuration: Some(template(json!({"OrderedViews": ["a"]}))),
            displayprefs: Some(template(json!({"CustomPrefs": {"home0": "resume"}}))),
        }
    }

    #[tokio::test]
    async fn creation_notice_goes_only_to_subscribers() {
        let mut h = harness().await;
        let code = invite(&h, None).await;
        h.invites
            .set_notify(
                &code,
                "a@example.com",
                NotifyFlags {
                    expiry: None,
                    creation: Some(true),
                },
            )
            .await
            .unwrap();
        h.invites
            .set_notify(
                &code,
                "b@example.com",
                NotifyFlags {
                    expiry: Some(true),
                    creation: Some(false),
                },
            )
            .await
            .unwrap();

        let out = h.svc.redeem(new_user("alice", &code)).await.unwrap();
        assert_eq!(out.user_id, "id-alice");
        assert!(out.validation.is_valid());

        let sent = recv_all(&mut h.rx, 1).await;
        assert_eq!(sent[0].address, "a@example.com");
        assert!(sent[0].subject.contains(&code));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());

        assert!(matches!(
            h.svc.redeem(new_user("bob", &code)).await,
            Err(LobbyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn weak_password_leaves_invite_alone() {
        let h = harness().await;
        let code = invite(&h, None).await;
        let mut req = new_user("alice", &code);
        req.password = "short".into();
        match h.svc.redeem(req).await {
            Err(LobbyError::WeakPassword(v)) => assert!(!v.is_valid()),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(h.media.calls().is_empty());
        assert!(
            h.invites
                .validate_and_consume(&code, None)
                .await
                .unwrap()
                .is_match()
        );
    }

    #[tokio::test]
    async fn taken_username_is_rejected_before_consuming() {
        let h = harness_with(
            FakeMediaServer::default().with_user("id-alice", "alice", Template::new()),
            FakeOmbi::default(),
        )
        .await;
        let code = invite(&h, None).await;
        assert!(matches!(
            h.svc.redeem(new_user("alice", &code)).await,
            Err(LobbyError::AlreadyExists(_))
        ));
        assert!(
            h.invites
                .validate_and_consume(&code, None)
                .await
                .unwrap()
                .is_match()
        );
    }

    #[tokio::test]
    async fn media_failure_keeps_the_use() {
        let h = harness().await;
        h.media.fail_for("alice");
        let code = invite(&h, None).await;
        assert!(matches!(
            h.svc.redeem(new_user("alice", &code)).await,
            Err(LobbyError::Media(MediaError::Status(500)))
        ));
        let listed = h.invites.list(None).await.unwrap();
        assert_eq!(listed.invites.len(), 1);
        assert_eq!(listed.invites[0].remaining_uses, 1);
        assert!(listed.invites[0].used_by.is_empty());

        let out = h.svc.redeem(new_user("bob", &code)).await.unwrap();
        assert_eq!(out.user_id, "id-bob");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeems_share_one_use() {
        let h = harness().await;
        let code = invite(&h, None).await;
        let svc = Arc::new(h.svc);
        let attempts = (0..8)
            .map(|i| {
                let svc = svc.clone();
                let req = new_user(&format!("user{i}"), &code);
                tokio::spawn(async move { svc.redeem(req).await })
            })
            .collect::<Vec<_>>();
        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(LobbyError::NotFound(_)) => {}
                Err(e) => panic!("unexpected: {e:?}"),
            }
        }
        assert_eq!(created, 1);
        let accounts = h
            .media
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MediaCall::CreateUser(_)))
            .count();
        assert_eq!(accounts, 1);
        assert!(h.invites.list(None).await.unwrap().invites.is_empty());
    }

    #[tokio::test]
    async fn redeem_provisions_from_the_invite_profile() {
        let h = harness().await;
        seed_profile(&h.state.db, "Kids", &full_profile()).await;
        h.state
            .settings
            .set::<PasswordResetsEnabled>(&true)
            .await
            .unwrap();
        let code = invite(&h, Some("Kids")).await;
        let out = h.svc.redeem(new_user("alice", &code)).await.unwrap();
        assert!(out.profile.is_clean());
        let calls = h.media.calls();
        for expected in [
            MediaCall::SetPolicy("id-alice".into()),
            MediaCall::SetConfiguration("id-alice".into()),
            MediaCall::SetDisplayPreferences("id-alice".into()),
            MediaCall::InvalidateCache,
        ] {
            assert!(calls.contains(&expected), "missing {expected:?}");
        }
        let users = h.svc.list_users().await.unwrap();
        assert_eq!(users[0].email.as_deref(), Some("alice@example.com"));
        assert_eq!(users[0].last_active, "n/a");
    }

    #[tokio::test]
    async fn ombi_user_mirrored_when_enabled() {
        let h = harness().await;
        h.state.settings.set::<OmbiEnabled>(&true).await.unwrap();
        let code = invite(&h, None).await;
        h.svc.redeem(new_user("alice", &code)).await.unwrap();
        assert!(h.ombi.created().is_empty());

        h.svc.set_ombi_defaults("ombi-1").await.unwrap();
        let code = invite(&h, None).await;
        h.svc.redeem(new_user("bob", &code)).await.unwrap();
        assert_eq!(h.ombi.created(), vec!["bob".to_owned()]);
        assert!(matches!(
            h.svc.set_ombi_defaults("nope").await,
            Err(LobbyError::Ombi(_))
        ));
    }

    #[tokio::test]
    async fn ombi_rejection_does_not_fail_redeem() {
        let h = harness_with(FakeMediaServer::default(), FakeOmbi::rejecting()).await;
        h.state.settings.set::<OmbiEnabled>(&true).await.unwrap();
        h.svc.set_ombi_defaults("ombi-1").await.unwrap();
        let code = invite(&h, None).await;
        assert!(h.svc.redeem(new_user("alice", &code)).await.is_ok());
    }

    #[tokio::test]
    async fn admin_creation_applies_default_profile() {
        let h = harness().await;
        seed_profile(&h.state.db, DEFAULT_PROFILE, &full_profile()).await;
        let id = h
            .svc
            .create_user_admin(new_user("carol", ""))
            .await
            .unwrap();
        assert!(h.media.calls().contains(&MediaCall::SetPolicy(id)));
        assert!(matches!(
            h.svc.create_user_admin(new_user("carol", "")).await,
            Err(LobbyError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn delete_users_reports_partial_and_total_failure() {
        let mut h = harness_with(
            FakeMediaServer::default()
                .with_user("u1", "one", Template::new())
                .with_user("u2", "two", Template::new()),
            FakeOmbi::default(),
        )
        .await;
        h.svc
            .modify_emails(EmailUpdates::from([
                ("u1".to_owned(), "one@example.com".to_owned()),
                ("ghost".to_owned(), "ghost@example.com".to_owned()),
            ]))
            .await
            .unwrap();
        h.media.fail_for("u2");

        match h
            .svc
            .delete_users(DeleteUsersReq {
                users: vec!["u1".into(), "u2".into()],
                notify: true,
                reason: "cleanup".into(),
            })
            .await
        {
            Err(LobbyError::PartialBatch(map)) => {
                assert_eq!(map.len(), 1);
                assert!(map["u2"].starts_with("500"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        let sent = recv_all(&mut h.rx, 1).await;
        assert_eq!(sent[0].address, "one@example.com");

        assert!(matches!(
            h.svc
                .delete_users(DeleteUsersReq {
                    users: vec!["u2".into()],
                    notify: false,
                    reason: String::new(),
                })
                .await,
            Err(LobbyError::Media(_))
        ));
        assert!(matches!(
            h.svc
                .delete_users(DeleteUsersReq {
                    users: vec![],
                    notify: false,
                    reason: String::new(),
                })
                .await,
            Err(LobbyError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn defaults_round_trip_through_profiles() {
        let h = harness_with(
            FakeMediaServer::default().with_user(
                "src",
                "template-user",
                template(json!({"EnableDownloads": true})),
            ),
            FakeOmbi::default(),
        )
        .await;
        h.svc
            .set_defaults(SetDefaultsReq {
                id: "src".into(),
                homescreen: false,
                profile: DEFAULT_PROFILE.into(),
            })
            .await
            .unwrap();
        let listed = h.svc.list_profiles().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].homescreen);

        h.svc
            .set_defaults(SetDefaultsReq {
                id: "src".into(),
                homescreen: true,
                profile: DEFAULT_PROFILE.into(),
            })
            .await
            .unwrap();
        assert!(h.svc.list_profiles().await.unwrap()[0].homescreen);

        h.svc.delete_profile(DEFAULT_PROFILE).await.unwrap();
        assert!(matches!(
            h.svc.delete_profile(DEFAULT_PROFILE).await,
            Err(LobbyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn apply_settings_sources() {
        let h = harness_with(
            FakeMediaServer::default()
                .with_user("src", "source", template(json!({"EnableDownloads": true})))
                .with_user("t1", "one", Template::new())
                .with_user("t2", "two", Template::new()),
            FakeOmbi::default(),
        )
        .await;
        let from_template = |homescreen| ApplySettingsReq {
            from: ApplySource::Template,
            profile: DEFAULT_PROFILE.into(),
            id: None,
            apply_to: vec!["t1".into(), "t2".into()],
            homescreen,
        };
        assert!(matches!(
            h.svc.apply_settings(from_template(false)).await,
            Err(LobbyError::NotFound(_))
        ));
        seed_profile(
            &h.state.db,
            DEFAULT_PROFILE,
            &Profile {
                policy: template(json!({"EnableDownloads": false})),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            h.svc.apply_settings(from_template(true)).await,
            Err(LobbyError::Validation(_))
        ));
        assert!(
            h.svc
                .apply_settings(from_template(false))
                .await
                .unwrap()
                .is_empty()
        );

        h.media.fail_for("t1");
        h.media.fail_for("t2");
        let errors = h
            .svc
            .apply_settings(ApplySettingsReq {
                from: ApplySource::User,
                profile: DEFAULT_PROFILE.into(),
                id: Some("src".into()),
                apply_to: vec!["t1".into(), "t2".into()],
                homescreen: true,
            })
            .await
            .unwrap();
        assert!(errors.all_failed(2));

        let mut empty = from_template(false);
        empty.apply_to.clear();
        assert!(matches!(
            h.svc.apply_settings(empty).await,
            Err(LobbyError::Validation(_))
        ));
    }
}
