//! In-memory collaborators and fixtures shared by the service tests.

use crate::models::profile::{Profile, Template};
use crate::models::settings::NotificationsEnabled;
use crate::models::users::{OmbiUserSummary, RemoteUser};
use crate::services::mailer::{EmailMessage, MailError, MailResult, Mailer};
use crate::services::media::{MediaError, MediaResult, MediaServer};
use crate::services::ombi::{OmbiError, OmbiResult, OmbiService};
use crate::services::states::LobbyState;
use crate::services::states::config::AppConfig;
use crate::services::states::db::{DataBaseState, LobbyDatabaseExecutor};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

const SCHEMA: &str = include_str!("../../migrations/20250601000000_init.sql");

/// A private in-memory database. One connection keeps the schema alive for the pool's lifetime.
pub async fn memory_db() -> DataBaseState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::raw_sql(SCHEMA).execute(&pool).await.unwrap();
    DataBaseState::new(pool)
}

/// Seeded settings with notifications switched on, everything else at defaults.
pub async fn test_state() -> Arc<LobbyState> {
    let state = LobbyState::new(memory_db().await, Arc::new(AppConfig::default()));
    state.settings.initialise().await.unwrap();
    state
        .settings
        .set::<NotificationsEnabled>(&true)
        .await
        .unwrap();
    Arc::new(state)
}

pub async fn seed_profile(db: &DataBaseState, name: &str, profile: &Profile) {
    let mut conn = db.acquire().await.unwrap();
    LobbyDatabaseExecutor::new(&mut *conn)
        .profiles()
        .upsert_profile(name, &serde_json::to_string(profile).unwrap())
        .await
        .unwrap();
}

pub fn template(v: serde_json::Value) -> Template {
    match v {
        serde_json::Value::Object(m) => m,
        _ => Template::new(),
    }
}

/// Waits for exactly `n` reports, failing the test if they do not arrive in time.
pub async fn recv_all(rx: &mut UnboundedReceiver<SentMail>, n: usize) -> Vec<SentMail> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let sent = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for mail")
            .expect("mail channel closed");
        out.push(sent);
    }
    out.sort_by(|a, b| a.address.cmp(&b.address));
    out
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub address: String,
    pub subject: String,
    pub delivered: bool,
}

/// Reports every send attempt over a channel. Addresses in the failing set are
/// reported undelivered and the send errors.
pub struct FakeMailer {
    tx: UnboundedSender<SentMail>,
    failing: HashSet<String>,
}

impl FakeMailer {
    pub fn new() -> (Self, UnboundedReceiver<SentMail>) {
        Self::failing_for(std::iter::empty::<&str>())
    }

    pub fn failing_for<'a, I>(addresses: I) -> (Self, UnboundedReceiver<SentMail>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (tx, rx) = unbounded_channel();
        let failing = addresses.into_iter().map(str::to_owned).collect();
        (Self { tx, failing }, rx)
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, address: &str, msg: &EmailMessage) -> MailResult<()> {
        let delivered = !self.failing.contains(address);
        let _ = self.tx.send(SentMail {
            address: address.to_owned(),
            subject: msg.subject.clone(),
            delivered,
        });
        if delivered {
            Ok(())
        } else {
            Err(MailError::SendFailed(format!("{address} bounced")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    CreateUser(String),
    DeleteUser(String),
    SetPolicy(String),
    SetConfiguration(String),
    SetDisplayPreferences(String),
    InvalidateCache,
}

#[derive(Default)]
struct FakeMediaInner {
    users: Vec<RemoteUser>,
    calls: Vec<MediaCall>,
    failing: HashSet<String>,
}

/// A media server held in memory. Names or ids marked with `fail_for` get a 500 on every call.
#[derive(Default)]
pub struct FakeMediaServer {
    inner: Mutex<FakeMediaInner>,
}

impl FakeMediaServer {
    pub fn fail_for(&self, key: &str) {
        self.inner.lock().unwrap().failing.insert(key.to_owned());
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn with_user(self, id: &str, name: &str, policy: Template) -> Self {
        self.inner.lock().unwrap().users.push(RemoteUser {
            id: id.to_owned(),
            name: name.to_owned(),
            policy,
            configuration: template(serde_json::json!({"OrderedViews": ["movies"]})),
            ..Default::default()
        });
        self
    }

    pub fn user_named(&self, name: &str) -> Option<RemoteUser> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|u| u.name == name).cloned()
    }

    fn record(&self, key: &str, call: MediaCall) -> MediaResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(key) {
            return Err(MediaError::Status(500));
        }
        inner.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn create_user(&self, username: &str, _password: &str) -> MediaResult<RemoteUser> {
        self.record(username, MediaCall::CreateUser(username.to_owned()))?;
        let user = RemoteUser {
            id: format!("id-{username}"),
            name: username.to_owned(),
            ..Default::default()
        };
        self.inner.lock().unwrap().users.push(user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> MediaResult<()> {
        self.record(user_id, MediaCall::DeleteUser(user_id.to_owned()))?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != user_id);
        if inner.users.len() == before {
            return Err(MediaError::Status(404));
        }
        Ok(())
    }

    async fn user_by_name(&self, username: &str) -> MediaResult<Option<RemoteUser>> {
        Ok(self.user_named(username))
    }

    async fn user_by_id(&self, user_id: &str) -> MediaResult<RemoteUser> {
        let inner = self.inner.lock().unwrap();
        if inner.failing.contains(user_id) {
            return Err(MediaError::Status(500));
        }
        inner
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(MediaError::Status(404))
    }

    async fn list_users(&self) -> MediaResult<Vec<RemoteUser>> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn set_policy(&self, user_id: &str, _policy: &Template) -> MediaResult<()> {
        self.record(user_id, MediaCall::SetPolicy(user_id.to_owned()))
    }

    async fn set_configuration(&self, user_id: &str, _configuration: &Template) -> MediaResult<()> {
        self.record(user_id, MediaCall::SetConfiguration(user_id.to_owned()))
    }

    async fn get_display_preferences(&self, user_id: &str) -> MediaResult<Template> {
        if self.inner.lock().unwrap().failing.contains(user_id) {
            return Err(MediaError::Status(500));
        }
        Ok(template(serde_json::json!({"CustomPrefs": {"home0": "smalllibrarytiles"}})))
    }

    async fn set_display_preferences(&self, user_id: &str, _prefs: &Template) -> MediaResult<()> {
        self.record(user_id, MediaCall::SetDisplayPreferences(user_id.to_owned()))
    }

    async fn invalidate_user_cache(&self) {
        self.inner.lock().unwrap().calls.push(MediaCall::InvalidateCache);
    }
}

/// Records the usernames it was asked to create.
#[derive(Default)]
pub struct FakeOmbi {
    created: Mutex<Vec<String>>,
    reject: bool,
}

impl FakeOmbi {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl OmbiService for FakeOmbi {
    async fn create_user(
        &self,
        username: &str,
        _password: &str,
        _email: &str,
        _template: &Template,
    ) -> OmbiResult<()> {
        if self.reject {
            return Err(OmbiError::Rejected(vec!["Username taken".into()]));
        }
        self.created.lock().unwrap().push(username.to_owned());
        Ok(())
    }

    async fn list_users(&self) -> OmbiResult<Vec<OmbiUserSummary>> {
        Ok(vec![OmbiUserSummary {
            name: "requester".into(),
            id: "ombi-1".into(),
        }])
    }

    async fn template_by_id(&self, id: &str) -> OmbiResult<Template> {
        if id != "ombi-1" {
            return Err(OmbiError::Status(404));
        }
        Ok(template(serde_json::json!({"movieRequestLimit": 5})))
    }
}
