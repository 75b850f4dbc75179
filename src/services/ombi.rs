use crate::models::profile::Template;
use crate::models::users::OmbiUserSummary;
use crate::services::states::config::OmbiConfig;
use async_trait::async_trait;
use lobby_macros::LobbyBusinessError;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Identity fields of an Ombi user that must not leak into a template.
const IDENTITY_FIELDS: [&str; 6] = [
    "id",
    "userName",
    "alias",
    "emailAddress",
    "hasLoggedIn",
    "lastLoggedIn",
];

#[derive(Debug, Clone, thiserror::Error, LobbyBusinessError)]
pub enum OmbiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("Ombi responded with {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("Ombi rejected the request: {}", .0.join(", "))]
    Rejected(Vec<String>),
    #[error("invalid Ombi configuration: {0}")]
    InvalidConfig(String),
}

pub type OmbiResult<T> = Result<T, OmbiError>;

#[async_trait]
pub trait OmbiService: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        template: &Template,
    ) -> OmbiResult<()>;
    async fn list_users(&self) -> OmbiResult<Vec<OmbiUserSummary>>;
    /// The user's settings with identity fields stripped, ready to stamp onto new users.
    async fn template_by_id(&self, id: &str) -> OmbiResult<Template>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOmbiUser {
    id: String,
    #[serde(default)]
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct IdentityResult {
    #[serde(default)]
    successful: bool,
    #[serde(default)]
    errors: Vec<String>,
}

pub struct OmbiClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl OmbiClient {
    pub fn new(cfg: &OmbiConfig) -> OmbiResult<Self> {
        let base = Url::parse(&cfg.server).map_err(|e| OmbiError::InvalidConfig(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(OmbiError::InvalidConfig(format!(
                "{} cannot be used as a base url",
                cfg.server
            )));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| OmbiError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http,
            base,
            api_key: cfg.api_key.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "v1", "Identity"])
                .extend(segments);
        }
        url
    }

    async fn send(&self, req: RequestBuilder) -> OmbiResult<Response> {
        let resp = req
            .header("ApiKey", &self.api_key)
            .send()
            .await
            .map_err(|e| OmbiError::Transport(e.to_string()))?;
        match resp.status().as_u16() {
            200 => Ok(resp),
            other => Err(OmbiError::Status(other)),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> OmbiResult<T> {
        self.send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| OmbiError::Decode(e.to_string()))
    }
}

fn strip_identity(mut user: Template) -> Template {
    for field in IDENTITY_FIELDS {
        user.remove(field);
    }
    user
}

#[async_trait]
impl OmbiService for OmbiClient {
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        template: &Template,
    ) -> OmbiResult<()> {
        let mut body = template.clone();
        body.insert("userName".into(), username.into());
        body.insert("password".into(), password.into());
        body.insert("emailAddress".into(), email.into());
        let res: IdentityResult = self
            .send_json(self.http.post(self.endpoint(&[])).json(&body))
            .await?;
        if res.successful {
            Ok(())
        } else {
            Err(OmbiError::Rejected(res.errors))
        }
    }

    async fn list_users(&self) -> OmbiResult<Vec<OmbiUserSummary>> {
        let users: Vec<RawOmbiUser> = self
            .send_json(self.http.get(self.endpoint(&["Users"])))
            .await?;
        Ok(users
            .into_iter()
            .map(|u| OmbiUserSummary {
                name: u.user_name,
                id: u.id,
            })
            .collect())
    }

    async fn template_by_id(&self, id: &str) -> OmbiResult<Template> {
        let user: Template = self
            .send_json(self.http.get(self.endpoint(&["User", id])))
            .await?;
        if user.is_empty() {
            return Err(OmbiError::Decode(format!("empty user record for {id}")));
        }
        Ok(strip_identity(user))
    }
}
