use crate::models::const_val::MEDIA_OK_STATUSES;
use crate::models::profile::Template;
use crate::models::users::RemoteUser;
use crate::services::media::{MediaError, MediaResult, MediaServer};
use crate::services::states::config::JellyfinConfig;
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const TOKEN_HEADER: &str = "X-Emby-Token";

pub struct JellyfinClient {
    http: Client,
    base: Url,
    api_key: String,
    users: Cache<(), Arc<Vec<RemoteUser>>>,
}

impl JellyfinClient {
    pub fn new(cfg: &JellyfinConfig) -> MediaResult<Self> {
        let base = Url::parse(&cfg.server).map_err(|e| MediaError::InvalidConfig(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(MediaError::InvalidConfig(format!(
                "{} cannot be used as a base url",
                cfg.server
            )));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| MediaError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http,
            base,
            api_key: cfg.api_key.to_string(),
            users: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(cfg.user_cache_secs))
                .build(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn display_prefs_endpoint(&self, user_id: &str) -> Url {
        let mut url = self.endpoint(&["DisplayPreferences", "usersettings"]);
        url.query_pairs_mut()
            .append_pair("userId", user_id)
            .append_pair("client", "emby");
        url
    }

    async fn send(&self, req: RequestBuilder) -> MediaResult<Response> {
        let resp = req
            .header(TOKEN_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        if MEDIA_OK_STATUSES.contains(&status) {
            Ok(resp)
        } else {
            tracing::debug!("Jellyfin {} responded with {}", resp.url(), status);
            Err(MediaError::Status(status))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> MediaResult<T> {
        self.send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| MediaError::Decode(e.to_string()))
    }

    async fn fetch_users(&self) -> MediaResult<Arc<Vec<RemoteUser>>> {
        tracing::trace!("User cache miss, fetching from Jellyfin");
        let users: Vec<RemoteUser> = self
            .send_json(self.http.get(self.endpoint(&["Users"])))
            .await?;
        Ok(Arc::new(users))
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    async fn create_user(&self, username: &str, password: &str) -> MediaResult<RemoteUser> {
        let body = json!({ "Name": username, "Password": password });
        let user = self
            .send_json(self.http.post(self.endpoint(&["Users", "New"])).json(&body))
            .await?;
        self.users.invalidate_all();
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> MediaResult<()> {
        self.send(self.http.delete(self.endpoint(&["Users", user_id])))
            .await?;
        Ok(())
    }

    async fn user_by_name(&self, username: &str) -> MediaResult<Option<RemoteUser>> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.name == username))
    }

    async fn user_by_id(&self, user_id: &str) -> MediaResult<RemoteUser> {
        self.send_json(self.http.get(self.endpoint(&["Users", user_id])))
            .await
    }

    async fn list_users(&self) -> MediaResult<Vec<RemoteUser>> {
        let users = self
            .users
            .try_get_with((), self.fetch_users())
            .await
            .map_err(|e| (*e).clone())?;
        Ok(users.as_ref().clone())
    }

    async fn set_policy(&self, user_id: &str, policy: &Template) -> MediaResult<()> {
        self.send(
            self.http
                .post(self.endpoint(&["Users", user_id, "Policy"]))
                .json(policy),
        )
        .await?;
        Ok(())
    }

    async fn set_configuration(&self, user_id: &str, configuration: &Template) -> MediaResult<()> {
        self.send(
            self.http
                .post(self.endpoint(&["Users", user_id, "Configuration"]))
                .json(configuration),
        )
        .await?;
        Ok(())
    }

    async fn get_display_preferences(&self, user_id: &str) -> MediaResult<Template> {
        self.send_json(self.http.get(self.display_prefs_endpoint(user_id)))
            .await
    }

    async fn set_display_preferences(&self, user_id: &str, prefs: &Template) -> MediaResult<()> {
        self.send(
            self.http
                .post(self.display_prefs_endpoint(user_id))
                .json(prefs),
        )
        .await?;
        Ok(())
    }

    async fn invalidate_user_cache(&self) {
        self.users.invalidate_all();
    }
}
