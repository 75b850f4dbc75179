use crate::models::profile::Template;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A user record as the media server reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteUser {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub last_activity_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub policy: Template,
    #[serde(default)]
    pub configuration: Template,
}

/// Unparseable or missing activity dates read as "never".
fn lenient_instant<'de, D>(d: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()))
}

impl RemoteUser {
    pub fn is_admin(&self) -> bool {
        self.policy
            .get("IsAdministrator")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub last_active: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmbiUserSummary {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserReq {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    /// Ignored when an admin creates the user.
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUsersReq {
    pub users: Vec<String>,
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub reason: String,
}

/// User id to address.
pub type EmailUpdates = BTreeMap<String, String>;
