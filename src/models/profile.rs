use crate::models::const_val::DEFAULT_PROFILE;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

/// Opaque remote-server document. Its schema belongs to the media server.
pub type Template = serde_json::Map<String, serde_json::Value>;

/// A named provisioning template: policy plus optional homescreen layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub policy: Template,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Template>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayprefs: Option<Template>,
}

impl Profile {
    /// Configuration and display preferences, only when both are present and non-empty.
    pub fn homescreen(&self) -> Option<(&Template, &Template)> {
        match (&self.configuration, &self.displayprefs) {
            (Some(c), Some(d)) if !c.is_empty() && !d.is_empty() => Some((c, d)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub homescreen: bool,
}

/// Copy a live user's settings into a named profile.
#[serde_inline_default]
#[derive(Debug, Clone, Deserialize)]
pub struct SetDefaultsReq {
    pub id: String,
    #[serde(default)]
    pub homescreen: bool,
    #[serde_inline_default(DEFAULT_PROFILE.to_owned())]
    pub profile: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplySource {
    Template,
    User,
}

#[serde_inline_default]
#[derive(Debug, Clone, Deserialize)]
pub struct ApplySettingsReq {
    pub from: ApplySource,
    #[serde_inline_default(DEFAULT_PROFILE.to_owned())]
    pub profile: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub apply_to: Vec<String>,
    #[serde(default)]
    pub homescreen: bool,
}
