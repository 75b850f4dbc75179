use crate::utils::smart_to_string::prelude::*;
use lobby_macros::LobbyBusinessError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, LobbyBusinessError)]
pub enum SettingParseError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: SmartStringError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingEntry {
    pub val: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

pub type SettingsKvMap = BTreeMap<&'static str, SettingEntry>;

/// A runtime setting persisted in `system_settings`.
pub trait Setting {
    type Value: Serialize + DeserializeOwned;
    const KEY: &'static str;
    const DESC: Option<&'static str>;
    fn default_val() -> Self::Value;
    fn parse(s: &str) -> SmartStringResult<Self::Value>;
    fn render(v: &Self::Value) -> SmartStringResult<String>;
}

macro_rules! opt {
    () => {
        None
    };
    ($s:expr) => {
        Some($s)
    };
}

macro_rules! define_settings {
    (
        $(
            $variant:ident => {
                key: $key:literal,
                typ: $ty:ty,
                default_val: $default_val:expr
                $(, desc: $desc:expr)?
            }
        ),* $(,)?
    ) => {
        use once_cell::sync::Lazy;
        use crate::{smart_parse, smart_string};

        $(
            pub struct $variant;

            impl Setting for $variant {
                type Value = $ty;

                const KEY: &'static str = $key;

                const DESC: Option<&'static str> = opt!($($desc)?);

                fn default_val() -> Self::Value {
                    $default_val
                }

                fn parse(s: &str) -> SmartStringResult<Self::Value> {
                    smart_parse!($ty, s)
                }

                fn render(v: &Self::Value) -> SmartStringResult<String> {
                    smart_string!(*v)
                }
            }
        )*

        pub struct SettingCollector;

        impl SettingCollector {
            /// Every known key with its rendered default.
            pub fn defaults() -> &'static SettingsKvMap {
                static KV: Lazy<SettingsKvMap> = Lazy::new(|| {
                    let mut m = BTreeMap::new();
                    $(
                        match $variant::render(&$variant::default_val()) {
                            Ok(val) => {
                                m.insert($key, SettingEntry { val, description: $variant::DESC });
                            }
                            Err(e) => tracing::error!("Cannot render default of {}: {}", $key, e),
                        }
                    )*
                    m
                });
                &*KV
            }

            /// Parses `input` as the type behind `key` and returns its canonical rendering.
            pub fn validate(key: &str, input: &str) -> Result<SettingEntry, SettingParseError> {
                match key {
                    $(
                        $key => $variant::parse(input)
                            .and_then(|v| $variant::render(&v))
                            .map(|val| SettingEntry { val, description: $variant::DESC })
                            .map_err(|source| SettingParseError::InvalidValue {
                                key: key.to_owned(),
                                source,
                            }),
                    )*
                    _ => Err(SettingParseError::UnknownKey(key.to_owned())),
                }
            }
        }
    };
}

define_settings! {
    NotificationsEnabled => {
        key: "notifications.enabled",
        typ: bool,
        default_val: false,
        desc: "Send expiry and account creation notices to subscribed addresses"
    },
    InviteEmailsEnabled => {
        key: "invite_emails.enabled",
        typ: bool,
        default_val: false,
        desc: "Email new invites to the address given at generation"
    },
    PasswordResetsEnabled => {
        key: "password_resets.enabled",
        typ: bool,
        default_val: false,
        desc: "Record the address of each new account for password resets"
    },
    OmbiEnabled => {
        key: "ombi.enabled",
        typ: bool,
        default_val: false,
        desc: "Mirror new accounts into Ombi using the stored template"
    },
    JellyfinLogin => {
        key: "ui.jellyfin_login",
        typ: bool,
        default_val: false,
        desc: "Admins are media server users; their address comes from the email directory"
    },
    AdminEmail => {
        key: "ui.email",
        typ: String,
        default_val: String::new(),
        desc: "Address of the single admin when media server login is off"
    },
    DateFormat => {
        key: "email.date_format",
        typ: String,
        default_val: "%d/%m/%y".to_string(),
        desc: "strftime style date pattern used in listings and emails"
    },
    Use24h => {
        key: "email.use_24h",
        typ: bool,
        default_val: true
    },
}
