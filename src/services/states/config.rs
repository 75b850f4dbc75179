use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct CommonConfig {
    pub host: Cow<'static, str>,
    pub port: usize,
    pub log_level: Cow<'static, str>,
    pub concurrency_limit: usize,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8056,
            log_level: "info,lobby=debug".into(),
            concurrency_limit: 128,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataBaseConfig {
    pub db_url: Cow<'static, str>,
    pub sqlite_connection_nums: u32,
}

impl Default for DataBaseConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite://data/lobby.db".into(),
            sqlite_connection_nums: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvitesConfig {
    /// How long a loaded invite snapshot is trusted before re-reading the table.
    pub reload_window_ms: u64,
    /// Period of the background expiry sweep, 0 disables it.
    pub sweep_interval_secs: u64,
    /// Base of the link put in invite emails, the code is appended as a path segment.
    pub public_url: Cow<'static, str>,
}

impl Default for InvitesConfig {
    fn default() -> Self {
        Self {
            reload_window_ms: 1000,
            sweep_interval_secs: 300,
            public_url: "http://127.0.0.1:8056/invite".into(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Offset applied when rendering instants, comparisons always use UTC.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JellyfinConfig {
    pub server: Cow<'static, str>,
    #[serde(default, skip_serializing)]
    pub api_key: Cow<'static, str>,
    pub timeout_secs: u64,
    pub user_cache_secs: u64,
}

impl Default for JellyfinConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8096".into(),
            api_key: "".into(),
            timeout_secs: 10,
            user_cache_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OmbiConfig {
    pub server: Cow<'static, str>,
    #[serde(default, skip_serializing)]
    pub api_key: Cow<'static, str>,
    pub timeout_secs: u64,
}

impl Default for OmbiConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:5000".into(),
            api_key: "".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Without a host, mail is only logged.
    pub host: Option<Cow<'static, str>>,
    pub port: u16,
    pub username: Option<Cow<'static, str>>,
    #[serde(default, skip_serializing)]
    pub password: Option<Cow<'static, str>>,
    pub use_tls: bool,
    pub from_address: Cow<'static, str>,
    pub from_name: Cow<'static, str>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            use_tls: true,
            from_address: "noreply@lobby.local".into(),
            from_name: "Lobby".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordValidationConfig {
    pub enabled: bool,
    pub min_length: u32,
    pub upper: u32,
    pub lower: u32,
    pub number: u32,
    pub special: u32,
}

impl Default for PasswordValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: 8,
            upper: 1,
            lower: 0,
            number: 1,
            special: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub common: CommonConfig,
    pub db: DataBaseConfig,
    pub invites: InvitesConfig,
    pub display: DisplayConfig,
    pub jellyfin: JellyfinConfig,
    pub ombi: OmbiConfig,
    pub smtp: SmtpConfig,
    pub password_validation: PasswordValidationConfig,
}

impl AppConfig {
    pub fn load(cfg_path: &str) -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed("LOBBY_").split("__").global());
        if Path::new(cfg_path).exists() {
            figment = figment.merge(Toml::file(cfg_path));
        }
        figment.extract().map_err(Into::into)
    }
}
