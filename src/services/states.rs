pub mod config;
pub mod db;

use crate::services::settings::RuntimeSettings;
use config::AppConfig;
use db::DataBaseState;
use std::sync::Arc;

pub struct LobbyState {
    pub db: DataBaseState,
    pub settings: RuntimeSettings,
    pub config: Arc<AppConfig>,
}

impl LobbyState {
    pub fn new(db: DataBaseState, config: Arc<AppConfig>) -> Self {
        Self {
            settings: RuntimeSettings::new(db.clone()),
            db,
            config,
        }
    }
}
