use crate::errors::LobbyError;
use crate::models::api::prelude::*;
use crate::models::settings::{SettingEntry, SettingsKvMap};
use crate::services::states::LobbyState;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SettingsRouterState = State<Arc<LobbyState>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GetSettingsReq {
    All,
    Single { key: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GetSettingsRes {
    All(SettingsKvMap),
    Single(SettingEntry),
}

pub async fn get_settings(
    State(state): SettingsRouterState,
    Json(req): Json<GetSettingsReq>,
) -> ApiResult<Json<GeneralResponse<GetSettingsRes>>> {
    let res = match req {
        GetSettingsReq::All => GetSettingsRes::All(state.settings.all().await?),
        GetSettingsReq::Single { key } => GetSettingsRes::Single(
            state
                .settings
                .get_raw(&key)
                .await
                .map_err(|e| match e {
                    LobbyError::Setting(_) => not_found!(e, "Cannot find the given key"),
                    other => other.into(),
                })?,
        ),
    };
    Ok(general_json_res!("Successfully got settings", res))
}

#[derive(Debug, Deserialize)]
pub struct SetSettingReq {
    key: String,
    new_value: String,
}

pub async fn set_setting(
    State(state): SettingsRouterState,
    Json(req): Json<SetSettingReq>,
) -> ApiResult<Json<GeneralResponse<SettingEntry>>> {
    let entry = state.settings.set_raw(&req.key, &req.new_value).await?;
    Ok(general_json_res!("Successfully set setting", entry))
}
