use crate::models::api::prelude::*;
use crate::models::settings::OmbiEnabled;
use crate::models::users::OmbiUserSummary;
use crate::services::accounts::AccountService;
use crate::services::states::LobbyState;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type OmbiRouterState = State<(Arc<LobbyState>, Arc<AccountService>)>;

async fn ensure_enabled(state: &LobbyState) -> ApiResult<()> {
    match state.settings.get::<OmbiEnabled>().await? {
        true => Ok(()),
        false => Err(bad_request!("Ombi integration is disabled")),
    }
}

#[derive(Debug, Serialize)]
pub struct OmbiUsersRes {
    pub users: Vec<OmbiUserSummary>,
}

pub async fn ombi_users(
    State((state, accounts)): OmbiRouterState,
) -> ApiResult<Json<GeneralResponse<OmbiUsersRes>>> {
    ensure_enabled(&state).await?;
    let users = accounts.ombi_users().await?;
    Ok(general_json_res!("Ombi users fetched", OmbiUsersRes { users }))
}

#[derive(Debug, Deserialize)]
pub struct SetOmbiDefaultsReq {
    pub id: String,
}

pub async fn set_ombi_defaults(
    State((state, accounts)): OmbiRouterState,
    Json(req): Json<SetOmbiDefaultsReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    ensure_enabled(&state).await?;
    accounts.set_ombi_defaults(&req.id).await?;
    Ok(general_json_res!("Ombi template saved"))
}
