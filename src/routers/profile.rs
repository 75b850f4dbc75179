use crate::models::api::prelude::*;
use crate::models::profile::{ProfileSummary, SetDefaultsReq};
use crate::services::accounts::AccountService;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ProfileRouterState = State<Arc<AccountService>>;

#[derive(Debug, Serialize)]
pub struct ListProfilesRes {
    pub profiles: Vec<ProfileSummary>,
}

pub async fn list_profiles(
    State(accounts): ProfileRouterState,
) -> ApiResult<Json<GeneralResponse<ListProfilesRes>>> {
    let profiles = accounts.list_profiles().await?;
    Ok(general_json_res!("Profiles fetched", ListProfilesRes { profiles }))
}

pub async fn set_defaults(
    State(accounts): ProfileRouterState,
    Json(req): Json<SetDefaultsReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    accounts.set_defaults(req).await?;
    Ok(general_json_res!("Profile saved"))
}

#[derive(Debug, Deserialize)]
pub struct DeleteProfileReq {
    pub name: String,
}

pub async fn delete_profile(
    State(accounts): ProfileRouterState,
    Json(req): Json<DeleteProfileReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    accounts.delete_profile(&req.name).await?;
    Ok(general_json_res!("Profile deleted"))
}
