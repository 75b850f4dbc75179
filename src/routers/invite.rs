use crate::layers::requester::Requester;
use crate::models::api::prelude::*;
use crate::models::invite::{GenerateInviteReq, InviteList, NotifyFlags};
use crate::services::invites::InviteService;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

pub type InviteRouterState = State<Arc<InviteService>>;

#[derive(Debug, Serialize)]
pub struct GenerateInviteRes {
    pub code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub valid_till: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub async fn generate_invite(
    State(invites): InviteRouterState,
    Json(req): Json<GenerateInviteReq>,
) -> ApiResult<Json<GeneralResponse<GenerateInviteRes>>> {
    let invite = invites.generate(req).await?;
    Ok(general_json_res!(
        "Invite created",
        GenerateInviteRes {
            code: invite.code,
            valid_till: invite.valid_till,
            email: invite.email,
        }
    ))
}

pub async fn list_invites(
    requester: Requester,
    State(invites): InviteRouterState,
) -> ApiResult<Json<GeneralResponse<InviteList>>> {
    let address = invites
        .requester_address(requester.user_id.as_deref())
        .await?;
    let list = invites.list(address.as_deref()).await?;
    Ok(general_json_res!("Invites fetched", list))
}

#[derive(Debug, Deserialize)]
pub struct DeleteInviteReq {
    pub code: String,
}

pub async fn delete_invite(
    State(invites): InviteRouterState,
    Json(req): Json<DeleteInviteReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    invites.delete(&req.code).await?;
    Ok(general_json_res!("Invite deleted"))
}

#[derive(Debug, Deserialize)]
pub struct SetInviteProfileReq {
    pub invite: String,
    #[serde(default)]
    pub profile: String,
}

pub async fn set_invite_profile(
    State(invites): InviteRouterState,
    Json(req): Json<SetInviteProfileReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    invites.set_profile(&req.invite, &req.profile).await?;
    Ok(general_json_res!("Invite profile set"))
}

/// Invite code to the flags to change for the requester.
pub type SetInviteNotifyReq = BTreeMap<String, NotifyFlags>;

#[derive(Debug, Serialize)]
pub struct SetInviteNotifyRes {
    pub changed: bool,
}

pub async fn set_invite_notify(
    requester: Requester,
    State(invites): InviteRouterState,
    Json(req): Json<SetInviteNotifyReq>,
) -> ApiResult<Json<GeneralResponse<SetInviteNotifyRes>>> {
    let address = invites
        .requester_address(requester.user_id.as_deref())
        .await?
        .ok_or_else(|| bad_request!("No email address is known for the requester"))?;
    let changed = invites.set_notify_batch(&address, req).await?;
    Ok(general_json_res!(
        "Notification preferences updated",
        SetInviteNotifyRes { changed }
    ))
}
