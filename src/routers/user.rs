use crate::models::api::prelude::*;
use crate::models::profile::ApplySettingsReq;
use crate::models::users::{DeleteUsersReq, EmailUpdates, NewUserReq, UserSummary};
use crate::services::accounts::AccountService;
use crate::services::password::PasswordValidation;
use crate::services::provisioner::{ApplyReport, BatchErrors};
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::sync::Arc;

pub type UserRouterState = State<Arc<AccountService>>;

#[derive(Debug, Serialize)]
pub struct RedeemRes {
    pub user_id: String,
    pub validation: PasswordValidation,
    /// Profile steps that failed. The account exists regardless.
    pub profile_errors: ApplyReport,
}

pub async fn redeem_invite(
    State(accounts): UserRouterState,
    Json(req): Json<NewUserReq>,
) -> ApiResult<Json<GeneralResponse<RedeemRes>>> {
    let out = accounts.redeem(req).await?;
    Ok(general_json_res!(
        "User created",
        RedeemRes {
            user_id: out.user_id,
            validation: out.validation,
            profile_errors: out.profile,
        }
    ))
}

#[derive(Debug, Serialize)]
pub struct NewUserAdminRes {
    pub user_id: String,
}

pub async fn new_user_admin(
    State(accounts): UserRouterState,
    Json(req): Json<NewUserReq>,
) -> ApiResult<Json<GeneralResponse<NewUserAdminRes>>> {
    let user_id = accounts.create_user_admin(req).await?;
    Ok(general_json_res!("User created", NewUserAdminRes { user_id }))
}

pub async fn delete_users(
    State(accounts): UserRouterState,
    Json(req): Json<DeleteUsersReq>,
) -> ApiResult<Json<GeneralResponse<()>>> {
    accounts.delete_users(req).await?;
    Ok(general_json_res!("Users deleted"))
}

#[derive(Debug, Serialize)]
pub struct GetUsersRes {
    pub users: Vec<UserSummary>,
}

pub async fn get_users(
    State(accounts): UserRouterState,
) -> ApiResult<Json<GeneralResponse<GetUsersRes>>> {
    let users = accounts.list_users().await?;
    Ok(general_json_res!("Users fetched", GetUsersRes { users }))
}

#[derive(Debug, Serialize)]
pub struct ModifyEmailsRes {
    pub written: usize,
}

pub async fn modify_emails(
    State(accounts): UserRouterState,
    Json(req): Json<EmailUpdates>,
) -> ApiResult<Json<GeneralResponse<ModifyEmailsRes>>> {
    let written = accounts.modify_emails(req).await?;
    Ok(general_json_res!("Email list modified", ModifyEmailsRes { written }))
}

pub async fn apply_settings(
    State(accounts): UserRouterState,
    Json(req): Json<ApplySettingsReq>,
) -> ApiResult<Json<GeneralResponse<BatchErrors>>> {
    let targets = req.apply_to.len();
    let errors = accounts.apply_settings(req).await?;
    if errors.all_failed(targets) {
        return Err(internal!("Failed to apply settings to every user")
            .with_data(serde_json::to_value(&errors).ok()));
    }
    Ok(general_json_res!("Settings applied", errors))
}
