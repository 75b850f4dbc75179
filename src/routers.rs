use crate::layers::requester::RequesterLayer;
use crate::models::const_val::LOBBY_REQUEST_ID_HEADER;
use crate::routers::invite::{
    delete_invite, generate_invite, list_invites, set_invite_notify, set_invite_profile,
};
use crate::routers::ombi::{ombi_users, set_ombi_defaults};
use crate::routers::profile::{delete_profile, list_profiles, set_defaults};
use crate::routers::settings::{get_settings, set_setting};
use crate::routers::user::{
    apply_settings, delete_users, get_users, modify_emails, new_user_admin, redeem_invite,
};
use crate::services::accounts::AccountService;
use crate::services::invites::InviteService;
use crate::services::states::LobbyState;
use axum::Router;
use axum::http::{HeaderName, Request};
use axum::routing::{post, put};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info_span;

mod invite;
mod ombi;
mod profile;
mod settings;
mod user;

pub fn router(
    state: Arc<LobbyState>,
    invites: Arc<InviteService>,
    accounts: Arc<AccountService>,
) -> Router {
    let invite_router = {
        Router::new()
            .route(
                "/",
                post(list_invites)
                    .put(generate_invite)
                    .delete(delete_invite),
            )
            .route("/profile", post(set_invite_profile))
            .route("/notify", post(set_invite_notify))
            .layer(RequesterLayer::new())
            .with_state(invites)
    };
    let user_router = {
        Router::new()
            .route(
                "/",
                post(get_users).put(new_user_admin).delete(delete_users),
            )
            .route("/redeem", post(redeem_invite))
            .route("/emails", post(modify_emails))
            .route("/settings", post(apply_settings))
            .with_state(accounts.clone())
    };
    let profile_router = {
        Router::new()
            .route(
                "/",
                post(list_profiles).put(set_defaults).delete(delete_profile),
            )
            .with_state(accounts.clone())
    };
    let ombi_router = {
        Router::new()
            .route("/users", post(ombi_users))
            .route("/defaults", put(set_ombi_defaults))
            .with_state((state.clone(), accounts))
    };
    let settings_router = {
        Router::new()
            .route("/", post(get_settings).patch(set_setting))
            .with_state(state.clone())
    };
    let trace_header = HeaderName::from_static(LOBBY_REQUEST_ID_HEADER);
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .nest("/invites", invite_router)
                .nest("/users", user_router)
                .nest("/profiles", profile_router)
                .nest("/ombi", ombi_router)
                .nest("/settings", settings_router),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    trace_header.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                        let rid = req
                            .extensions()
                            .get::<RequestId>()
                            .and_then(|r| r.header_value().to_str().ok())
                            .unwrap_or("-");
                        info_span!(
                            "http.request",
                            request_id = %rid,
                            method = %req.method(),
                            uri = %req.uri(),
                            version = ?req.version(),
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::new(trace_header))
                .concurrency_limit(state.config.common.concurrency_limit),
        )
}
