use crate::models::api::prelude::*;
use crate::models::const_val::LOBBY_USER_ID_HEADER;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// The admin making the request, as identified by the fronting proxy. No
/// authentication happens here; the header is trusted as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<String>,
}

impl Requester {
    fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get(LOBBY_USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        Self { user_id }
    }
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> ApiResult<Self> {
        parts
            .extensions
            .get::<Requester>()
            .cloned()
            .ok_or_else(|| internal!("Cannot extract requester. Is `RequesterLayer` enabled?"))
    }
}

#[derive(Clone, Default)]
pub struct RequesterLayer;

impl RequesterLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequesterLayer {
    type Service = RequesterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequesterService { inner }
    }
}

#[derive(Clone)]
pub struct RequesterService<S> {
    inner: S,
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for RequesterService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let requester = Requester::from_headers(req.headers());
        req.extensions_mut().insert(requester);
        self.inner.call(req)
    }
}
