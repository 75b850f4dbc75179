use crate::errors::{LobbyBusinessErrCode, LobbyError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneralResponse<T> {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> GeneralResponse<T>
where
    (StatusCode, Json<GeneralResponse<T>>): IntoResponse,
{
    pub fn new(msg: impl Into<String>, data: Option<T>) -> Self {
        Self {
            msg: msg.into(),
            data,
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        <(StatusCode, Json<Self>) as IntoResponse>::into_response((status, Json(self)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: Option<u32>,
    pub message: String,
    /// Per-target failures of a batch, or the failed criteria of a password check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
struct ApiEmitError<'a, E>
where
    E: std::error::Error + LobbyBusinessErrCode,
{
    msg: &'a str,
    business_code: &'a Option<u32>,
    error: &'a Option<E>,
}

impl ApiError {
    fn api_error_inner<E, T>(
        status: StatusCode,
        err: Option<E>,
        msg: Option<T>,
        fallback_msg: &str,
    ) -> Self
    where
        E: std::error::Error + LobbyBusinessErrCode,
        T: Into<String>,
    {
        let err_user_msg = msg.map(|m| m.into()).unwrap_or_else(|| fallback_msg.into());
        let business_code = err.as_ref().and_then(|e| e.code());
        let emit = ApiEmitError {
            msg: &err_user_msg,
            business_code: &business_code,
            error: &err,
        };
        if status.is_server_error() {
            tracing::error!("An api error occurred! => {:?}", emit);
        } else {
            tracing::info!("Request rejected => {:?}", emit);
        }
        Self {
            status,
            code: business_code,
            message: err_user_msg,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data;
        self
    }
}

macro_rules! define_api_error {
    ($fn_name:ident, $http_status:expr, $fallback_msg:expr) => {
        impl ApiError {
            #[inline]
            pub fn $fn_name<E, T>(err: Option<E>, msg: Option<T>) -> Self
            where
                E: ::std::error::Error + $crate::errors::LobbyBusinessErrCode,
                T: Into<String>,
            {
                Self::api_error_inner($http_status, err, msg, $fallback_msg)
            }
        }
        macro_rules! $fn_name {
            (err = $err: expr) => {
                $crate::models::api::ApiError::$fn_name(Some($err), None::<&str>)
            };
            (msg = $msg: expr) => {
                $crate::models::api::ApiError::$fn_name::<::std::convert::Infallible, _>(
                    None,
                    Some($msg),
                )
            };
            ($msg: literal) => {
                $crate::models::api::ApiError::$fn_name::<::std::convert::Infallible, _>(
                    None,
                    Some($msg),
                )
            };
            ($msg: expr) => {
                $crate::models::api::ApiError::$fn_name::<::std::convert::Infallible, _>(
                    None,
                    Some($msg),
                )
            };
            ($err: expr,$msg: expr) => {
                $crate::models::api::ApiError::$fn_name(Some($err), Some($msg))
            };
        }
        #[allow(unused_imports)]
        pub(crate) use $fn_name;
    };
}

define_api_error!(bad_request, StatusCode::BAD_REQUEST, "Bad Request");
define_api_error!(not_found, StatusCode::NOT_FOUND, "Not Found");
define_api_error!(conflict, StatusCode::CONFLICT, "Conflict");
define_api_error!(bad_gateway, StatusCode::BAD_GATEWAY, "Upstream Error");
define_api_error!(
    internal,
    StatusCode::INTERNAL_SERVER_ERROR,
    "Internal Server Error"
);

impl From<LobbyError> for ApiError {
    fn from(e: LobbyError) -> Self {
        let data = match &e {
            LobbyError::WeakPassword(v) => serde_json::to_value(v).ok(),
            LobbyError::PartialBatch(m) => serde_json::to_value(m).ok(),
            _ => None,
        };
        let msg = e.to_string();
        let api = match e {
            LobbyError::Validation(_) | LobbyError::WeakPassword(_) => bad_request!(e, msg),
            LobbyError::NotFound(_) => not_found!(e, msg),
            LobbyError::AlreadyExists(_) => conflict!(e, msg),
            LobbyError::Media(_) | LobbyError::Ombi(_) | LobbyError::Mail(_) => {
                bad_gateway!(e, msg)
            }
            LobbyError::PartialBatch(_) => internal!(e, msg),
            LobbyError::DataBase(_) | LobbyError::Setting(_) | LobbyError::TimeFormat(_) => {
                internal!(e, "Persistence error")
            }
        };
        api.with_data(data)
    }
}

macro_rules! general_json_res {
    ($msg:literal) => {
        Json(GeneralResponse::new($msg, None))
    };
    ($msg:literal, $data:expr) => {
        Json(GeneralResponse::new($msg, Some($data)))
    };
}

pub(crate) use general_json_res;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(self);
        (status, body).into_response()
    }
}

pub mod prelude {
    pub use super::{ApiError, ApiResult, GeneralResponse};
    pub(crate) use crate::models::api::general_json_res;
    pub(crate) use crate::models::api::{bad_gateway, bad_request, conflict, internal, not_found};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn lobby_errors_map_to_statuses() {
        let e: ApiError = LobbyError::validation("no duration").into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, Some(40001));
        assert_eq!(e.message, "no duration");

        let e: ApiError = LobbyError::not_found("invite not found").into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);

        let e: ApiError =
            LobbyError::Media(crate::services::media::MediaError::Status(500)).into();
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn partial_batch_carries_the_map() {
        let mut m = BTreeMap::new();
        m.insert("u1".to_string(), "500: boom".to_string());
        let e: ApiError = LobbyError::PartialBatch(m).into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.data, Some(serde_json::json!({"u1": "500: boom"})));
    }
}
