use crate::models::settings::SettingParseError;
use crate::services::mailer::MailError;
use crate::services::media::MediaError;
use crate::services::ombi::OmbiError;
use crate::services::password::PasswordValidation;
use crate::services::states::db::DataBaseError;
use crate::utils::time_fmt::TimeFormatError;
use lobby_macros::LobbyBusinessError;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub trait LobbyBusinessErrCode {
    fn code(&self) -> Option<u32>;
}

impl LobbyBusinessErrCode for std::convert::Infallible {
    fn code(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, thiserror::Error, LobbyBusinessError)]
pub enum LobbyError {
    /// Bad or missing input, nothing was mutated.
    #[code(40001)]
    #[error("{0}")]
    Validation(Cow<'static, str>),
    #[code(40002)]
    #[error("Password does not meet the requirements")]
    WeakPassword(PasswordValidation),
    #[code(40401)]
    #[error("{0}")]
    NotFound(Cow<'static, str>),
    #[code(40901)]
    #[error("{0}")]
    AlreadyExists(String),
    #[code(50201)]
    #[error("Media server error: {0}")]
    Media(#[from] MediaError),
    #[code(50202)]
    #[error("Ombi error: {0}")]
    Ombi(#[from] OmbiError),
    #[code(50203)]
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
    /// Some targets of a batch operation failed, the rest succeeded.
    #[code(50701)]
    #[error("{} target(s) failed", .0.len())]
    PartialBatch(BTreeMap<String, String>),
    #[code(50001)]
    #[error(transparent)]
    DataBase(#[from] DataBaseError),
    #[code(50002)]
    #[error(transparent)]
    Setting(#[from] SettingParseError),
    #[code(50003)]
    #[error(transparent)]
    TimeFormat(#[from] TimeFormatError),
}

impl LobbyError {
    pub fn validation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type LobbyResult<T> = Result<T, LobbyError>;
