//! Autoref-specialised string conversion for runtime settings values.
//!
//! Plain scalars go through `ToString`/`FromStr` so a boolean is stored as `true`
//! rather than a JSON literal; everything else falls back to serde_json.
//!
//! ref: <https://github.com/dtolnay/case-studies/blob/master/autoref-specialization/README.md>
use lobby_macros::LobbyBusinessError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, LobbyBusinessError)]
pub enum SmartStringError {
    #[error(transparent)]
    SerdeJson(serde_json::Error),
    #[error("{0}")]
    FromStr(String),
}

pub type SmartStringResult<T> = Result<T, SmartStringError>;

pub trait DisplayToString {
    fn smart_to_string(&self) -> SmartStringResult<String>;
}

impl<T: ToString> DisplayToString for T {
    fn smart_to_string(&self) -> SmartStringResult<String> {
        Ok(self.to_string())
    }
}

pub trait SerdeToString {
    fn smart_to_string(&self) -> SmartStringResult<String>;
}

impl<T: Serialize> SerdeToString for &T {
    fn smart_to_string(&self) -> SmartStringResult<String> {
        serde_json::to_string(self).map_err(SmartStringError::SerdeJson)
    }
}

pub struct ParseTarget<T>(PhantomData<fn() -> T>);

impl<T> ParseTarget<T> {
    pub const NEW: Self = ParseTarget(PhantomData);
}

pub trait SmartParse<T> {
    fn smart_parse(self, s: &str) -> SmartStringResult<T>;
}

impl<T> SmartParse<T> for ParseTarget<T>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    fn smart_parse(self, s: &str) -> SmartStringResult<T> {
        T::from_str(s.trim()).map_err(|e| SmartStringError::FromStr(e.to_string()))
    }
}

impl<T> SmartParse<T> for &ParseTarget<T>
where
    T: DeserializeOwned,
{
    fn smart_parse(self, s: &str) -> SmartStringResult<T> {
        serde_json::from_str::<T>(s).map_err(SmartStringError::SerdeJson)
    }
}

#[macro_export]
macro_rules! smart_string {
    ($e:expr) => {
        (&$e).smart_to_string()
    };
}

#[macro_export]
macro_rules! smart_parse {
    ($ty:ty, $s:expr) => {
        $crate::utils::smart_to_string::ParseTarget::<$ty>::NEW.smart_parse($s)
    };
}

pub mod prelude {
    pub use super::{
        DisplayToString as _, SerdeToString as _, SmartParse, SmartStringError,
        SmartStringResult,
    };
}
