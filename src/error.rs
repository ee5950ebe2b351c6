use std::borrow::Cow;

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("unknown error: {0}")]
    Unknown(Cow<'static, str>),
    #[error("internal error: {0}")]
    Internal(Cow<'static, str>),
    #[error("out of memory")]
    OutOfMemory,
    #[error("illegal argument: {0}")]
    IllegalArgument(Cow<'static, str>),
    #[error("unsupported operation: {0}")]
    Unsupported(Cow<'static, str>),
    #[error("user callback failed")]
    UserCallbackFailed,
}

impl Error {
    /// Stable integer code for the error category.
    pub fn code(&self) -> i32 {
        match self {
            Error::Unknown(_) => -1,
            Error::Internal(_) => 100,
            Error::OutOfMemory => 200,
            Error::IllegalArgument(_) => 300,
            Error::Unsupported(_) => 400,
            Error::UserCallbackFailed => 500,
        }
    }
}

#[macro_export]
macro_rules! internal_error {
    ($param:literal) => {
        $crate::error::Error::Internal($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::Internal(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! illegal_argument_error {
    ($param:literal) => {
        $crate::error::Error::IllegalArgument($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::IllegalArgument(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! unsupported_error {
    ($param:literal) => {
        $crate::error::Error::Unsupported($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::Unsupported(format!("{:?}", $param).into())
    };
}
