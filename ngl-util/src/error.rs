//! Error type.
//!
//! This is the shared error type for the whole workspace: every crate from
//! `ngl-gpu` up re-exports [`NglError`] rather than minting its own.

use std::{error, fmt};

/// One of the exit codes a public entry point can return.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    Unsupported,
    InvalidArg,
    InvalidUsage,
    InvalidData,
    Memory,
    Bug,
    NotFound,
    External,
    LimitExceeded,
    GraphicsUnsupported,
    GraphicsLimitExceeded,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorCode::Unsupported => "unsupported",
            ErrorCode::InvalidArg => "invalid argument",
            ErrorCode::InvalidUsage => "invalid usage",
            ErrorCode::InvalidData => "invalid data",
            ErrorCode::Memory => "out of memory",
            ErrorCode::Bug => "internal error",
            ErrorCode::NotFound => "not found",
            ErrorCode::External => "external failure",
            ErrorCode::LimitExceeded => "limit exceeded",
            ErrorCode::GraphicsUnsupported => "unsupported by this backend",
            ErrorCode::GraphicsLimitExceeded => "graphics limit exceeded",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct NglError {
    pub code: ErrorCode,
    pub message: String,
    pub source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
}

impl NglError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        NglError {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl error::Error + Send + Sync + 'static,
    ) -> Self {
        NglError {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for NglError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl error::Error for NglError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn error::Error + 'static))
    }
}

pub type Result<T> = ::std::result::Result<T, NglError>;

/// Shorthand for constructing a `Bug` error; used at assertion sites that
/// degrade to a checked error return in release builds (see §7 of the spec).
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        $crate::error::NglError::new($crate::error::ErrorCode::Bug, format!($($arg)*))
    };
}
