// ABOUTME: Application-wide error types for whaler.
// ABOUTME: Uses thiserror; engine failures are carried through EngineError.

use crate::runtime::{EngineError, RuntimeError};
use crate::types::NameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad names, relative paths and other malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    /// Broken `extend`/`extends` references, missing build contexts.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The user interrupted the run, or detached from a readiness wait.
    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Config,
    Engine,
    Interrupted,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::Config(_) | Error::Yaml(_) | Error::Json(_) => ErrorKind::Config,
            Error::Engine(_) | Error::Runtime(_) => ErrorKind::Engine,
            Error::Interrupted(_) => ErrorKind::Interrupted,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<NameError> for Error {
    fn from(e: NameError) -> Self {
        Error::Validation(e.to_string())
    }
}

/// Engine trait errors convert straight into `Error::Engine`.
macro_rules! engine_error_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Error {
            fn from(e: $ty) -> Self {
                Error::Engine(EngineError::from(e))
            }
        })*
    };
}

engine_error_from!(
    crate::runtime::ContainerError,
    crate::runtime::ImageError,
    crate::runtime::NetworkError,
    crate::runtime::VolumeError,
    crate::runtime::LogError
);

pub type Result<T> = std::result::Result<T, Error>;
