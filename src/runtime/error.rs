// ABOUTME: Engine connection error types with SNAFU pattern.
// ABOUTME: Covers bad endpoints and engines that cannot be reached.

use snafu::Snafu;

/// Failure to establish a usable engine client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("invalid engine endpoint \"{endpoint}\""))]
    InvalidEndpoint { endpoint: String },

    #[snafu(display("engine connection failed: {source}"))]
    Connection { source: bollard::errors::Error },

    #[snafu(display("engine at {endpoint} is not responding: {source}"))]
    Unreachable {
        endpoint: String,
        source: bollard::errors::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// The -H value could not be understood.
    InvalidEndpoint,
    /// The client could not be constructed.
    ConnectionFailed,
    /// The client was built but the engine did not answer a ping.
    Unreachable,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::InvalidEndpoint { .. } => RuntimeErrorKind::InvalidEndpoint,
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
            RuntimeError::Unreachable { .. } => RuntimeErrorKind::Unreachable,
        }
    }
}
