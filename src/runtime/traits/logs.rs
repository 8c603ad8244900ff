// ABOUTME: Output streaming operations for the container engine.
// ABOUTME: Attach to a TTY container, follow demultiplexed logs, resize the TTY.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::SystemTime;
use tokio::io::AsyncWrite;

/// A live stream of container output.
pub type OutputStream = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

/// Output and input halves of an attached container.
pub struct AttachedIo {
    pub output: OutputStream,
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl std::fmt::Debug for AttachedIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedIo").finish_non_exhaustive()
    }
}

/// Streaming operations.
#[async_trait]
pub trait StreamOps: Sealed + Send + Sync {
    /// Attach to stdin, stdout and stderr as one raw stream.
    async fn attach_container(&self, id: &ContainerId) -> Result<AttachedIo, LogError>;

    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<OutputStream, LogError>;

    /// Resize the container's TTY.
    async fn resize_tty(&self, id: &ContainerId, width: u16, height: u16)
    -> Result<(), LogError>;
}

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Follow log output (like `tail -f`).
    pub follow: bool,
    /// Show logs since this time.
    pub since: Option<SystemTime>,
}

impl LogOptions {
    /// Follow stdout and stderr from `since` onwards.
    pub fn follow_since(since: SystemTime) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            since: Some(since),
        }
    }
}

/// A chunk of container output.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// The output content.
    pub content: String,
    /// Which stream produced it.
    pub stream: LogStream,
}

impl LogLine {
    pub fn stdout(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stream: LogStream::Stdout,
        }
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stream: LogStream::Stderr,
        }
    }
}

/// Output stream type. `Console` is the combined stream of a TTY container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Stdout,
    Stderr,
    Console,
}

/// Errors from streaming operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
