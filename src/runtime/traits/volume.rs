// ABOUTME: Volume operations trait for the container engine.
// ABOUTME: Inspect and create named volumes.

use super::sealed::Sealed;
use super::shared_types::VolumeConfig;
use async_trait::async_trait;

/// Named volume operations.
#[async_trait]
pub trait VolumeOps: Sealed + Send + Sync {
    /// Inspect a volume. Only existence matters to callers.
    async fn inspect_volume(&self, name: &str) -> Result<(), VolumeError>;

    /// Create a volume.
    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError>;
}

/// Errors from volume operations.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
