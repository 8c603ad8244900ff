// ABOUTME: Image operations trait for the container engine.
// ABOUTME: Inspect, pull, build from an archive, and remove images.

use super::sealed::Sealed;
use super::shared_types::{BuildOptions, ImageInfo};
use async_trait::async_trait;

/// Image operations.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Inspect an image by tag or id.
    async fn inspect_image(&self, name: &str) -> Result<ImageInfo, ImageError>;

    /// Pull an image, consuming the progress stream.
    async fn pull_image(&self, name: &str) -> Result<(), ImageError>;

    /// Build an image from a tar archive of the build context.
    ///
    /// Each line of build output is handed to `progress` as it arrives.
    async fn build_image(
        &self,
        archive: Vec<u8>,
        opts: &BuildOptions,
        progress: &mut (dyn for<'p> FnMut(&'p str) + Send),
    ) -> Result<(), ImageError>;

    /// Remove an image by tag or id.
    async fn remove_image(&self, name: &str, force: bool) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
