// ABOUTME: Composable capability traits for the container engine.
// ABOUTME: Defines ContainerOps, ImageOps, NetworkOps, VolumeOps, StreamOps and FullRuntime.

mod container;
mod image;
mod logs;
mod network;
pub(crate) mod sealed;
mod shared_types;
mod volume;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps};
pub use logs::{AttachedIo, LogError, LogLine, LogOptions, LogStream, OutputStream, StreamOps};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;
pub use volume::{VolumeError, VolumeOps};

/// Every capability the orchestrator consumes. Implemented automatically.
pub trait FullRuntime: ContainerOps + ImageOps + NetworkOps + VolumeOps + StreamOps {}

impl<T> FullRuntime for T where T: ContainerOps + ImageOps + NetworkOps + VolumeOps + StreamOps {}

/// Any failure surfaced by the engine client.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl EngineError {
    /// Whether the engine reported the referenced object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Container(ContainerError::NotFound(_))
                | EngineError::Image(ImageError::NotFound(_))
                | EngineError::Network(NetworkError::NotFound(_))
                | EngineError::Volume(VolumeError::NotFound(_))
                | EngineError::Log(LogError::ContainerNotFound(_))
        )
    }
}
