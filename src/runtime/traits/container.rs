// ABOUTME: Container operations trait for the container engine.
// ABOUTME: Create, start, remove, inspect, and list containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerInfo, ContainerSpec};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container from a fully resolved creation descriptor.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError>;

    /// Start a created or stopped container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Remove a container, killing it first when `force` is set.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Get detailed information about a container by id or name.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (engine-side regular expression match).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Every container, running or not, whose name ends in `.<app>`.
    pub fn for_app(app: &str) -> Self {
        Self {
            name: Some(format!("^/?[a-z0-9-]+\\.{}$", app)),
            all: true,
            ..Default::default()
        }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container name without the leading slash.
    pub name: String,
    /// Current state.
    pub state: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_filter_includes_stopped_containers() {
        let filters = ContainerFilters::for_app("shop");
        assert!(filters.all);
        assert_eq!(filters.name.as_deref(), Some("^/?[a-z0-9-]+\\.shop$"));
    }
}
