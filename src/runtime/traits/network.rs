// ABOUTME: Engine networks: the shared network and one network per application.
// ABOUTME: Containers join both; only the application network carries an alias.

use super::sealed::Sealed;
use super::shared_types::NetworkConfig;
use crate::types::{ContainerId, NetworkAlias, NetworkId};
use async_trait::async_trait;

#[async_trait]
pub trait NetworkOps: Sealed + Send + Sync {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;

    /// Create a network. Fails with `AlreadyExists` if another caller won the race.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Attach a container. An empty `aliases` slice attaches it under its name only.
    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[NetworkAlias],
    ) -> Result<(), NetworkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network \"{0}\" not found")]
    NotFound(String),

    #[error("network \"{0}\" already exists")]
    AlreadyExists(String),

    #[error("network request failed: {0}")]
    Runtime(String),
}
