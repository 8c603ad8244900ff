// ABOUTME: Engine-wide and per-application networks, created on first use.
// ABOUTME: Every container joins both; the application network carries the service alias.

use crate::config::Settings;
use crate::error::Result;
use crate::runtime::{NetworkConfig, NetworkError, NetworkOps};
use crate::types::{AppName, NetworkId};
use std::collections::HashMap;

/// The two networks a container of one application is connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppNetworks {
    pub shared: NetworkId,
    pub app: NetworkId,
}

pub async fn ensure_networks<R: NetworkOps + ?Sized>(
    runtime: &R,
    settings: &Settings,
    app: &AppName,
) -> Result<AppNetworks> {
    let shared = ensure(
        runtime,
        NetworkConfig {
            name: settings.shared_network(),
            driver: None,
            options: HashMap::new(),
        },
    )
    .await?;

    let app = ensure(
        runtime,
        NetworkConfig {
            name: settings.app_network(app),
            driver: Some(settings.network.driver.clone()),
            options: settings.network.options.clone(),
        },
    )
    .await?;

    Ok(AppNetworks { shared, app })
}

async fn ensure<R: NetworkOps + ?Sized>(runtime: &R, config: NetworkConfig) -> Result<NetworkId> {
    if runtime.network_exists(&config.name).await? {
        return Ok(NetworkId::new(config.name));
    }

    tracing::debug!(network = %config.name, "creating network");
    match runtime.create_network(&config).await {
        Ok(id) => Ok(id),
        // Lost a race with a concurrent invocation.
        Err(NetworkError::AlreadyExists(_)) => Ok(NetworkId::new(config.name)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{Call, FakeRuntime};

    #[tokio::test]
    async fn networks_are_created_once() {
        let runtime = FakeRuntime::new();
        let settings = Settings::default();
        let app = AppName::new("shop").unwrap();

        let first = ensure_networks(&runtime, &settings, &app).await.unwrap();
        let second = ensure_networks(&runtime, &settings, &app).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.shared.as_str(), "whaler_nw");
        assert_eq!(first.app.as_str(), "whaler_nw.shop");
        assert_eq!(
            runtime.calls(),
            vec![
                Call::CreateNetwork("whaler_nw".into()),
                Call::CreateNetwork("whaler_nw.shop".into()),
            ]
        );
    }
}
