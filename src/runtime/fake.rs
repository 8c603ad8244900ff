// ABOUTME: In-memory engine used by unit tests.
// ABOUTME: Records every mutating call and serves scripted container output.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    AttachedIo, BuildOptions, ContainerError, ContainerFilters, ContainerInfo, ContainerOps,
    ContainerSpec, ContainerSummary, ImageError, ImageInfo, ImageOps, LogError, LogLine,
    LogOptions, NetworkConfig, NetworkError, NetworkInfo, NetworkOps, OutputStream, StreamOps,
    VolumeConfig, VolumeError, VolumeOps,
};
use crate::types::{ContainerId, ImageId, NetworkAlias, NetworkId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// One observed engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateContainer(String),
    StartContainer(String),
    RemoveContainer(String),
    PullImage(String),
    BuildImage(String),
    RemoveImage(String),
    CreateNetwork(String),
    Connect {
        container: String,
        network: String,
        aliases: Vec<String>,
    },
    CreateVolume(String),
    Attach(String),
    Logs(String),
}

#[derive(Default)]
struct State {
    containers: HashMap<String, ContainerInfo>,
    specs: HashMap<String, ContainerSpec>,
    images: HashMap<String, ImageInfo>,
    networks: HashSet<String>,
    volumes: HashSet<String>,
    occupied: HashSet<String>,
    output: Vec<String>,
    resizes: Vec<(String, u16, u16)>,
    fail_pull: bool,
    builds: usize,
}

#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
}

impl Sealed for FakeRuntime {}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed an existing container named `<service>.<app>`.
    pub(crate) fn with_container(
        self,
        name: &str,
        running: bool,
        tty: bool,
        labels: &[(&str, &str)],
    ) -> Self {
        let info = ContainerInfo {
            id: ContainerId::new(format!("id-{}", name)),
            name: name.to_string(),
            running,
            tty,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        self.state.lock().containers.insert(name.to_string(), info);
        self
    }

    /// Seed an image.
    pub(crate) fn with_image(self, name: &str, info: ImageInfo) -> Self {
        self.state.lock().images.insert(name.to_string(), info);
        self
    }

    pub(crate) fn with_volume(self, name: &str) -> Self {
        self.state.lock().volumes.insert(name.to_string());
        self
    }

    /// Output chunks served by attach and log calls.
    pub(crate) fn with_output(self, chunks: &[&str]) -> Self {
        self.state.lock().output = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    pub(crate) fn failing_pulls(self) -> Self {
        self.state.lock().fail_pull = true;
        self
    }

    pub(crate) fn set_ip(&self, container: &str, network: &str, ip: &str) {
        if let Some(info) = self.state.lock().containers.get_mut(container) {
            info.networks.insert(
                network.to_string(),
                NetworkInfo {
                    ip_address: ip.to_string(),
                    aliases: Vec::new(),
                },
            );
        }
    }

    pub(crate) fn set_mounts(&self, container: &str, mounts: &[&str]) {
        if let Some(info) = self.state.lock().containers.get_mut(container) {
            info.mounts = mounts.iter().map(|m| m.to_string()).collect();
        }
    }

    /// Make creating `name` collide with a container this app cannot see.
    pub(crate) fn occupy(&self, name: &str) {
        self.state.lock().occupied.insert(name.to_string());
    }

    /// Accepted TTY resizes as `(container, width, height)`.
    pub(crate) fn resizes(&self) -> Vec<(String, u16, u16)> {
        self.state.lock().resizes.clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// The descriptor a container was created from.
    pub(crate) fn spec(&self, name: &str) -> Option<ContainerSpec> {
        self.state.lock().specs.get(name).cloned()
    }

    pub(crate) fn has_container(&self, name: &str) -> bool {
        self.state.lock().containers.contains_key(name)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    /// Resolve an id or a name to the stored container name.
    fn lookup(state: &State, id: &ContainerId) -> Option<String> {
        if state.containers.contains_key(id.as_str()) {
            return Some(id.to_string());
        }
        state
            .containers
            .iter()
            .find(|(_, info)| info.id == *id)
            .map(|(name, _)| name.clone())
    }

    fn output_stream(&self) -> OutputStream {
        let chunks: Vec<Result<LogLine, LogError>> = self
            .state
            .lock()
            .output
            .iter()
            .map(|c| Ok(LogLine::stdout(c.clone())))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if state.containers.contains_key(&spec.name) || state.occupied.contains(&spec.name) {
            return Err(ContainerError::AlreadyExists(spec.name.clone()));
        }
        let id = ContainerId::new(format!("id-{}", spec.name));
        state.containers.insert(
            spec.name.clone(),
            ContainerInfo {
                id: id.clone(),
                name: spec.name.clone(),
                running: false,
                tty: spec.tty,
                attach_stdin: spec.attach_stdin,
                labels: spec.labels.clone(),
                ..Default::default()
            },
        );
        state.specs.insert(spec.name.clone(), spec.clone());
        drop(state);
        self.record(Call::CreateContainer(spec.name.clone()));
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let name =
            Self::lookup(&state, id).ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if let Some(info) = state.containers.get_mut(&name) {
            info.running = true;
        }
        drop(state);
        self.record(Call::StartContainer(name));
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let name =
            Self::lookup(&state, id).ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        state.containers.remove(&name);
        drop(state);
        self.record(Call::RemoveContainer(name));
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let state = self.state.lock();
        Self::lookup(&state, id)
            .and_then(|name| state.containers.get(&name).cloned())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        // Only the `.<app>` suffix of the name filter is honored.
        let suffix = filters
            .name
            .as_deref()
            .and_then(|n| n.rsplit_once("\\."))
            .map(|(_, app)| format!(".{}", app.trim_end_matches('$')));

        let state = self.state.lock();
        let mut found: Vec<ContainerSummary> = state
            .containers
            .values()
            .filter(|info| suffix.as_ref().is_none_or(|s| info.name.ends_with(s)))
            .filter(|info| filters.all || info.running)
            .map(|info| ContainerSummary {
                id: info.id.clone(),
                name: info.name.clone(),
                state: if info.running { "running" } else { "exited" }.to_string(),
                labels: info.labels.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn inspect_image(&self, name: &str) -> Result<ImageInfo, ImageError> {
        let state = self.state.lock();
        state
            .images
            .get(name)
            .or_else(|| state.images.values().find(|i| i.id.as_str() == name))
            .cloned()
            .ok_or_else(|| ImageError::NotFound(name.to_string()))
    }

    async fn pull_image(&self, name: &str) -> Result<(), ImageError> {
        self.record(Call::PullImage(name.to_string()));
        let mut state = self.state.lock();
        if state.fail_pull {
            return Err(ImageError::PullFailed(name.to_string()));
        }
        state.images.entry(name.to_string()).or_insert_with(|| ImageInfo {
            id: ImageId::new(format!("sha256:pulled-{}", name)),
            entrypoint: None,
            volumes: Vec::new(),
        });
        Ok(())
    }

    async fn build_image(
        &self,
        _archive: Vec<u8>,
        opts: &BuildOptions,
        progress: &mut (dyn for<'p> FnMut(&'p str) + Send),
    ) -> Result<(), ImageError> {
        self.record(Call::BuildImage(opts.tag.clone()));
        progress("Step 1/1\n");
        let mut state = self.state.lock();
        state.builds += 1;
        let id = ImageId::new(format!("sha256:build{}", state.builds));
        let previous = state.images.get(&opts.tag).cloned();
        state.images.insert(
            opts.tag.clone(),
            ImageInfo {
                id,
                entrypoint: previous.as_ref().and_then(|p| p.entrypoint.clone()),
                volumes: previous.map(|p| p.volumes).unwrap_or_default(),
            },
        );
        Ok(())
    }

    async fn remove_image(&self, name: &str, _force: bool) -> Result<(), ImageError> {
        self.record(Call::RemoveImage(name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.contains(name))
    }

    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        if !self.state.lock().networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        self.record(Call::CreateNetwork(config.name.clone()));
        Ok(NetworkId::new(config.name.clone()))
    }

    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[NetworkAlias],
    ) -> Result<(), NetworkError> {
        let name = {
            let state = self.state.lock();
            Self::lookup(&state, container).unwrap_or_else(|| container.to_string())
        };
        self.record(Call::Connect {
            container: name,
            network: network.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        });
        Ok(())
    }
}

#[async_trait]
impl VolumeOps for FakeRuntime {
    async fn inspect_volume(&self, name: &str) -> Result<(), VolumeError> {
        if self.state.lock().volumes.contains(name) {
            Ok(())
        } else {
            Err(VolumeError::NotFound(name.to_string()))
        }
    }

    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        self.state.lock().volumes.insert(config.name.clone());
        self.record(Call::CreateVolume(config.name.clone()));
        Ok(())
    }
}

#[async_trait]
impl StreamOps for FakeRuntime {
    async fn attach_container(&self, id: &ContainerId) -> Result<AttachedIo, LogError> {
        self.record(Call::Attach(id.to_string()));
        Ok(AttachedIo {
            output: self.output_stream(),
            input: Box::pin(tokio::io::sink()),
        })
    }

    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<OutputStream, LogError> {
        self.record(Call::Logs(id.to_string()));
        Ok(self.output_stream())
    }

    async fn resize_tty(
        &self,
        id: &ContainerId,
        width: u16,
        height: u16,
    ) -> Result<(), LogError> {
        let mut state = self.state.lock();
        let name =
            Self::lookup(&state, id).ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?;
        // The engine only resizes running containers.
        if !state.containers[&name].running {
            return Err(LogError::Runtime(format!("container {} is not running", name)));
        }
        state.resizes.push((name, width, height));
        Ok(())
    }
}
