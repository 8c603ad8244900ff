// ABOUTME: Bollard-based container engine implementation.
// ABOUTME: Speaks the Docker-compatible HTTP API over a unix socket or TCP.

use crate::runtime::error::{ConnectionSnafu, RuntimeError, UnreachableSnafu};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    AttachedIo, BuildOptions, ContainerError, ContainerFilters, ContainerInfo, ContainerOps,
    ContainerSpec, ContainerSummary, ImageError, ImageInfo, ImageOps, LogError, LogLine,
    LogOptions, LogStream, NetworkConfig, NetworkError, NetworkInfo, NetworkOps, OutputStream,
    StreamOps, VolumeConfig, VolumeError, VolumeOps,
};
use crate::runtime::types::EngineEndpoint;
use crate::types::{ContainerId, ImageId, NetworkAlias, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, HostConfigLogConfig, PortBinding,
};
use bollard::query_parameters::{
    AttachContainerOptions, BuildImageOptions, CreateContainerOptions, CreateImageOptions,
    InspectContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RemoveImageOptions, ResizeContainerTTYOptionsBuilder,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    ImageError::PullFailed(format!("{}: {}", image_name, e))
}

fn map_image_inspect_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("failed to inspect {}: {}", image_name, e)),
    }
}

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 409 =>
        {
            ImageError::InUse(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("failed to remove {}: {}", image_name, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => NetworkError::AlreadyExists(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_connect_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => NetworkError::NotFound(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_volume_error(e: bollard::errors::Error, name: &str) -> VolumeError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            VolumeError::NotFound(name.to_string())
        }
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 409 =>
        {
            VolumeError::AlreadyExists(name.to_string())
        }
        _ => VolumeError::Runtime(e.to_string()),
    }
}

fn map_stream_error(e: bollard::errors::Error) -> LogError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => LogError::ContainerNotFound(message.clone()),
        _ => LogError::StreamError(e.to_string()),
    }
}

/// Decodes engine frames into text per stream.
///
/// A multibyte character split across frames is held back until the rest arrives.
#[derive(Debug, Default)]
struct FrameDecoder {
    pending: HashMap<LogStream, Vec<u8>>,
}

impl FrameDecoder {
    /// `None` when the whole frame is held back.
    fn decode(&mut self, output: LogOutput) -> Option<LogLine> {
        let (stream, data) = match output {
            LogOutput::StdOut { message } => (LogStream::Stdout, message),
            LogOutput::StdErr { message } => (LogStream::Stderr, message),
            LogOutput::StdIn { message } => (LogStream::Stdout, message),
            LogOutput::Console { message } => (LogStream::Console, message),
        };
        let buf = self.pending.entry(stream).or_default();
        buf.extend_from_slice(&data);
        let keep = incomplete_tail(buf);
        let tail = buf.split_off(buf.len() - keep);
        let content = String::from_utf8_lossy(buf).into_owned();
        *buf = tail;
        (!content.is_empty()).then_some(LogLine { content, stream })
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for at in (start..bytes.len()).rev() {
        let byte = bytes[at];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let have = bytes.len() - at;
        return if have < needed { have } else { 0 };
    }
    0
}

fn decode_frames<S>(frames: S) -> OutputStream
where
    S: futures::Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send + 'static,
{
    let mut decoder = FrameDecoder::default();
    Box::pin(frames.filter_map(move |item| {
        let line = match item {
            Ok(frame) => decoder.decode(frame).map(Ok),
            Err(e) => Some(Err(map_stream_error(e))),
        };
        std::future::ready(line)
    }))
}

/// Strings from a JSON value that is either a list or the keys of an object.
///
/// Image configs report `Volumes` as an object keyed by mount point, while
/// some engines hand back a plain list.
fn json_strings(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container engine client using bollard.
pub struct BollardRuntime {
    client: Docker,
    endpoint: EngineEndpoint,
}

impl BollardRuntime {
    /// Wrap an existing client.
    pub fn new(client: Docker, endpoint: EngineEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// Build a client for `endpoint` and check that the engine answers.
    pub async fn connect(endpoint: &EngineEndpoint, timeout: Duration) -> Result<Self, RuntimeError> {
        let secs = timeout.as_secs().max(1);
        let client = match endpoint {
            EngineEndpoint::Local => Docker::connect_with_local_defaults()
                .map(|c| c.with_timeout(timeout))
                .context(ConnectionSnafu)?,
            EngineEndpoint::Unix(path) => {
                Docker::connect_with_unix(path, secs, bollard::API_DEFAULT_VERSION)
                    .context(ConnectionSnafu)?
            }
            EngineEndpoint::Http(addr) => {
                Docker::connect_with_http(addr, secs, bollard::API_DEFAULT_VERSION)
                    .context(ConnectionSnafu)?
            }
        };

        let runtime = Self::new(client, endpoint.clone());
        runtime.ping().await?;
        Ok(runtime)
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await.context(UnreachableSnafu {
            endpoint: self.endpoint.to_string(),
        })?;
        Ok(())
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn inspect_image(&self, name: &str) -> Result<ImageInfo, ImageError> {
        let details = self
            .client
            .inspect_image(name)
            .await
            .map_err(|e| map_image_inspect_error(e, name))?;

        // The generated config model differs between API versions, so read
        // the two fields we need from its JSON form.
        let config = details
            .config
            .as_ref()
            .and_then(|c| serde_json::to_value(c).ok())
            .unwrap_or(serde_json::Value::Null);
        let entrypoint = json_strings(config.get("Entrypoint"));
        let mut volumes = json_strings(config.get("Volumes"));
        volumes.sort();

        Ok(ImageInfo {
            id: ImageId::new(details.id.unwrap_or_default()),
            entrypoint: if entrypoint.is_empty() {
                None
            } else {
                Some(entrypoint)
            },
            volumes,
        })
    }

    async fn pull_image(&self, name: &str) -> Result<(), ImageError> {
        let opts = CreateImageOptions {
            from_image: Some(name.to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, name))?;
        }

        Ok(())
    }

    async fn build_image(
        &self,
        archive: Vec<u8>,
        opts: &BuildOptions,
        progress: &mut (dyn for<'p> FnMut(&'p str) + Send),
    ) -> Result<(), ImageError> {
        let options = BuildImageOptions {
            dockerfile: opts
                .dockerfile
                .clone()
                .unwrap_or_else(|| "Dockerfile".to_string()),
            t: Some(opts.tag.clone()),
            pull: opts.pull.then(|| "true".to_string()),
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(archive)));
        let mut build_stream = self.client.build_image(options, None, Some(body));

        while let Some(result) = build_stream.next().await {
            let output = result.map_err(|e| ImageError::BuildFailed(format!("{}: {}", opts.tag, e)))?;
            if let Some(detail) = output.error_detail {
                return Err(ImageError::BuildFailed(format!(
                    "{}: {}",
                    opts.tag,
                    detail.message.unwrap_or_default()
                )));
            }
            if let Some(line) = output.stream.as_deref() {
                progress(line);
            }
        }

        Ok(())
    }

    async fn remove_image(&self, name: &str, force: bool) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(name, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, name))?;

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &spec.ports {
            let key = port.key();
            exposed_ports.push(key.clone());
            port_bindings
                .entry(key)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: if port.host_ip.is_empty() {
                        None
                    } else {
                        Some(port.host_ip.clone())
                    },
                    host_port: port.host_port.clone(),
                });
        }

        let host_config = HostConfig {
            binds: if spec.binds.is_empty() {
                None
            } else {
                Some(spec.binds.clone())
            },
            volumes_from: if spec.volumes_from.is_empty() {
                None
            } else {
                Some(spec.volumes_from.clone())
            },
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            extra_hosts: spec.extra_hosts.clone(),
            log_config: spec.log_config.as_ref().map(|l| HostConfigLogConfig {
                typ: Some(l.driver.clone()),
                config: if l.options.is_empty() {
                    None
                } else {
                    Some(l.options.clone())
                },
            }),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            hostname: Some(spec.hostname.clone()),
            image: Some(spec.image.clone()),
            tty: Some(spec.tty),
            open_stdin: Some(spec.open_stdin),
            attach_stdin: Some(spec.attach_stdin),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            env: if spec.env.is_empty() {
                None
            } else {
                Some(spec.env.clone())
            },
            labels: if spec.labels.is_empty() {
                None
            } else {
                Some(spec.labels.clone())
            },
            cmd: spec.cmd.clone(),
            entrypoint: spec.entrypoint.clone(),
            working_dir: spec.working_dir.clone(),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        tracing::debug!(name = %spec.name, image = %spec.image, "creating container");
        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        tracing::debug!(container = %id, "starting container");
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        tracing::debug!(container = %id, force, "removing container");
        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)?;

        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let mut networks = HashMap::new();
        if let Some(ref network_settings) = details.network_settings
            && let Some(ref nets) = network_settings.networks
        {
            for (name, endpoint) in nets {
                networks.insert(
                    name.clone(),
                    NetworkInfo {
                        ip_address: endpoint.ip_address.clone().unwrap_or_default(),
                        aliases: endpoint.aliases.clone().unwrap_or_default(),
                    },
                );
            }
        }

        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.destination)
            .collect();

        let config = details.config.unwrap_or_default();

        Ok(ContainerInfo {
            id: ContainerId::new(details.id.unwrap_or_else(|| id.to_string())),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            running: details.state.and_then(|s| s.running).unwrap_or(false),
            tty: config.tty.unwrap_or(false),
            attach_stdin: config.attach_stdin.unwrap_or(false),
            labels: config.labels.unwrap_or_default(),
            mounts,
            networks,
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }

    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let request = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            options: if config.options.is_empty() {
                None
            } else {
                Some(config.options.clone())
            },
            ..Default::default()
        };

        tracing::debug!(network = %config.name, "creating network");
        let response = self
            .client
            .create_network(request)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[NetworkAlias],
    ) -> Result<(), NetworkError> {
        let request = bollard::models::NetworkConnectRequest {
            container: container.to_string(),
            endpoint_config: Some(EndpointSettings {
                aliases: if aliases.is_empty() {
                    None
                } else {
                    Some(aliases.iter().map(|a| a.to_string()).collect())
                },
                ..Default::default()
            }),
        };

        self.client
            .connect_network(network.as_str(), request)
            .await
            .map_err(map_network_connect_error)
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn inspect_volume(&self, name: &str) -> Result<(), VolumeError> {
        self.client
            .inspect_volume(name)
            .await
            .map_err(|e| map_volume_error(e, name))?;
        Ok(())
    }

    async fn create_volume(&self, config: &VolumeConfig) -> Result<(), VolumeError> {
        let request = bollard::models::VolumeCreateRequest {
            name: Some(config.name.clone()),
            driver: Some(config.driver.clone()),
            driver_opts: Some(config.driver_opts.clone()),
            labels: Some(config.labels.clone()),
            ..Default::default()
        };

        tracing::debug!(volume = %config.name, "creating volume");
        self.client
            .create_volume(request)
            .await
            .map_err(|e| map_volume_error(e, &config.name))?;
        Ok(())
    }
}

#[async_trait]
impl StreamOps for BollardRuntime {
    async fn attach_container(&self, id: &ContainerId) -> Result<AttachedIo, LogError> {
        let opts = AttachContainerOptions {
            stream: true,
            stdin: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let attached = self
            .client
            .attach_container(id.as_str(), Some(opts))
            .await
            .map_err(map_stream_error)?;

        Ok(AttachedIo {
            output: decode_frames(attached.output),
            input: attached.input,
        })
    }

    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<OutputStream, LogError> {
        let since = opts
            .since
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| i32::try_from(d.as_secs()).unwrap_or(i32::MAX))
            .unwrap_or(0);

        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            since,
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        Ok(decode_frames(stream))
    }

    async fn resize_tty(
        &self,
        id: &ContainerId,
        width: u16,
        height: u16,
    ) -> Result<(), LogError> {
        let opts = ResizeContainerTTYOptionsBuilder::default()
            .w(i32::from(width))
            .h(i32::from(height))
            .build();

        self.client
            .resize_container_tty(id.as_str(), opts)
            .await
            .map_err(map_stream_error)
    }
}
