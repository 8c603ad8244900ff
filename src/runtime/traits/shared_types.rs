// ABOUTME: Shared types used across engine trait definitions.
// ABOUTME: ContainerSpec, ContainerInfo, ImageInfo, BuildOptions, NetworkConfig, VolumeConfig.

use crate::types::{ContainerId, ImageId};
use std::collections::HashMap;
use std::fmt;

/// Complete creation descriptor for one container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    /// Container name, `<service>.<app>`.
    pub name: String,
    /// Hostname inside the container.
    pub hostname: String,
    /// Image tag or id to run.
    pub image: String,
    /// Allocate a TTY.
    pub tty: bool,
    /// Keep stdin open.
    pub open_stdin: bool,
    /// Attach stdin.
    pub attach_stdin: bool,
    /// Environment as `KEY=VALUE` entries, in order.
    pub env: Vec<String>,
    /// Labels to apply.
    pub labels: HashMap<String, String>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Bind mounts in `src:dst[:mode]` form.
    pub binds: Vec<String>,
    /// Containers to inherit volumes from, `name[:mode]`.
    pub volumes_from: Vec<String>,
    /// Extra `/etc/hosts` entries in `host:ip` form.
    pub extra_hosts: Option<Vec<String>>,
    /// Command (exec form).
    pub cmd: Option<Vec<String>>,
    /// Entrypoint (exec form).
    pub entrypoint: Option<Vec<String>>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Logging driver configuration.
    pub log_config: Option<LogConfig>,
}

/// Port publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Host IP to bind to; empty binds every interface.
    pub host_ip: String,
    /// Host port; `None` lets the engine choose.
    pub host_port: Option<String>,
    /// Container port (number or range).
    pub container_port: String,
    /// Protocol (tcp/udp).
    pub protocol: Protocol,
}

impl PortMapping {
    /// Engine key for this port, e.g. `80/tcp`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Logging driver configuration for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub driver: String,
    pub options: HashMap<String, String>,
}

/// Information about a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    /// Container ID.
    pub id: ContainerId,
    /// Container name without the leading slash.
    pub name: String,
    /// Whether the container is running right now.
    pub running: bool,
    /// Whether a TTY was allocated at creation.
    pub tty: bool,
    /// Whether stdin is attached.
    pub attach_stdin: bool,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Destinations of the container's mounts.
    pub mounts: Vec<String>,
    /// Addresses by network name.
    pub networks: HashMap<String, NetworkInfo>,
}

impl ContainerInfo {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// IP address on the named network, if connected and assigned.
    pub fn ip_address(&self, network: &str) -> Option<&str> {
        self.networks
            .get(network)
            .map(|n| n.ip_address.as_str())
            .filter(|ip| !ip.is_empty())
    }
}

/// Network information for a container.
#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    /// IP address in this network.
    pub ip_address: String,
    /// Aliases in this network.
    pub aliases: Vec<String>,
}

/// Information about an image.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Image ID.
    pub id: ImageId,
    /// Entrypoint declared by the image.
    pub entrypoint: Option<Vec<String>>,
    /// Anonymous volume mount points declared by the image.
    pub volumes: Vec<String>,
}

impl ImageInfo {
    pub fn has_entrypoint(&self) -> bool {
        self.entrypoint.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Options for building an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Tag for the resulting image.
    pub tag: String,
    /// Dockerfile name inside the archive; the engine default when `None`.
    pub dockerfile: Option<String>,
    /// Always attempt to pull newer base images.
    pub pull: bool,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name.
    pub name: String,
    /// Network driver (bridge, overlay, etc.).
    pub driver: Option<String>,
    /// Driver options.
    pub options: HashMap<String, String>,
}

/// Configuration for creating a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeConfig {
    pub name: String,
    pub driver: String,
    pub driver_opts: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}
