// ABOUTME: Container Spec Builder: one normalized service into a full creation descriptor.
// ABOUTME: Resolves the image, command, mounts, ports and hosts, then creates and connects.

pub mod archive;
pub mod command;
pub mod image;
pub mod network;
pub mod ports;
pub mod volumes;

pub use command::{SCRIPT_MOUNT, split_command};
pub use image::resolve_image;
pub use network::{AppNetworks, ensure_networks};
pub use ports::parse_port;
pub use volumes::{VolumePlan, plan_volumes};

use crate::config::{Command, Config, Frontend, Service, Settings, label_text};
use crate::deploy::WaitMode;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::runtime::{ContainerSpec, FullRuntime, LogConfig};
use crate::types::{AppName, ContainerId, Position, ServiceName};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub const LABEL_APP: &str = "whaler.app";
pub const LABEL_SERVICE: &str = "whaler.service";
pub const LABEL_POSITION: &str = "whaler.position";
pub const LABEL_WAIT: &str = "whaler.wait";

/// Mount points of the bridge binary inside every container.
const BRIDGE_MOUNTS: [&str; 2] = ["/usr/bin/@me", "/usr/bin/@whaler"];

/// Everything about one application a spec is built against.
#[derive(Debug, Clone, Copy)]
pub struct AppContext<'a> {
    pub app: &'a AppName,
    pub config: &'a Config,
    pub settings: &'a Settings,
    pub frontend: &'a Frontend,
}

pub struct SpecBuilder<'a, R: ?Sized> {
    runtime: &'a R,
    ctx: AppContext<'a>,
    output: &'a Output,
}

impl<'a, R: FullRuntime + ?Sized> SpecBuilder<'a, R> {
    pub fn new(runtime: &'a R, ctx: AppContext<'a>, output: &'a Output) -> Self {
        Self {
            runtime,
            ctx,
            output,
        }
    }

    /// Build the descriptor for `name`, create the container and attach it to
    /// both networks.
    pub async fn create(&self, name: &ServiceName, diag: &mut Diagnostics) -> Result<ContainerId> {
        let networks = ensure_networks(self.runtime, self.ctx.settings, self.ctx.app).await?;

        self.output.progress(&format!(
            "Creating \"{}\" container.",
            name.container_name(self.ctx.app)
        ));
        let spec = self.build(name, diag).await?;
        let id = self.runtime.create_container(&spec).await?;

        self.runtime
            .connect_to_network(&id, &networks.shared, &[])
            .await?;
        self.runtime
            .connect_to_network(&id, &networks.app, &[name.as_alias()])
            .await?;

        tracing::info!(container = %spec.name, id = %id.short(), "container created");
        self.output
            .progress(&format!("Container \"{}\" created.", spec.name));
        Ok(id)
    }

    /// Resolve the creation descriptor for `name`. Builds or pulls its image.
    pub async fn build(&self, name: &ServiceName, diag: &mut Diagnostics) -> Result<ContainerSpec> {
        let ctx = &self.ctx;
        let container = name.container_name(ctx.app);
        let service = ctx
            .config
            .service(name.as_str())
            .ok_or_else(|| Error::Config(format!("Config for \"{}\" not found.", container)))?;

        let mut env = service.env.clone();
        env.push(format!("WHALER_APP={}", ctx.app));
        env.push(format!("WHALER_SERVICE={}", name));
        merge_globals(&mut env, &ctx.settings.vars);

        let mut labels: HashMap<String, String> = service
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), label_text(v)))
            .collect();
        labels.insert(LABEL_APP.to_string(), ctx.app.to_string());
        labels.insert(LABEL_SERVICE.to_string(), name.to_string());
        labels.insert(
            LABEL_POSITION.to_string(),
            Position::within(&ctx.config.service_names(), name.as_str()).to_label(),
        );

        let mode = match wait_label(name, service)? {
            Some(wait) => {
                labels.insert(LABEL_WAIT.to_string(), wait);
                WaitMode::decide(ctx.frontend)
            }
            None => WaitMode::NonInteractive,
        };
        let interactive = mode.is_interactive();

        let tag = service
            .image
            .clone()
            .unwrap_or_else(|| ctx.settings.image_name(ctx.app, name));
        let image = resolve_image(
            self.runtime,
            &tag,
            service,
            ctx.config.manifest_dir(),
            self.output,
            diag,
        )
        .await?;

        let mut binds = bridge_binds(ctx.settings);

        let entrypoint = service.entrypoint.as_ref().map(command::entrypoint_args);
        let cmd = match &service.cmd {
            None => None,
            Some(Command::Exec(args)) => Some(args.clone()),
            Some(Command::Line(line)) => {
                let line = if command::is_script(line) {
                    let script =
                        command::write_script(&ctx.settings.service_dir(ctx.app, name), line)?;
                    binds.push(format!("{}:{}", script.display(), SCRIPT_MOUNT));
                    SCRIPT_MOUNT.to_string()
                } else {
                    line.clone()
                };
                let has_entrypoint = match &entrypoint {
                    Some(args) => !args.is_empty(),
                    None => image.has_entrypoint(),
                };
                Some(command::command_args(&line, has_entrypoint))
            }
        };

        let volumes = plan_volumes(self.runtime, ctx, name, service, &image).await?;
        binds.extend(volumes.binds);

        let ports = service
            .ports
            .iter()
            .map(|p| parse_port(p))
            .collect::<Result<Vec<_>>>()?;

        let extra_hosts = self.extra_hosts(service).await?;

        let log_config = service
            .logging
            .as_ref()
            .or(ctx.settings.log.as_ref())
            .map(|log| LogConfig {
                driver: log.driver.clone(),
                options: log.options.clone(),
            });

        Ok(ContainerSpec {
            name: container.clone(),
            hostname: container,
            image: tag,
            tty: interactive,
            open_stdin: interactive,
            attach_stdin: interactive,
            env,
            labels,
            ports,
            binds,
            volumes_from: volumes.volumes_from,
            extra_hosts,
            cmd,
            entrypoint,
            working_dir: service.workdir.clone(),
            log_config,
        })
    }

    /// `host:ip` entries; `host:container:<name>` takes the bridge address of `<name>`.
    async fn extra_hosts(&self, service: &Service) -> Result<Option<Vec<String>>> {
        if service.extra_hosts.is_empty() {
            return Ok(None);
        }

        let mut hosts = Vec::with_capacity(service.extra_hosts.len());
        for value in &service.extra_hosts {
            let parts: Vec<&str> = value.split(':').collect();
            if let [host, "container", target] = parts.as_slice() {
                let info = self
                    .runtime
                    .inspect_container(&ContainerId::new(*target))
                    .await?;
                let ip = info.ip_address("bridge").ok_or_else(|| {
                    Error::Config(format!(
                        "container \"{}\" has no address on the bridge network",
                        target
                    ))
                })?;
                hosts.push(format!("{}:{}", host, ip));
            } else {
                hosts.push(value.clone());
            }
        }
        Ok(Some(hosts))
    }
}

/// The `whaler.wait` label value, when the service declares a readiness wait.
fn wait_label(name: &ServiceName, service: &Service) -> Result<Option<String>> {
    let declared = service
        .wait_duration()
        .map_err(|e| Error::Config(format!("service \"{}\": {}", name, e)))?;
    Ok(declared.and(service.wait.clone()))
}

/// Append global variables whose key the service does not set itself.
fn merge_globals(env: &mut Vec<String>, globals: &IndexMap<String, String>) {
    for (key, value) in globals {
        let present = env
            .iter()
            .any(|entry| entry.split_once('=').map_or(entry.as_str(), |(k, _)| k) == key);
        if !present {
            env.push(format!("{}={}", key, value));
        }
    }
}

fn bridge_binds(settings: &Settings) -> Vec<String> {
    let bridge = settings.bridge_binary();
    if !bridge.is_file() {
        return Vec::new();
    }
    BRIDGE_MOUNTS
        .iter()
        .map(|mount| format!("{}:{}", bridge.display(), mount))
        .collect()
}

/// `raw` joined onto `base` unless absolute, with `.` and `..` folded lexically.
pub(crate) fn host_path(base: &Path, raw: &str) -> PathBuf {
    let joined = base.join(raw);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
