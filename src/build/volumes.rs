// ABOUTME: Volume planning: binds, volumes-from and generated host paths.
// ABOUTME: Image-declared mount points nobody else satisfies get a per-service host directory.

use super::{AppContext, host_path};
use crate::config::{Service, label_text};
use crate::error::Result;
use crate::runtime::{ContainerOps, ImageInfo, VolumeConfig, VolumeError, VolumeOps};
use crate::types::{ContainerId, ServiceName, VolumeName};

/// Mount configuration for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumePlan {
    /// `src:dst[:mode]` bind entries.
    pub binds: Vec<String>,
    /// `container[:mode]` entries.
    pub volumes_from: Vec<String>,
}

pub async fn plan_volumes<R: ContainerOps + VolumeOps + ?Sized>(
    runtime: &R,
    ctx: &AppContext<'_>,
    name: &ServiceName,
    service: &Service,
    image: &ImageInfo,
) -> Result<VolumePlan> {
    let mut plan = VolumePlan::default();
    let mut pending: Vec<String> = image.volumes.clone();

    for entry in &service.volumes_from {
        let mut parts: Vec<String> = entry.split(':').map(str::to_string).collect();
        if parts[0] == "container" {
            parts.remove(0);
        } else {
            parts[0] = format!("{}.{}", parts[0], ctx.app);
        }
        let Some(source) = parts.first().cloned() else {
            continue;
        };
        plan.volumes_from.push(parts.join(":"));

        if !pending.is_empty() {
            let info = runtime
                .inspect_container(&ContainerId::new(source))
                .await?;
            pending.retain(|mount| !info.mounts.contains(mount));
        }
    }

    for entry in &service.volumes {
        let mut parts: Vec<String> = entry.split(':').map(str::to_string).collect();
        if parts.len() == 1 {
            if !pending.contains(&parts[0]) {
                pending.push(parts.remove(0));
            }
            continue;
        }

        let mode = if parts.len() == 3 { parts.pop() } else { None };
        parts[0] = source_volume(runtime, ctx, &parts[0]).await?;
        pending.retain(|mount| *mount != parts[1]);

        if let Some(mode) = mode {
            parts.push(mode);
        }
        plan.binds.push(parts.join(":"));
    }

    let dir = ctx.settings.service_dir(ctx.app, name);
    for mount in pending {
        plan.binds.push(format!("{}{}:{}", dir.display(), mount, mount));
    }

    Ok(plan)
}

/// Engine volume name for a declared application volume, else a host path.
async fn source_volume<R: VolumeOps + ?Sized>(
    runtime: &R,
    ctx: &AppContext<'_>,
    source: &str,
) -> Result<String> {
    let Some(spec) = ctx.config.volumes.get(source) else {
        return Ok(host_path(ctx.config.manifest_dir(), source)
            .to_string_lossy()
            .into_owned());
    };

    if let Some(external) = spec.external_name(source) {
        runtime.inspect_volume(&external).await?;
        return Ok(external);
    }

    VolumeName::new(source)?;
    let engine_name = ctx.settings.volume_name(ctx.app, source);
    match runtime.inspect_volume(&engine_name).await {
        Ok(()) => {}
        Err(VolumeError::NotFound(_)) => {
            tracing::info!(volume = %engine_name, "creating volume");
            runtime
                .create_volume(&VolumeConfig {
                    name: engine_name.clone(),
                    driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
                    driver_opts: spec.driver_opts.clone(),
                    labels: spec
                        .labels
                        .iter()
                        .map(|(k, v)| (k.clone(), label_text(v)))
                        .collect(),
                })
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(engine_name)
}
