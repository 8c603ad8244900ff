// ABOUTME: Image resolution for a service: inline Dockerfile build, context build, or pull.
// ABOUTME: A rebuild that produces a new image id removes the replaced image best-effort.

use super::{archive, host_path};
use crate::config::{BuildContext, BuildSpec, Service};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::output::Output;
use crate::runtime::{BuildOptions, ImageInfo, ImageOps};
use std::path::{Path, PathBuf};

/// Where a service's image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImageSource {
    /// Inline Dockerfile text, optionally with a context directory.
    Inline {
        context: Option<PathBuf>,
        dockerfile: String,
    },
    /// One or more context directories and an optional Dockerfile name.
    Context {
        contexts: Vec<PathBuf>,
        dockerfile: Option<String>,
    },
    Pull,
}

impl ImageSource {
    pub(crate) fn of(service: &Service, manifest_dir: &Path) -> Result<Self> {
        if let Some(dockerfile) = &service.dockerfile {
            let context = match &service.build {
                Some(BuildSpec::Context(BuildContext::One(path)))
                    if !Path::new(path).is_absolute() =>
                {
                    Some(host_path(manifest_dir, path))
                }
                _ => None,
            };
            return Ok(ImageSource::Inline {
                context,
                dockerfile: dockerfile.clone(),
            });
        }

        let Some(build) = &service.build else {
            return Ok(ImageSource::Pull);
        };

        let (context, dockerfile) = match build {
            BuildSpec::Context(context) => (Some(context), None),
            BuildSpec::Detailed {
                context,
                dockerfile,
            } => (context.as_ref(), dockerfile.clone()),
        };
        let contexts: Vec<PathBuf> = context
            .map(|c| c.paths())
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| host_path(manifest_dir, p))
            .collect();
        if contexts.is_empty() {
            return Err(Error::Config("Context must be specified!".to_string()));
        }

        Ok(ImageSource::Context {
            contexts,
            dockerfile,
        })
    }
}

/// Build or pull the image for `tag` and return what the engine now has under it.
pub async fn resolve_image<R: ImageOps + ?Sized>(
    runtime: &R,
    tag: &str,
    service: &Service,
    manifest_dir: &Path,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<ImageInfo> {
    let previous = runtime.inspect_image(tag).await.ok().map(|info| info.id);
    let mut progress = |line: &str| output.passthrough(line);

    match ImageSource::of(service, manifest_dir)? {
        ImageSource::Inline {
            context,
            dockerfile,
        } => {
            let contexts: Vec<PathBuf> = context.into_iter().collect();
            let tar = archive::pack(&contexts, Some(&dockerfile))?;
            let opts = BuildOptions {
                tag: tag.to_string(),
                dockerfile: None,
                pull: true,
            };
            tracing::info!(image = %tag, "building image from inline Dockerfile");
            runtime.build_image(tar, &opts, &mut progress).await?;
        }
        ImageSource::Context {
            contexts,
            dockerfile,
        } => {
            let tar = archive::pack(&contexts, None)?;
            let opts = BuildOptions {
                tag: tag.to_string(),
                dockerfile,
                pull: true,
            };
            tracing::info!(image = %tag, contexts = contexts.len(), "building image");
            runtime.build_image(tar, &opts, &mut progress).await?;
        }
        ImageSource::Pull => {
            tracing::debug!(image = %tag, "pulling image");
            if let Err(e) = runtime.pull_image(tag).await {
                diag.warn(Warning::pull_failed(format!(
                    "pull of \"{}\" failed, using the local image if any: {}",
                    tag, e
                )));
            }
        }
    }

    let info = runtime.inspect_image(tag).await?;

    if let Some(previous) = previous
        && previous != info.id
    {
        tracing::debug!(old = %previous.short(), new = %info.id.short(), "removing replaced image");
        if let Err(e) = runtime.remove_image(previous.as_str(), false).await {
            diag.warn(Warning::image_remove_failed(format!(
                "replaced image {} was not removed: {}",
                previous.short(),
                e
            )));
        }
    }

    Ok(info)
}
