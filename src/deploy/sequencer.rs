// ABOUTME: Deployment Sequencer: creates, starts and rebuilds an application's containers.
// ABOUTME: Strictly sequential; any engine failure aborts the rest of the sequence.

use super::order::app_order;
use super::readiness::ReadinessMonitor;
use super::wait_mode::WaitMode;
use crate::build::{AppContext, LABEL_WAIT, SpecBuilder};
use crate::config::parse_duration;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::runtime::{ContainerError, ContainerInfo, FullRuntime};
use crate::types::{ContainerId, ServiceName};
use indexmap::IndexMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Containers touched by a request, keyed by service name in execution order.
pub type Deployed = IndexMap<String, ContainerId>;

pub struct Sequencer<'a, R: ?Sized> {
    runtime: &'a R,
    ctx: AppContext<'a>,
    output: &'a Output,
    cancel: CancellationToken,
}

impl<'a, R: FullRuntime + ?Sized> Sequencer<'a, R> {
    pub fn new(
        runtime: &'a R,
        ctx: AppContext<'a>,
        output: &'a Output,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runtime,
            ctx,
            output,
            cancel,
        }
    }

    fn builder(&self) -> SpecBuilder<'a, R> {
        SpecBuilder::new(self.runtime, self.ctx, self.output)
    }

    fn container_name(&self, service: &str) -> String {
        format!("{}.{}", service, self.ctx.app)
    }

    /// Services a request applies to: the named one, or the whole start order.
    async fn targets(&self, service: Option<&ServiceName>) -> Result<Vec<String>> {
        match service {
            Some(service) => Ok(vec![service.to_string()]),
            None => Ok(app_order(self.runtime, self.ctx.app, &self.ctx.config.service_names())
                .await?
                .into_iter()
                .map(|s| s.name)
                .collect()),
        }
    }

    /// Create containers for one declared service or all of them, without starting.
    pub async fn create(
        &self,
        service: Option<&ServiceName>,
        diag: &mut Diagnostics,
    ) -> Result<Deployed> {
        let services: Vec<ServiceName> = match service {
            Some(service) => {
                if self.ctx.config.service(service.as_str()).is_none() {
                    return Err(Error::Config(format!(
                        "Config for \"{}\" not found.",
                        self.container_name(service.as_str())
                    )));
                }
                vec![service.clone()]
            }
            None => self.ctx.config.services.keys().cloned().collect(),
        };

        let builder = self.builder();
        let mut created = Deployed::new();
        for name in services {
            let id = builder.create(&name, diag).await?;
            created.insert(name.to_string(), id);
        }
        Ok(created)
    }

    /// Bring one service or the whole application up, in order.
    pub async fn start(
        &self,
        service: Option<&ServiceName>,
        diag: &mut Diagnostics,
    ) -> Result<Deployed> {
        let mut started = Deployed::new();
        for name in self.targets(service).await? {
            let id = self.start_one(&name, diag).await?;
            started.insert(name, id);
        }
        Ok(started)
    }

    /// Remove the targeted containers, then start them again from the manifest.
    pub async fn rebuild(
        &self,
        service: Option<&ServiceName>,
        diag: &mut Diagnostics,
    ) -> Result<Deployed> {
        for name in self.targets(service).await? {
            self.remove_container(&name).await?;
        }
        self.start(service, diag).await
    }

    /// Force-remove a service's container. An absent container is not an error.
    pub async fn remove_container(&self, service: &str) -> Result<bool> {
        let name = self.container_name(service);
        match self
            .runtime
            .remove_container(&ContainerId::new(name.clone()), true)
            .await
        {
            Ok(()) => {
                tracing::info!(container = %name, "container removed");
                self.output
                    .progress(&format!("Container \"{}\" removed.", name));
                Ok(true)
            }
            Err(ContainerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_one(&self, service: &str, diag: &mut Diagnostics) -> Result<ContainerId> {
        let name = self.container_name(service);
        let existing = match self
            .runtime
            .inspect_container(&ContainerId::new(name.clone()))
            .await
        {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(container = %name, "treating as absent: {}", e);
                None
            }
        };

        let id = match existing {
            None => self.builder().create(&ServiceName::new(service)?, diag).await?,
            Some(info) if info.running => {
                tracing::info!(container = %name, "already running");
                self.output
                    .progress(&format!("Container \"{}\" already running.", name));
                return Ok(info.id);
            }
            Some(info) => {
                let desired =
                    WaitMode::for_container(info.label(LABEL_WAIT).is_some(), self.ctx.frontend);
                if info.tty == desired.is_interactive() {
                    info.id
                } else {
                    self.output.progress(&format!(
                        "Rebuild container \"{}\" to {} mode.",
                        name,
                        if desired.is_interactive() {
                            "interactive"
                        } else {
                            "non-interactive"
                        }
                    ));
                    self.runtime.remove_container(&info.id, true).await?;
                    self.builder()
                        .create(&ServiceName::new(service)?, diag)
                        .await?
                }
            }
        };

        self.start_container(&name, &id, diag).await?;
        Ok(id)
    }

    async fn start_container(
        &self,
        name: &str,
        id: &ContainerId,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        self.output
            .progress(&format!("Starting \"{}\" container.", name));
        let info = self.runtime.inspect_container(id).await?;

        match readiness_wait(&info) {
            Some(wait) => {
                ReadinessMonitor::new(self.runtime, self.output, self.cancel.clone())
                    .start_and_wait(&info, wait, diag)
                    .await?
            }
            None => self.runtime.start_container(id).await?,
        }

        tracing::info!(container = %name, "container started");
        self.output
            .progress(&format!("Container \"{}\" started.", name));
        Ok(())
    }
}

/// The wait recorded on a container at create time.
fn readiness_wait(info: &ContainerInfo) -> Option<Duration> {
    let raw = info.label(LABEL_WAIT)?;
    match parse_duration(raw) {
        Ok(wait) if !wait.is_zero() => Some(wait),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(container = %info.name, "ignoring wait label: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Frontend, Settings};
    use crate::output::OutputMode;
    use crate::runtime::fake::{Call, FakeRuntime};
    use crate::types::AppName;

    struct Fixture {
        _dir: tempfile::TempDir,
        app: AppName,
        config: Config,
        settings: Settings,
        frontend: Frontend,
        output: Output,
    }

    impl Fixture {
        fn new(manifest: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("whaler.yml");
            let config: Config =
                serde_yaml::from_str(&format!("file: {}\n{}", file.display(), manifest)).unwrap();
            let settings = Settings {
                base_dir: dir.path().join("lib"),
                ..Settings::default()
            };
            Self {
                _dir: dir,
                app: AppName::new("shop").unwrap(),
                config,
                settings,
                frontend: Frontend::default(),
                output: Output::new(OutputMode::Quiet),
            }
        }

        fn sequencer<'a>(&'a self, runtime: &'a FakeRuntime) -> Sequencer<'a, FakeRuntime> {
            let ctx = AppContext {
                app: &self.app,
                config: &self.config,
                settings: &self.settings,
                frontend: &self.frontend,
            };
            Sequencer::new(runtime, ctx, &self.output, CancellationToken::new())
        }
    }

    fn lifecycle(calls: Vec<Call>) -> Vec<Call> {
        calls
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::CreateContainer(_) | Call::StartContainer(_) | Call::RemoveContainer(_)
                )
            })
            .collect()
    }

    const TWO_SERVICES: &str = "services:\n  db:\n    image: postgres\n  web:\n    image: nginx\n";

    #[tokio::test]
    async fn only_the_missing_service_is_created_and_started() {
        let fx = Fixture::new(TWO_SERVICES);
        let runtime = FakeRuntime::new().with_container("db.shop", true, false, &[]);

        let started = fx
            .sequencer(&runtime)
            .start(None, &mut Diagnostics::default())
            .await
            .unwrap();

        assert_eq!(started.keys().collect::<Vec<_>>(), vec!["db", "web"]);
        assert_eq!(
            lifecycle(runtime.calls()),
            vec![
                Call::CreateContainer("web.shop".into()),
                Call::StartContainer("web.shop".into()),
            ]
        );
    }

    #[tokio::test]
    async fn stopped_containers_start_in_manifest_order() {
        let fx = Fixture::new(TWO_SERVICES);
        let runtime = FakeRuntime::new()
            .with_container("web.shop", false, false, &[])
            .with_container("db.shop", false, false, &[]);

        fx.sequencer(&runtime)
            .start(None, &mut Diagnostics::default())
            .await
            .unwrap();

        assert_eq!(
            lifecycle(runtime.calls()),
            vec![
                Call::StartContainer("db.shop".into()),
                Call::StartContainer("web.shop".into()),
            ]
        );
    }

    #[tokio::test]
    async fn volatile_containers_start_after_declared_ones() {
        let fx = Fixture::new("services:\n  web:\n    image: nginx\n");
        let runtime = FakeRuntime::new()
            .with_container(
                "cron.shop",
                false,
                false,
                &[("whaler.service", "cron"), ("whaler.position", r#"{"after":"web","before":null}"#)],
            )
            .with_container("web.shop", false, false, &[]);

        let started = fx
            .sequencer(&runtime)
            .start(None, &mut Diagnostics::default())
            .await
            .unwrap();

        assert_eq!(started.keys().collect::<Vec<_>>(), vec!["web", "cron"]);
        assert_eq!(
            lifecycle(runtime.calls()),
            vec![
                Call::StartContainer("web.shop".into()),
                Call::StartContainer("cron.shop".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tty_mismatch_rebuilds_before_starting() {
        let fx = Fixture::new("services:\n  web:\n    image: nginx\n    wait: 5s\n");
        let runtime = FakeRuntime::new().with_container(
            "web.shop",
            false,
            true,
            &[("whaler.wait", "5s")],
        );

        let start = tokio::time::Instant::now();
        fx.sequencer(&runtime)
            .start(Some(&ServiceName::new("web").unwrap()), &mut Diagnostics::default())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(
            lifecycle(runtime.calls()),
            vec![
                Call::RemoveContainer("web.shop".into()),
                Call::CreateContainer("web.shop".into()),
                Call::StartContainer("web.shop".into()),
            ]
        );
        assert!(!runtime.spec("web.shop").unwrap().tty);
    }

    #[tokio::test]
    async fn engine_failure_aborts_the_sequence() {
        let fx = Fixture::new(TWO_SERVICES);
        let runtime = FakeRuntime::new();
        runtime.occupy("db.shop");

        let err = fx
            .sequencer(&runtime)
            .start(None, &mut Diagnostics::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Engine);
        assert!(!runtime.has_container("web.shop"));
    }

    #[tokio::test]
    async fn create_rejects_undeclared_services() {
        let fx = Fixture::new(TWO_SERVICES);
        let runtime = FakeRuntime::new();
        let err = fx
            .sequencer(&runtime)
            .create(
                Some(&ServiceName::new("cache").unwrap()),
                &mut Diagnostics::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Config for \"cache.shop\" not found.");
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn rebuild_recreates_running_containers() {
        let fx = Fixture::new(TWO_SERVICES);
        let runtime = FakeRuntime::new()
            .with_container("db.shop", true, false, &[])
            .with_container("web.shop", true, false, &[]);

        fx.sequencer(&runtime)
            .rebuild(None, &mut Diagnostics::default())
            .await
            .unwrap();

        assert_eq!(
            lifecycle(runtime.calls()),
            vec![
                Call::RemoveContainer("db.shop".into()),
                Call::RemoveContainer("web.shop".into()),
                Call::CreateContainer("db.shop".into()),
                Call::StartContainer("db.shop".into()),
                Call::CreateContainer("web.shop".into()),
                Call::StartContainer("web.shop".into()),
            ]
        );
    }
}
