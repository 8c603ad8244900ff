// ABOUTME: Request surface of the orchestrator: config, vars, init, create, start, rebuild, status, remove.
// ABOUTME: Resolves the registry entry and manifest, then hands off to the sequencer.

use crate::build::AppContext;
use crate::config::{
    Config, Frontend, ResolveOptions, Resolver, Settings, TemplateRenderer, VariableProvider, Vars,
};
use crate::deploy::{Deployed, Sequencer, app_order};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, ErrorKind, Result};
use crate::output::Output;
use crate::registry::{AppRegistry, AppUpdate, Application};
use crate::runtime::FullRuntime;
use crate::types::{AppName, ContainerId, ServiceName};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_ENV: &str = "dev";

/// `app` or `service.app`, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub app: AppName,
    pub service: Option<ServiceName>,
}

impl Target {
    /// Parse a reference. A missing app, or the empty app of `service.`,
    /// is the basename of `cwd`.
    pub fn parse(raw: Option<&str>, cwd: &Path) -> Result<Self> {
        let raw = raw.unwrap_or_default().trim();
        let (service, app) = match raw.split_once('.') {
            Some((service, app)) => (Some(service), app),
            None => (None, raw),
        };

        let app = if app.is_empty() {
            let base = cwd
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "Cannot derive an application name from \"{}\".",
                        cwd.display()
                    ))
                })?;
            AppName::new(base)?
        } else {
            AppName::new(app)?
        };

        Ok(Self {
            app,
            service: service.map(ServiceName::new).transpose()?,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(f, "{}.{}", service, self.app),
            None => write!(f, "{}", self.app),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    pub file: Option<PathBuf>,
    /// Re-resolve the manifest and store the result.
    pub update: bool,
    /// Replace the stored environment tags.
    pub set_env: Option<String>,
    /// Deprecated inline manifest text.
    pub inline: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitRequest {
    pub name: AppName,
    pub path: PathBuf,
    pub env: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "NOT CREATED")]
    NotCreated,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerState::On => write!(f, "ON"),
            ContainerState::Off => write!(f, "OFF"),
            ContainerState::NotCreated => write!(f, "NOT CREATED"),
        }
    }
}

/// One line of `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub name: String,
    pub state: ContainerState,
    pub ip: Option<String>,
    pub volatile: bool,
}

pub struct Orchestrator<'a, R: ?Sized, G: ?Sized> {
    runtime: &'a R,
    registry: &'a G,
    settings: &'a Settings,
    frontend: &'a Frontend,
    output: &'a Output,
    renderer: &'a dyn TemplateRenderer,
    vars: VariableProvider,
    cwd: PathBuf,
    cancel: CancellationToken,
}

impl<'a, R, G> Orchestrator<'a, R, G>
where
    R: FullRuntime + ?Sized,
    G: AppRegistry + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime: &'a R,
        registry: &'a G,
        settings: &'a Settings,
        frontend: &'a Frontend,
        output: &'a Output,
        renderer: &'a dyn TemplateRenderer,
        cwd: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runtime,
            registry,
            settings,
            frontend,
            output,
            renderer,
            vars: VariableProvider::new(settings.vars.clone()),
            cwd: cwd.into(),
            cancel,
        }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.vars, self.renderer, &self.cwd)
    }

    fn sequencer<'s>(&'s self, app: &'s AppName, config: &'s Config) -> Sequencer<'s, R> {
        let ctx = AppContext {
            app,
            config,
            settings: self.settings,
            frontend: self.frontend,
        };
        Sequencer::new(self.runtime, ctx, self.output, self.cancel.clone())
    }

    /// Read, re-resolve or retarget an application's config.
    pub fn config(&self, name: &AppName, req: &ConfigRequest) -> Result<Config> {
        let mut app = self.registry.get(name)?;
        let opts = ResolveOptions {
            file: req.file.clone(),
            inline: req.inline.clone(),
        };

        let mut update = AppUpdate::default();
        if let Some(env) = &req.set_env {
            app.env = env.clone();
            update.env = Some(env.clone());
        }
        if req.update {
            update.config = Some(self.resolver().resolve(&app, &opts)?);
        }

        if !update.is_empty() {
            let stored = self.registry.update(name, update)?;
            tracing::info!(app = %name, env = %stored.env, "application updated");
            return Ok(stored.config);
        }
        if req.file.is_some() || req.inline.is_some() {
            return self.resolver().resolve(&app, &opts);
        }
        Ok(app.config)
    }

    /// Variables a manifest renders with; process-wide ones without an app.
    pub fn vars(&self, name: Option<&AppName>) -> Result<Vars> {
        match name {
            Some(name) => {
                let app = self.registry.get(name)?;
                Ok(self.vars.for_app(&app.name, &app.path, &app.env))
            }
            None => Ok(self.vars.global().clone()),
        }
    }

    /// Register an application and store its resolved config.
    pub fn init(&self, req: &InitRequest) -> Result<Application> {
        if !req.path.is_absolute() {
            return Err(Error::Validation(format!(
                "Application path \"{}\" must be absolute.",
                req.path.display()
            )));
        }
        match self.registry.get(&req.name) {
            Ok(_) => {
                return Err(Error::AlreadyExists(format!(
                    "Application \"{}\" already exists.",
                    req.name
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let env = req.env.clone().unwrap_or_else(|| DEFAULT_ENV.to_string());
        let mut app = Application::new(req.name.clone(), req.path.clone(), env, Config::default());
        app.config = self.resolver().resolve(
            &app,
            &ResolveOptions {
                file: req.file.clone(),
                inline: None,
            },
        )?;

        self.registry.insert(app.clone())?;
        tracing::info!(app = %app.name, path = %app.path.display(), "application registered");
        Ok(app)
    }

    fn declared(&self, target: &Target, file: Option<&Path>) -> Result<Config> {
        match file {
            Some(file) => self.config(
                &target.app,
                &ConfigRequest {
                    file: Some(file.to_path_buf()),
                    ..Default::default()
                },
            ),
            None => Ok(self.registry.get(&target.app)?.config),
        }
    }

    /// Create containers without starting them.
    pub async fn create(
        &self,
        target: &Target,
        file: Option<&Path>,
        diag: &mut Diagnostics,
    ) -> Result<Deployed> {
        let config = self.declared(target, file)?;
        self.sequencer(&target.app, &config)
            .create(target.service.as_ref(), diag)
            .await
    }

    /// Start a service or a whole application. With `init`, an unregistered
    /// application is registered from the current directory first.
    pub async fn start(
        &self,
        target: &Target,
        init: Option<Option<PathBuf>>,
        diag: &mut Diagnostics,
    ) -> Result<Deployed> {
        let app = match (self.registry.get(&target.app), init) {
            (Ok(app), _) => app,
            (Err(e), Some(file)) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(app = %target.app, "not registered, initializing");
                self.init(&InitRequest {
                    name: target.app.clone(),
                    path: self.cwd.clone(),
                    env: None,
                    file,
                })?
            }
            (Err(e), _) => return Err(e),
        };

        self.sequencer(&app.name, &app.config)
            .start(target.service.as_ref(), diag)
            .await
    }

    pub async fn rebuild(&self, target: &Target, diag: &mut Diagnostics) -> Result<Deployed> {
        let app = self.registry.get(&target.app)?;
        self.sequencer(&app.name, &app.config)
            .rebuild(target.service.as_ref(), diag)
            .await
    }

    /// Declared and volatile containers in start order.
    pub async fn status(&self, name: &AppName) -> Result<Vec<StatusRow>> {
        let app = self.registry.get(name)?;
        let network = self.settings.app_network(name);
        let order = app_order(self.runtime, name, &app.config.service_names()).await?;

        let mut rows = Vec::with_capacity(order.len());
        for entry in order {
            let container = format!("{}.{}", entry.name, name);
            let row = match self
                .runtime
                .inspect_container(&ContainerId::new(container.clone()))
                .await
            {
                Ok(info) => StatusRow {
                    name: container,
                    state: if info.running {
                        ContainerState::On
                    } else {
                        ContainerState::Off
                    },
                    ip: info.ip_address(&network).map(String::from),
                    volatile: entry.volatile,
                },
                Err(e) => {
                    tracing::debug!(container = %container, "not created: {}", e);
                    StatusRow {
                        name: container,
                        state: ContainerState::NotCreated,
                        ip: None,
                        volatile: entry.volatile,
                    }
                }
            };
            rows.push(row);
        }
        Ok(rows)
    }

    /// Force-remove containers in reverse start order. `purge` also forgets
    /// the application.
    pub async fn remove(&self, target: &Target, purge: bool) -> Result<Vec<String>> {
        if purge && target.service.is_some() {
            return Err(Error::Validation(format!(
                "Cannot purge \"{}\": purge applies to a whole application.",
                target
            )));
        }

        let app = self.registry.get(&target.app)?;
        let services: Vec<String> = match &target.service {
            Some(service) => vec![service.to_string()],
            None => app_order(self.runtime, &app.name, &app.config.service_names())
                .await?
                .into_iter()
                .rev()
                .map(|s| s.name)
                .collect(),
        };

        let sequencer = self.sequencer(&app.name, &app.config);
        let mut removed = Vec::new();
        for service in services {
            if sequencer.remove_container(&service).await? {
                removed.push(format!("{}.{}", service, app.name));
            }
        }

        if purge {
            self.registry.remove(&app.name)?;
            tracing::info!(app = %app.name, "application purged");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Interpolator;
    use crate::output::OutputMode;
    use crate::registry::MemoryRegistry;
    use crate::runtime::fake::{Call, FakeRuntime};

    const MANIFEST: &str = "services:\n  db:\n    image: postgres\n  web:\n    image: nginx\n";

    struct Fixture {
        dir: tempfile::TempDir,
        registry: MemoryRegistry,
        settings: Settings,
        frontend: Frontend,
        output: Output,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let app_dir = dir.path().join("shop");
            std::fs::create_dir_all(&app_dir).unwrap();
            std::fs::write(app_dir.join("whaler.yml"), MANIFEST).unwrap();
            let settings = Settings {
                base_dir: dir.path().join("lib"),
                ..Settings::default()
            };
            Self {
                dir,
                registry: MemoryRegistry::new(),
                settings,
                frontend: Frontend::default(),
                output: Output::new(OutputMode::Quiet),
            }
        }

        fn app_dir(&self) -> PathBuf {
            self.dir.path().join("shop")
        }

        fn orchestrator<'a>(
            &'a self,
            runtime: &'a FakeRuntime,
        ) -> Orchestrator<'a, FakeRuntime, MemoryRegistry> {
            Orchestrator::new(
                runtime,
                &self.registry,
                &self.settings,
                &self.frontend,
                &self.output,
                &Interpolator,
                self.app_dir(),
                CancellationToken::new(),
            )
        }

        fn init(&self, runtime: &FakeRuntime) -> Application {
            self.orchestrator(runtime)
                .init(&InitRequest {
                    name: shop(),
                    path: self.app_dir(),
                    env: None,
                    file: None,
                })
                .unwrap()
        }
    }

    fn shop() -> AppName {
        AppName::new("shop").unwrap()
    }

    fn app_target() -> Target {
        Target {
            app: shop(),
            service: None,
        }
    }

    #[test]
    fn references_complete_from_the_working_directory() {
        let cwd = Path::new("/srv/shop");
        assert_eq!(Target::parse(None, cwd).unwrap(), app_target());
        assert_eq!(Target::parse(Some("shop"), cwd).unwrap(), app_target());

        let web = Target::parse(Some("web."), cwd).unwrap();
        assert_eq!(web.service.unwrap().as_str(), "web");
        assert_eq!(web.app, shop());

        let other = Target::parse(Some("db.blog"), cwd).unwrap();
        assert_eq!(other.to_string(), "db.blog");
    }

    #[test]
    fn references_with_bad_names_are_rejected() {
        let err = Target::parse(Some("Web.shop"), Path::new("/srv/shop")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn init_registers_with_the_default_env() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        let app = fx.init(&runtime);

        assert_eq!(app.env, DEFAULT_ENV);
        assert_eq!(app.config.service_names(), vec!["db", "web"]);
        assert_eq!(app.config.file, fx.app_dir().join("whaler.yml"));
        assert_eq!(fx.registry.get(&shop()).unwrap(), app);
    }

    #[test]
    fn init_rejects_relative_paths_and_duplicates() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        let orchestrator = fx.orchestrator(&runtime);

        let relative = orchestrator
            .init(&InitRequest {
                name: shop(),
                path: PathBuf::from("shop"),
                env: None,
                file: None,
            })
            .unwrap_err();
        assert_eq!(relative.kind(), ErrorKind::Validation);

        fx.init(&runtime);
        let duplicate = orchestrator
            .init(&InitRequest {
                name: shop(),
                path: fx.app_dir(),
                env: None,
                file: None,
            })
            .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn config_update_stores_the_new_env_and_manifest() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        fx.init(&runtime);
        std::fs::write(
            fx.app_dir().join("whaler.yml"),
            "services:\n  web:\n    image: nginx\n  ~prod:\n    cache:\n      image: redis\n",
        )
        .unwrap();

        let orchestrator = fx.orchestrator(&runtime);
        let stored = orchestrator.config(&shop(), &ConfigRequest::default()).unwrap();
        assert_eq!(stored.service_names(), vec!["db", "web"]);

        let updated = orchestrator
            .config(
                &shop(),
                &ConfigRequest {
                    update: true,
                    set_env: Some("prod".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.service_names(), vec!["web", "cache"]);
        assert_eq!(fx.registry.get(&shop()).unwrap().env, "prod");
    }

    #[test]
    fn explicit_file_gives_a_transient_config() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        fx.init(&runtime);
        let other = fx.app_dir().join("other.yml");
        std::fs::write(&other, "services:\n  api:\n    image: api\n").unwrap();

        let config = fx
            .orchestrator(&runtime)
            .config(
                &shop(),
                &ConfigRequest {
                    file: Some(other),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(config.service_names(), vec!["api"]);
        assert_eq!(
            fx.registry.get(&shop()).unwrap().config.service_names(),
            vec!["db", "web"]
        );
    }

    #[test]
    fn vars_include_application_values() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        fx.init(&runtime);
        let vars = fx.orchestrator(&runtime).vars(Some(&shop())).unwrap();
        assert_eq!(vars["APP_NAME"], "shop");
        assert_eq!(vars["APP_ENV"], DEFAULT_ENV);
    }

    #[tokio::test]
    async fn start_requires_registration_unless_init_is_requested() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        let orchestrator = fx.orchestrator(&runtime);

        let err = orchestrator
            .start(&app_target(), None, &mut Diagnostics::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let started = orchestrator
            .start(&app_target(), Some(None), &mut Diagnostics::default())
            .await
            .unwrap();
        assert_eq!(started.keys().collect::<Vec<_>>(), vec!["db", "web"]);
        assert!(fx.registry.get(&shop()).is_ok());
    }

    #[tokio::test]
    async fn create_reports_undeclared_services() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        fx.init(&runtime);
        let target = Target::parse(Some("cache.shop"), &fx.app_dir()).unwrap();

        let err = fx
            .orchestrator(&runtime)
            .create(&target, None, &mut Diagnostics::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "Config for \"cache.shop\" not found.");
    }

    #[tokio::test]
    async fn status_lists_declared_then_volatile_containers() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new()
            .with_container("db.shop", true, false, &[])
            .with_container("cron.shop", false, false, &[("whaler.service", "cron")]);
        runtime.set_ip("db.shop", &fx.settings.app_network(&shop()), "172.18.0.2");
        fx.init(&runtime);

        let rows = fx.orchestrator(&runtime).status(&shop()).await.unwrap();
        assert_eq!(
            rows,
            vec![
                StatusRow {
                    name: "db.shop".into(),
                    state: ContainerState::On,
                    ip: Some("172.18.0.2".into()),
                    volatile: false,
                },
                StatusRow {
                    name: "web.shop".into(),
                    state: ContainerState::NotCreated,
                    ip: None,
                    volatile: false,
                },
                StatusRow {
                    name: "cron.shop".into(),
                    state: ContainerState::Off,
                    ip: None,
                    volatile: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn remove_goes_in_reverse_order_and_purges() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new()
            .with_container("db.shop", true, false, &[])
            .with_container("web.shop", false, false, &[]);
        fx.init(&runtime);

        let removed = fx
            .orchestrator(&runtime)
            .remove(&app_target(), true)
            .await
            .unwrap();

        assert_eq!(removed, vec!["web.shop", "db.shop"]);
        assert_eq!(
            runtime.calls(),
            vec![
                Call::RemoveContainer("web.shop".into()),
                Call::RemoveContainer("db.shop".into()),
            ]
        );
        assert_eq!(
            fx.registry.get(&shop()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn purge_needs_a_whole_application() {
        let fx = Fixture::new();
        let runtime = FakeRuntime::new();
        fx.init(&runtime);
        let target = Target::parse(Some("web.shop"), &fx.app_dir()).unwrap();

        let err = fx
            .orchestrator(&runtime)
            .remove(&target, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(fx.registry.get(&shop()).is_ok());
    }
}
