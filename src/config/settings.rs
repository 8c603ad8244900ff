// ABOUTME: Engine-wide settings shared by every application on the host.
// ABOUTME: Loaded once per invocation from $WHALER_CONFIG or /etc/whaler/config.yml.

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::types::{AppName, ServiceName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_ENV: &str = "WHALER_CONFIG";
pub const SETTINGS_PATH: &str = "/etc/whaler/config.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every engine object this host creates.
    pub namespace: String,
    pub base_dir: PathBuf,
    pub network: NetworkSettings,
    /// Logging used when a service declares none.
    pub log: Option<LoggingConfig>,
    /// Process-wide variables, visible to every manifest and container.
    pub vars: IndexMap<String, String>,
    /// Engine request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Driver settings for per-application networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub driver: String,
    pub options: HashMap<String, String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            driver: "bridge".to_string(),
            options: HashMap::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: "whaler".to_string(),
            base_dir: PathBuf::from("/var/lib/whaler"),
            network: NetworkSettings::default(),
            log: None,
            vars: IndexMap::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// `$WHALER_CONFIG`, then the system path, then built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(SETTINGS_ENV)
            && !path.is_empty()
        {
            return Self::load_from(Path::new(&path));
        }
        let system = Path::new(SETTINGS_PATH);
        if system.exists() {
            return Self::load_from(system);
        }
        Ok(Self::default())
    }

    /// The network every container joins, across applications.
    pub fn shared_network(&self) -> String {
        format!("{}_nw", self.namespace)
    }

    pub fn app_network(&self, app: &AppName) -> String {
        format!("{}_nw.{}", self.namespace, app)
    }

    /// Engine name of an orchestrator-managed volume.
    pub fn volume_name(&self, app: &AppName, volume: &str) -> String {
        format!("{}_vlm.{}.{}", self.namespace, app, volume)
    }

    /// Image tag used when a service names no image.
    pub fn image_name(&self, app: &AppName, service: &ServiceName) -> String {
        format!("{}_{}_{}", self.namespace, app, service)
    }

    /// Host directory for a service's generated files and anonymous volumes.
    pub fn service_dir(&self, app: &AppName, service: &ServiceName) -> PathBuf {
        self.base_dir
            .join("volumes")
            .join(app.as_str())
            .join(service.as_str())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.base_dir.join("apps.json")
    }

    pub fn bridge_binary(&self) -> PathBuf {
        self.base_dir.join("bin").join("bridge")
    }
}

/// Invocation-wide facts about the front-end, captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontend {
    /// Raw `WHALER_WAIT_MODE` value, which wins over everything else.
    pub wait_mode: Option<String>,
    /// `WHALER_FRONTEND=interactive`.
    pub interactive: bool,
    /// Whether stdout is a terminal.
    pub stdout_tty: bool,
}

impl Frontend {
    pub fn detect() -> Self {
        Self {
            wait_mode: std::env::var("WHALER_WAIT_MODE")
                .ok()
                .filter(|v| !v.is_empty()),
            interactive: std::env::var("WHALER_FRONTEND").is_ok_and(|v| v == "interactive"),
            stdout_tty: std::io::stdout().is_terminal(),
        }
    }
}
