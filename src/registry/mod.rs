// ABOUTME: Application registry: which applications exist, where they live, their cached config.
// ABOUTME: AppRegistry trait with a JSON file store and an in-memory store.

mod file;
mod memory;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

use crate::config::Config;
use crate::error::Result;
use crate::types::AppName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A registered application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub name: AppName,
    /// Absolute directory holding the manifest.
    pub path: PathBuf,
    /// Comma-separated environment tags, e.g. `dev` or `prod,eu`.
    pub env: String,
    /// Config resolved at the last init or update.
    #[serde(default)]
    pub config: Config,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(name: AppName, path: PathBuf, env: impl Into<String>, config: Config) -> Self {
        let now = Utc::now();
        Self {
            name,
            path,
            env: env.into(),
            config,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a stored application.
#[derive(Debug, Clone, Default)]
pub struct AppUpdate {
    pub env: Option<String>,
    pub config: Option<Config>,
}

impl AppUpdate {
    pub fn is_empty(&self) -> bool {
        self.env.is_none() && self.config.is_none()
    }

    fn apply(self, app: &mut Application) {
        if let Some(env) = self.env {
            app.env = env;
        }
        if let Some(config) = self.config {
            app.config = config;
        }
        app.updated_at = Utc::now();
    }
}

/// Persistent key-value store of applications.
pub trait AppRegistry: Send + Sync {
    /// Fetch an application; `NotFound` when it is not registered.
    fn get(&self, name: &AppName) -> Result<Application>;

    /// Register a new application; `AlreadyExists` when the name is taken.
    fn insert(&self, app: Application) -> Result<()>;

    /// Apply a partial update and return the stored result.
    fn update(&self, name: &AppName, update: AppUpdate) -> Result<Application>;

    fn remove(&self, name: &AppName) -> Result<()>;
}

pub(crate) fn not_registered(name: &AppName) -> crate::error::Error {
    crate::error::Error::NotFound(format!("Application \"{}\" not found.", name))
}

pub(crate) fn already_registered(name: &AppName) -> crate::error::Error {
    crate::error::Error::AlreadyExists(format!("Application \"{}\" already exists.", name))
}
