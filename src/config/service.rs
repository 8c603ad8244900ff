// ABOUTME: Typed, normalized manifest model: Config, Service and VolumeSpec.
// ABOUTME: Produced by the resolver and cached in the application registry.

use super::duration::{InvalidDuration, parse_duration};
use crate::types::ServiceName;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A resolved manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Absolute path of the manifest this was resolved from.
    pub file: PathBuf,
    /// Services in deployment order.
    #[serde(default)]
    pub services: IndexMap<ServiceName, Service>,
    #[serde(default)]
    pub volumes: IndexMap<String, VolumeSpec>,
}

impl Config {
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Declared service names in order.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(ServiceName::as_str).collect()
    }

    /// Directory relative paths in the manifest are resolved against.
    pub fn manifest_dir(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// One normalized service definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    /// Inline Dockerfile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// `KEY=VALUE` entries in declaration order.
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub extra_hosts: Vec<String>,
    /// Readiness wait, e.g. `10s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl Service {
    /// The declared wait, if any. A zero wait declares no readiness contract.
    pub fn wait_duration(&self) -> Result<Option<Duration>, InvalidDuration> {
        match self.wait.as_deref() {
            None => Ok(None),
            Some(raw) => parse_duration(raw).map(|d| (!d.is_zero()).then_some(d)),
        }
    }
}

/// `build:` as a context path, a list of context paths, or a detailed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    Context(BuildContext),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<BuildContext>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dockerfile: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildContext {
    One(String),
    Many(Vec<String>),
}

impl BuildContext {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            BuildContext::One(p) => vec![p.as_str()],
            BuildContext::Many(ps) => ps.iter().map(String::as_str).collect(),
        }
    }
}

/// A command line, either as one string or already split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Line(String),
    Exec(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_driver")]
    pub driver: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_log_driver() -> String {
    "json-file".to_string()
}

/// A named volume declared at the top level of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub driver_opts: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalVolume {
    Flag(bool),
    Named {
        #[serde(default)]
        name: Option<String>,
    },
}

impl VolumeSpec {
    /// Engine name of an externally managed volume declared under `key`.
    pub fn external_name(&self, key: &str) -> Option<String> {
        match &self.external {
            None | Some(ExternalVolume::Flag(false)) => None,
            Some(ExternalVolume::Flag(true)) => Some(key.to_string()),
            Some(ExternalVolume::Named { name }) => {
                Some(name.clone().unwrap_or_else(|| key.to_string()))
            }
        }
    }
}

/// Textual form of a label value: strings as-is, anything else as JSON.
pub fn label_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// A list whose entries may be written as bare numbers, e.g. `ports: [8080]`.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<Scalar>> = Option::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(Scalar::into_string)
        .collect())
}
