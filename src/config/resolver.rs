// ABOUTME: Config Resolver: renders a manifest and normalizes it into a typed Config.
// ABOUTME: Env overlays, extends/extend inheritance, collection shapes and scale expansion.

use super::conditional::apply_env_overlays;
use super::merge::{ExtendRef, inherit, overlay};
use super::service::{Config, Service, VolumeSpec};
use super::template::TemplateRenderer;
use super::vars::VariableProvider;
use crate::error::{Error, Result};
use crate::registry::Application;
use crate::types::{ServiceName, VolumeName};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILENAME: &str = "whaler.yml";

/// Where to read the manifest from.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Explicit manifest path; must be absolute.
    pub file: Option<PathBuf>,
    /// Deprecated inline manifest text, rendered through a temporary sibling file.
    pub inline: Option<String>,
}

impl ResolveOptions {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            inline: None,
        }
    }
}

pub struct Resolver<'a> {
    vars: &'a VariableProvider,
    renderer: &'a dyn TemplateRenderer,
    /// Base for relative `extends.file` paths.
    cwd: PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(
        vars: &'a VariableProvider,
        renderer: &'a dyn TemplateRenderer,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vars,
            renderer,
            cwd: cwd.into(),
        }
    }

    /// The explicit file, else the file of the stored config, else `<app>/whaler.yml`.
    pub fn manifest_path(app: &Application, file: Option<&Path>) -> PathBuf {
        if let Some(file) = file {
            return file.to_path_buf();
        }
        if !app.config.file.as_os_str().is_empty() {
            return app.config.file.clone();
        }
        app.path.join(MANIFEST_FILENAME)
    }

    pub fn resolve(&self, app: &Application, opts: &ResolveOptions) -> Result<Config> {
        let mut chain = Vec::new();
        self.resolve_in(app, opts, &mut chain)
    }

    fn resolve_in(
        &self,
        app: &Application,
        opts: &ResolveOptions,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Config> {
        let file = Self::manifest_path(app, opts.file.as_deref());
        if chain.contains(&file) {
            return Err(Error::Config(format!(
                "extends cycle through \"{}\"",
                file.display()
            )));
        }

        let vars = self.vars.for_app(&app.name, &app.path, &app.env);
        let text = match &opts.inline {
            Some(inline) => {
                let mut tmp = file.clone().into_os_string();
                tmp.push(".tmp");
                let tmp = PathBuf::from(tmp);
                std::fs::write(&tmp, inline)?;
                let rendered = self.renderer.render(&tmp, &vars);
                if let Err(e) = std::fs::remove_file(&tmp) {
                    tracing::debug!(path = %tmp.display(), "failed to remove temporary manifest: {}", e);
                }
                rendered?
            }
            None => {
                if !file.is_absolute() {
                    return Err(Error::Validation(format!(
                        "Config path \"{}\" must be absolute.",
                        file.display()
                    )));
                }
                if !file.exists() {
                    return Err(Error::NotFound(format!(
                        "Config file \"{}\" not exists.",
                        file.display()
                    )));
                }
                self.renderer.render(&file, &vars)?
            }
        };

        tracing::debug!(app = %app.name, file = %file.display(), "resolving manifest");

        let document: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(&text)?
        };
        let mut root = match apply_env_overlays(document, &app.env) {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => {
                return Err(Error::Config(format!(
                    "manifest \"{}\" must be a mapping",
                    file.display()
                )));
            }
        };

        chain.push(file.clone());
        let services = self.normalize_services(app, root.shift_remove("services"), chain);
        chain.pop();

        Ok(Config {
            services: services?,
            volumes: parse_volumes(root.shift_remove("volumes"))?,
            file,
        })
    }

    fn normalize_services(
        &self,
        app: &Application,
        value: Option<Value>,
        chain: &mut Vec<PathBuf>,
    ) -> Result<IndexMap<ServiceName, Service>> {
        let mut services = match value {
            None | Some(Value::Null) => return Ok(IndexMap::new()),
            Some(Value::Mapping(map)) => map,
            Some(_) => return Err(Error::Config("\"services\" must be a mapping".to_string())),
        };

        let keys: Vec<Value> = services.keys().cloned().collect();
        let mut scale: HashMap<String, u64> = HashMap::new();

        for key in keys {
            let name = ServiceName::new(&key_text(&key))?;
            let mut def = as_mapping(services.get(&key), &name)?;

            if let Some(extends) = def.shift_remove("extends") {
                let base = self.load_extended(app, &extends, chain)?;
                def = overlay(&base, def);
            }

            if let Some(extend) = def.shift_remove("extend") {
                let reference = ExtendRef::parse(&extend)?;
                let source = services.get(reference.service.as_str()).ok_or_else(|| {
                    Error::Config(format!(
                        "service \"{}\" extends unknown service \"{}\"",
                        name, reference.service
                    ))
                })?;
                let source = as_mapping(Some(source), &name)?;
                def = inherit(&source, def, &reference.fields);
            }

            normalize_shapes(&mut def);

            if let Some(count) = def.shift_remove("scale").as_ref().and_then(scale_count)
                && count > 0
            {
                scale.insert(name.to_string(), count);
            }

            services.insert(key, Value::Mapping(def));
        }

        let mut resolved = IndexMap::with_capacity(services.len());
        for (key, value) in services {
            let name = key_text(&key);
            let service: Service = serde_yaml::from_value(value)
                .map_err(|e| Error::Config(format!("service \"{}\": {}", name, e)))?;

            match scale.get(&name) {
                Some(&count) => {
                    for index in 1..=count {
                        let replica = ServiceName::new(&format!("{}{}", name, index))?;
                        resolved.insert(replica, service.clone());
                    }
                }
                None => {
                    resolved.insert(ServiceName::new(&name)?, service);
                }
            }
        }

        Ok(resolved)
    }

    /// Load the service an `extends: {file, service}` points at.
    ///
    /// An undeclared service yields an empty mapping.
    fn load_extended(
        &self,
        app: &Application,
        extends: &Value,
        chain: &mut Vec<PathBuf>,
    ) -> Result<Mapping> {
        let file = extends.get("file").and_then(Value::as_str);
        let service = extends.get("service").and_then(Value::as_str);
        let (Some(file), Some(service)) = (file, service) else {
            return Err(Error::Config(
                "extends requires both \"file\" and \"service\"".to_string(),
            ));
        };

        let path = self.cwd.join(file);
        let config = self.resolve_in(app, &ResolveOptions::file(&path), chain)?;
        // A scaled source only has its replicas, so there is nothing to inherit.
        let Some(data) = config.service(service) else {
            tracing::debug!(
                service,
                file = %path.display(),
                "extended service not declared, inheriting nothing"
            );
            return Ok(Mapping::new());
        };

        match serde_yaml::to_value(data)? {
            Value::Mapping(map) => Ok(map),
            _ => Ok(Mapping::new()),
        }
    }
}

fn as_mapping(value: Option<&Value>, name: &ServiceName) -> Result<Mapping> {
    match value {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(map)) => Ok(map.clone()),
        Some(_) => Err(Error::Config(format!(
            "service \"{}\" must be a mapping",
            name
        ))),
    }
}

/// Mapping-shaped `volumes`/`env` become ordered lists; a numeric `wait` gains an `s` unit.
fn normalize_shapes(def: &mut Mapping) {
    if let Some(Value::Mapping(volumes)) = def.get("volumes") {
        let list = pairs_to_list(volumes, ':');
        def.insert("volumes".into(), list);
    }
    if let Some(Value::Mapping(env)) = def.get("env") {
        let list = pairs_to_list(env, '=');
        def.insert("env".into(), list);
    }
    if let Some(Value::Number(wait)) = def.get("wait") {
        let wait = format!("{}s", wait);
        def.insert("wait".into(), Value::String(wait));
    }
}

fn pairs_to_list(map: &Mapping, separator: char) -> Value {
    Value::Sequence(
        map.iter()
            .map(|(k, v)| {
                let key = key_text(k);
                match v {
                    Value::Null => Value::String(key),
                    Value::String(s) if s.is_empty() => Value::String(key),
                    other => Value::String(format!("{}{}{}", key, separator, scalar_text(other))),
                }
            })
            .collect(),
    )
}

fn key_text(key: &Value) -> String {
    scalar_text(key)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn scale_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_volumes(value: Option<Value>) -> Result<IndexMap<String, VolumeSpec>> {
    let map = match value {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Mapping(map)) => map,
        Some(_) => return Err(Error::Config("\"volumes\" must be a mapping".to_string())),
    };

    let mut volumes = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let name = key_text(&key);
        let spec: VolumeSpec = match value {
            Value::Null => VolumeSpec::default(),
            other => serde_yaml::from_value(other)
                .map_err(|e| Error::Config(format!("volume \"{}\": {}", name, e)))?,
        };
        if spec.external_name(&name).is_none() {
            VolumeName::new(&name)?;
        }
        volumes.insert(name, spec);
    }
    Ok(volumes)
}
