// ABOUTME: Tree-merge rules for service inheritance.
// ABOUTME: Shallow merges where the inheriting service wins, with per-field include/exclude rules.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Fields an `extend` never copies from its source service.
pub const NEVER_INHERITED: &[&str] = &["ports"];

/// Keys that drive inheritance and never survive into a merged service.
const INHERITANCE_KEYS: &[&str] = &["extend", "extends"];

/// Which fields of the source service an `extend` copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    All,
    Only(Vec<String>),
    Except(Vec<String>),
}

/// A parsed same-manifest `extend` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendRef {
    pub service: String,
    pub fields: FieldFilter,
}

impl ExtendRef {
    /// Accepts `svc`, `svc&a,b`, `svc!a,b` or a `{service, include, exclude}` mapping.
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::parse_str(s)),
            Value::Mapping(map) => {
                let service = map
                    .get("service")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Config("extend requires a \"service\"".to_string()))?;
                let fields = if let Some(include) = map.get("include") {
                    FieldFilter::Only(string_list(include)?)
                } else if let Some(exclude) = map.get("exclude") {
                    FieldFilter::Except(string_list(exclude)?)
                } else {
                    FieldFilter::All
                };
                Ok(Self {
                    service: service.to_string(),
                    fields,
                })
            }
            other => Err(Error::Config(format!(
                "extend must be a service name, got {:?}",
                other
            ))),
        }
    }

    fn parse_str(s: &str) -> Self {
        let split = |rest: &str| rest.split(',').map(|f| f.trim().to_string()).collect();
        if let Some((service, fields)) = s.split_once('&') {
            Self {
                service: service.trim().to_string(),
                fields: FieldFilter::Only(split(fields)),
            }
        } else if let Some((service, fields)) = s.split_once('!') {
            Self {
                service: service.trim().to_string(),
                fields: FieldFilter::Except(split(fields)),
            }
        } else {
            Self {
                service: s.trim().to_string(),
                fields: FieldFilter::All,
            }
        }
    }
}

fn string_list(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(s.split(',').map(|f| f.trim().to_string()).collect()),
        Value::Sequence(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| Error::Config("extend field names must be strings".to_string()))
            })
            .collect(),
        _ => Err(Error::Config(
            "extend include/exclude must be a list of field names".to_string(),
        )),
    }
}

/// Shallow merge: every field of `base`, overridden by every field of `own`.
pub fn overlay(base: &Mapping, own: Mapping) -> Mapping {
    let mut merged: Mapping = base
        .iter()
        .filter(|(k, _)| !is_inheritance_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (k, v) in own {
        merged.insert(k, v);
    }
    merged
}

/// Apply a same-manifest `extend` of `source` onto `own`.
pub fn inherit(source: &Mapping, own: Mapping, fields: &FieldFilter) -> Mapping {
    let keep = |key: &Value| -> bool {
        let Some(key) = key.as_str() else {
            return false;
        };
        if NEVER_INHERITED.contains(&key) {
            return false;
        }
        match fields {
            FieldFilter::All => true,
            FieldFilter::Only(only) => only.iter().any(|f| f == key),
            FieldFilter::Except(except) => !except.iter().any(|f| f == key),
        }
    };

    let filtered: Mapping = source
        .iter()
        .filter(|(k, _)| keep(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    overlay(&filtered, own)
}

fn is_inheritance_key(key: &Value) -> bool {
    key.as_str().is_some_and(|k| INHERITANCE_KEYS.contains(&k))
}
