// ABOUTME: Variable Provider for manifest rendering.
// ABOUTME: Process-wide vars, then the application's .env file, then APP_NAME/APP_PATH/APP_ENV.

use crate::types::AppName;
use indexmap::IndexMap;
use std::path::Path;

pub type Vars = IndexMap<String, String>;

/// Parse `.env` content: `KEY=VALUE` lines, `#` comments, optional `export`
/// prefix and quoted values.
pub fn parse_env(content: &str) -> Vars {
    let mut vars = Vars::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()));
    }
    vars
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return inner.replace("\\n", "\n").replace("\\\"", "\"");
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.to_string();
        }
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Assembles the variable set for one render pass.
#[derive(Debug, Clone, Default)]
pub struct VariableProvider {
    global: Vars,
}

impl VariableProvider {
    pub fn new(global: Vars) -> Self {
        Self { global }
    }

    /// The process-wide variables alone.
    pub fn global(&self) -> &Vars {
        &self.global
    }

    /// Variables for rendering one application's manifest.
    ///
    /// A missing or unreadable `.env` contributes nothing.
    pub fn for_app(&self, name: &AppName, path: &Path, env: &str) -> Vars {
        let mut vars = self.global.clone();

        match std::fs::read_to_string(path.join(".env")) {
            Ok(content) => vars.extend(parse_env(&content)),
            Err(e) => tracing::debug!(app = %name, "no .env loaded: {}", e),
        }

        vars.insert("APP_NAME".to_string(), name.to_string());
        vars.insert("APP_PATH".to_string(), path.display().to_string());
        vars.insert("APP_ENV".to_string(), env.to_string());
        vars
    }
}
