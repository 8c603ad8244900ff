// ABOUTME: Manifest template rendering.
// ABOUTME: TemplateRenderer seam plus the default ${VAR} / ${VAR:-default} interpolator.

use super::vars::Vars;
use crate::error::{Error, Result};
use std::path::Path;

/// Renders a manifest file into YAML text given a variable set.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, path: &Path, vars: &Vars) -> Result<String>;
}

/// Shell-style interpolation: `${NAME}`, `${NAME:-fallback}` and `$$` for a
/// literal dollar sign. Unknown names without a fallback render empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolator;

impl TemplateRenderer for Interpolator {
    fn render(&self, path: &Path, vars: &Vars) -> Result<String> {
        let text = std::fs::read_to_string(path)?;
        interpolate(&text, vars).map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))
    }
}

pub fn interpolate(text: &str, vars: &Vars) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body
                .find('}')
                .ok_or_else(|| "unterminated \"${\" in template".to_string())?;
            let expr = &body[..end];
            let (name, fallback) = match expr.split_once(":-") {
                Some((name, fallback)) => (name, Some(fallback)),
                None => (expr, None),
            };
            match vars.get(name.trim()) {
                Some(value) if !(value.is_empty() && fallback.is_some()) => out.push_str(value),
                _ => out.push_str(fallback.unwrap_or("")),
            }
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut vars = Vars::new();
        vars.insert("APP_NAME".into(), "shop".into());
        vars.insert("EMPTY".into(), String::new());
        vars
    }

    #[test]
    fn substitutes_known_names() {
        assert_eq!(
            interpolate("image: ${APP_NAME}:latest", &vars()).unwrap(),
            "image: shop:latest"
        );
    }

    #[test]
    fn fallback_applies_to_missing_and_empty() {
        assert_eq!(interpolate("${NOPE:-dev}", &vars()).unwrap(), "dev");
        assert_eq!(interpolate("${EMPTY:-x}", &vars()).unwrap(), "x");
        assert_eq!(interpolate("${NOPE}", &vars()).unwrap(), "");
    }

    #[test]
    fn dollar_escapes_pass_through() {
        assert_eq!(interpolate("cost $$5 and $HOME", &vars()).unwrap(), "cost $5 and $HOME");
    }

    #[test]
    fn unterminated_reference_is_an_error() {
        assert!(interpolate("${APP_NAME", &vars()).is_err());
    }
}
