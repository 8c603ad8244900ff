// ABOUTME: Environment-conditional overlays in a parsed manifest.
// ABOUTME: A `~tag1,tag2` key merges its mapping into the parent when the app's environment matches.

use serde_yaml::{Mapping, Value};

/// Resolve every `~...` key in `value` against the application's
/// comma-separated environment tag.
///
/// Matching overlays are shallow-merged into their parent mapping with the
/// overlay winning; every conditional key is removed whether or not it matched.
pub fn apply_env_overlays(value: Value, env: &str) -> Value {
    let tags: Vec<&str> = env
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    apply(value, &tags)
}

fn apply(value: Value, tags: &[&str]) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(apply_mapping(map, tags)),
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(|v| apply(v, tags)).collect())
        }
        Value::Tagged(mut tagged) => {
            tagged.value = apply(std::mem::take(&mut tagged.value), tags);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

fn apply_mapping(mut map: Mapping, tags: &[&str]) -> Mapping {
    // An applied overlay may bring new conditional keys into this level.
    while let Some(key) = map.keys().find(|k| condition_of(k).is_some()).cloned() {
        let Some(overlay) = map.shift_remove(&key) else {
            break;
        };
        let matched = condition_of(&key)
            .map(|wanted| wanted.iter().any(|w| tags.contains(w)))
            .unwrap_or(false);
        if matched && let Value::Mapping(overlay) = overlay {
            for (k, v) in overlay {
                map.insert(k, v);
            }
        }
    }

    map.into_iter().map(|(k, v)| (k, apply(v, tags))).collect()
}

/// Tags listed by a conditional key, `None` for ordinary keys.
fn condition_of(key: &Value) -> Option<Vec<&str>> {
    let rest = key.as_str()?.strip_prefix('~')?;
    Some(
        rest.split(['~', ','])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect(),
    )
}
