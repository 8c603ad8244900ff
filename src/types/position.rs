// ABOUTME: Declared-order neighbours recorded on a container at creation time.
// ABOUTME: The only durable ordering record once a service leaves the manifest.

use serde::{Deserialize, Serialize};

/// Immediate neighbours of a service in the manifest's declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

impl Position {
    /// Neighbours of `name` within `order`. Both ends are `None` when the name is absent.
    pub fn within<S: AsRef<str>>(order: &[S], name: &str) -> Self {
        let Some(index) = order.iter().position(|s| s.as_ref() == name) else {
            return Self::default();
        };

        Self {
            after: index
                .checked_sub(1)
                .map(|i| order[i].as_ref().to_string()),
            before: order.get(index + 1).map(|s| s.as_ref().to_string()),
        }
    }

    /// Serialized label value: `{"after":..,"before":..}` with `null` at either end.
    pub fn to_label(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Read a label written by [`Position::to_label`]. Unreadable labels yield no neighbours.
    pub fn from_label(label: Option<&str>) -> Self {
        label
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_service_has_both_neighbours() {
        let order = ["a", "b", "c"];
        assert_eq!(
            Position::within(&order, "b"),
            Position {
                after: Some("a".into()),
                before: Some("c".into())
            }
        );
    }

    #[test]
    fn ends_are_null() {
        let order = ["a", "b", "c"];
        assert_eq!(Position::within(&order, "a").after, None);
        assert_eq!(Position::within(&order, "c").before, None);
        assert_eq!(
            Position::within(&order, "a").to_label(),
            r#"{"after":null,"before":"b"}"#
        );
    }

    #[test]
    fn label_round_trips_and_tolerates_garbage() {
        let pos = Position {
            after: Some("db".into()),
            before: None,
        };
        assert_eq!(Position::from_label(Some(&pos.to_label())), pos);
        assert_eq!(Position::from_label(Some("not json")), Position::default());
        assert_eq!(Position::from_label(None), Position::default());
    }
}
