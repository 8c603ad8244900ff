// ABOUTME: Validated names for applications, services and volumes.
// ABOUTME: All three share the `[a-z0-9-]+` character set; violations are rejected, never renamed.

use super::network_alias::NetworkAlias;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// What a validated name identifies. Used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Application,
    Service,
    Volume,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Application => write!(f, "Application"),
            NameKind::Service => write!(f, "Service"),
            NameKind::Volume => write!(f, "Application volume"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NameError {
    #[error("{0} name cannot be empty")]
    Empty(NameKind),

    #[error("{kind} name \"{value}\" includes invalid characters, only \"[a-z0-9-]\" are allowed")]
    InvalidChars { kind: NameKind, value: String },
}

/// Check a name against `[a-z0-9-]+`.
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate(kind: NameKind, value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty(kind));
    }
    if !is_valid_name(value) {
        return Err(NameError::InvalidChars {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: &str) -> Result<Self, NameError> {
                validate($kind, value)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::new(&value).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_name!(
    /// Name of a registered application.
    AppName,
    NameKind::Application
);

validated_name!(
    /// Name of a service declared in a manifest.
    ServiceName,
    NameKind::Service
);

validated_name!(
    /// Name of an orchestrator-managed volume declared in a manifest.
    VolumeName,
    NameKind::Volume
);

impl ServiceName {
    /// Alias the service answers to on its application network.
    pub fn as_alias(&self) -> NetworkAlias {
        NetworkAlias::from(self)
    }

    /// The engine container name for this service: `<service>.<app>`.
    pub fn container_name(&self, app: &AppName) -> String {
        format!("{}.{}", self.0, app)
    }
}
