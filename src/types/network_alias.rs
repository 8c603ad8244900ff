// ABOUTME: DNS alias a container answers to on its application network.
// ABOUTME: Always derived from a service name, so it needs no validation of its own.

use super::name::ServiceName;
use std::fmt;

/// The short name siblings use to reach a service, e.g. `db` for `db.shop`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAlias(String);

impl NetworkAlias {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ServiceName> for NetworkAlias {
    fn from(service: &ServiceName) -> Self {
        Self(service.as_str().to_string())
    }
}

impl fmt::Display for NetworkAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
