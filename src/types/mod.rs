// ABOUTME: Names, engine references and ordering metadata shared across the crate.
// ABOUTME: Application, service and volume names are validated once, at the edge.

mod id;
mod name;
mod network_alias;
mod position;

pub use id::{ContainerId, ImageId, NetworkId};
pub use name::{AppName, NameError, NameKind, ServiceName, VolumeName, is_valid_name};
pub use network_alias::NetworkAlias;
pub use position::Position;
