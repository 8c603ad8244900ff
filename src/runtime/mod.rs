// ABOUTME: Container engine client layer.
// ABOUTME: Capability traits, the bollard implementation and endpoint selection.

mod bollard;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::EngineEndpoint;
