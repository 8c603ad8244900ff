// ABOUTME: Sealed trait pattern for engine capability traits.
// ABOUTME: Only in-crate engines (bollard, and the test fake) may implement them.

/// Implemented by every in-crate engine client; private to the crate so the
/// capability traits can grow methods without breaking outside code.
pub trait Sealed {}
