// ABOUTME: Phantom-typed engine references for containers, networks and images.
// ABOUTME: The engine accepts either an id or a name, so both are carried as the same type.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub enum ContainerMarker {}
pub enum NetworkMarker {}
pub enum ImageMarker {}

/// A reference to an engine object: an engine-assigned id or a resolvable name.
///
/// The marker parameter keeps a container reference from being passed where a
/// network or image is expected.
#[must_use = "references name engine objects and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// First 12 characters of a hex id, as the engine CLI prints them.
    /// Names are returned unchanged.
    pub fn short(&self) -> &str {
        let hex = self.value.strip_prefix("sha256:").unwrap_or(&self.value);
        if hex.len() > 12 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            &hex[..12]
        } else {
            &self.value
        }
    }
}

// T is only a marker, so none of these may require bounds on it.

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

pub type ContainerId = Id<ContainerMarker>;
pub type NetworkId = Id<NetworkMarker>;
pub type ImageId = Id<ImageMarker>;
