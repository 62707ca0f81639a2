//! Typed records for datasets reported by the storage tooling.
//!
//! Records are only authoritative once they have been read back from the live
//! system. Relationships between them are derived from names and the `origin`
//! property, never stored as references.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Separator between a snapshot's filesystem and its suffix.
pub const SNAPSHOT_SEPARATOR: char = '@';

/// Value the tooling reports for an unset `origin`.
pub const NO_ORIGIN: &str = "-";

/// Filesystems keyed by full dataset name.
pub type Filesystems = HashMap<String, Filesystem>;

/// Snapshots keyed by full `filesystem@suffix` name.
pub type Snapshots = HashMap<String, Snapshot>;

/// Mutable, mountable dataset within a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filesystem {
    pub name: String,
    pub guid: String,
    /// Snapshot this filesystem was cloned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Server-assigned creation transaction group. Zero on unsent requests.
    pub createtxg: u64,
}

impl Filesystem {
    /// Request for a plain filesystem.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Request for a copy-on-write clone of `origin`.
    pub fn clone_of(name: impl Into<String>, origin: impl Into<String>) -> Self {
        let mut requested = Self::new(name);
        requested.set_origin(origin);
        requested
    }

    /// Store an origin as reported by the tooling, treating `-` and empty as unset.
    pub fn set_origin(&mut self, origin: impl Into<String>) {
        let origin = origin.into();
        self.origin = if origin.is_empty() || origin == NO_ORIGIN {
            None
        } else {
            Some(origin)
        };
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn is_clone(&self) -> bool {
        self.origin.is_some()
    }

    pub fn is_clone_of(&self, snapshot: &Snapshot) -> bool {
        self.origin() == Some(snapshot.name.as_str())
    }
}

/// Immutable point-in-time view of a filesystem, named `filesystem@suffix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub guid: String,
    pub createtxg: u64,
}

impl Snapshot {
    /// Name of the owning filesystem (everything before the first `@`).
    pub fn filesystem_name(&self) -> &str {
        split_snapshot_name(&self.name).0
    }

    /// Suffix after the first `@`, if any.
    pub fn short_name(&self) -> Option<&str> {
        split_snapshot_name(&self.name).1
    }

    pub fn belongs_to(&self, filesystem: &Filesystem) -> bool {
        self.filesystem_name() == filesystem.name
    }
}

/// Split `filesystem@suffix` at the first `@`.
pub fn split_snapshot_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once(SNAPSHOT_SEPARATOR) {
        Some((filesystem, suffix)) => (filesystem, Some(suffix)),
        None => (name, None),
    }
}
