#![forbid(unsafe_code)]

//! Dataset contracts shared across poolkeeper.
//!
//! The entity model and relationship derivations live here so callers can
//! program against [`DatasetProvider`] without depending on how a concrete
//! implementation reaches the storage system.

pub mod model;
pub mod relations;

use std::error::Error;

pub use model::{
    split_snapshot_name, Filesystem, Filesystems, Snapshot, Snapshots, NO_ORIGIN,
    SNAPSHOT_SEPARATOR,
};
pub use relations::{take_clones, take_snapshots};

/// Inventory and provisioning surface over one storage pool.
///
/// Every call is a fresh round trip to the storage system; implementations
/// must not cache results between calls.
pub trait DatasetProvider {
    type Error: Error + Send + Sync + 'static;

    /// Name of the pool this provider is bound to.
    fn pool_name(&self) -> &str;

    /// Every filesystem in the pool, including the pool's root filesystem.
    fn list_filesystems(&self) -> Result<Filesystems, Self::Error>;

    /// Every snapshot in the pool.
    fn list_snapshots(&self) -> Result<Snapshots, Self::Error>;

    /// Fetch one filesystem. Absence and query failure are reported alike.
    fn get_filesystem(&self, name: &str) -> Result<Filesystem, Self::Error>;

    /// Fetch one snapshot. Absence and query failure are reported alike.
    fn get_snapshot(&self, name: &str) -> Result<Snapshot, Self::Error>;

    /// Create `requested` (cloning when it carries an origin) and return the
    /// record as read back from the system.
    fn create_filesystem(&self, requested: &Filesystem) -> Result<Filesystem, Self::Error>;

    /// Create the `filesystem@suffix` snapshot and return it as read back.
    fn create_snapshot(&self, name: &str) -> Result<Snapshot, Self::Error>;

    /// Existence predicate; any failure collapses to `false`.
    fn exists_by_name(&self, name: &str) -> bool;

    /// True when some dataset in the pool carries `guid`.
    fn exists_by_guid(&self, guid: &str) -> bool;

    /// Filesystems cloned from `snapshot`, oldest first.
    fn clones_of(&self, snapshot: &Snapshot) -> Result<Vec<Filesystem>, Self::Error> {
        Ok(take_clones(self.list_filesystems()?, snapshot))
    }

    /// Snapshots of exactly `filesystem` (not of its descendants), oldest first.
    fn snapshots_of(&self, filesystem: &Filesystem) -> Result<Vec<Snapshot>, Self::Error> {
        Ok(take_snapshots(self.list_snapshots()?, filesystem))
    }

    /// The snapshot `filesystem` was cloned from, if it is a clone.
    fn origin_of(&self, filesystem: &Filesystem) -> Result<Option<Snapshot>, Self::Error> {
        match filesystem.origin() {
            Some(origin) => self.get_snapshot(origin).map(Some),
            None => Ok(None),
        }
    }
}
