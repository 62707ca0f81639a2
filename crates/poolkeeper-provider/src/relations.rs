//! Relationships derived from dataset names and the `origin` property.
//!
//! Nothing here is cached: every derivation is a linear scan over a freshly
//! listed collection, since the authoritative state lives outside the process.

use crate::model::{Filesystem, Filesystems, Snapshot, Snapshots};
use std::collections::HashMap;

/// Datasets that can be ordered by when the pool created them.
trait Created {
    fn createtxg(&self) -> u64;
    fn name(&self) -> &str;
}

impl Created for Filesystem {
    fn createtxg(&self) -> u64 {
        self.createtxg
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Created for Snapshot {
    fn createtxg(&self) -> u64 {
        self.createtxg
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Filesystems whose origin is `snapshot`, oldest first.
pub fn take_clones(filesystems: Filesystems, snapshot: &Snapshot) -> Vec<Filesystem> {
    select(filesystems, |fs| fs.is_clone_of(snapshot))
}

/// Snapshots taken directly of `filesystem`, oldest first.
pub fn take_snapshots(snapshots: Snapshots, filesystem: &Filesystem) -> Vec<Snapshot> {
    select(snapshots, |snap| snap.belongs_to(filesystem))
}

/// Consume a listing, keeping matches in creation order with name as tiebreak.
fn select<T: Created>(listing: HashMap<String, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut kept: Vec<T> = listing.into_values().filter(|item| keep(item)).collect();
    kept.sort_by(|a, b| {
        a.createtxg()
            .cmp(&b.createtxg())
            .then_with(|| a.name().cmp(b.name()))
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(name: &str, origin: &str, createtxg: u64) -> (String, Filesystem) {
        let mut fs = Filesystem::new(name);
        fs.set_origin(origin);
        fs.createtxg = createtxg;
        (name.to_string(), fs)
    }

    fn snap(name: &str, createtxg: u64) -> (String, Snapshot) {
        (
            name.to_string(),
            Snapshot {
                name: name.to_string(),
                guid: format!("guid-{createtxg}"),
                createtxg,
            },
        )
    }

    #[test]
    fn clones_follow_origin_only() {
        let base = snap("tank/base@s1", 10).1;
        let filesystems: Filesystems = [
            fs("tank/base", "-", 5),
            fs("tank/c2", "tank/base@s1", 30),
            fs("tank/c1", "tank/base@s1", 20),
            fs("tank/other", "tank/base@s2", 40),
        ]
        .into_iter()
        .collect();

        let names: Vec<String> = take_clones(filesystems, &base)
            .into_iter()
            .map(|fs| fs.name)
            .collect();
        assert_eq!(names, vec!["tank/c1", "tank/c2"]);
    }

    #[test]
    fn snapshots_exclude_shared_name_prefixes() {
        let target = Filesystem::new("tank/f");
        let snapshots: Snapshots = [
            snap("tank/f@b", 3),
            snap("tank/f@a", 2),
            snap("tank/f2@a", 4),
            snap("tank/f/child@a", 5),
        ]
        .into_iter()
        .collect();

        let names: Vec<String> = take_snapshots(snapshots, &target)
            .into_iter()
            .map(|snap| snap.name)
            .collect();
        assert_eq!(names, vec!["tank/f@a", "tank/f@b"]);
    }

    #[test]
    fn empty_listing_yields_nothing() {
        let base = snap("tank/base@s1", 1).1;
        assert!(take_clones(Filesystems::new(), &base).is_empty());
        assert!(take_snapshots(Snapshots::new(), &Filesystem::new("tank/base")).is_empty());
    }

    #[test]
    fn equal_createtxg_falls_back_to_name() {
        let base = snap("tank/base@s1", 10).1;
        let filesystems: Filesystems = [
            fs("tank/zz", "tank/base@s1", 20),
            fs("tank/aa", "tank/base@s1", 20),
            fs("tank/mm", "tank/base@s1", 15),
        ]
        .into_iter()
        .collect();
        let names: Vec<String> = take_clones(filesystems, &base)
            .into_iter()
            .map(|fs| fs.name)
            .collect();
        assert_eq!(names, vec!["tank/mm", "tank/aa", "tank/zz"]);

        let target = Filesystem::new("tank/f");
        let snapshots: Snapshots = [snap("tank/f@y", 7), snap("tank/f@x", 7)]
            .into_iter()
            .collect();
        let names: Vec<String> = take_snapshots(snapshots, &target)
            .into_iter()
            .map(|snap| snap.name)
            .collect();
        assert_eq!(names, vec!["tank/f@x", "tank/f@y"]);
    }
}
