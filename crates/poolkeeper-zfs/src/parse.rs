//! Parsers for `zfs get -H` output.
//!
//! Each line is `name<TAB>property<TAB>value` (multi-dataset form) or
//! `property<TAB>value` (single-dataset form). Properties are routed through a
//! static table of setters; anything not in the table is ignored so newer
//! tooling can report extra properties without breaking us.

use poolkeeper_core::error::{PoolkeeperError, PoolkeeperResult};
use poolkeeper_provider::{Filesystem, Snapshot};
use std::collections::HashMap;

type Setter<T> = fn(&mut T, &str) -> PoolkeeperResult<()>;

/// A record that can be assembled field-by-field from property lines.
pub(crate) trait PropertyRecord: Sized + 'static {
    /// Human-readable dataset kind, also the `-t` argument for `zfs get`.
    const KIND: &'static str;
    /// Property to setter routing.
    const PROPERTIES: &'static [(&'static str, Setter<Self>)];

    fn named(name: &str) -> Self;

    fn name(&self) -> &str;
}

impl PropertyRecord for Filesystem {
    const KIND: &'static str = "filesystem";
    const PROPERTIES: &'static [(&'static str, Setter<Self>)] = &[
        ("name", set_filesystem_name),
        ("guid", set_filesystem_guid),
        ("origin", set_filesystem_origin),
        ("createtxg", set_filesystem_createtxg),
    ];

    fn named(name: &str) -> Self {
        Filesystem::new(name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PropertyRecord for Snapshot {
    const KIND: &'static str = "snapshot";
    const PROPERTIES: &'static [(&'static str, Setter<Self>)] = &[
        ("name", set_snapshot_name),
        ("guid", set_snapshot_guid),
        ("createtxg", set_snapshot_createtxg),
    ];

    fn named(name: &str) -> Self {
        Snapshot {
            name: name.to_string(),
            ..Snapshot::default()
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn set_filesystem_name(fs: &mut Filesystem, value: &str) -> PoolkeeperResult<()> {
    fs.name = value.to_string();
    Ok(())
}

fn set_filesystem_guid(fs: &mut Filesystem, value: &str) -> PoolkeeperResult<()> {
    fs.guid = value.to_string();
    Ok(())
}

fn set_filesystem_origin(fs: &mut Filesystem, value: &str) -> PoolkeeperResult<()> {
    fs.set_origin(value);
    Ok(())
}

fn set_filesystem_createtxg(fs: &mut Filesystem, value: &str) -> PoolkeeperResult<()> {
    fs.createtxg = parse_createtxg(value)?;
    Ok(())
}

fn set_snapshot_name(snap: &mut Snapshot, value: &str) -> PoolkeeperResult<()> {
    snap.name = value.to_string();
    Ok(())
}

fn set_snapshot_guid(snap: &mut Snapshot, value: &str) -> PoolkeeperResult<()> {
    snap.guid = value.to_string();
    Ok(())
}

fn set_snapshot_createtxg(snap: &mut Snapshot, value: &str) -> PoolkeeperResult<()> {
    snap.createtxg = parse_createtxg(value)?;
    Ok(())
}

fn parse_createtxg(value: &str) -> PoolkeeperResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| PoolkeeperError::Parse {
            property: "createtxg",
            value: value.to_string(),
            reason: err.to_string(),
        })
}

fn apply<T: PropertyRecord>(record: &mut T, property: &str, value: &str) -> PoolkeeperResult<()> {
    match T::PROPERTIES.iter().find(|(name, _)| *name == property) {
        Some((_, setter)) => setter(record, value),
        None => Ok(()),
    }
}

fn content_lines(stdout: &str) -> impl Iterator<Item = &str> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}

/// Parse `name<TAB>property<TAB>value` lines into records keyed by dataset name.
///
/// The first line for a name creates its record; later lines fill in fields.
pub(crate) fn parse_dataset_table<T: PropertyRecord>(
    stdout: &str,
) -> PoolkeeperResult<HashMap<String, T>> {
    let mut records: HashMap<String, T> = HashMap::new();
    for line in content_lines(stdout) {
        let mut columns = line.splitn(3, '\t');
        let (Some(name), Some(property), Some(value)) =
            (columns.next(), columns.next(), columns.next())
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let record = records
            .entry(name.to_string())
            .or_insert_with(|| T::named(name));
        apply(record, property, value)?;
    }
    Ok(records)
}

/// Parse `property<TAB>value` lines describing a single dataset.
pub(crate) fn parse_dataset_record<T: PropertyRecord>(stdout: &str) -> PoolkeeperResult<T> {
    let mut record = T::named("");
    for line in content_lines(stdout) {
        let Some((property, value)) = line.split_once('\t') else {
            continue;
        };
        apply(&mut record, property, value)?;
    }
    Ok(record)
}

/// Single-column `-o value` output.
pub(crate) fn parse_value_lines(stdout: &str) -> impl Iterator<Item = &str> {
    content_lines(stdout)
}
