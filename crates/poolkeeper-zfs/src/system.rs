//! System-backed `DatasetProvider` implementation.
//!
//! Every operation spawns one `zfs`/`zpool` subprocess, waits for it, and
//! parses the complete output. Nothing is cached between calls.

use crate::command::{render_command, CommandOutput, CommandRunner, SystemRunner};
use crate::parse::{parse_dataset_record, parse_dataset_table, parse_value_lines, PropertyRecord};
use log::{debug, info, warn};
use poolkeeper_core::config::{
    detect_binary_path, find_in_path, looks_like_dataset_name, looks_like_pool_name,
    looks_like_snapshot_name, PoolkeeperConfig, DEFAULT_ZFS_PATH, DEFAULT_ZPOOL_PATH,
    KNOWN_ZFS_PATHS, KNOWN_ZPOOL_PATHS,
};
use poolkeeper_core::error::{PoolkeeperError, PoolkeeperResult};
use poolkeeper_provider::{
    split_snapshot_name, DatasetProvider, Filesystem, Filesystems, Snapshot, Snapshots,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const FILESYSTEM_LIST_PROPERTIES: &str = "origin,guid,createtxg";
const FILESYSTEM_GET_PROPERTIES: &str = "name,guid,createtxg,origin";
const SNAPSHOT_LIST_PROPERTIES: &str = "guid,createtxg";
const SNAPSHOT_GET_PROPERTIES: &str = "name,guid,createtxg";

/// Resolved locations of the `zfs` and `zpool` binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZfsTools {
    pub zfs: PathBuf,
    pub zpool: PathBuf,
}

impl Default for ZfsTools {
    fn default() -> Self {
        Self::new(DEFAULT_ZFS_PATH, DEFAULT_ZPOOL_PATH)
    }
}

impl ZfsTools {
    pub fn new(zfs: impl Into<PathBuf>, zpool: impl Into<PathBuf>) -> Self {
        Self {
            zfs: zfs.into(),
            zpool: zpool.into(),
        }
    }

    /// Resolve binaries from configuration, known install paths, then `PATH`.
    pub fn from_config(config: &PoolkeeperConfig) -> PoolkeeperResult<Self> {
        Ok(Self {
            zfs: resolve_binary(config.zfs_binary_path(), KNOWN_ZFS_PATHS, "zfs")?,
            zpool: resolve_binary(config.zpool_binary_path(), KNOWN_ZPOOL_PATHS, "zpool")?,
        })
    }
}

fn resolve_binary(
    configured: Option<PathBuf>,
    candidates: &[&str],
    name: &str,
) -> PoolkeeperResult<PathBuf> {
    if let Some(path) = configured {
        if !path.exists() {
            return Err(PoolkeeperError::InvalidConfig(format!(
                "{name} binary not found at {}",
                path.display()
            )));
        }
        return Ok(path);
    }

    detect_binary_path(candidates)
        .or_else(|| find_in_path(name))
        .ok_or_else(|| {
            PoolkeeperError::InvalidConfig(format!(
                "unable to locate {name} binary; tried {candidates:?} and PATH"
            ))
        })
}

/// Handle on one storage pool.
///
/// Construction queries the live system, so holding a `Zpool` means the pool
/// existed at the time it was opened.
#[derive(Debug, Clone)]
pub struct Zpool<R = SystemRunner> {
    name: String,
    tools: ZfsTools,
    runner: R,
}

impl Zpool<SystemRunner> {
    /// Open `name` using real subprocesses. `None` waits on each tool indefinitely.
    pub fn system(
        tools: ZfsTools,
        timeout: Option<Duration>,
        name: &str,
    ) -> PoolkeeperResult<Self> {
        Self::open(tools, SystemRunner::new(timeout), name)
    }

    /// Open the configured pool with configured binaries and timeout.
    pub fn from_config(config: &PoolkeeperConfig) -> PoolkeeperResult<Self> {
        let tools = ZfsTools::from_config(config)?;
        Self::system(tools, config.command_timeout(), &config.pool_name())
    }
}

impl<R: CommandRunner> Zpool<R> {
    /// Open `name`, failing unless `zpool` currently reports it.
    pub fn open(tools: ZfsTools, runner: R, name: &str) -> PoolkeeperResult<Self> {
        if !looks_like_pool_name(name) {
            return Err(PoolkeeperError::PoolNotFound(name.to_string()));
        }

        let args = ["get", "-H", "-o", "value", "name", name];
        debug!("probing pool: {}", render_command(&tools.zpool, &args));
        match runner.run(&tools.zpool, &args) {
            Ok(out) if out.success() => Ok(Self {
                name: name.to_string(),
                tools,
                runner,
            }),
            Ok(out) => {
                debug!("zpool {name} lookup failed: {}", out.diagnostic());
                Err(PoolkeeperError::PoolNotFound(name.to_string()))
            }
            Err(err) => {
                debug!("zpool {name} lookup failed: {err}");
                Err(PoolkeeperError::PoolNotFound(name.to_string()))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ZfsTools {
        &self.tools
    }

    /// The pool's root dataset, any descendant, or any snapshot of either.
    fn belongs_to_pool(&self, name: &str) -> bool {
        name == self.name
            || name
                .strip_prefix(self.name.as_str())
                .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('@'))
    }

    /// Strictly below the pool root.
    fn within_pool(&self, name: &str) -> bool {
        name.strip_prefix(self.name.as_str())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'))
    }

    fn zfs(&self, args: &[&str]) -> PoolkeeperResult<CommandOutput> {
        debug!("running {}", render_command(&self.tools.zfs, args));
        self.runner.run(&self.tools.zfs, args)
    }

    /// Run `zfs`, mapping spawn errors and non-zero exits to `Command`.
    fn zfs_checked(&self, args: &[&str], target: &str) -> PoolkeeperResult<String> {
        let command = render_command(&self.tools.zfs, args);
        let out = self.zfs(args).map_err(|err| PoolkeeperError::Command {
            command: command.clone(),
            target: target.to_string(),
            message: err.to_string(),
        })?;
        if !out.success() {
            return Err(PoolkeeperError::Command {
                command,
                target: target.to_string(),
                message: out.diagnostic(),
            });
        }
        Ok(out.stdout)
    }

    fn list<T: PropertyRecord>(
        &self,
        properties: &str,
    ) -> PoolkeeperResult<HashMap<String, T>> {
        let args = [
            "get",
            "-t",
            T::KIND,
            "-Hro",
            "name,property,value",
            properties,
            self.name.as_str(),
        ];
        let stdout = self.zfs_checked(&args, &self.name)?;
        parse_dataset_table::<T>(&stdout)
    }

    fn get<T: PropertyRecord>(&self, name: &str, properties: &str) -> PoolkeeperResult<T> {
        if !self.belongs_to_pool(name) {
            return Err(PoolkeeperError::InvalidName(format!(
                "bad request for {} {name:?} on zpool {:?}",
                T::KIND,
                self.name
            )));
        }

        let args = ["get", "-t", T::KIND, "-Ho", "property,value", properties, name];
        let not_found = |reason: String| PoolkeeperError::NotFound {
            kind: T::KIND,
            name: name.to_string(),
            reason,
        };
        let out = self.zfs(&args).map_err(|err| not_found(err.to_string()))?;
        if !out.success() {
            return Err(not_found(out.diagnostic()));
        }

        let record = parse_dataset_record::<T>(&out.stdout)?;
        if record.name().is_empty() {
            return Err(not_found("no properties reported".to_string()));
        }
        Ok(record)
    }

    fn validate_filesystem_request(&self, requested: &Filesystem) -> PoolkeeperResult<()> {
        let name = requested.name.as_str();
        let reject = |reason: &str| {
            Err(PoolkeeperError::InvalidName(format!(
                "filesystem {name:?} cannot be created on zpool {:?}: {reason}",
                self.name
            )))
        };

        if name.is_empty() {
            return reject("name is empty");
        }
        if !self.within_pool(name) {
            return reject("name must start with the pool name followed by '/'");
        }
        if name.contains('@') {
            return reject("filesystem names cannot contain '@'");
        }
        if !looks_like_dataset_name(name) {
            return reject("malformed dataset name component");
        }
        if let Some(origin) = requested.origin() {
            if !looks_like_snapshot_name(origin) {
                return reject("origin must be a well-formed filesystem@suffix snapshot name");
            }
        }
        if requested.createtxg != 0 {
            return reject("createtxg is assigned by the system and must be 0");
        }
        Ok(())
    }

    fn validate_snapshot_request(&self, name: &str) -> PoolkeeperResult<()> {
        let reject = |reason: &str| {
            Err(PoolkeeperError::InvalidName(format!(
                "snapshot {name:?} cannot be created on zpool {:?}: {reason}",
                self.name
            )))
        };

        if name.is_empty() {
            return reject("name is empty");
        }
        if !self.within_pool(name) {
            return reject("name must start with the pool name followed by '/'");
        }
        match split_snapshot_name(name) {
            (filesystem, Some(suffix)) if !filesystem.is_empty() && !suffix.is_empty() => {}
            _ => return reject("name must have the form filesystem@suffix"),
        }
        if !looks_like_snapshot_name(name) {
            return reject("malformed filesystem or suffix component");
        }
        Ok(())
    }
}

impl<R: CommandRunner> DatasetProvider for Zpool<R> {
    type Error = PoolkeeperError;

    fn pool_name(&self) -> &str {
        &self.name
    }

    fn list_filesystems(&self) -> PoolkeeperResult<Filesystems> {
        self.list::<Filesystem>(FILESYSTEM_LIST_PROPERTIES)
    }

    fn list_snapshots(&self) -> PoolkeeperResult<Snapshots> {
        self.list::<Snapshot>(SNAPSHOT_LIST_PROPERTIES)
    }

    fn get_filesystem(&self, name: &str) -> PoolkeeperResult<Filesystem> {
        self.get::<Filesystem>(name, FILESYSTEM_GET_PROPERTIES)
    }

    fn get_snapshot(&self, name: &str) -> PoolkeeperResult<Snapshot> {
        self.get::<Snapshot>(name, SNAPSHOT_GET_PROPERTIES)
    }

    fn create_filesystem(&self, requested: &Filesystem) -> PoolkeeperResult<Filesystem> {
        self.validate_filesystem_request(requested)?;
        let name = requested.name.as_str();

        // Known failure causes (name taken, missing parent, tool error) are
        // only distinguishable through the wrapped message.
        match requested.origin() {
            Some(origin) => self.zfs_checked(&["clone", origin, name], name)?,
            None => self.zfs_checked(&["create", name], name)?,
        };
        info!("created filesystem {name}");

        self.get_filesystem(name).map_err(|err| {
            warn!("filesystem {name} was created but could not be read back: {err}");
            PoolkeeperError::Unconfirmed {
                kind: "filesystem",
                name: name.to_string(),
                reason: err.to_string(),
            }
        })
    }

    fn create_snapshot(&self, name: &str) -> PoolkeeperResult<Snapshot> {
        self.validate_snapshot_request(name)?;

        self.zfs_checked(&["snapshot", name], name)?;
        info!("created snapshot {name}");

        self.get_snapshot(name).map_err(|err| {
            warn!("snapshot {name} was created but could not be read back: {err}");
            PoolkeeperError::Unconfirmed {
                kind: "snapshot",
                name: name.to_string(),
                reason: err.to_string(),
            }
        })
    }

    fn exists_by_name(&self, name: &str) -> bool {
        if name.is_empty() || !self.belongs_to_pool(name) {
            return false;
        }
        matches!(
            self.zfs(&["get", "-H", "-o", "value", "name", name]),
            Ok(out) if out.success()
        )
    }

    fn exists_by_guid(&self, guid: &str) -> bool {
        if guid.is_empty() {
            return false;
        }
        match self.zfs(&["get", "-r", "-Ho", "value", "guid", self.name.as_str()]) {
            Ok(out) if out.success() => parse_value_lines(&out.stdout).any(|value| value == guid),
            _ => false,
        }
    }
}
