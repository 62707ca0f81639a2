//! Configuration model and helpers used by poolkeeper binaries.

use crate::error::{PoolkeeperError, PoolkeeperResult};
use log::info;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/poolkeeper.toml";
pub const DEFAULT_ZFS_PATH: &str = "/usr/sbin/zfs";
pub const DEFAULT_ZPOOL_PATH: &str = "/usr/sbin/zpool";
pub const DEFAULT_POOL_NAME: &str = "tank";

const ZFS_PATH_ENV: &str = "POOLKEEPER_ZFS_PATH";
const ZPOOL_PATH_ENV: &str = "POOLKEEPER_ZPOOL_PATH";
const POOL_ENV: &str = "POOLKEEPER_POOL";

pub const KNOWN_ZFS_PATHS: &[&str] = &[
    "/usr/sbin/zfs",
    "/sbin/zfs",
    "/bin/zfs",
    "/usr/local/sbin/zfs",
];
pub const KNOWN_ZPOOL_PATHS: &[&str] = &[
    "/usr/sbin/zpool",
    "/sbin/zpool",
    "/bin/zpool",
    "/usr/local/sbin/zpool",
];

/// Return the first candidate that exists on this host.
pub fn detect_binary_path(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

/// Search `PATH` for `binary`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(binary);
        candidate.is_file().then_some(candidate)
    })
}

fn valid_component(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('-')
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.' | ' '))
}

/// Lightweight sanity check that a provided dataset name matches ZFS filesystem naming.
pub fn looks_like_dataset_name(name: &str) -> bool {
    if name.is_empty() || name.trim() != name {
        return false;
    }
    name.split('/').all(valid_component)
}

/// Same as [`looks_like_dataset_name`] but for `filesystem@suffix` names.
pub fn looks_like_snapshot_name(name: &str) -> bool {
    match name.split_once('@') {
        Some((filesystem, suffix)) => {
            looks_like_dataset_name(filesystem) && valid_component(suffix)
        }
        None => false,
    }
}

/// A pool name is a single dataset component.
pub fn looks_like_pool_name(name: &str) -> bool {
    looks_like_dataset_name(name) && !name.contains('/')
}

/// Which pool the binaries operate on by default.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PoolCfg {
    #[serde(default = "default_pool_name")]
    pub name: String,
}

fn default_pool_name() -> String {
    DEFAULT_POOL_NAME.to_string()
}

impl Default for PoolCfg {
    fn default() -> Self {
        Self {
            name: default_pool_name(),
        }
    }
}

/// Location of the storage tooling and how long to wait on it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ZfsCfg {
    #[serde(default)]
    pub zfs_path: Option<String>,

    #[serde(default)]
    pub zpool_path: Option<String>,

    /// Zero or absent waits on the tool indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolkeeperConfig {
    #[serde(default)]
    pub pool: PoolCfg,

    #[serde(default)]
    pub zfs: ZfsCfg,

    /// File the configuration was read from, or would have been.
    #[serde(skip)]
    pub path: PathBuf,
}

impl PoolkeeperConfig {
    /// Read a config file from disk and detect its format from the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> PoolkeeperResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
        );
        let mut cfg = if is_yaml {
            serde_yaml::from_str::<Self>(&contents)?
        } else {
            toml::from_str::<Self>(&contents)?
        };

        cfg.path = path.to_path_buf();

        let issues = cfg.validate();
        if !issues.is_empty() {
            return Err(PoolkeeperError::InvalidConfig(issues.join("; ")));
        }

        Ok(cfg)
    }

    /// Load `path` when present, otherwise fall back to built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> PoolkeeperResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        info!(
            "configuration missing at {}; using built-in defaults",
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            ..Self::default()
        })
    }

    /// Perform a best-effort validation pass and return human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let pool = self.pool.name.trim();
        if pool.is_empty() {
            issues.push("pool.name must not be empty".to_string());
        } else if !looks_like_pool_name(pool) {
            issues.push(format!("pool.name is not a valid pool name: {pool}"));
        }

        for (key, value) in [
            ("zfs.zfs_path", &self.zfs.zfs_path),
            ("zfs.zpool_path", &self.zfs.zpool_path),
        ] {
            if let Some(path) = value {
                if path.trim().is_empty() {
                    issues.push(format!("{key} must not be empty when set"));
                }
            }
        }

        issues
    }

    /// Pool name, honouring the `POOLKEEPER_POOL` override.
    pub fn pool_name(&self) -> String {
        env_override(POOL_ENV).unwrap_or_else(|| self.pool.name.trim().to_string())
    }

    /// Optional override for the `zfs` CLI path.
    pub fn zfs_binary_path(&self) -> Option<PathBuf> {
        env_override(ZFS_PATH_ENV)
            .or_else(|| configured(&self.zfs.zfs_path))
            .map(PathBuf::from)
    }

    /// Optional override for the `zpool` CLI path.
    pub fn zpool_binary_path(&self) -> Option<PathBuf> {
        env_override(ZPOOL_PATH_ENV)
            .or_else(|| configured(&self.zfs.zpool_path))
            .map(PathBuf::from)
    }

    /// Translate the stored timeout into a `Duration`; `None` means wait forever.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.zfs
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn configured(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
