//! Error taxonomy shared by every poolkeeper crate.
//!
//! Validation failures are raised before any subprocess is spawned. Subprocess
//! failures carry the rendered command and the dataset they targeted, but the
//! underlying cause (collision, missing parent, transient tool error) is only
//! visible in the message text.

use std::io;
use thiserror::Error;

pub type PoolkeeperResult<T> = Result<T, PoolkeeperError>;

#[derive(Debug, Error)]
pub enum PoolkeeperError {
    /// Name rejected before reaching the storage tooling.
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("zpool {0:?} doesn't exist")]
    PoolNotFound(String),

    /// The external tool exited non-zero or could not be started.
    #[error("unable to run command {command:?} for {target:?}: {message}")]
    Command {
        command: String,
        target: String,
        message: String,
    },

    /// Single-dataset query failed. Absence and query failure are not distinguished.
    #[error("{kind} {name:?} not found: {reason}")]
    NotFound {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("unable to parse {property} value {value:?}: {reason}")]
    Parse {
        property: &'static str,
        value: String,
        reason: String,
    },

    /// Creation was accepted by the tool but the confirmation fetch failed.
    /// The dataset may or may not exist; callers must reconcile manually.
    #[error("unable to retrieve {kind} {name:?} after creation: {reason}")]
    Unconfirmed {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// Startup validation of the zfs/zpool tooling failed.
    #[error("preflight failed: {0}")]
    Preflight(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl PoolkeeperError {
    /// True for errors raised by local validation, i.e. nothing was executed.
    pub fn is_validation(&self) -> bool {
        matches!(self, PoolkeeperError::InvalidName(_))
    }

    /// True when creation may have happened even though an error was returned.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, PoolkeeperError::Unconfirmed { .. })
    }
}
