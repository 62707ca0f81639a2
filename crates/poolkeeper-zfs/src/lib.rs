#![forbid(unsafe_code)]

//! ZFS provider integration.
//!
//! `system` implements `DatasetProvider` using the host `zfs`/`zpool` CLIs.
//! `command` and `parse` isolate process execution and output parsing so the
//! provider stays testable; `preflight` validates the tooling once at startup.

mod command;
mod parse;
mod preflight;
mod system;

pub use command::{render_command, CommandOutput, CommandRunner, SystemRunner};
pub use preflight::{ensure_initialized, ensure_initialized_with, preflight, ToolVersions};
pub use system::{ZfsTools, Zpool};
