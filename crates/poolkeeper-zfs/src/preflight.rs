//! One-time validation that the `zfs`/`zpool` tooling is installed and answers.
//!
//! The engine only returns errors here; deciding that a failure is fatal is
//! left to the binary that calls [`ensure_initialized`].

use crate::command::{render_command, CommandRunner, SystemRunner};
use crate::system::ZfsTools;
use log::{error, info, warn};
use poolkeeper_core::error::{PoolkeeperError, PoolkeeperResult};
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

/// First line each tool printed for `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersions {
    pub zfs: String,
    pub zpool: String,
}

static INITIALIZED: OnceLock<ToolVersions> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Check both binaries exist and exit successfully for `version`.
pub fn preflight<R: CommandRunner + ?Sized>(
    tools: &ZfsTools,
    runner: &R,
) -> PoolkeeperResult<ToolVersions> {
    Ok(ToolVersions {
        zfs: check_tool(&tools.zfs, runner)?,
        zpool: check_tool(&tools.zpool, runner)?,
    })
}

/// Run [`preflight`] with real subprocesses once per process.
///
/// Later calls return the cached versions. A failed attempt is not cached,
/// so a caller may retry after fixing the host.
pub fn ensure_initialized(tools: &ZfsTools) -> PoolkeeperResult<&'static ToolVersions> {
    ensure_initialized_with(tools, &SystemRunner::default())
}

/// [`ensure_initialized`] with an explicit runner.
pub fn ensure_initialized_with<R: CommandRunner + ?Sized>(
    tools: &ZfsTools,
    runner: &R,
) -> PoolkeeperResult<&'static ToolVersions> {
    if let Some(versions) = INITIALIZED.get() {
        return Ok(versions);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(versions) = INITIALIZED.get() {
        return Ok(versions);
    }

    let versions = preflight(tools, runner)?;
    Ok(INITIALIZED.get_or_init(|| versions))
}

fn check_tool<R: CommandRunner + ?Sized>(binary: &Path, runner: &R) -> PoolkeeperResult<String> {
    if !binary.is_file() {
        error!("{} not found", binary.display());
        return Err(PoolkeeperError::Preflight(format!(
            "{} not found",
            binary.display()
        )));
    }

    let args = ["version"];
    let command = render_command(binary, &args);
    let out = runner
        .run(binary, &args)
        .map_err(|err| PoolkeeperError::Preflight(format!("unable to run {command}: {err}")))?;

    for line in out.stdout.lines() {
        info!("{command} out: {line}");
    }
    for line in out.stderr.lines() {
        warn!("{command} err: {line}");
    }

    if !out.success() {
        return Err(PoolkeeperError::Preflight(format!(
            "{command} exited with code {}: {}",
            out.status,
            out.diagnostic()
        )));
    }

    Ok(out
        .stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string())
}
