//! Poolkeeper command-line interface for inspecting and provisioning datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error};
use poolkeeper_core::config::{PoolkeeperConfig, DEFAULT_CONFIG_PATH};
use poolkeeper_core::error::PoolkeeperResult;
use poolkeeper_core::logging;
use poolkeeper_provider::{DatasetProvider, Filesystem, Snapshot};
use poolkeeper_zfs::{ensure_initialized_with, SystemRunner, ToolVersions, ZfsTools, Zpool};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "poolkeeper",
    version,
    about = "Inventory and provisioning for ZFS filesystems, snapshots, and clones."
)]
struct Cli {
    /// Path to the poolkeeper configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pool to operate on; overrides the configured pool.
    #[arg(short, long)]
    pool: Option<String>,

    /// Emit JSON instead of tab-separated text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the zfs/zpool tooling and confirm the pool is present.
    Check,

    /// List every filesystem in the pool.
    Filesystems,

    /// List every snapshot in the pool.
    Snapshots,

    /// Show one filesystem.
    GetFilesystem { name: String },

    /// Show one snapshot.
    GetSnapshot { name: String },

    /// Create a filesystem, or clone one from a snapshot with --origin.
    CreateFilesystem {
        name: String,

        /// Snapshot to clone from.
        #[arg(long)]
        origin: Option<String>,
    },

    /// Create a `filesystem@suffix` snapshot.
    Snapshot { name: String },

    /// List filesystems cloned from a snapshot.
    Clones { snapshot: String },

    /// List snapshots taken of exactly one filesystem.
    SnapshotsOf { filesystem: String },

    /// Report whether a dataset with this name exists.
    Exists { name: String },

    /// Report whether any dataset in the pool carries this GUID.
    ExistsGuid { guid: String },
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn load_cli_config(path: &Path) -> Result<PoolkeeperConfig> {
    PoolkeeperConfig::load_or_default(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Build the configured runner and validate the tooling through it.
fn startup(
    config: &PoolkeeperConfig,
    tools: &ZfsTools,
) -> PoolkeeperResult<(SystemRunner, &'static ToolVersions)> {
    let runner = SystemRunner::new(config.command_timeout());
    let versions = ensure_initialized_with(tools, &runner)?;
    Ok((runner, versions))
}

fn run() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let config = load_cli_config(&cli.config)?;
    debug!("configuration: {}", config.path.display());
    let tools = ZfsTools::from_config(&config).context("failed to locate zfs tooling")?;

    // The engine never exits on its own; a broken toolchain is fatal only here.
    let (runner, versions) = match startup(&config, &tools) {
        Ok(started) => started,
        Err(err) => {
            error!("startup validation failed: {err}");
            eprintln!("error: startup validation failed: {err}");
            std::process::exit(1);
        }
    };

    let pool_name = cli.pool.clone().unwrap_or_else(|| config.pool_name());
    let pool = Zpool::open(tools, runner, &pool_name)
        .with_context(|| format!("unable to open zpool {pool_name}"))?;

    let json = cli.json;
    match cli.command {
        Commands::Check => {
            if json {
                print_json(&serde_json::json!({
                    "pool": pool.name(),
                    "zfs": versions.zfs,
                    "zpool": versions.zpool,
                }))?;
            } else {
                println!("pool\t{}", pool.name());
                println!("zfs\t{}", versions.zfs);
                println!("zpool\t{}", versions.zpool);
            }
        }
        Commands::Filesystems => {
            let mut filesystems: Vec<Filesystem> =
                pool.list_filesystems()?.into_values().collect();
            filesystems.sort_by(|a, b| a.name.cmp(&b.name));
            print_filesystems(&filesystems, json)?;
        }
        Commands::Snapshots => {
            let mut snapshots: Vec<Snapshot> = pool.list_snapshots()?.into_values().collect();
            snapshots.sort_by(|a, b| a.name.cmp(&b.name));
            print_snapshots(&snapshots, json)?;
        }
        Commands::GetFilesystem { name } => {
            let fs = pool.get_filesystem(&name)?;
            print_filesystems(std::slice::from_ref(&fs), json)?;
        }
        Commands::GetSnapshot { name } => {
            let snap = pool.get_snapshot(&name)?;
            print_snapshots(std::slice::from_ref(&snap), json)?;
        }
        Commands::CreateFilesystem { name, origin } => {
            let requested = match origin {
                Some(origin) => Filesystem::clone_of(name, origin),
                None => Filesystem::new(name),
            };
            let created = pool
                .create_filesystem(&requested)
                .with_context(|| format!("failed to create {}", requested.name))?;
            print_filesystems(std::slice::from_ref(&created), json)?;
        }
        Commands::Snapshot { name } => {
            let created = pool
                .create_snapshot(&name)
                .with_context(|| format!("failed to snapshot {name}"))?;
            print_snapshots(std::slice::from_ref(&created), json)?;
        }
        Commands::Clones { snapshot } => {
            let snap = pool.get_snapshot(&snapshot)?;
            print_filesystems(&pool.clones_of(&snap)?, json)?;
        }
        Commands::SnapshotsOf { filesystem } => {
            let fs = pool.get_filesystem(&filesystem)?;
            print_snapshots(&pool.snapshots_of(&fs)?, json)?;
        }
        Commands::Exists { name } => print_flag(pool.exists_by_name(&name), json)?,
        Commands::ExistsGuid { guid } => print_flag(pool.exists_by_guid(&guid), json)?,
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_filesystems(filesystems: &[Filesystem], json: bool) -> Result<()> {
    if json {
        return print_json(filesystems);
    }
    for fs in filesystems {
        println!("{}", filesystem_row(fs));
    }
    Ok(())
}

fn print_snapshots(snapshots: &[Snapshot], json: bool) -> Result<()> {
    if json {
        return print_json(snapshots);
    }
    for snap in snapshots {
        println!("{}", snapshot_row(snap));
    }
    Ok(())
}

fn print_flag(flag: bool, json: bool) -> Result<()> {
    if json {
        return print_json(&flag);
    }
    println!("{flag}");
    Ok(())
}

fn filesystem_row(fs: &Filesystem) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        fs.name,
        fs.guid,
        fs.createtxg,
        fs.origin().unwrap_or(poolkeeper_provider::NO_ORIGIN)
    )
}

fn snapshot_row(snap: &Snapshot) -> String {
    format!("{}\t{}\t{}", snap.name, snap.guid, snap.createtxg)
}
