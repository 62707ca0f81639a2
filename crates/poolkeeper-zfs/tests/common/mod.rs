//! In-memory stand-in for the `zfs`/`zpool` binaries.
//!
//! Understands exactly the argument shapes the engine issues and answers with
//! the same tab-separated layout the real tools print.

#![allow(dead_code)]

use poolkeeper_core::error::PoolkeeperResult;
use poolkeeper_zfs::{CommandOutput, CommandRunner};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Filesystem,
    Snapshot,
}

impl Kind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "filesystem" => Some(Kind::Filesystem),
            "snapshot" => Some(Kind::Snapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Dataset {
    kind: Kind,
    guid: String,
    createtxg: u64,
    origin: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    pools: Vec<String>,
    datasets: BTreeMap<String, Dataset>,
    txg: u64,
    calls: Vec<String>,
    hide_new: bool,
    hidden: HashSet<String>,
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        stdout,
        stderr: String::new(),
        status: 0,
    }
}

fn fail(status: i32, stderr: String) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: format!("{stderr}\n"),
        status,
    }
}

fn in_pool(name: &str, pool: &str) -> bool {
    name == pool
        || name
            .strip_prefix(pool)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('@'))
}

impl State {
    fn insert(&mut self, name: &str, kind: Kind, origin: Option<String>) {
        self.txg += 1;
        let dataset = Dataset {
            kind,
            guid: (10_000_000_000u64 + self.txg * 7_919).to_string(),
            createtxg: self.txg,
            origin,
        };
        self.datasets.insert(name.to_string(), dataset);
        if self.hide_new {
            self.hidden.insert(name.to_string());
        }
    }

    fn property(name: &str, dataset: &Dataset, property: &str) -> Option<String> {
        match property {
            "name" => Some(name.to_string()),
            "guid" => Some(dataset.guid.clone()),
            "createtxg" => Some(dataset.createtxg.to_string()),
            "origin" => Some(dataset.origin.clone().unwrap_or_else(|| "-".to_string())),
            _ => None,
        }
    }

    fn zpool(&self, args: &[&str]) -> CommandOutput {
        match args {
            ["get", "-H", "-o", "value", "name", pool] => {
                if self.pools.iter().any(|known| known == pool) {
                    ok(format!("{pool}\n"))
                } else {
                    fail(1, format!("cannot open '{pool}': no such pool"))
                }
            }
            _ => fail(2, format!("unrecognized command '{}'", args.join(" "))),
        }
    }

    fn zfs(&mut self, args: &[&str]) -> CommandOutput {
        match args {
            ["get", "-t", kind, "-Hro", "name,property,value", properties, pool] => {
                self.list(kind, properties, pool)
            }
            ["get", "-t", kind, "-Ho", "property,value", properties, name] => {
                self.get(kind, properties, name)
            }
            ["get", "-H", "-o", "value", "name", name] => {
                if self.datasets.contains_key(*name) {
                    ok(format!("{name}\n"))
                } else {
                    fail(1, format!("cannot open '{name}': dataset does not exist"))
                }
            }
            ["get", "-r", "-Ho", "value", "guid", pool] => {
                let mut stdout = String::new();
                for (name, dataset) in &self.datasets {
                    if in_pool(name, pool) {
                        stdout.push_str(&dataset.guid);
                        stdout.push('\n');
                    }
                }
                ok(stdout)
            }
            ["create", name] => self.create(name, None),
            ["clone", origin, name] => {
                match self.datasets.get(*origin) {
                    Some(dataset) if dataset.kind == Kind::Snapshot => {}
                    _ => return fail(1, format!("cannot open '{origin}': dataset does not exist")),
                }
                self.create(name, Some(origin.to_string()))
            }
            ["snapshot", name] => self.snapshot(name),
            _ => fail(2, format!("unrecognized command '{}'", args.join(" "))),
        }
    }

    fn list(&self, kind: &str, properties: &str, pool: &str) -> CommandOutput {
        let Some(kind) = Kind::parse(kind) else {
            return fail(2, format!("invalid type '{kind}'"));
        };
        if !self.pools.iter().any(|known| known == pool) {
            return fail(1, format!("cannot open '{pool}': dataset does not exist"));
        }

        let mut stdout = String::new();
        for (name, dataset) in &self.datasets {
            if dataset.kind != kind || !in_pool(name, pool) {
                continue;
            }
            for property in properties.split(',') {
                if let Some(value) = Self::property(name, dataset, property) {
                    stdout.push_str(&format!("{name}\t{property}\t{value}\n"));
                }
            }
        }
        ok(stdout)
    }

    fn get(&self, kind: &str, properties: &str, name: &str) -> CommandOutput {
        let Some(kind) = Kind::parse(kind) else {
            return fail(2, format!("invalid type '{kind}'"));
        };
        let dataset = match self.datasets.get(name) {
            Some(dataset) if dataset.kind == kind && !self.hidden.contains(name) => dataset,
            _ => return fail(1, format!("cannot open '{name}': dataset does not exist")),
        };

        let mut stdout = String::new();
        for property in properties.split(',') {
            if let Some(value) = Self::property(name, dataset, property) {
                stdout.push_str(&format!("{property}\t{value}\n"));
            }
        }
        ok(stdout)
    }

    fn create(&mut self, name: &str, origin: Option<String>) -> CommandOutput {
        if self.datasets.contains_key(name) {
            return fail(1, format!("cannot create '{name}': dataset already exists"));
        }
        let parent_ok = name
            .rsplit_once('/')
            .and_then(|(parent, _)| self.datasets.get(parent))
            .is_some_and(|parent| parent.kind == Kind::Filesystem);
        if !parent_ok {
            return fail(1, format!("cannot create '{name}': parent does not exist"));
        }
        self.insert(name, Kind::Filesystem, origin);
        ok(String::new())
    }

    fn snapshot(&mut self, name: &str) -> CommandOutput {
        let Some((filesystem, _)) = name.split_once('@') else {
            return fail(1, format!("cannot create snapshot '{name}': missing '@'"));
        };
        match self.datasets.get(filesystem) {
            Some(dataset) if dataset.kind == Kind::Filesystem => {}
            _ => return fail(1, format!("cannot open '{filesystem}': dataset does not exist")),
        }
        if self.datasets.contains_key(name) {
            return fail(1, format!("cannot create snapshot '{name}': dataset already exists"));
        }
        self.insert(name, Kind::Snapshot, None);
        ok(String::new())
    }
}

/// Fake storage system holding any number of pools.
#[derive(Debug, Default)]
pub struct FakeZfs {
    state: Mutex<State>,
}

impl FakeZfs {
    pub fn with_pool(pool: &str) -> Self {
        let fake = Self::default();
        fake.add_pool(pool);
        fake
    }

    pub fn add_pool(&self, pool: &str) {
        let mut state = self.state.lock().unwrap();
        state.pools.push(pool.to_string());
        state.insert(pool, Kind::Filesystem, None);
    }

    /// Every invocation so far, rendered as `<binary> <args>`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// From now on, created datasets exist but single-dataset `get` fails for them.
    pub fn hide_new_datasets(&self) {
        self.state.lock().unwrap().hide_new = true;
    }
}

impl CommandRunner for FakeZfs {
    fn run(&self, program: &Path, args: &[&str]) -> PoolkeeperResult<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        let binary = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        state.calls.push(format!("{binary} {}", args.join(" ")));

        Ok(match binary.as_str() {
            "zpool" => state.zpool(args),
            "zfs" => state.zfs(args),
            other => fail(127, format!("{other}: command not found")),
        })
    }
}

pub fn write_executable(path: &Path, contents: &str) -> PoolkeeperResult<()> {
    fs::write(path, contents)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}
