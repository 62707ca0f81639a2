#![forbid(unsafe_code)]

//! Core building blocks shared by poolkeeper crates.
//!
//! Error taxonomy, configuration, and logging live here so the provider and
//! system crates can focus on talking to the storage tooling.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{PoolCfg, PoolkeeperConfig, ZfsCfg};
pub use error::{PoolkeeperError, PoolkeeperResult};
