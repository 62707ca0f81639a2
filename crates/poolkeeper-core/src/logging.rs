//! Logging bootstrap shared by poolkeeper binaries.

use env_logger::{Builder, Env};
use std::sync::Once;

const LOG_ENV: &str = "POOLKEEPER_LOG";

static INIT: Once = Once::new();

/// Install the global logger once. `POOLKEEPER_LOG` wins over `RUST_LOG`;
/// `default_level` applies when neither is set.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let env = if std::env::var_os(LOG_ENV).is_some() {
            Env::new().filter(LOG_ENV)
        } else {
            Env::default().default_filter_or(default_level)
        };
        let _ = Builder::from_env(env)
            .format_timestamp_secs()
            .format_target(false)
            .try_init();
    });
}
