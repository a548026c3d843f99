// markguard/src/logger.rs
//! Logger setup for the CLI.
//!
//! `--debug` and `--quiet` pass an explicit level; otherwise `RUST_LOG` decides,
//! defaulting to warnings only. Logs go to stderr so stdout stays clean for
//! sanitized output.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Installs `env_logger`. Calling it twice is harmless.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    builder.target(Target::Stderr).format_timestamp(None);
    if let Some(level) = level {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}
