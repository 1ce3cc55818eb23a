//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `hydrate_core` linkage.
//! - Validate `HYDRATE_*` configuration and start file logging when
//!   `HYDRATE_LOG_DIR` is set.
//! - Keep output deterministic for quick local sanity checks.

use hydrate_core::db::migrations::latest_version;
use hydrate_core::{init_logging_from_config, CoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("hydrate_cli config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let logging = match init_logging_from_config(&config) {
        Ok(true) => "file",
        Ok(false) => "off",
        Err(err) => {
            eprintln!("hydrate_cli logging error: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("hydrate_core ping={}", hydrate_core::ping());
    println!("hydrate_core version={}", hydrate_core::core_version());
    println!("hydrate_core schema_version={}", latest_version());
    println!("hydrate_core db_path={}", config.db_path.display());
    println!("hydrate_core logging={logging} level={}", config.log_level);
    ExitCode::SUCCESS
}
