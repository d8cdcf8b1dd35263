//! Warehouse loader service binary.
//!
//! Loads configuration, initializes tracing, and runs the two-stage warehouse
//! load exactly once. Exit code 0 signals full success (including runs with
//! quarantined rows, which are counted and logged); any abort exits non-zero.

use std::process::ExitCode;

use tracing::{error, info};

use dwh_config::load::load_config;
use dwh_config::shared::LoaderConfig;
use dwh_telemetry::tracing::init_tracing;

mod core;
mod error;

fn main() -> ExitCode {
    // Configuration is loaded before telemetry so a broken config is reported
    // even without a subscriber installed.
    let config: LoaderConfig = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load loader configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_tracing(env!("CARGO_BIN_NAME")) {
        eprintln!("failed to initialize telemetry: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(core::start_loader(config)) {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                quarantined = report.quarantined_rows(),
                "warehouse load succeeded"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(category = err.category(), error = %err, "warehouse load aborted");
            ExitCode::FAILURE
        }
    }
}
