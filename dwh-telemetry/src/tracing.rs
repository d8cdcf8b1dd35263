use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default directive applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Error raised when the global tracing subscriber cannot be installed.
#[derive(Debug, Error)]
#[error("failed to install the global tracing subscriber: {0}")]
pub struct InitTracingError(String);

/// Initializes tracing for a loader service.
///
/// Installs a formatting subscriber filtered by `RUST_LOG` (defaulting to
/// `info`). Installation happens at most once per process; calling this again
/// returns an error, which callers in tests may ignore.
pub fn init_tracing(service_name: &str) -> Result<(), InitTracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| InitTracingError(err.to_string()))?;

    tracing::info!(service = service_name, "tracing initialized");

    Ok(())
}
