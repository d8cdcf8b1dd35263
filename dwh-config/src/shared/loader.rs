use serde::Deserialize;

use crate::shared::{ValidationError, WarehouseConfig};

/// Configuration for the staging snapshot hand-off the loader consumes.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// In-memory source, for development and tests.
    Memory,
    /// NDJSON snapshot files under a directory, one file per staging entity.
    Ndjson { dir: String },
}

/// Configuration for the warehouse store the loader emits into.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store, for development and tests.
    Memory,
    /// Append-only NDJSON files under a directory.
    Ndjson { dir: String },
}

/// Configuration for one loader invocation.
#[derive(Clone, Debug, Deserialize)]
pub struct LoaderConfig {
    pub warehouse: WarehouseConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
    /// Load date override (`YYYY-MM-DD`). Defaults to today; set explicitly
    /// when re-running a past load.
    #[serde(default)]
    pub load_date: Option<String>,
}

impl LoaderConfig {
    /// Validates loader configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.warehouse.validate()
    }
}
