use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::store::WarehouseStore;
use crate::types::{DimensionVersion, FactRow, SurrogateKey};

/// Subdirectory holding dimension tables.
const DIMENSIONS_AREA: &str = "dimensions";

/// Subdirectory holding fact tables.
const FACTS_AREA: &str = "facts";

/// Lock file implementing the single-writer run lock.
const RUN_LOCK_FILE: &str = "run.lock";

/// Warehouse store backed by append-only NDJSON files.
///
/// Each table is one file under `<root>/dimensions/` or `<root>/facts/`, one
/// emission per line, appended in write order. The downstream storage layer is
/// expected to collapse the files by its latest-version-wins rule; this store
/// never rewrites or deletes what it has appended. The run lock is a lock file
/// created exclusively at `<root>/run.lock`.
#[derive(Debug, Clone)]
pub struct NdjsonWarehouse {
    root: PathBuf,
}

impl NdjsonWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_path(&self, area: &str, table: &str) -> PathBuf {
        self.root.join(area).join(format!("{table}.ndjson"))
    }

    async fn append_lines(&self, area: &str, table: &str, lines: String) -> LoadResult<()> {
        let directory = self.root.join(area);
        tokio::fs::create_dir_all(&directory).await.map_err(|err| {
            load_error!(
                ErrorKind::StoreWriteFailed,
                "Warehouse table directory could not be created",
                directory.display(),
                source: err
            )
        })?;

        let path = self.table_path(area, table);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|err| {
                load_error!(
                    ErrorKind::StoreWriteFailed,
                    "Warehouse table could not be opened for append",
                    path.display(),
                    source: err
                )
            })?;

        file.write_all(lines.as_bytes()).await.map_err(|err| {
            load_error!(
                ErrorKind::StoreWriteFailed,
                "Warehouse table append failed",
                path.display(),
                source: err
            )
        })?;
        file.flush().await.map_err(|err| {
            load_error!(
                ErrorKind::StoreWriteFailed,
                "Warehouse table flush failed",
                path.display(),
                source: err
            )
        })?;

        Ok(())
    }

    async fn read_lines(&self, path: &Path) -> LoadResult<Vec<serde_json::Value>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(load_error!(
                    ErrorKind::StoreUnavailable,
                    "Warehouse table could not be read",
                    path.display(),
                    source: err
                ));
            }
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|err| {
                    load_error!(
                        ErrorKind::StoreUnavailable,
                        "Warehouse table holds an undecodable row",
                        path.display(),
                        source: err
                    )
                })
            })
            .collect()
    }
}

impl WarehouseStore for NdjsonWarehouse {
    async fn acquire_run_lock(&self) -> LoadResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            load_error!(
                ErrorKind::StoreUnavailable,
                "Warehouse root directory could not be created",
                self.root.display(),
                source: err
            )
        })?;

        let path = self.root.join(RUN_LOCK_FILE);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                info!(path = %path.display(), "acquired warehouse run lock");
                Ok(())
            }
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => Err(load_error!(
                ErrorKind::InvalidState,
                "Another run already holds the warehouse run lock",
                path.display(),
                source: err
            )),
            Err(err) => Err(load_error!(
                ErrorKind::StoreUnavailable,
                "Warehouse run lock could not be created",
                path.display(),
                source: err
            )),
        }
    }

    async fn release_run_lock(&self) -> LoadResult<()> {
        let path = self.root.join(RUN_LOCK_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(load_error!(
                ErrorKind::StoreUnavailable,
                "Warehouse run lock could not be released",
                path.display(),
                source: err
            )),
        }
    }

    async fn max_surrogate_key(&self, dimension: &str) -> LoadResult<Option<SurrogateKey>> {
        let versions = self.dimension_versions(dimension).await?;
        Ok(versions.iter().map(|version| version.surrogate_key).max())
    }

    async fn dimension_versions(&self, dimension: &str) -> LoadResult<Vec<DimensionVersion>> {
        let path = self.table_path(DIMENSIONS_AREA, dimension);

        self.read_lines(&path)
            .await?
            .iter()
            .map(DimensionVersion::from_json)
            .collect()
    }

    async fn write_versions(
        &self,
        dimension: &str,
        versions: Vec<DimensionVersion>,
    ) -> LoadResult<()> {
        info!(
            dimension,
            count = versions.len(),
            "appending dimension version emissions"
        );

        let mut lines = String::new();
        for version in &versions {
            lines.push_str(&version.to_json().to_string());
            lines.push('\n');
        }

        self.append_lines(DIMENSIONS_AREA, dimension, lines).await
    }

    async fn write_facts(&self, fact: &str, rows: Vec<FactRow>) -> LoadResult<()> {
        info!(fact, count = rows.len(), "appending fact emissions");

        let mut lines = String::new();
        for row in &rows {
            lines.push_str(&row.to_json().to_string());
            lines.push('\n');
        }

        self.append_lines(FACTS_AREA, fact, lines).await
    }
}
