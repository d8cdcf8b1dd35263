use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::source::SnapshotSource;
use crate::types::StagingRow;

/// Subdirectory holding dimension entity snapshots.
const DIMENSIONS_AREA: &str = "dimensions";

/// Subdirectory holding fact entity snapshots.
const FACTS_AREA: &str = "facts";

/// Snapshot source reading NDJSON files from a staging directory.
///
/// The extraction collaborator drops one file per entity and run:
/// `<dir>/dimensions/<entity>.ndjson` and `<dir>/facts/<entity>.ndjson`, one
/// JSON object per line. A missing file is a fatal extraction error, and so is
/// a line that fails to decode: a half-readable snapshot must not be merged.
#[derive(Debug, Clone)]
pub struct NdjsonSnapshotSource {
    dir: PathBuf,
}

impl NdjsonSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_entity(&self, area: &str, entity: &str) -> LoadResult<Vec<StagingRow>> {
        let path = self.dir.join(area).join(format!("{entity}.ndjson"));
        read_staging_file(&path).await
    }
}

impl SnapshotSource for NdjsonSnapshotSource {
    async fn dimension_snapshot(&self, entity: &str) -> LoadResult<Vec<StagingRow>> {
        self.read_entity(DIMENSIONS_AREA, entity).await
    }

    async fn fact_snapshot(&self, entity: &str) -> LoadResult<Vec<StagingRow>> {
        self.read_entity(FACTS_AREA, entity).await
    }
}

async fn read_staging_file(path: &Path) -> LoadResult<Vec<StagingRow>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        load_error!(
            ErrorKind::SnapshotMissing,
            "Staging snapshot could not be read",
            path.display(),
            source: err
        )
    })?;

    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line)?;
            StagingRow::from_json(&value)
        })
        .collect()
}
