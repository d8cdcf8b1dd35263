use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::source::SnapshotSource;
use crate::types::StagingRow;

#[derive(Debug, Default)]
struct Inner {
    dimensions: HashMap<String, Vec<StagingRow>>,
    facts: HashMap<String, Vec<StagingRow>>,
}

/// In-memory snapshot source for testing and development purposes.
///
/// Snapshots are registered per entity before a run; requesting an entity that
/// was never registered fails the same way a missing upstream snapshot would,
/// which makes extraction failures easy to exercise in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotSource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the snapshot for a dimension entity.
    pub async fn set_dimension_snapshot(&self, entity: &str, rows: Vec<StagingRow>) {
        let mut inner = self.inner.lock().await;
        inner.dimensions.insert(entity.to_string(), rows);
    }

    /// Registers (or replaces) the snapshot for a fact entity.
    pub async fn set_fact_snapshot(&self, entity: &str, rows: Vec<StagingRow>) {
        let mut inner = self.inner.lock().await;
        inner.facts.insert(entity.to_string(), rows);
    }
}

impl SnapshotSource for MemorySnapshotSource {
    async fn dimension_snapshot(&self, entity: &str) -> LoadResult<Vec<StagingRow>> {
        let inner = self.inner.lock().await;

        match inner.dimensions.get(entity) {
            Some(rows) => Ok(rows.clone()),
            None => bail!(
                ErrorKind::SnapshotMissing,
                "No staging snapshot registered for dimension entity",
                entity.to_string()
            ),
        }
    }

    async fn fact_snapshot(&self, entity: &str) -> LoadResult<Vec<StagingRow>> {
        let inner = self.inner.lock().await;

        match inner.facts.get(entity) {
            Some(rows) => Ok(rows.clone()),
            None => bail!(
                ErrorKind::SnapshotMissing,
                "No staging snapshot registered for fact entity",
                entity.to_string()
            ),
        }
    }
}
