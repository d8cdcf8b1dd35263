use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::state::DimensionState;
use crate::store::WarehouseStore;
use crate::types::{DimensionVersion, FactRow, NaturalKey, SurrogateKey};

#[derive(Debug, Default)]
struct Inner {
    versions: HashMap<String, Vec<DimensionVersion>>,
    facts: HashMap<String, Vec<FactRow>>,
    run_lock_held: bool,
}

/// In-memory warehouse store for testing and development purposes.
///
/// Emissions accumulate append-only exactly as a real storage layer would
/// receive them. The raw emission log is inspectable, and the deduplicated
/// accessors apply the latest-version-wins rule a real storage layer performs
/// asynchronously, so tests can assert on the visible rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every dimension version emission, in emission order.
    pub async fn version_emissions(&self, dimension: &str) -> Vec<DimensionVersion> {
        let inner = self.inner.lock().await;
        inner.versions.get(dimension).cloned().unwrap_or_default()
    }

    /// Returns the visible dimension rows after deduplication, sorted by
    /// natural key then `valid_from`.
    pub async fn dimension_rows(&self, dimension: &str) -> Vec<DimensionVersion> {
        let emissions = self.version_emissions(dimension).await;
        DimensionState::from_history(dimension, emissions).all_versions()
    }

    /// Returns every fact row emission, in emission order.
    pub async fn fact_emissions(&self, fact: &str) -> Vec<FactRow> {
        let inner = self.inner.lock().await;
        inner.facts.get(fact).cloned().unwrap_or_default()
    }

    /// Returns the visible fact rows after deduplication by fact natural key,
    /// sorted by fact key.
    pub async fn fact_rows(&self, fact: &str) -> Vec<FactRow> {
        let emissions = self.fact_emissions(fact).await;

        let mut latest: HashMap<NaturalKey, FactRow> = HashMap::new();
        for row in emissions {
            match latest.get(&row.fact_key) {
                Some(existing) if existing.loaded_at > row.loaded_at => {}
                _ => {
                    latest.insert(row.fact_key, row);
                }
            }
        }

        let mut rows: Vec<FactRow> = latest.into_values().collect();
        rows.sort_by_key(|row| row.fact_key);
        rows
    }
}

impl WarehouseStore for MemoryWarehouse {
    async fn acquire_run_lock(&self) -> LoadResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.run_lock_held {
            bail!(
                ErrorKind::InvalidState,
                "Another run already holds the warehouse run lock"
            );
        }

        inner.run_lock_held = true;
        Ok(())
    }

    async fn release_run_lock(&self) -> LoadResult<()> {
        let mut inner = self.inner.lock().await;
        inner.run_lock_held = false;
        Ok(())
    }

    async fn max_surrogate_key(&self, dimension: &str) -> LoadResult<Option<SurrogateKey>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .versions
            .get(dimension)
            .and_then(|versions| versions.iter().map(|version| version.surrogate_key).max()))
    }

    async fn dimension_versions(&self, dimension: &str) -> LoadResult<Vec<DimensionVersion>> {
        let inner = self.inner.lock().await;
        Ok(inner.versions.get(dimension).cloned().unwrap_or_default())
    }

    async fn write_versions(
        &self,
        dimension: &str,
        versions: Vec<DimensionVersion>,
    ) -> LoadResult<()> {
        let mut inner = self.inner.lock().await;

        info!(
            dimension,
            count = versions.len(),
            "writing a batch of dimension version emissions"
        );
        inner
            .versions
            .entry(dimension.to_string())
            .or_default()
            .extend(versions);

        Ok(())
    }

    async fn write_facts(&self, fact: &str, rows: Vec<FactRow>) -> LoadResult<()> {
        let mut inner = self.inner.lock().await;

        info!(fact, count = rows.len(), "writing a batch of fact emissions");
        inner.facts.entry(fact.to_string()).or_default().extend(rows);

        Ok(())
    }
}
