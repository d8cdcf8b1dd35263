//! The load orchestrator.
//!
//! A run is an ordered two-stage batch: every dimension merges to completion
//! and durability first, and only then does fact reconciliation begin, since
//! fact resolution depends on fully merged dimension state. A fatal failure in
//! the dimension stage aborts the run before any fact is resolved against
//! partially merged state. The whole run executes under the store's
//! single-writer run lock.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ErrorKind, LoadResult};
use crate::facts::{FactReconciler, FactStats};
use crate::load_error;
use crate::merge::{DimensionMerger, DimensionStats};
use crate::registry::KeyRegistry;
use crate::report::LoadReport;
use crate::resolve::AsOfResolver;
use crate::schema::{DimensionSchema, FactSchema, WarehouseSchema};
use crate::source::SnapshotSource;
use crate::state::DimensionState;
use crate::store::WarehouseStore;

/// Runs the two-stage warehouse load against a snapshot source and a store.
#[derive(Debug)]
pub struct LoadPipeline<S, W> {
    schema: WarehouseSchema,
    source: S,
    store: W,
}

impl<S, W> LoadPipeline<S, W>
where
    S: SnapshotSource,
    W: WarehouseStore,
{
    pub fn new(schema: WarehouseSchema, source: S, store: W) -> Self {
        Self {
            schema,
            source,
            store,
        }
    }

    /// Executes one load run for `load_date`.
    ///
    /// Because every stage's operations are individually idempotent, a safe
    /// retry after any abort is simply re-running the whole pipeline with the
    /// same load date.
    pub async fn run(&self, load_date: NaiveDate) -> LoadResult<LoadReport> {
        self.store.acquire_run_lock().await?;

        let result = self.run_locked(load_date).await;

        if let Err(release_err) = self.store.release_run_lock().await {
            error!(error = %release_err, "failed to release the warehouse run lock");
            if result.is_ok() {
                return Err(release_err);
            }
        }

        result
    }

    async fn run_locked(&self, load_date: NaiveDate) -> LoadResult<LoadReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(%run_id, %load_date, "starting warehouse load run");

        // One freshness marker per run: every row emitted by this run carries
        // the same marker, so interleaving within a run cannot reorder wins.
        let loaded_at = started_at;

        let mut states: HashMap<String, DimensionState> = HashMap::new();
        let mut registry = KeyRegistry::new();

        let mut dimension_stats = Vec::new();
        for dimension in &self.schema.dimensions {
            let stats = self
                .merge_dimension(dimension, load_date, loaded_at, &mut states, &mut registry)
                .await?;
            dimension_stats.push((dimension.name.clone(), stats));
        }

        // All dimensions are merged and durable; facts may now resolve.
        let resolver = AsOfResolver::new(&states);

        let mut fact_stats = Vec::new();
        for fact in &self.schema.facts {
            let stats = self.reconcile_fact(fact, loaded_at, &resolver).await?;
            fact_stats.push((fact.name.clone(), stats));
        }

        let report = LoadReport {
            run_id,
            load_date,
            started_at,
            finished_at: Utc::now(),
            dimensions: dimension_stats,
            facts: fact_stats,
        };

        info!(%run_id, quarantined = report.quarantined_rows(), "warehouse load run completed");

        Ok(report)
    }

    async fn merge_dimension(
        &self,
        dimension: &DimensionSchema,
        load_date: NaiveDate,
        loaded_at: DateTime<Utc>,
        states: &mut HashMap<String, DimensionState>,
        registry: &mut KeyRegistry,
    ) -> LoadResult<DimensionStats> {
        info!(dimension = %dimension.name, "merging dimension");

        let rows = self.source.dimension_snapshot(&dimension.name).await?;

        let history = self.store.dimension_versions(&dimension.name).await?;
        let mut state = DimensionState::from_history(&dimension.name, history);

        // The counter is derived state: re-seed it from the persisted maximum
        // at every run start. A failed read is fatal, never worked around.
        let persisted_max = self
            .store
            .max_surrogate_key(&dimension.name)
            .await
            .map_err(|err| {
                load_error!(
                    ErrorKind::KeyAllocation,
                    "Surrogate key counter could not be seeded",
                    dimension.name.clone(),
                    source: err
                )
            })?;
        registry.seed_dimension(&dimension.name, persisted_max, state.open_keys());

        let merger = DimensionMerger::new(dimension, load_date, loaded_at);
        let outcome = merger.merge(rows, &mut state, registry)?;

        if !outcome.emissions.is_empty() {
            self.store
                .write_versions(&dimension.name, outcome.emissions)
                .await?;
        }

        states.insert(dimension.name.clone(), state);

        Ok(outcome.stats)
    }

    async fn reconcile_fact(
        &self,
        fact: &FactSchema,
        loaded_at: DateTime<Utc>,
        resolver: &AsOfResolver<'_>,
    ) -> LoadResult<FactStats> {
        info!(fact = %fact.name, "reconciling fact source");

        let rows = self.source.fact_snapshot(&fact.name).await?;

        let reconciler = FactReconciler::new(fact, loaded_at);
        let outcome = reconciler.reconcile(rows, resolver)?;

        if !outcome.emissions.is_empty() {
            self.store.write_facts(&fact.name, outcome.emissions).await?;
        }

        Ok(outcome.stats)
    }
}
