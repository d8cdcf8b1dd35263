use std::future::Future;

use crate::error::LoadResult;
use crate::types::{DimensionVersion, FactRow, SurrogateKey};

/// Trait for the persistence layer the pipeline loads into.
///
/// Writes are append-only emissions; the storage layer's latest-version-wins
/// deduplication produces the visible rows. Reads are only used at run start,
/// to seed surrogate key counters and in-run dimension state, never to observe
/// the run's own writes: deduplication is eventually consistent, so
/// read-your-own-write must be satisfied from in-memory state.
///
/// Implementations should ensure writes are durable before returning, since
/// the orchestrator treats a completed dimension stage as safe ground for
/// fact reconciliation.
pub trait WarehouseStore {
    /// Acquires the single-writer run lock.
    ///
    /// Type-2 version closing is not commutative under interleaving, so two
    /// concurrent runs against the same warehouse must be prevented here.
    /// Fails when another run already holds the lock.
    fn acquire_run_lock(&self) -> impl Future<Output = LoadResult<()>> + Send;

    /// Releases the run lock. Releasing an unheld lock is a no-op.
    fn release_run_lock(&self) -> impl Future<Output = LoadResult<()>> + Send;

    /// Returns the highest surrogate key ever persisted for a dimension.
    ///
    /// Callers treat a failed read as fatal: surrogate key counters must be
    /// seeded from this value, never guessed.
    fn max_surrogate_key(
        &self,
        dimension: &str,
    ) -> impl Future<Output = LoadResult<Option<SurrogateKey>>> + Send;

    /// Returns the full persisted version history of a dimension, including
    /// superseded emissions that the storage layer has not yet collapsed.
    fn dimension_versions(
        &self,
        dimension: &str,
    ) -> impl Future<Output = LoadResult<Vec<DimensionVersion>>> + Send;

    /// Appends a batch of dimension version emissions.
    fn write_versions(
        &self,
        dimension: &str,
        versions: Vec<DimensionVersion>,
    ) -> impl Future<Output = LoadResult<()>> + Send;

    /// Appends a batch of fact row emissions.
    fn write_facts(
        &self,
        fact: &str,
        rows: Vec<FactRow>,
    ) -> impl Future<Output = LoadResult<()>> + Send;
}
