use std::future::Future;

use crate::error::LoadResult;
use crate::types::StagingRow;

/// Trait for systems that hand full staging snapshots to the load pipeline.
///
/// Each method returns the complete snapshot of one staging entity as of the
/// current run. A missing or unreadable snapshot is a fatal extraction error:
/// the pipeline aborts before any merge begins rather than load from partial
/// input. An empty snapshot, by contrast, is valid and merges as "nothing
/// observed".
pub trait SnapshotSource {
    /// Returns the staging snapshot for a dimension entity.
    fn dimension_snapshot(
        &self,
        entity: &str,
    ) -> impl Future<Output = LoadResult<Vec<StagingRow>>> + Send;

    /// Returns the staging snapshot for a fact entity.
    fn fact_snapshot(
        &self,
        entity: &str,
    ) -> impl Future<Output = LoadResult<Vec<StagingRow>>> + Send;
}
