//! Per-run load statistics.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::facts::FactStats;
use crate::merge::DimensionStats;

/// Aggregated outcome of one completed load run.
///
/// A report only exists for runs that ran to completion; aborted runs surface
/// as errors instead. Quarantine counts are part of the report so that no
/// quarantined row is ever dropped without being counted.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub load_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Merge counters per dimension, in load order.
    pub dimensions: Vec<(String, DimensionStats)>,
    /// Reconciliation counters per fact source, in load order.
    pub facts: Vec<(String, FactStats)>,
}

impl LoadReport {
    /// Total rows quarantined across all stages and categories.
    pub fn quarantined_rows(&self) -> usize {
        let dimension_rows: usize = self
            .dimensions
            .iter()
            .map(|(_, stats)| stats.quarantined)
            .sum();
        let fact_rows: usize = self.facts.iter().map(|(_, stats)| stats.quarantined()).sum();

        dimension_rows + fact_rows
    }

    /// Returns whether the run loaded every row it saw.
    pub fn is_clean(&self) -> bool {
        self.quarantined_rows() == 0
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {} for load date {} completed in {}ms",
            self.run_id,
            self.load_date,
            (self.finished_at - self.started_at).num_milliseconds()
        )?;

        for (dimension, stats) in &self.dimensions {
            writeln!(
                f,
                "  dimension {dimension}: {} seen, {} opened, {} superseded, \
                 {} revised, {} unchanged, {} quarantined",
                stats.rows_seen,
                stats.opened,
                stats.superseded,
                stats.revised,
                stats.unchanged,
                stats.quarantined
            )?;
        }

        for (fact, stats) in &self.facts {
            writeln!(
                f,
                "  fact {fact}: {} seen, {} loaded, {} quarantined \
                 ({} validation, {} unresolved)",
                stats.rows_seen,
                stats.loaded,
                stats.quarantined(),
                stats.validation_quarantined,
                stats.unresolved_quarantined
            )?;
        }

        write!(f, "  total quarantined rows: {}", self.quarantined_rows())
    }
}
