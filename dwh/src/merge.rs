//! Type-2 merge of staging snapshots into historized dimension state.
//!
//! The decision procedure is a pure function of the current open version, the
//! incoming attributes, and the load date, returning a tagged [`MergeDecision`]
//! so it can be tested independently of any persistence. [`DimensionMerger`]
//! applies decisions: it allocates surrogate keys, keeps the in-run
//! [`DimensionState`] and [`KeyRegistry`] current, and batches the version rows
//! to emit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, LoadResult, Severity};
use crate::registry::KeyRegistry;
use crate::schema::{DimensionSchema, Historization};
use crate::state::DimensionState;
use crate::types::{Cell, DimensionVersion, NaturalKey, StagingRow, open_valid_to};

/// What the merge does with one staging row, evaluated once per natural key
/// per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No open version exists: insert a new open version under a fresh key.
    Open,
    /// All tracked attributes equal the open version: leave it untouched.
    Unchanged,
    /// A tracked attribute changed: close the open version the day before the
    /// load date and insert a new open version under a fresh key.
    Supersede,
    /// A tracked attribute changed but the open version was itself opened on
    /// the load date (or the dimension is overwrite-historized): rewrite the
    /// open version in place, keeping its surrogate key and `valid_from`.
    Revise,
}

/// Decides how one staging row merges against the current open version.
///
/// The full tracked attribute set is compared in a single pass, so several
/// changed attributes observed in one load still produce exactly one decision
/// and at most one new version.
pub fn decide(
    current: Option<&DimensionVersion>,
    incoming: &BTreeMap<String, Cell>,
    schema: &DimensionSchema,
    load_date: NaiveDate,
) -> MergeDecision {
    let Some(current) = current else {
        return MergeDecision::Open;
    };

    if !tracked_attributes_differ(&current.attributes, incoming, schema) {
        return MergeDecision::Unchanged;
    }

    match schema.historization {
        Historization::Overwrite => MergeDecision::Revise,
        // Closing at `load_date - 1 day` would put `valid_to` before
        // `valid_from` for a version opened on (or, in a replayed run,
        // after) the load date; revise it instead.
        Historization::Type2 if current.valid_from >= load_date => MergeDecision::Revise,
        Historization::Type2 => MergeDecision::Supersede,
    }
}

/// Returns whether any tracked attribute differs between the stored version
/// and the incoming staging row. A column that is absent on one side compares
/// equal to an explicit null on the other.
fn tracked_attributes_differ(
    stored: &BTreeMap<String, Cell>,
    incoming: &BTreeMap<String, Cell>,
    schema: &DimensionSchema,
) -> bool {
    let columns: BTreeSet<&String> = stored.keys().chain(incoming.keys()).collect();

    columns
        .into_iter()
        .filter(|column| schema.is_tracked(column))
        .any(|column| normalized(stored, column) != normalized(incoming, column))
}

/// Returns the non-null cell stored under `column`, treating absent and null
/// values alike.
fn normalized<'a>(attributes: &'a BTreeMap<String, Cell>, column: &str) -> Option<&'a Cell> {
    attributes.get(column).filter(|cell| !cell.is_null())
}

/// Per-dimension merge counters for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionStats {
    pub rows_seen: usize,
    pub opened: usize,
    pub superseded: usize,
    pub revised: usize,
    pub unchanged: usize,
    pub quarantined: usize,
}

/// Result of merging one dimension's snapshot: the version rows to emit and
/// the counters for the report.
#[derive(Debug)]
pub struct MergeOutcome {
    pub emissions: Vec<DimensionVersion>,
    pub stats: DimensionStats,
}

/// Applies the merge decision procedure to one dimension's staging snapshot.
pub struct DimensionMerger<'a> {
    schema: &'a DimensionSchema,
    load_date: NaiveDate,
    loaded_at: DateTime<Utc>,
}

impl<'a> DimensionMerger<'a> {
    pub fn new(schema: &'a DimensionSchema, load_date: NaiveDate, loaded_at: DateTime<Utc>) -> Self {
        Self {
            schema,
            load_date,
            loaded_at,
        }
    }

    /// Merges a full staging snapshot against the dimension's current state.
    ///
    /// Rows that fail natural-key validation are quarantined and counted; any
    /// structural failure aborts the merge. Each natural key is evaluated
    /// exactly once: when a key appears in several snapshot rows, only the one
    /// with the freshest row timestamp is merged.
    pub fn merge(
        &self,
        rows: Vec<StagingRow>,
        state: &mut DimensionState,
        registry: &mut KeyRegistry,
    ) -> LoadResult<MergeOutcome> {
        let mut stats = DimensionStats {
            rows_seen: rows.len(),
            ..Default::default()
        };
        let mut emissions = Vec::new();

        let mut freshest: BTreeMap<NaturalKey, StagingRow> = BTreeMap::new();
        for row in rows {
            let natural_key = match row.natural_key(&self.schema.natural_key) {
                Ok(natural_key) => natural_key,
                Err(err) if err.severity() == Severity::Row => {
                    warn!(
                        dimension = %self.schema.name,
                        error = %err,
                        "quarantining staging row"
                    );
                    stats.quarantined += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            match freshest.get(&natural_key) {
                Some(existing) if existing.recorded_at() >= row.recorded_at() => {
                    debug!(
                        dimension = %self.schema.name,
                        natural_key, "skipping stale duplicate staging row"
                    );
                }
                _ => {
                    freshest.insert(natural_key, row);
                }
            }
        }

        for (natural_key, row) in freshest {
            let current = state.current(natural_key).cloned();
            let incoming = row.into_attributes();
            let decision = decide(current.as_ref(), &incoming, self.schema, self.load_date);

            match decision {
                MergeDecision::Unchanged => {
                    stats.unchanged += 1;
                }
                MergeDecision::Open => {
                    let version = self.open_version(natural_key, incoming, registry)?;
                    registry.record_open(&self.schema.name, natural_key, version.surrogate_key);
                    emissions.push(version.clone());
                    state.upsert(version);
                    stats.opened += 1;
                }
                MergeDecision::Supersede => {
                    let Some(valid_to) = self.load_date.pred_opt() else {
                        bail!(
                            ErrorKind::InvalidState,
                            "Load date has no predecessor day",
                            self.load_date.to_string()
                        );
                    };

                    let mut closed =
                        current.expect("supersede decision implies an open version");
                    closed.valid_to = valid_to;
                    closed.is_current = false;
                    closed.updated_at = self.loaded_at;
                    emissions.push(closed.clone());
                    state.upsert(closed);

                    let version = self.open_version(natural_key, incoming, registry)?;
                    registry.record_open(&self.schema.name, natural_key, version.surrogate_key);
                    emissions.push(version.clone());
                    state.upsert(version);
                    stats.superseded += 1;
                }
                MergeDecision::Revise => {
                    let mut revised =
                        current.expect("revise decision implies an open version");
                    revised.attributes = incoming;
                    revised.updated_at = self.loaded_at;
                    emissions.push(revised.clone());
                    state.upsert(revised);
                    stats.revised += 1;
                }
            }
        }

        info!(
            dimension = %self.schema.name,
            rows_seen = stats.rows_seen,
            opened = stats.opened,
            superseded = stats.superseded,
            revised = stats.revised,
            unchanged = stats.unchanged,
            quarantined = stats.quarantined,
            "dimension merge completed"
        );

        Ok(MergeOutcome { emissions, stats })
    }

    fn open_version(
        &self,
        natural_key: NaturalKey,
        attributes: BTreeMap<String, Cell>,
        registry: &mut KeyRegistry,
    ) -> LoadResult<DimensionVersion> {
        let surrogate_key = registry.allocate(&self.schema.name)?;

        Ok(DimensionVersion {
            surrogate_key,
            natural_key,
            attributes,
            valid_from: self.load_date,
            valid_to: open_valid_to(),
            is_current: true,
            updated_at: self.loaded_at,
        })
    }
}
