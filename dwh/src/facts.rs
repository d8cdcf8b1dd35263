//! Reconciliation of staging fact rows into warehouse fact rows.
//!
//! Each staging fact row is validated, its dimension references are resolved
//! as of the event date, and declared measures are coerced to their target
//! types. Rows that fail are quarantined, counted per category, and logged;
//! the rest of the batch proceeds. Emitted rows carry a fresh freshness
//! marker, so re-emitting an unchanged fact is harmless: the storage layer's
//! latest-version-wins rule collapses repeated emissions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::bail;
use crate::conversions;
use crate::error::{ErrorKind, LoadResult, Severity};
use crate::resolve::AsOfResolver;
use crate::schema::{FactSchema, MeasureColumn, MeasureKind};
use crate::types::{Cell, FactRow, StagingRow, date_key};

/// Per-fact reconciliation counters for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactStats {
    pub rows_seen: usize,
    pub loaded: usize,
    /// Rows quarantined for missing or malformed natural keys, dates, or
    /// measures.
    pub validation_quarantined: usize,
    /// Rows quarantined because a dimension reference could not be resolved
    /// as of the event date.
    pub unresolved_quarantined: usize,
}

impl FactStats {
    pub fn quarantined(&self) -> usize {
        self.validation_quarantined + self.unresolved_quarantined
    }
}

/// Result of reconciling one fact source: the fact rows to emit and the
/// counters for the report.
#[derive(Debug)]
pub struct FactOutcome {
    pub emissions: Vec<FactRow>,
    pub stats: FactStats,
}

/// Transforms one fact source's staging snapshot into warehouse fact rows.
pub struct FactReconciler<'a> {
    schema: &'a FactSchema,
    loaded_at: DateTime<Utc>,
}

impl<'a> FactReconciler<'a> {
    pub fn new(schema: &'a FactSchema, loaded_at: DateTime<Utc>) -> Self {
        Self { schema, loaded_at }
    }

    /// Reconciles a staging snapshot, quarantining row-level failures and
    /// propagating everything else.
    pub fn reconcile(
        &self,
        rows: Vec<StagingRow>,
        resolver: &AsOfResolver<'_>,
    ) -> LoadResult<FactOutcome> {
        let mut stats = FactStats {
            rows_seen: rows.len(),
            ..Default::default()
        };
        let mut emissions = Vec::new();

        for row in rows {
            match self.reconcile_row(&row, resolver) {
                Ok(fact) => {
                    emissions.push(fact);
                    stats.loaded += 1;
                }
                Err(err) if err.severity() == Severity::Row => {
                    warn!(fact = %self.schema.name, error = %err, "quarantining fact row");
                    match err.kind() {
                        ErrorKind::UnresolvedReference => stats.unresolved_quarantined += 1,
                        _ => stats.validation_quarantined += 1,
                    }
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            fact = %self.schema.name,
            rows_seen = stats.rows_seen,
            loaded = stats.loaded,
            validation_quarantined = stats.validation_quarantined,
            unresolved_quarantined = stats.unresolved_quarantined,
            "fact reconciliation completed"
        );

        Ok(FactOutcome { emissions, stats })
    }

    fn reconcile_row(&self, row: &StagingRow, resolver: &AsOfResolver<'_>) -> LoadResult<FactRow> {
        let fact_key = row.natural_key(&self.schema.natural_key)?;
        let event_date = row.event_date(&self.schema.event_date)?;

        let mut dimension_keys = BTreeMap::new();
        for reference in &self.schema.references {
            let Some(cell) = row.cell(&reference.key_column) else {
                bail!(
                    ErrorKind::Validation,
                    "Fact row is missing a dimension reference column",
                    format!("fact key {fact_key}, column '{}'", reference.key_column)
                );
            };

            let Some(referenced_key) = conversions::to_i64(cell) else {
                bail!(
                    ErrorKind::Validation,
                    "Fact row dimension reference is not an integer",
                    format!("fact key {fact_key}, column '{}'", reference.key_column)
                );
            };

            let surrogate_key =
                resolver.resolve(&reference.dimension, referenced_key, event_date)?;
            dimension_keys.insert(reference.role.clone(), surrogate_key);
        }

        let mut measures = BTreeMap::new();
        for measure in &self.schema.measures {
            let value = convert_measure(row.cell(&measure.name), measure, fact_key)?;
            measures.insert(measure.name.clone(), value);
        }

        Ok(FactRow {
            fact_key,
            date_key: date_key(event_date),
            dimension_keys,
            measures,
            loaded_at: self.loaded_at,
        })
    }
}

/// Coerces one measure cell to its declared kind.
///
/// Absent and null measures stay null (a homework without a submitted score is
/// a valid fact); a present value that cannot be coerced quarantines the row.
fn convert_measure(
    cell: Option<&Cell>,
    measure: &MeasureColumn,
    fact_key: i64,
) -> LoadResult<Cell> {
    let Some(cell) = cell else {
        return Ok(Cell::Null);
    };
    if cell.is_null() {
        return Ok(Cell::Null);
    }

    let converted = match measure.kind {
        MeasureKind::Int => conversions::to_i64(cell).map(Cell::I64),
        MeasureKind::Float => conversions::to_f64(cell).map(Cell::F64),
        MeasureKind::Numeric => conversions::to_numeric(cell).map(Cell::Numeric),
        MeasureKind::Text => conversions::to_text(cell).map(Cell::String),
    };

    match converted {
        Some(value) => Ok(value),
        None => bail!(
            ErrorKind::Validation,
            "Fact measure cannot be coerced to its declared kind",
            format!(
                "fact key {fact_key}, measure '{}' ({:?}) holds {cell:?}",
                measure.name, measure.kind
            )
        ),
    }
}
