//! As-of resolution of dimension references.
//!
//! Maps `(dimension, natural key, event date)` to the surrogate key of the
//! version valid at that date. Resolution runs against the run's merged
//! in-memory state, never against storage, and it never falls back to the open
//! version: attributing a historical event to the present-day version would
//! silently misprice historical measures, which is exactly the failure this
//! lookup exists to prevent.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::state::DimensionState;
use crate::types::{NaturalKey, SurrogateKey};

/// Resolves dimension references against fully merged dimension state.
pub struct AsOfResolver<'a> {
    dimensions: &'a HashMap<String, DimensionState>,
}

impl<'a> AsOfResolver<'a> {
    pub fn new(dimensions: &'a HashMap<String, DimensionState>) -> Self {
        Self { dimensions }
    }

    /// Returns the surrogate key of the version of `natural_key` whose
    /// validity window contains `event_date`.
    ///
    /// Fails with [`ErrorKind::UnresolvedReference`] when the dimension holds
    /// no versions for the natural key, or when the event date precedes the
    /// earliest version (a dimension change applied out of order relative to a
    /// backdated event).
    pub fn resolve(
        &self,
        dimension: &str,
        natural_key: NaturalKey,
        event_date: NaiveDate,
    ) -> LoadResult<SurrogateKey> {
        let Some(state) = self.dimensions.get(dimension) else {
            bail!(
                ErrorKind::UnresolvedReference,
                "Referenced dimension was not merged this run",
                dimension.to_string()
            );
        };

        if let Some(version) = state.as_of(natural_key, event_date) {
            return Ok(version.surrogate_key);
        }

        match state.earliest_valid_from(natural_key) {
            None => bail!(
                ErrorKind::UnresolvedReference,
                "No dimension version exists for natural key",
                format!("dimension '{dimension}', natural key {natural_key}")
            ),
            Some(earliest) if event_date < earliest => bail!(
                ErrorKind::UnresolvedReference,
                "Event date precedes the earliest dimension version",
                format!(
                    "dimension '{dimension}', natural key {natural_key}, \
                     event date {event_date}, earliest version {earliest}"
                )
            ),
            Some(_) => bail!(
                ErrorKind::UnresolvedReference,
                "No dimension version covers the event date",
                format!(
                    "dimension '{dimension}', natural key {natural_key}, event date {event_date}"
                )
            ),
        }
    }
}
