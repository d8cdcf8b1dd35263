use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::bail;
use crate::conversions;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{Cell, NaturalKey};

/// Column that carries the source row timestamp in staging snapshots.
pub const RECORDED_AT_COLUMN: &str = "updated_at";

/// An untyped row from a full (non-delta) staging snapshot of one source entity.
///
/// A staging row is just a column-to-cell map keyed by natural key plus a row
/// timestamp; it carries no warehouse keys. Natural key and event date are
/// extracted on demand per the entity's schema declaration, and failures to
/// extract them are row-level validation errors.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingRow {
    attributes: BTreeMap<String, Cell>,
}

impl StagingRow {
    pub fn new(attributes: BTreeMap<String, Cell>) -> Self {
        Self { attributes }
    }

    /// Decodes a staging row from one JSON object of an NDJSON snapshot.
    pub fn from_json(value: &serde_json::Value) -> LoadResult<Self> {
        let serde_json::Value::Object(fields) = value else {
            bail!(
                ErrorKind::SnapshotMalformed,
                "Staging row is not a JSON object",
                value.to_string()
            );
        };

        let mut attributes = BTreeMap::new();
        for (column, value) in fields {
            attributes.insert(column.clone(), Cell::from_json(value)?);
        }

        Ok(Self { attributes })
    }

    /// Returns the cell stored under `column`, if any.
    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.attributes.get(column)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Cell> {
        &self.attributes
    }

    pub fn into_attributes(self) -> BTreeMap<String, Cell> {
        self.attributes
    }

    /// Extracts the row's natural key from `column`.
    ///
    /// A missing, null, or non-integer value is a row-level validation error;
    /// the engine never guesses a key for an unidentifiable row.
    pub fn natural_key(&self, column: &str) -> LoadResult<NaturalKey> {
        let Some(cell) = self.attributes.get(column) else {
            bail!(
                ErrorKind::Validation,
                "Staging row is missing its natural key column",
                column
            );
        };

        match conversions::to_i64(cell) {
            Some(key) => Ok(key),
            None => bail!(
                ErrorKind::Validation,
                "Staging row natural key is not an integer",
                format!("column '{column}' holds {cell:?}")
            ),
        }
    }

    /// Extracts the event date from `column`.
    pub fn event_date(&self, column: &str) -> LoadResult<NaiveDate> {
        let Some(cell) = self.attributes.get(column) else {
            bail!(
                ErrorKind::Validation,
                "Staging row is missing its event date column",
                column
            );
        };

        match conversions::to_date(cell) {
            Some(date) => Ok(date),
            None => bail!(
                ErrorKind::Validation,
                "Staging row event date is malformed",
                format!("column '{column}' holds {cell:?}")
            ),
        }
    }

    /// Returns the source row timestamp, if present and well-formed.
    ///
    /// Used only to pick the freshest row when one natural key appears more
    /// than once in a single snapshot, so a malformed timestamp simply ranks
    /// the row oldest rather than failing it.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.attributes
            .get(RECORDED_AT_COLUMN)
            .and_then(conversions::to_timestamp)
    }
}
