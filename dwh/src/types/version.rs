use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{Cell, DATE_FORMAT, NaturalKey, SurrogateKey};

/// Sentinel `valid_to` of the open (current) version of an entity.
pub fn open_valid_to() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).expect("sentinel date is valid")
}

/// One historized version of a dimension entity.
///
/// For every natural key at most one version is open: `is_current` set and
/// `valid_to` at the open sentinel. Closed versions carry non-overlapping,
/// contiguous closed-closed validity windows ordered by `valid_from`, with each
/// closed `valid_to` one day before the successor's `valid_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionVersion {
    pub surrogate_key: SurrogateKey,
    pub natural_key: NaturalKey,
    pub attributes: BTreeMap<String, Cell>,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub is_current: bool,
    /// Freshness marker consumed by the storage layer's latest-version-wins
    /// deduplication, keyed by `(natural_key, valid_from)`.
    pub updated_at: DateTime<Utc>,
}

impl DimensionVersion {
    /// Returns whether `date` falls inside this version's validity window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }

    /// Encodes this version as one JSON object for append-only emission.
    pub fn to_json(&self) -> serde_json::Value {
        let attributes: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(column, cell)| (column.clone(), cell.to_json()))
            .collect();

        serde_json::json!({
            "surrogate_key": self.surrogate_key.get(),
            "natural_key": self.natural_key,
            "attributes": attributes,
            "valid_from": self.valid_from.format(DATE_FORMAT).to_string(),
            "valid_to": self.valid_to.format(DATE_FORMAT).to_string(),
            "is_current": self.is_current,
            "updated_at": self.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }

    /// Decodes a version from one persisted JSON object.
    ///
    /// Persisted history that fails to decode means the warehouse state cannot
    /// be trusted for seeding, which is a fatal persistence error.
    pub fn from_json(value: &serde_json::Value) -> LoadResult<Self> {
        let Some(fields) = value.as_object() else {
            bail!(
                ErrorKind::StoreUnavailable,
                "Persisted dimension version is not a JSON object",
                value.to_string()
            );
        };

        let surrogate_key = require_i64(fields, "surrogate_key")?;
        let natural_key = require_i64(fields, "natural_key")?;
        let valid_from = require_date(fields, "valid_from")?;
        let valid_to = require_date(fields, "valid_to")?;
        let is_current = fields
            .get("is_current")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let updated_at = require_timestamp(fields, "updated_at")?;

        let mut attributes = BTreeMap::new();
        if let Some(serde_json::Value::Object(raw)) = fields.get("attributes") {
            for (column, value) in raw {
                attributes.insert(column.clone(), Cell::from_json(value)?);
            }
        }

        Ok(Self {
            surrogate_key: SurrogateKey::new(surrogate_key),
            natural_key,
            attributes,
            valid_from,
            valid_to,
            is_current,
            updated_at,
        })
    }
}

fn require_i64(fields: &serde_json::Map<String, serde_json::Value>, name: &str) -> LoadResult<i64> {
    match fields.get(name).and_then(serde_json::Value::as_i64) {
        Some(value) => Ok(value),
        None => bail!(
            ErrorKind::StoreUnavailable,
            "Persisted dimension version is missing an integer field",
            name.to_string()
        ),
    }
}

fn require_date(
    fields: &serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> LoadResult<NaiveDate> {
    let raw = match fields.get(name).and_then(serde_json::Value::as_str) {
        Some(value) => value,
        None => bail!(
            ErrorKind::StoreUnavailable,
            "Persisted dimension version is missing a date field",
            name.to_string()
        ),
    };

    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Ok(date),
        Err(_) => bail!(
            ErrorKind::StoreUnavailable,
            "Persisted dimension version holds a malformed date",
            format!("field '{name}' holds '{raw}'")
        ),
    }
}

fn require_timestamp(
    fields: &serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> LoadResult<DateTime<Utc>> {
    let raw = match fields.get(name).and_then(serde_json::Value::as_str) {
        Some(value) => value,
        None => bail!(
            ErrorKind::StoreUnavailable,
            "Persisted dimension version is missing a timestamp field",
            name.to_string()
        ),
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => Ok(timestamp.with_timezone(&Utc)),
        Err(_) => bail!(
            ErrorKind::StoreUnavailable,
            "Persisted dimension version holds a malformed timestamp",
            format!("field '{name}' holds '{raw}'")
        ),
    }
}
