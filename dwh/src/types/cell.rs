use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::LoadResult;
use crate::types::DATE_FORMAT;

/// A single typed attribute or measure value.
///
/// Staging snapshots arrive untyped, so cells decoded from JSON only ever use
/// the `Null`, `Bool`, `I64`, `F64`, and `String` variants. The richer variants
/// are produced by the engine itself when a schema declares a typed measure
/// (`Numeric` for money) or when the engine stamps dates and timestamps onto
/// emitted rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Returns whether this cell holds no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Decodes a cell from a JSON scalar.
    ///
    /// Numbers that fit an `i64` decode as [`Cell::I64`], all other numbers as
    /// [`Cell::F64`]. Nested arrays and objects are rejected: staging rows are
    /// flat by contract, so nesting means the snapshot is malformed.
    pub fn from_json(value: &serde_json::Value) -> LoadResult<Cell> {
        let cell = match value {
            serde_json::Value::Null => Cell::Null,
            serde_json::Value::Bool(value) => Cell::Bool(*value),
            serde_json::Value::Number(value) => match value.as_i64() {
                Some(value) => Cell::I64(value),
                None => Cell::F64(value.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Cell::String(value.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                crate::bail!(
                    crate::error::ErrorKind::SnapshotMalformed,
                    "Staging cell holds a nested value",
                    value.to_string()
                )
            }
        };

        Ok(cell)
    }

    /// Encodes this cell as a JSON scalar.
    ///
    /// `Numeric`, `Date`, and `Timestamp` cells encode as strings; non-finite
    /// floats have no JSON representation and encode as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(value) => serde_json::Value::Bool(*value),
            Cell::I64(value) => serde_json::Value::Number((*value).into()),
            Cell::F64(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Numeric(value) => serde_json::Value::String(value.to_string()),
            Cell::String(value) => serde_json::Value::String(value.clone()),
            Cell::Date(value) => {
                serde_json::Value::String(value.format(DATE_FORMAT).to_string())
            }
            Cell::Timestamp(value) => {
                serde_json::Value::String(value.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}
