use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{Cell, DateKey, NaturalKey, SurrogateKey};

/// One reconciled warehouse fact row, ready for append-only emission.
///
/// Dimension references are resolved surrogate keys, each the key valid for the
/// referenced entity at the fact's event date. The row is re-emitted every run
/// it is observed in staging; the storage layer's latest-version-wins rule,
/// keyed by the fact natural key and ordered by `loaded_at`, collapses repeated
/// emissions to one visible row.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub fact_key: NaturalKey,
    pub date_key: DateKey,
    /// Resolved surrogate keys by declared reference role.
    pub dimension_keys: BTreeMap<String, SurrogateKey>,
    pub measures: BTreeMap<String, Cell>,
    /// Freshness marker for the storage layer's deduplication.
    pub loaded_at: DateTime<Utc>,
}

impl FactRow {
    /// Encodes this fact row as one JSON object for append-only emission.
    pub fn to_json(&self) -> serde_json::Value {
        let dimension_keys: serde_json::Map<String, serde_json::Value> = self
            .dimension_keys
            .iter()
            .map(|(role, key)| (role.clone(), serde_json::json!(key.get())))
            .collect();
        let measures: serde_json::Map<String, serde_json::Value> = self
            .measures
            .iter()
            .map(|(column, cell)| (column.clone(), cell.to_json()))
            .collect();

        serde_json::json!({
            "fact_key": self.fact_key,
            "date_key": self.date_key,
            "dimension_keys": dimension_keys,
            "measures": measures,
            "loaded_at": self.loaded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }
}
