//! In-run dimension state.
//!
//! The pipeline never re-queries storage for rows it has written within the
//! same run: the storage layer's deduplication is an eventually consistent
//! background process, so read-your-own-write is satisfied from this in-memory
//! state instead. [`DimensionState`] is loaded once from persisted history at
//! run start and kept current by the merger as versions open and close.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::types::{DimensionVersion, NaturalKey, SurrogateKey};

/// All known versions of one dimension, grouped by natural key and ordered by
/// `valid_from`.
#[derive(Debug)]
pub struct DimensionState {
    name: String,
    versions: HashMap<NaturalKey, Vec<DimensionVersion>>,
}

impl DimensionState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: HashMap::new(),
        }
    }

    /// Builds state from raw persisted history.
    ///
    /// Persisted history is append-only, so it can contain several emissions of
    /// the same version row. This applies the storage layer's own
    /// latest-version-wins rule, keyed by `(natural_key, valid_from)` and
    /// ordered by the freshness marker, before grouping.
    pub fn from_history(name: impl Into<String>, history: Vec<DimensionVersion>) -> Self {
        let mut latest: HashMap<(NaturalKey, NaiveDate), DimensionVersion> = HashMap::new();
        for version in history {
            let key = (version.natural_key, version.valid_from);
            match latest.get(&key) {
                Some(existing) if existing.updated_at > version.updated_at => {}
                _ => {
                    latest.insert(key, version);
                }
            }
        }

        let mut state = Self::new(name);
        for version in latest.into_values() {
            state.upsert(version);
        }

        state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the currently open version of `natural_key`, if any.
    pub fn current(&self, natural_key: NaturalKey) -> Option<&DimensionVersion> {
        self.versions
            .get(&natural_key)?
            .iter()
            .rev()
            .find(|version| version.is_current)
    }

    /// Returns the version whose validity window contains `date`, if any.
    pub fn as_of(&self, natural_key: NaturalKey, date: NaiveDate) -> Option<&DimensionVersion> {
        self.versions
            .get(&natural_key)?
            .iter()
            .find(|version| version.contains(date))
    }

    /// Returns the earliest `valid_from` known for `natural_key`.
    pub fn earliest_valid_from(&self, natural_key: NaturalKey) -> Option<NaiveDate> {
        self.versions
            .get(&natural_key)?
            .first()
            .map(|version| version.valid_from)
    }

    /// Inserts a version, replacing any existing version of the same natural
    /// key with the same `valid_from`.
    pub fn upsert(&mut self, version: DimensionVersion) {
        let versions = self.versions.entry(version.natural_key).or_default();

        match versions.iter().position(|existing| existing.valid_from == version.valid_from) {
            Some(index) => versions[index] = version,
            None => {
                let index = versions
                    .iter()
                    .position(|existing| existing.valid_from > version.valid_from)
                    .unwrap_or(versions.len());
                versions.insert(index, version);
            }
        }
    }

    /// Returns `(natural key, surrogate key)` for every open version, used to
    /// seed the key registry's lookup index.
    pub fn open_keys(&self) -> Vec<(NaturalKey, SurrogateKey)> {
        self.versions
            .values()
            .flatten()
            .filter(|version| version.is_current)
            .map(|version| (version.natural_key, version.surrogate_key))
            .collect()
    }

    /// Returns every version, sorted by natural key then `valid_from`.
    pub fn all_versions(&self) -> Vec<DimensionVersion> {
        let mut keys: Vec<_> = self.versions.keys().copied().collect();
        keys.sort_unstable();

        keys.into_iter()
            .flat_map(|key| self.versions[&key].iter().cloned())
            .collect()
    }

    pub fn natural_key_count(&self) -> usize {
        self.versions.len()
    }

    pub fn version_count(&self) -> usize {
        self.versions.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, open_valid_to};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    fn date(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    fn version(
        surrogate_key: i64,
        natural_key: NaturalKey,
        valid_from: &str,
        valid_to: Option<&str>,
        updated_at: &str,
    ) -> DimensionVersion {
        DimensionVersion {
            surrogate_key: SurrogateKey::new(surrogate_key),
            natural_key,
            attributes: BTreeMap::from([("grade".to_string(), Cell::String("5A".to_string()))]),
            valid_from: date(valid_from),
            valid_to: valid_to.map(date).unwrap_or_else(open_valid_to),
            is_current: valid_to.is_none(),
            updated_at: updated_at.parse::<DateTime<Utc>>().unwrap(),
        }
    }

    #[test]
    fn test_from_history_applies_latest_version_wins() {
        // Two emissions of the same version row: the first opened it, the
        // second closed it in a later run.
        let opened = version(1, 55, "2024-01-01", None, "2024-01-01T06:00:00Z");
        let closed = version(1, 55, "2024-01-01", Some("2024-02-29"), "2024-03-01T06:00:00Z");
        let successor = version(2, 55, "2024-03-01", None, "2024-03-01T06:00:00Z");

        let state =
            DimensionState::from_history("students", vec![opened, closed.clone(), successor]);

        assert_eq!(state.version_count(), 2);
        assert_eq!(state.as_of(55, date("2024-02-01")), Some(&closed));
    }

    #[test]
    fn test_current_finds_the_open_version() {
        let state = DimensionState::from_history(
            "students",
            vec![
                version(1, 55, "2024-01-01", Some("2024-02-29"), "2024-03-01T06:00:00Z"),
                version(2, 55, "2024-03-01", None, "2024-03-01T06:00:00Z"),
            ],
        );

        assert_eq!(state.current(55).unwrap().surrogate_key, SurrogateKey::new(2));
        assert!(state.current(56).is_none());
    }

    #[test]
    fn test_upsert_keeps_versions_ordered() {
        let mut state = DimensionState::new("students");
        state.upsert(version(2, 55, "2024-03-01", None, "2024-03-01T06:00:00Z"));
        state.upsert(version(1, 55, "2024-01-01", Some("2024-02-29"), "2024-03-01T06:00:00Z"));

        assert_eq!(state.earliest_valid_from(55), Some(date("2024-01-01")));
        let versions = state.all_versions();
        assert_eq!(versions[0].surrogate_key, SurrogateKey::new(1));
        assert_eq!(versions[1].surrogate_key, SurrogateKey::new(2));
    }

    #[test]
    fn test_open_keys_lists_only_current_versions() {
        let state = DimensionState::from_history(
            "students",
            vec![
                version(1, 55, "2024-01-01", Some("2024-02-29"), "2024-03-01T06:00:00Z"),
                version(2, 55, "2024-03-01", None, "2024-03-01T06:00:00Z"),
                version(3, 56, "2024-01-01", None, "2024-01-01T06:00:00Z"),
            ],
        );

        let mut open = state.open_keys();
        open.sort_unstable();
        assert_eq!(
            open,
            vec![(55, SurrogateKey::new(2)), (56, SurrogateKey::new(3))]
        );
    }
}
