//! Surrogate key allocation and lookup.
//!
//! The registry tracks, per dimension, the highest surrogate key ever issued
//! and which key identifies the currently open version of each natural key.
//! Counters are derived state: they are re-seeded from the persisted maximum at
//! every run start and are never authoritative on their own.

use std::collections::HashMap;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{NaturalKey, SurrogateKey};

/// Per-dimension surrogate key counters and open-version index.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    /// Highest key issued per dimension, including persisted history.
    counters: HashMap<String, SurrogateKey>,
    /// Surrogate key of the currently open version per natural key.
    open_keys: HashMap<(String, NaturalKey), SurrogateKey>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a dimension's counter from the persisted maximum and indexes the
    /// open versions loaded from the store.
    ///
    /// Must be called before any allocation for the dimension. The caller is
    /// responsible for failing the run if the persisted maximum could not be
    /// read; seeding from a guessed value would risk key collisions.
    pub fn seed_dimension(
        &mut self,
        dimension: &str,
        persisted_max: Option<SurrogateKey>,
        open: impl IntoIterator<Item = (NaturalKey, SurrogateKey)>,
    ) {
        self.counters.insert(
            dimension.to_string(),
            persisted_max.unwrap_or(SurrogateKey::new(0)),
        );

        for (natural_key, surrogate_key) in open {
            self.open_keys
                .insert((dimension.to_string(), natural_key), surrogate_key);
        }
    }

    /// Allocates a fresh surrogate key, strictly greater than any previously
    /// issued for `dimension`.
    ///
    /// Fails with a fatal [`ErrorKind::KeyAllocation`] error when the dimension
    /// was never seeded: allocating from an unseeded counter could reissue a
    /// persisted key, which is a correctness violation rather than a
    /// recoverable condition.
    pub fn allocate(&mut self, dimension: &str) -> LoadResult<SurrogateKey> {
        let Some(counter) = self.counters.get_mut(dimension) else {
            bail!(
                ErrorKind::KeyAllocation,
                "Surrogate key counter was never seeded",
                dimension.to_string()
            );
        };

        *counter = counter.next();
        Ok(*counter)
    }

    /// Returns the surrogate key of the currently open version of
    /// `natural_key`, if any.
    pub fn lookup(&self, dimension: &str, natural_key: NaturalKey) -> Option<SurrogateKey> {
        self.open_keys
            .get(&(dimension.to_string(), natural_key))
            .copied()
    }

    /// Records that `surrogate_key` now identifies the open version of
    /// `natural_key`. Called by the merger whenever a version opens or an open
    /// version is superseded.
    pub fn record_open(
        &mut self,
        dimension: &str,
        natural_key: NaturalKey,
        surrogate_key: SurrogateKey,
    ) {
        self.open_keys
            .insert((dimension.to_string(), natural_key), surrogate_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_monotonic_from_seed() {
        let mut registry = KeyRegistry::new();
        registry.seed_dimension("students", Some(SurrogateKey::new(7)), []);

        assert_eq!(registry.allocate("students").unwrap(), SurrogateKey::new(8));
        assert_eq!(registry.allocate("students").unwrap(), SurrogateKey::new(9));
    }

    #[test]
    fn test_empty_dimension_allocates_from_one() {
        let mut registry = KeyRegistry::new();
        registry.seed_dimension("students", None, []);

        assert_eq!(registry.allocate("students").unwrap(), SurrogateKey::new(1));
    }

    #[test]
    fn test_unseeded_allocation_fails_loudly() {
        let mut registry = KeyRegistry::new();

        let err = registry.allocate("students").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyAllocation);
    }

    #[test]
    fn test_counters_are_independent_per_dimension() {
        let mut registry = KeyRegistry::new();
        registry.seed_dimension("students", Some(SurrogateKey::new(10)), []);
        registry.seed_dimension("teachers", None, []);

        assert_eq!(registry.allocate("teachers").unwrap(), SurrogateKey::new(1));
        assert_eq!(registry.allocate("students").unwrap(), SurrogateKey::new(11));
    }

    #[test]
    fn test_lookup_follows_the_open_version() {
        let mut registry = KeyRegistry::new();
        registry.seed_dimension("students", Some(SurrogateKey::new(1)), [(55, SurrogateKey::new(1))]);

        assert_eq!(registry.lookup("students", 55), Some(SurrogateKey::new(1)));
        assert_eq!(registry.lookup("students", 56), None);

        let replacement = registry.allocate("students").unwrap();
        registry.record_open("students", 55, replacement);
        assert_eq!(registry.lookup("students", 55), Some(replacement));
    }
}
