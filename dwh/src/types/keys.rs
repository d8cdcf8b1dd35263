use std::fmt;

/// Stable business-system identifier for a dimension entity or fact event,
/// constant across all versions of the entity.
pub type NaturalKey = i64;

/// Warehouse-internal identifier for one dimension version.
///
/// Surrogate keys are allocated per dimension, strictly monotonically, and are
/// never reused, including after the version they identify is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurrogateKey(i64);

impl SurrogateKey {
    pub fn new(key: i64) -> Self {
        Self(key)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Returns the key issued after this one.
    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
