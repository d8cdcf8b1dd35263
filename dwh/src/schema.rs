//! Warehouse schema declarations: which dimensions are historized, which
//! attributes are tracked, and how fact sources reference dimensions.
//!
//! Schemas are built from the shared configuration structs; construction
//! validates the declarations so the pipeline can assume they are coherent.

use dwh_config::shared::{
    DimensionConfig, FactConfig, HistorizationConfig, MeasureKindConfig, WarehouseConfig,
};

use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::types::RECORDED_AT_COLUMN;

/// How a dimension's history is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Historization {
    /// Attribute changes close the open version and insert a new one.
    Type2,
    /// Attribute changes overwrite the open version in place.
    Overwrite,
}

/// Target type of a declared fact measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    Int,
    Float,
    Numeric,
    Text,
}

/// Declaration of one historized dimension.
#[derive(Debug, Clone)]
pub struct DimensionSchema {
    pub name: String,
    /// Staging column carrying the natural key.
    pub natural_key: String,
    /// Attributes whose changes open a new version. [`None`] means every
    /// non-key business column is tracked.
    pub tracked: Option<Vec<String>>,
    pub historization: Historization,
}

impl DimensionSchema {
    pub fn type2(name: impl Into<String>, natural_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            natural_key: natural_key.into(),
            tracked: None,
            historization: Historization::Type2,
        }
    }

    pub fn overwrite(name: impl Into<String>, natural_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            natural_key: natural_key.into(),
            tracked: None,
            historization: Historization::Overwrite,
        }
    }

    pub fn with_tracked(mut self, tracked: Vec<String>) -> Self {
        self.tracked = Some(tracked);
        self
    }

    /// Returns whether a change to `column` opens a new version.
    ///
    /// The natural key identifies the entity and cannot change, and the row
    /// timestamp is snapshot envelope rather than a business attribute, so
    /// neither is ever tracked.
    pub fn is_tracked(&self, column: &str) -> bool {
        if column == self.natural_key || column == RECORDED_AT_COLUMN {
            return false;
        }

        match &self.tracked {
            Some(tracked) => tracked.iter().any(|tracked| tracked == column),
            None => true,
        }
    }
}

/// Declaration of one dimension reference on a fact.
#[derive(Debug, Clone)]
pub struct DimensionRef {
    /// Role the referenced dimension plays on this fact.
    pub role: String,
    /// Name of the referenced dimension.
    pub dimension: String,
    /// Staging column carrying the referenced entity's natural key.
    pub key_column: String,
}

/// Declaration of one measure column on a fact.
#[derive(Debug, Clone)]
pub struct MeasureColumn {
    pub name: String,
    pub kind: MeasureKind,
}

/// Declaration of one fact source.
#[derive(Debug, Clone)]
pub struct FactSchema {
    pub name: String,
    /// Staging column carrying the event's natural key, which is also the
    /// storage layer's deduplication key for this fact.
    pub natural_key: String,
    /// Staging column carrying the event date.
    pub event_date: String,
    pub references: Vec<DimensionRef>,
    pub measures: Vec<MeasureColumn>,
}

/// Complete declaration of the warehouse to load.
#[derive(Debug, Clone)]
pub struct WarehouseSchema {
    pub dimensions: Vec<DimensionSchema>,
    pub facts: Vec<FactSchema>,
}

impl TryFrom<&WarehouseConfig> for WarehouseSchema {
    type Error = crate::error::LoadError;

    fn try_from(config: &WarehouseConfig) -> LoadResult<Self> {
        config.validate().map_err(|err| {
            load_error!(
                ErrorKind::Config,
                "Warehouse configuration is invalid",
                err.to_string()
            )
        })?;

        Ok(Self {
            dimensions: config.dimensions.iter().map(DimensionSchema::from).collect(),
            facts: config.facts.iter().map(FactSchema::from).collect(),
        })
    }
}

impl From<&DimensionConfig> for DimensionSchema {
    fn from(config: &DimensionConfig) -> Self {
        Self {
            name: config.name.clone(),
            natural_key: config.natural_key.clone(),
            tracked: config.tracked.clone(),
            historization: match config.historization {
                HistorizationConfig::Type2 => Historization::Type2,
                HistorizationConfig::Overwrite => Historization::Overwrite,
            },
        }
    }
}

impl From<&FactConfig> for FactSchema {
    fn from(config: &FactConfig) -> Self {
        Self {
            name: config.name.clone(),
            natural_key: config.natural_key.clone(),
            event_date: config.event_date.clone(),
            references: config
                .references
                .iter()
                .map(|reference| DimensionRef {
                    role: reference.role.clone(),
                    dimension: reference.dimension.clone(),
                    key_column: reference.key_column.clone(),
                })
                .collect(),
            measures: config
                .measures
                .iter()
                .map(|measure| MeasureColumn {
                    name: measure.name.clone(),
                    kind: match measure.kind {
                        MeasureKindConfig::Int => MeasureKind::Int,
                        MeasureKindConfig::Float => MeasureKind::Float,
                        MeasureKindConfig::Numeric => MeasureKind::Numeric,
                        MeasureKindConfig::Text => MeasureKind::Text,
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_non_key_columns_tracked_by_default() {
        let schema = DimensionSchema::type2("students", "student_id");

        assert!(schema.is_tracked("grade"));
        assert!(schema.is_tracked("status"));
        assert!(!schema.is_tracked("student_id"));
        assert!(!schema.is_tracked(RECORDED_AT_COLUMN));
    }

    #[test]
    fn test_explicit_tracked_list_narrows_tracking() {
        let schema = DimensionSchema::type2("teachers", "teacher_id")
            .with_tracked(vec!["hourly_rate".to_string()]);

        assert!(schema.is_tracked("hourly_rate"));
        assert!(!schema.is_tracked("phone_number"));
    }

    #[test]
    fn test_invalid_config_is_rejected_at_conversion() {
        let config = WarehouseConfig {
            dimensions: vec![],
            facts: vec![],
        };

        let err = WarehouseSchema::try_from(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
