use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating warehouse declarations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("warehouse configuration declares no dimensions")]
    NoDimensions,

    #[error("duplicate {scope} name `{name}`")]
    DuplicateName { scope: &'static str, name: String },

    #[error("{scope} `{name}` has an empty `{field}`")]
    EmptyField {
        scope: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("dimension `{dimension}` declares an empty tracked attribute list")]
    EmptyTrackedList { dimension: String },

    #[error("fact `{fact}` references undeclared dimension `{dimension}`")]
    UnknownDimension { fact: String, dimension: String },

    #[error("fact `{fact}` declares duplicate reference role `{role}`")]
    DuplicateRole { fact: String, role: String },
}

/// How a dimension's history is maintained.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistorizationConfig {
    /// Type-2: attribute changes close the open version and insert a new one.
    Type2,
    /// Type-1: attribute changes overwrite the open version in place; the
    /// dimension keeps exactly one version per natural key.
    Overwrite,
}

impl Default for HistorizationConfig {
    fn default() -> Self {
        Self::Type2
    }
}

/// Target type of a declared fact measure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKindConfig {
    Int,
    Float,
    /// Exact decimal, for money amounts.
    Numeric,
    Text,
}

/// Declaration of one historized dimension.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// Dimension name; also the staging entity name.
    pub name: String,
    /// Staging column carrying the natural key.
    pub natural_key: String,
    /// Attributes whose changes open a new version. When absent, every
    /// non-key column is tracked.
    #[serde(default)]
    pub tracked: Option<Vec<String>>,
    #[serde(default)]
    pub historization: HistorizationConfig,
}

/// Declaration of one measure column on a fact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeasureConfig {
    pub name: String,
    pub kind: MeasureKindConfig,
}

/// Declaration of one dimension reference on a fact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Role the referenced dimension plays on this fact (e.g. `student`).
    pub role: String,
    /// Name of the referenced dimension.
    pub dimension: String,
    /// Staging column carrying the referenced entity's natural key.
    pub key_column: String,
}

/// Declaration of one fact source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FactConfig {
    /// Fact name; also the staging entity name.
    pub name: String,
    /// Staging column carrying the event's natural key.
    pub natural_key: String,
    /// Staging column carrying the event date.
    pub event_date: String,
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
    #[serde(default)]
    pub measures: Vec<MeasureConfig>,
}

/// Complete declaration of the warehouse to load: its dimensions and facts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub dimensions: Vec<DimensionConfig>,
    #[serde(default)]
    pub facts: Vec<FactConfig>,
}

impl WarehouseConfig {
    /// Validates warehouse declarations.
    ///
    /// Checks that names are present and unique, tracked attribute lists are
    /// not declared empty, and every fact reference points at a declared
    /// dimension.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dimensions.is_empty() {
            return Err(ValidationError::NoDimensions);
        }

        let mut dimension_names = Vec::new();
        for dimension in &self.dimensions {
            validate_name("dimension", &dimension.name, &mut dimension_names)?;
            require_field("dimension", &dimension.name, "natural_key", &dimension.natural_key)?;

            if let Some(tracked) = &dimension.tracked
                && tracked.is_empty()
            {
                return Err(ValidationError::EmptyTrackedList {
                    dimension: dimension.name.clone(),
                });
            }
        }

        let mut fact_names = Vec::new();
        for fact in &self.facts {
            validate_name("fact", &fact.name, &mut fact_names)?;
            require_field("fact", &fact.name, "natural_key", &fact.natural_key)?;
            require_field("fact", &fact.name, "event_date", &fact.event_date)?;

            let mut roles = Vec::new();
            for reference in &fact.references {
                if roles.contains(&reference.role) {
                    return Err(ValidationError::DuplicateRole {
                        fact: fact.name.clone(),
                        role: reference.role.clone(),
                    });
                }
                roles.push(reference.role.clone());

                if !dimension_names.contains(&reference.dimension) {
                    return Err(ValidationError::UnknownDimension {
                        fact: fact.name.clone(),
                        dimension: reference.dimension.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn validate_name(
    scope: &'static str,
    name: &str,
    seen: &mut Vec<String>,
) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyField {
            scope,
            name: name.to_string(),
            field: "name",
        });
    }

    if seen.contains(&name.to_string()) {
        return Err(ValidationError::DuplicateName {
            scope,
            name: name.to_string(),
        });
    }

    seen.push(name.to_string());
    Ok(())
}

fn require_field(
    scope: &'static str,
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            scope,
            name: name.to_string(),
            field,
        });
    }

    Ok(())
}
