//! Variable declarations, mappings, lookup tables and response validity
//! constraints.

use crate::enums::{BaseType, Cardinality};
use crate::error::ModelError;
use crate::shape::Shape;
use crate::value::{is_declaration_compliant, Scalar, Value};

/// Identifier of the built-in response variable counting attempts.
pub const NUM_ATTEMPTS: &str = "numAttempts";
/// Identifier of the built-in duration response variable (item and test).
pub const DURATION: &str = "duration";
/// Identifier of the built-in completion status outcome.
pub const COMPLETION_STATUS: &str = "completionStatus";

pub const COMPLETION_NOT_ATTEMPTED: &str = "not_attempted";
pub const COMPLETION_UNKNOWN: &str = "unknown";
pub const COMPLETION_COMPLETED: &str = "completed";
pub const COMPLETION_INCOMPLETE: &str = "incomplete";

fn check_shape(
    identifier: &str,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: Option<&Value>,
    what: &str,
) -> Result<(), ModelError> {
    match (cardinality, base_type) {
        (Cardinality::Record, Some(_)) => {
            return Err(ModelError::InvalidDeclaration {
                identifier: identifier.to_string(),
                message: "record variables have no baseType".to_string(),
            })
        }
        (Cardinality::Single | Cardinality::Multiple | Cardinality::Ordered, None) => {
            return Err(ModelError::InvalidDeclaration {
                identifier: identifier.to_string(),
                message: format!("{} variables require a baseType", cardinality),
            })
        }
        _ => {}
    }
    if let Some(value) = value {
        if !is_declaration_compliant(cardinality, base_type, value) {
            return Err(ModelError::InvalidDeclaration {
                identifier: identifier.to_string(),
                message: format!(
                    "{} {} is not a {} {}",
                    what,
                    value,
                    cardinality,
                    base_type.map(BaseType::name).unwrap_or("record")
                ),
            });
        }
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Response declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub map_key: Scalar,
    pub mapped_value: f64,
    /// Only relevant to string keys.
    pub case_sensitive: bool,
}

impl MapEntry {
    pub fn new(map_key: Scalar, mapped_value: f64) -> Self {
        MapEntry {
            map_key,
            mapped_value,
            case_sensitive: true,
        }
    }
}

/// Maps response values onto floats for `mapResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub entries: Vec<MapEntry>,
    pub default_value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

impl Mapping {
    pub fn new(entries: Vec<MapEntry>) -> Result<Self, ModelError> {
        if entries.is_empty() {
            return Err(ModelError::EmptyMapping);
        }
        Ok(Mapping {
            entries,
            default_value: 0.0,
            lower_bound: None,
            upper_bound: None,
        })
    }

    pub fn with_default(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaMapEntry {
    pub shape: Shape,
    pub coords: Vec<i64>,
    pub mapped_value: f64,
}

/// Maps point responses onto floats by area, for `mapResponsePoint`.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaMapping {
    pub entries: Vec<AreaMapEntry>,
    pub default_value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

impl AreaMapping {
    pub fn new(entries: Vec<AreaMapEntry>) -> Result<Self, ModelError> {
        if entries.is_empty() {
            return Err(ModelError::EmptyMapping);
        }
        for e in &entries {
            e.shape.validate_coords(&e.coords)?;
        }
        Ok(AreaMapping {
            entries,
            default_value: 0.0,
            lower_bound: None,
            upper_bound: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub default_value: Option<Value>,
    pub correct_response: Option<Value>,
    pub mapping: Option<Mapping>,
    pub area_mapping: Option<AreaMapping>,
}

impl ResponseDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        ResponseDeclaration {
            identifier: identifier.into(),
            cardinality,
            base_type,
            default_value: None,
            correct_response: None,
            mapping: None,
            area_mapping: None,
        }
    }

    pub fn with_correct(mut self, value: Value) -> Self {
        self.correct_response = Some(value);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_area_mapping(mut self, area_mapping: AreaMapping) -> Self {
        self.area_mapping = Some(area_mapping);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_shape(
            &self.identifier,
            self.cardinality,
            self.base_type,
            self.default_value.as_ref(),
            "default value",
        )?;
        check_shape(
            &self.identifier,
            self.cardinality,
            self.base_type,
            self.correct_response.as_ref(),
            "correct response",
        )?;
        if let Some(mapping) = &self.mapping {
            if mapping.entries.is_empty() {
                return Err(ModelError::EmptyMapping);
            }
        }
        if self.area_mapping.is_some() && self.base_type != Some(BaseType::Point) {
            return Err(ModelError::InvalidDeclaration {
                identifier: self.identifier.clone(),
                message: "an areaMapping requires a point response".to_string(),
            });
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Outcome declarations and lookup tables
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MatchTableEntry {
    pub source_value: i64,
    pub target_value: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationTableEntry {
    /// Lower threshold of the entry.
    pub source_value: f64,
    /// Whether a value equal to the threshold maps to this entry.
    pub include_boundary: bool,
    pub target_value: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupTable {
    /// Exact integer matches.
    Match {
        entries: Vec<MatchTableEntry>,
        default_value: Option<Scalar>,
    },
    /// Entries are tried in order; the first whose threshold the value
    /// exceeds (or reaches, when the boundary is included) wins.
    Interpolation {
        entries: Vec<InterpolationTableEntry>,
        default_value: Option<Scalar>,
    },
}

impl LookupTable {
    pub fn default_value(&self) -> Option<&Scalar> {
        match self {
            LookupTable::Match { default_value, .. }
            | LookupTable::Interpolation { default_value, .. } => default_value.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub default_value: Option<Value>,
    pub lookup_table: Option<LookupTable>,
    pub normal_minimum: Option<f64>,
    pub normal_maximum: Option<f64>,
}

impl OutcomeDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        OutcomeDeclaration {
            identifier: identifier.into(),
            cardinality,
            base_type,
            default_value: None,
            lookup_table: None,
            normal_minimum: None,
            normal_maximum: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_lookup_table(mut self, table: LookupTable) -> Self {
        self.lookup_table = Some(table);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_shape(
            &self.identifier,
            self.cardinality,
            self.base_type,
            self.default_value.as_ref(),
            "default value",
        )?;
        if self.lookup_table.is_some() && self.cardinality != Cardinality::Single {
            return Err(ModelError::InvalidDeclaration {
                identifier: self.identifier.clone(),
                message: "a lookup table requires a single cardinality outcome".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDeclaration {
    pub identifier: String,
    pub cardinality: Cardinality,
    pub base_type: Option<BaseType>,
    pub default_value: Option<Value>,
}

impl TemplateDeclaration {
    pub fn new(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        TemplateDeclaration {
            identifier: identifier.into(),
            cardinality,
            base_type,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_shape(
            &self.identifier,
            self.cardinality,
            self.base_type,
            self.default_value.as_ref(),
            "default value",
        )
    }
}

// ──────────────────────────────────────────────
// Response validity
// ──────────────────────────────────────────────

/// Bounds on how often one choice identifier may appear across the pairs
/// of an association response.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationValidityConstraint {
    pub identifier: String,
    pub min_constraint: usize,
    /// 0 means unbounded.
    pub max_constraint: usize,
}

/// Validity rule bound to one response variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseValidityConstraint {
    pub response_identifier: String,
    pub min_constraint: usize,
    /// 0 means unbounded.
    pub max_constraint: usize,
    pub pattern_mask: Option<String>,
    pub associations: Vec<AssociationValidityConstraint>,
}

impl ResponseValidityConstraint {
    pub fn new(response_identifier: impl Into<String>, min: usize, max: usize) -> Self {
        ResponseValidityConstraint {
            response_identifier: response_identifier.into(),
            min_constraint: min,
            max_constraint: max,
            pattern_mask: None,
            associations: Vec::new(),
        }
    }

    pub fn with_pattern_mask(mut self, pattern: impl Into<String>) -> Self {
        self.pattern_mask = Some(pattern.into());
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let component = format!("responseValidityConstraint({})", self.response_identifier);
        if self.max_constraint != 0 && self.min_constraint > self.max_constraint {
            return Err(ModelError::InvalidAttribute {
                component,
                attribute: "minConstraint",
                message: format!(
                    "{} is greater than maxConstraint {}",
                    self.min_constraint, self.max_constraint
                ),
            });
        }
        for a in &self.associations {
            if a.max_constraint != 0 && a.min_constraint > a.max_constraint {
                return Err(ModelError::InvalidAttribute {
                    component: format!("associationValidityConstraint({})", a.identifier),
                    attribute: "minConstraint",
                    message: format!(
                        "{} is greater than maxConstraint {}",
                        a.min_constraint, a.max_constraint
                    ),
                });
            }
        }
        Ok(())
    }
}
