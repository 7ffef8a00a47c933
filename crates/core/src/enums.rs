//! QTI enumerations and their name tables.
//!
//! Names are the ones used by the QTI information model (`directedPair`,
//! `intOrIdentifier`, ...). The tables are immutable constants; lookups by
//! name are linear scans over a dozen entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ──────────────────────────────────────────────
// BaseType
// ──────────────────────────────────────────────

/// Primitive kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Boolean,
    Integer,
    Float,
    String,
    Identifier,
    Uri,
    IntOrIdentifier,
    Duration,
    Point,
    Pair,
    DirectedPair,
    File,
}

const BASE_TYPE_NAMES: [(&str, BaseType); 12] = [
    ("boolean", BaseType::Boolean),
    ("integer", BaseType::Integer),
    ("float", BaseType::Float),
    ("string", BaseType::String),
    ("identifier", BaseType::Identifier),
    ("uri", BaseType::Uri),
    ("intOrIdentifier", BaseType::IntOrIdentifier),
    ("duration", BaseType::Duration),
    ("point", BaseType::Point),
    ("pair", BaseType::Pair),
    ("directedPair", BaseType::DirectedPair),
    ("file", BaseType::File),
];

impl BaseType {
    /// Every base type, in declaration order.
    pub const ALL: [BaseType; 12] = [
        BaseType::Boolean,
        BaseType::Integer,
        BaseType::Float,
        BaseType::String,
        BaseType::Identifier,
        BaseType::Uri,
        BaseType::IntOrIdentifier,
        BaseType::Duration,
        BaseType::Point,
        BaseType::Pair,
        BaseType::DirectedPair,
        BaseType::File,
    ];

    /// Resolve a QTI base type name.
    pub fn from_name(name: &str) -> Result<BaseType, ModelError> {
        BASE_TYPE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, bt)| *bt)
            .ok_or_else(|| ModelError::UnknownBaseType(name.to_string()))
    }

    /// The QTI name of this base type.
    pub fn name(self) -> &'static str {
        BASE_TYPE_NAMES
            .iter()
            .find(|(_, bt)| *bt == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    /// Integer and float.
    pub fn is_numeric(self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────────────────────────────────
// Cardinality
// ──────────────────────────────────────────────

/// Shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
    Record,
}

const CARDINALITY_NAMES: [(&str, Cardinality); 4] = [
    ("single", Cardinality::Single),
    ("multiple", Cardinality::Multiple),
    ("ordered", Cardinality::Ordered),
    ("record", Cardinality::Record),
];

impl Cardinality {
    pub fn from_name(name: &str) -> Result<Cardinality, ModelError> {
        CARDINALITY_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
            .ok_or_else(|| ModelError::UnknownCardinality(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        CARDINALITY_NAMES
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    /// Multiple and ordered hold a homogeneous sequence of scalars.
    pub fn is_container(self) -> bool {
        matches!(self, Cardinality::Multiple | Cardinality::Ordered)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────────────────────────────────
// Test structure enumerations
// ──────────────────────────────────────────────

/// How a candidate may move between the items of a test part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationMode {
    #[default]
    Linear,
    NonLinear,
}

/// When responses of a test part are submitted for response processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionMode {
    #[default]
    Individual,
    Simultaneous,
}

impl NavigationMode {
    pub fn from_name(name: &str) -> Result<NavigationMode, ModelError> {
        match name {
            "linear" => Ok(NavigationMode::Linear),
            "nonlinear" => Ok(NavigationMode::NonLinear),
            other => Err(ModelError::UnknownConstant {
                kind: "navigationMode",
                name: other.to_string(),
            }),
        }
    }
}

impl SubmissionMode {
    pub fn from_name(name: &str) -> Result<SubmissionMode, ModelError> {
        match name {
            "individual" => Ok(SubmissionMode::Individual),
            "simultaneous" => Ok(SubmissionMode::Simultaneous),
            other => Err(ModelError::UnknownConstant {
                kind: "submissionMode",
                name: other.to_string(),
            }),
        }
    }
}
