//! Construction-time errors of the component tree.
//!
//! Every variant is a configuration error: the tree handed to the runtime
//! is malformed. They are raised before any evaluation starts and are never
//! retried.

use crate::rule::ProcessingKind;
use crate::shape::Shape;

/// A malformed component tree or an unknown enumeration constant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown baseType '{0}'")]
    UnknownBaseType(String),

    #[error("unknown cardinality '{0}'")]
    UnknownCardinality(String),

    #[error("unknown shape '{0}'")]
    UnknownShape(String),

    /// Any other enumeration (math function, rounding mode, ...).
    #[error("unknown {kind} '{name}'")]
    UnknownConstant { kind: &'static str, name: String },

    #[error("operator '{operator}' expects {expected} operand(s), {got} given")]
    Arity {
        operator: &'static str,
        expected: String,
        got: usize,
    },

    #[error("'{component}' is missing mandatory attribute '{attribute}'")]
    MissingAttribute {
        component: String,
        attribute: &'static str,
    },

    #[error("invalid attribute '{attribute}' on '{component}': {message}")]
    InvalidAttribute {
        component: String,
        attribute: &'static str,
        message: String,
    },

    #[error("{count} coordinate(s) do not describe a {shape}")]
    InvalidCoords { shape: Shape, count: usize },

    #[error("rule '{rule}' is not allowed in {pass}")]
    RuleNotAllowed {
        rule: &'static str,
        pass: ProcessingKind,
    },

    #[error("a mapping must contain at least one entry, none given")]
    EmptyMapping,

    #[error("value {value} is not compliant with the '{expected}' {what}")]
    NotCompliant {
        expected: String,
        what: &'static str,
        value: String,
    },

    #[error("invalid declaration of '{identifier}': {message}")]
    InvalidDeclaration { identifier: String, message: String },

    #[error("identifier '{identifier}' is declared more than once in {scope}")]
    DuplicateIdentifier { identifier: String, scope: String },
}
