//! Runtime errors.
//!
//! One enum per layer: `EvalError` for expression evaluation, `RuleError`
//! for rule processing, `SelectionError` for route building and
//! `NavigationError` for session transitions. `Error` unifies them for
//! hosts that do not care which layer failed. Validity failures are not
//! errors; see [`crate::validity::ValidityReport`] and
//! [`crate::session::MoveReport`].

use std::fmt;

use qti_core::ModelError;

use crate::config::ConfigError;
use crate::variable::VariableKind;

/// Failure class of the pattern engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFailure {
    /// The pattern is not a valid regular expression.
    Malformed,
    /// The compiled program exceeds the configured size limit.
    SizeLimitExceeded,
    /// The pattern nests deeper than the configured limit.
    NestLimitExceeded,
    /// Any other engine failure.
    Internal,
}

impl fmt::Display for PatternFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternFailure::Malformed => "malformed pattern",
            PatternFailure::SizeLimitExceeded => "size limit exceeded",
            PatternFailure::NestLimitExceeded => "nest limit exceeded",
            PatternFailure::Internal => "internal engine error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Operands violate the operator's cardinality or base type contract.
    #[error("operator '{operator}' requires {constraint}")]
    OperatorType {
        operator: &'static str,
        constraint: String,
    },

    #[error("cannot compile pattern '{pattern}' ({kind}): {message}")]
    PatternCompilation {
        pattern: String,
        kind: PatternFailure,
        message: String,
    },

    #[error("no variable '{0}' in scope")]
    UnknownVariable(String),

    #[error("'{expression}' can only be evaluated in the context of a test")]
    NoTestContext { expression: &'static str },

    /// An attribute given as a variable reference did not resolve to a
    /// usable value.
    #[error("attribute '{attribute}' of '{component}' references '{identifier}': {message}")]
    AttributeReference {
        component: &'static str,
        attribute: &'static str,
        identifier: String,
        message: String,
    },

    /// The expression needs declaration data the variable does not carry
    /// (a mapping, a correct response, a response variable).
    #[error("'{expression}' cannot use variable '{identifier}': {message}")]
    Declaration {
        expression: &'static str,
        identifier: String,
        message: String,
    },

    #[error("integer overflow in '{operator}'")]
    Overflow { operator: &'static str },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("{rule} failed: {source}")]
    Evaluation {
        rule: &'static str,
        target: Option<String>,
        source: EvalError,
    },

    #[error("{rule} cannot assign {actual} to '{identifier}', declared {expected}")]
    TypeMismatch {
        rule: &'static str,
        identifier: String,
        expected: String,
        actual: String,
    },

    #[error("{rule} guard must be a single boolean, got {actual}")]
    GuardType { rule: &'static str, actual: String },

    #[error("{rule} targets undeclared variable '{identifier}'")]
    UnknownTarget {
        rule: &'static str,
        identifier: String,
    },

    #[error("{rule} cannot target {kind} variable '{identifier}'")]
    WrongTargetKind {
        rule: &'static str,
        identifier: String,
        kind: VariableKind,
    },

    #[error("outcome '{identifier}' declares no lookup table")]
    MissingLookupTable { identifier: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("section '{section}' selects {requested} of {available} eligible children without replacement")]
    NotEnoughChildren {
        section: String,
        requested: usize,
        available: usize,
    },

    #[error("section '{section}' has {required} required children but selects only {requested}")]
    TooManyRequired {
        section: String,
        required: usize,
        requested: usize,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("illegal transition '{operation}' while the session is {state}")]
    IllegalTransition {
        operation: &'static str,
        state: String,
    },

    #[error("no route item at position {position} (route has {len})")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("position {position} is outside the current test part '{part}'")]
    OutsideTestPart { position: usize, part: String },

    #[error("'{operation}' is not allowed in linear test part '{part}'")]
    LinearMode {
        operation: &'static str,
        part: String,
    },

    #[error("item '{item}' allows {max_attempts} attempt(s), all used")]
    AttemptLimit { item: String, max_attempts: u32 },

    #[error("item '{item}' may not be skipped")]
    SkippingForbidden { item: String },

    #[error("pre-conditions of '{item}' do not hold")]
    PreConditionFailed { item: String },

    #[error("invalid responses for item '{item}': {violations:?}")]
    InvalidResponses {
        item: String,
        violations: Vec<String>,
    },

    #[error("cannot bind response '{identifier}' of item '{item}': {message}")]
    ResponseBinding {
        item: String,
        identifier: String,
        message: String,
    },

    #[error("branch from '{from}' to '{target}' rejected: {message}")]
    BranchTarget {
        from: String,
        target: String,
        message: String,
    },

    #[error("snapshot does not match the test definition: {message}")]
    SnapshotMismatch { message: String },

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Any engine error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
