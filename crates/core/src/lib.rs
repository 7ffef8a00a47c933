#![allow(clippy::result_large_err)]
//! qti-core: typed QTI component tree and runtime value model.
//!
//! The tree is what the runtime consumes: variable declarations,
//! expression and rule trees, items and the part/section structure of a
//! test. Parsing it from XML is someone else's job; hosts build it
//! directly or through a marshalling layer.
//!
//! # Public API
//!
//! - [`Value`], [`Scalar`], [`Container`], [`Record`] -- runtime values
//! - [`is_base_type_compliant`], [`infer_base_type`], [`infer_cardinality`]
//! - [`Expression`], [`OperatorKind`] -- expression trees
//! - [`Rule`], [`ProcessingKind`] -- rule trees
//! - [`AssessmentItem`], [`AssessmentTest`] and the structure in between
//! - [`ModelError`] -- construction-time errors

pub mod assessment;
pub mod declaration;
pub mod enums;
pub mod error;
pub mod expression;
pub mod rule;
pub mod shape;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use assessment::{
    AssessmentItem, AssessmentItemRef, AssessmentSection, AssessmentTest, BranchRule,
    ItemSessionControl, Ordering, SectionPart, Selection, TestPart, TimeLimits, Weight,
    EXIT_SECTION, EXIT_TEST, EXIT_TESTPART,
};
pub use declaration::{
    AreaMapEntry, AreaMapping, AssociationValidityConstraint, InterpolationTableEntry,
    LookupTable, MapEntry, Mapping, MatchTableEntry, OutcomeDeclaration, ResponseDeclaration,
    ResponseValidityConstraint, TemplateDeclaration,
};
pub use enums::{BaseType, Cardinality, NavigationMode, SubmissionMode};
pub use error::ModelError;
pub use expression::{
    check_figures, Arity, Expression, FloatOrVariableRef, IntegerOrVariableRef, ItemSubset,
    MathConstant, MathFunction, Operator, OperatorKind, RoundingMode, StatsFunction, ToleranceMode,
};
pub use rule::{Condition, ConditionalBranch, ExitKind, ProcessingKind, Rule};
pub use shape::Shape;
pub use value::{
    infer_base_type, infer_cardinality, is_base_type_compliant, is_base_type_compliant_named,
    is_declaration_compliant, is_scalar_compliant, Container, DirectedPair, Pair, Point,
    QtiFile, Record, Scalar, Value,
};
