#![allow(clippy::result_large_err)]
//! qti-eval: the QTI runtime.
//!
//! Evaluates expression trees against variable stores, runs template,
//! response and outcome processing, builds the route of a test by
//! selection and ordering, and drives a candidate through it.
//!
//! # Public API
//!
//! - [`evaluate`], [`EvalContext`], [`Environment`] -- expressions
//! - [`ProcessingEngine`] -- rule processing for one processing pass
//! - [`check_item`], [`ValidityReport`] -- response validity
//! - [`Route`] -- the ordered sequence of item occurrences of a test
//! - [`TestSession`], [`ItemSession`] -- navigation and attempts
//! - [`SessionSnapshot`] -- serializable session state
//! - [`EngineConfig`] -- seed, iteration and pattern limits
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod error;
pub mod expression;
pub mod mapping;
pub mod operands;
pub mod operators;
pub mod route;
pub mod rules;
pub mod selection;
pub mod session;
pub mod validity;
pub mod variable;

// ── Convenience re-exports ───────────────────────────────────────────

pub use config::{ConfigError, EngineConfig};
pub use error::{Error, EvalError, NavigationError, PatternFailure, RuleError, SelectionError};
pub use expression::{evaluate, Environment, EvalContext, ExpressionEngine, ItemView, TestScope};
pub use operators::{round_to, translate_xsd_pattern, PatternCache};
pub use route::{Route, RouteEntry, RouteItem};
pub use rules::{Flow, ProcessingEngine};
pub use session::{
    ItemSession, ItemSessionState, LimitLevel, MoveReport, SessionSnapshot, SessionState,
    TestSession, TimeLimitExit,
};
pub use validity::{check_item, ValidityReport, Violation};
pub use variable::{State, Variable, VariableKind};
