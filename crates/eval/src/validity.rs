//! Response validity.
//!
//! Validity is data, not an error: a failed constraint lands in a
//! [`ValidityReport`] and the caller decides whether it blocks a
//! transition. Only a pattern mask that cannot be compiled is an error.

use std::fmt;

use qti_core::{
    AssessmentItem, AssociationValidityConstraint, ResponseValidityConstraint, Scalar, Value,
};

use crate::error::EvalError;
use crate::operators::PatternCache;
use crate::variable::State;

/// Record field holding the raw text of a string-interaction response.
const STRING_VALUE_FIELD: &str = "stringValue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    TooFewResponses {
        response: String,
        min: usize,
        count: usize,
    },
    TooManyResponses {
        response: String,
        max: usize,
        count: usize,
    },
    PatternMask {
        response: String,
        pattern: String,
    },
    Association {
        response: String,
        choice: String,
        min: usize,
        max: usize,
        count: usize,
    },
    /// The constraint names a response the item does not declare.
    UnknownResponse { response: String },
    /// A time limit's minimum was not reached when leaving.
    MinTimeNotReached {
        component: String,
        required: time::Duration,
        spent: time::Duration,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TooFewResponses {
                response,
                min,
                count,
            } => write!(f, "'{}' needs at least {} response(s), got {}", response, min, count),
            Violation::TooManyResponses {
                response,
                max,
                count,
            } => write!(f, "'{}' allows at most {} response(s), got {}", response, max, count),
            Violation::PatternMask { response, pattern } => {
                write!(f, "'{}' does not match pattern mask '{}'", response, pattern)
            }
            Violation::Association {
                response,
                choice,
                min,
                max,
                count,
            } => write!(
                f,
                "'{}' associates '{}' {} time(s), allowed {}..{}",
                response,
                choice,
                count,
                min,
                if *max == 0 { "*".to_string() } else { max.to_string() }
            ),
            Violation::UnknownResponse { response } => {
                write!(f, "no response variable '{}'", response)
            }
            Violation::MinTimeNotReached {
                component,
                required,
                spent,
            } => write!(
                f,
                "'{}' requires at least {} seconds, {} spent",
                component,
                required.whole_seconds(),
                spent.whole_seconds()
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityReport {
    pub violations: Vec<Violation>,
}

impl ValidityReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    pub fn merge(&mut self, other: ValidityReport) {
        self.violations.extend(other.violations);
    }
}

/// How many responses a value counts as. A non-empty record is one
/// response even though it has no cardinality.
pub fn response_count(value: &Value) -> usize {
    if value.is_null() {
        return 0;
    }
    match value {
        Value::Single(_) => 1,
        Value::Multiple(c) | Value::Ordered(c) => c.len(),
        Value::Record(_) => 1,
        Value::Null => 0,
    }
}

/// Whether `value` satisfies `constraint`.
pub fn is_response_valid(
    value: &Value,
    constraint: &ResponseValidityConstraint,
    patterns: &mut PatternCache,
) -> Result<bool, EvalError> {
    let mut report = ValidityReport::default();
    check(value, constraint, patterns, &mut report)?;
    Ok(report.is_valid())
}

/// Check every validity constraint of `item` against its current
/// responses.
pub fn check_item(
    item: &AssessmentItem,
    state: &State,
    patterns: &mut PatternCache,
) -> Result<ValidityReport, EvalError> {
    let mut report = ValidityReport::default();
    for constraint in &item.validity_constraints {
        match state.value(&constraint.response_identifier) {
            Some(value) => check(value, constraint, patterns, &mut report)?,
            None => report.violations.push(Violation::UnknownResponse {
                response: constraint.response_identifier.clone(),
            }),
        }
    }
    Ok(report)
}

fn check(
    value: &Value,
    constraint: &ResponseValidityConstraint,
    patterns: &mut PatternCache,
    report: &mut ValidityReport,
) -> Result<(), EvalError> {
    let response = &constraint.response_identifier;
    let count = response_count(value);
    if count < constraint.min_constraint {
        report.violations.push(Violation::TooFewResponses {
            response: response.clone(),
            min: constraint.min_constraint,
            count,
        });
    }
    if constraint.max_constraint != 0 && count > constraint.max_constraint {
        report.violations.push(Violation::TooManyResponses {
            response: response.clone(),
            max: constraint.max_constraint,
            count,
        });
    }

    // No values, nothing to match: the counts alone decide.
    let values = string_values(value);
    if let Some(mask) = constraint.pattern_mask.as_deref().filter(|_| !values.is_empty()) {
        let mask = strip_anchors(mask);
        let regex = patterns.get(mask)?;
        let ok = values.iter().all(|s| regex.is_match(s));
        if !ok {
            report.violations.push(Violation::PatternMask {
                response: response.clone(),
                pattern: mask.to_string(),
            });
        }
    }

    for association in &constraint.associations {
        check_association(value, response, association, report);
    }
    Ok(())
}

/// Masks are often authored with explicit anchors; patterns are anchored
/// anyway.
fn strip_anchors(mask: &str) -> &str {
    let mask = mask.strip_prefix('^').unwrap_or(mask);
    mask.strip_suffix('$').unwrap_or(mask)
}

fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::Single(s) => s.as_str().into_iter().collect(),
        Value::Multiple(c) | Value::Ordered(c) => c.iter().filter_map(Scalar::as_str).collect(),
        Value::Record(r) => r
            .get(STRING_VALUE_FIELD)
            .and_then(Scalar::as_str)
            .into_iter()
            .collect(),
        Value::Null => Vec::new(),
    }
}

fn check_association(
    value: &Value,
    response: &str,
    association: &AssociationValidityConstraint,
    report: &mut ValidityReport,
) {
    let pairs: Vec<&Scalar> = match value {
        Value::Single(s) => vec![s],
        Value::Multiple(c) | Value::Ordered(c) => c.iter().collect(),
        _ => Vec::new(),
    };
    let choice = association.identifier.as_str();
    let count = pairs
        .iter()
        .map(|s| match s {
            Scalar::Pair(p) => usize::from(p.first == choice) + usize::from(p.second == choice),
            Scalar::DirectedPair(p) => {
                usize::from(p.source == choice) + usize::from(p.target == choice)
            }
            _ => 0,
        })
        .sum::<usize>();
    let too_few = count < association.min_constraint;
    let too_many = association.max_constraint != 0 && count > association.max_constraint;
    if too_few || too_many {
        report.violations.push(Violation::Association {
            response: response.to_string(),
            choice: choice.to_string(),
            min: association.min_constraint,
            max: association.max_constraint,
            count,
        });
    }
}
