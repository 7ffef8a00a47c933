//! Response mappings and outcome lookup tables.

use qti_core::{AreaMapping, LookupTable, MapEntry, Mapping, Scalar, Value};

use crate::error::EvalError;
use crate::variable::{Variable, VariableKind};

fn clamp(sum: f64, lower: Option<f64>, upper: Option<f64>) -> f64 {
    let sum = lower.map_or(sum, |l| sum.max(l));
    upper.map_or(sum, |u| sum.min(u))
}

fn key_matches(entry: &MapEntry, value: &Scalar) -> bool {
    match (&entry.map_key, value) {
        (Scalar::String(k), Scalar::String(v)) if !entry.case_sensitive => {
            k.to_lowercase() == v.to_lowercase()
        }
        (Scalar::Integer(k), Scalar::Float(v)) => (*k as f64) == *v,
        (k, v) => k == v,
    }
}

/// Map one scalar; `None` when no entry matches.
fn map_scalar(mapping: &Mapping, value: &Scalar) -> Option<f64> {
    mapping
        .entries
        .iter()
        .find(|e| key_matches(e, value))
        .map(|e| e.mapped_value)
}

/// Apply a mapping to a response value.
///
/// A single value maps to its entry (or the default). Each distinct
/// element of a container is mapped once and the results are summed.
/// Null maps to the default. The sum is clamped to the bounds.
pub fn apply_mapping(mapping: &Mapping, value: &Value) -> Result<f64, String> {
    if value.is_null() {
        return Ok(clamp(
            mapping.default_value,
            mapping.lower_bound,
            mapping.upper_bound,
        ));
    }
    let sum = match value {
        Value::Single(s) => map_scalar(mapping, s).unwrap_or(mapping.default_value),
        Value::Multiple(c) | Value::Ordered(c) => {
            let mut distinct: Vec<&Scalar> = Vec::new();
            for s in c.iter() {
                if !distinct.contains(&s) {
                    distinct.push(s);
                }
            }
            distinct
                .into_iter()
                .map(|s| map_scalar(mapping, s).unwrap_or(mapping.default_value))
                .sum()
        }
        _ => return Err("record responses cannot be mapped".to_string()),
    };
    Ok(clamp(sum, mapping.lower_bound, mapping.upper_bound))
}

/// Apply an area mapping to a point response. Every area containing at
/// least one point contributes once; no hit at all yields the default.
pub fn apply_area_mapping(mapping: &AreaMapping, value: &Value) -> Result<f64, String> {
    let points: Vec<_> = match value {
        v if v.is_null() => Vec::new(),
        Value::Single(Scalar::Point(p)) => vec![*p],
        Value::Multiple(c) | Value::Ordered(c) => c.iter().filter_map(Scalar::as_point).collect(),
        other => return Err(format!("expected point responses, found {}", other.describe())),
    };
    let mut hit = false;
    let mut sum = 0.0;
    for entry in &mapping.entries {
        if points
            .iter()
            .any(|p| entry.shape.contains_point(&entry.coords, *p))
        {
            hit = true;
            sum += entry.mapped_value;
        }
    }
    let sum = if hit { sum } else { mapping.default_value };
    Ok(clamp(sum, mapping.lower_bound, mapping.upper_bound))
}

fn response_only(v: &Variable, expression: &'static str) -> Result<(), EvalError> {
    if v.kind == VariableKind::Response {
        Ok(())
    } else {
        Err(EvalError::Declaration {
            expression,
            identifier: v.identifier.clone(),
            message: format!("{} variables cannot be mapped", v.kind),
        })
    }
}

pub fn map_response(v: &Variable) -> Result<Value, EvalError> {
    response_only(v, "mapResponse")?;
    let mapping = v.mapping.as_ref().ok_or_else(|| EvalError::Declaration {
        expression: "mapResponse",
        identifier: v.identifier.clone(),
        message: "no mapping declared".to_string(),
    })?;
    apply_mapping(mapping, &v.value)
        .map(Value::float)
        .map_err(|message| EvalError::Declaration {
            expression: "mapResponse",
            identifier: v.identifier.clone(),
            message,
        })
}

pub fn map_response_point(v: &Variable) -> Result<Value, EvalError> {
    response_only(v, "mapResponsePoint")?;
    let mapping = v.area_mapping.as_ref().ok_or_else(|| EvalError::Declaration {
        expression: "mapResponsePoint",
        identifier: v.identifier.clone(),
        message: "no areaMapping declared".to_string(),
    })?;
    apply_area_mapping(mapping, &v.value)
        .map(Value::float)
        .map_err(|message| EvalError::Declaration {
            expression: "mapResponsePoint",
            identifier: v.identifier.clone(),
            message,
        })
}

/// Translate `value` through a lookup table. Null and unmatched values
/// take the table default, which may itself be absent.
pub fn lookup(table: &LookupTable, value: &Value) -> Result<Option<Scalar>, String> {
    if value.is_null() {
        return Ok(table.default_value().cloned());
    }
    match table {
        LookupTable::Match {
            entries,
            default_value,
        } => {
            let source = value
                .as_i64()
                .ok_or_else(|| format!("a matchTable needs a single integer, found {}", value.describe()))?;
            Ok(entries
                .iter()
                .find(|e| e.source_value == source)
                .map(|e| e.target_value.clone())
                .or_else(|| default_value.clone()))
        }
        LookupTable::Interpolation {
            entries,
            default_value,
        } => {
            let source = value.as_f64().ok_or_else(|| {
                format!(
                    "an interpolationTable needs a single numeric, found {}",
                    value.describe()
                )
            })?;
            Ok(entries
                .iter()
                .find(|e| {
                    if e.include_boundary {
                        source >= e.source_value
                    } else {
                        source > e.source_value
                    }
                })
                .map(|e| e.target_value.clone())
                .or_else(|| default_value.clone()))
        }
    }
}
