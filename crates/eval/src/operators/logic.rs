//! and, or, not, anyN.

use qti_core::Value;

use crate::error::EvalError;
use crate::operands::Operands;

fn booleans(ops: &Operands<'_>, operator: &'static str) -> Result<Vec<bool>, EvalError> {
    Operands::require(ops.exclusively_single(), operator, "single cardinality operands")?;
    Operands::require(ops.exclusively_boolean(), operator, "boolean operands")?;
    Ok(ops.iter().filter_map(Value::as_bool).collect())
}

/// Null when any operand is null.
pub fn and(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let values = booleans(&ops, "and")?;
    Ok(Value::boolean(values.iter().all(|b| *b)))
}

/// Null when any operand is null.
pub fn or(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let values = booleans(&ops, "or")?;
    Ok(Value::boolean(values.iter().any(|b| *b)))
}

pub fn not(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let values = booleans(&ops, "not")?;
    Ok(Value::boolean(!values[0]))
}

/// True when between `min` and `max` operands are true. Null operands are
/// unknowns: the result is null when they could move the count across a
/// bound.
pub fn any_n(ops: Operands<'_>, min: i64, max: i64) -> Result<Value, EvalError> {
    let mut trues = 0i64;
    let mut nulls = 0i64;
    for v in ops.iter() {
        if v.is_null() {
            nulls += 1;
            continue;
        }
        match v {
            Value::Single(s) => match s.as_bool() {
                Some(true) => trues += 1,
                Some(false) => {}
                None => {
                    return Err(EvalError::OperatorType {
                        operator: "anyN",
                        constraint: "boolean operands".to_string(),
                    })
                }
            },
            _ => {
                return Err(EvalError::OperatorType {
                    operator: "anyN",
                    constraint: "single cardinality operands".to_string(),
                })
            }
        }
    }

    if trues > max || trues + nulls < min {
        Ok(Value::boolean(false))
    } else if trues >= min && trues + nulls <= max {
        Ok(Value::boolean(true))
    } else {
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(v: bool) -> Value {
        Value::boolean(v)
    }

    #[test]
    fn and_or_not() {
        let t = [b(true), b(true)];
        let f = [b(true), b(false)];
        assert_eq!(and(Operands::new(&t)).unwrap(), b(true));
        assert_eq!(and(Operands::new(&f)).unwrap(), b(false));
        assert_eq!(or(Operands::new(&f)).unwrap(), b(true));
        assert_eq!(not(Operands::new(&[b(true)])).unwrap(), b(false));
    }

    #[test]
    fn null_operands_propagate() {
        let ops = [b(false), Value::Null];
        assert_eq!(and(Operands::new(&ops)).unwrap(), Value::Null);
        assert_eq!(or(Operands::new(&ops)).unwrap(), Value::Null);
    }

    #[test]
    fn non_boolean_operands_are_type_errors() {
        let ops = [b(true), Value::integer(1)];
        assert!(matches!(
            and(Operands::new(&ops)),
            Err(EvalError::OperatorType { operator: "and", .. })
        ));
    }

    #[test]
    fn any_n_is_three_valued() {
        let ops = [b(true), b(true), Value::Null];
        // 2 or 3 true: within [2, 3] either way.
        assert_eq!(any_n(Operands::new(&ops), 2, 3).unwrap(), b(true));
        // 2 or 3 true: only 2 is within [1, 2].
        assert_eq!(any_n(Operands::new(&ops), 1, 2).unwrap(), Value::Null);
        // at most 3: never 4.
        assert_eq!(any_n(Operands::new(&ops), 4, 5).unwrap(), b(false));
        assert_eq!(any_n(Operands::new(&ops), 0, 1).unwrap(), b(false));
    }
}
