//! match, stringMatch, equal, equalRounded, inside, lt/gt/lte/gte,
//! durationLT/GTE and substring.

use std::cmp::Ordering;

use qti_core::{OperatorKind, RoundingMode, Scalar, Shape, ToleranceMode, Value};

use super::arithmetic::round_to;
use crate::error::EvalError;
use crate::operands::Operands;

fn require_single(ops: &Operands<'_>, operator: &'static str) -> Result<(), EvalError> {
    Operands::require(ops.exclusively_single(), operator, "single cardinality operands")
}

fn numbers(ops: &Operands<'_>, operator: &'static str) -> Result<Vec<f64>, EvalError> {
    require_single(ops, operator)?;
    Operands::require(ops.exclusively_numeric(), operator, "numeric operands")?;
    Ok(ops.iter().filter_map(Value::as_f64).collect())
}

/// Structural equality: same cardinality and base type required. Multiple
/// containers compare as bags, ordered ones as sequences.
pub fn match_values(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(ops.same_cardinality(), "match", "operands of the same cardinality")?;
    Operands::require(ops.same_base_type(), "match", "operands of the same baseType")?;
    Ok(Value::boolean(ops[0] == ops[1]))
}

/// With `substring`, true when the second string occurs in the first.
pub fn string_match(
    ops: Operands<'_>,
    case_sensitive: bool,
    substring: bool,
) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    require_single(&ops, "stringMatch")?;
    Operands::require(ops.exclusively_string(), "stringMatch", "string operands")?;
    let (mut a, mut b) = (
        ops[0].as_str().unwrap_or_default().to_string(),
        ops[1].as_str().unwrap_or_default().to_string(),
    );
    if !case_sensitive {
        a = a.to_lowercase();
        b = b.to_lowercase();
    }
    Ok(Value::boolean(if substring { a.contains(&b) } else { a == b }))
}

/// True when the first string occurs in the second.
pub fn substring(ops: Operands<'_>, case_sensitive: bool) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    require_single(&ops, "substring")?;
    Operands::require(ops.exclusively_string(), "substring", "string operands")?;
    let needle = ops[0].as_str().unwrap_or_default();
    let haystack = ops[1].as_str().unwrap_or_default();
    let found = if case_sensitive {
        haystack.contains(needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    };
    Ok(Value::boolean(found))
}

/// Numeric equality with an optional tolerance window around the first
/// operand. `tolerance` holds the resolved t0 and t1.
pub fn equal(
    ops: Operands<'_>,
    mode: ToleranceMode,
    tolerance: (f64, f64),
    include_lower_bound: bool,
    include_upper_bound: bool,
) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let n = numbers(&ops, "equal")?;
    let (x, y) = (n[0], n[1]);
    let (t0, t1) = tolerance;
    let (low, high) = match mode {
        ToleranceMode::Exact => return Ok(Value::boolean(x == y)),
        ToleranceMode::Absolute => (x - t0, x + t1),
        ToleranceMode::Relative => (x * (1.0 - t0 / 100.0), x * (1.0 + t1 / 100.0)),
    };
    let above = if include_lower_bound { y >= low } else { y > low };
    let below = if include_upper_bound { y <= high } else { y < high };
    Ok(Value::boolean(above && below))
}

pub fn equal_rounded(
    ops: Operands<'_>,
    mode: RoundingMode,
    figures: i64,
) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let n = numbers(&ops, "equalRounded")?;
    match (round_to(n[0], mode, figures), round_to(n[1], mode, figures)) {
        (Some(a), Some(b)) => Ok(Value::boolean(a == b)),
        _ => Ok(Value::Null),
    }
}

/// Whether any point of the operand lies in the shape.
pub fn inside(ops: Operands<'_>, shape: Shape, coords: &[i64]) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_single_or_multiple() || ops.exclusively_single_or_ordered(),
        "inside",
        "a single, multiple or ordered operand",
    )?;
    Operands::require(ops.exclusively_point(), "inside", "a point operand")?;
    let hit = match &ops[0] {
        Value::Single(Scalar::Point(p)) => shape.contains_point(coords, *p),
        Value::Multiple(c) | Value::Ordered(c) => c
            .iter()
            .filter_map(Scalar::as_point)
            .any(|p| shape.contains_point(coords, p)),
        _ => false,
    };
    Ok(Value::boolean(hit))
}

/// lt, gt, lte and gte.
pub fn numeric_compare(ops: Operands<'_>, kind: &OperatorKind) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let n = numbers(&ops, kind.name())?;
    let Some(ord) = n[0].partial_cmp(&n[1]) else {
        return Ok(Value::Null);
    };
    let result = match kind {
        OperatorKind::Lt => ord == Ordering::Less,
        OperatorKind::Gt => ord == Ordering::Greater,
        OperatorKind::Lte => ord != Ordering::Greater,
        _ => ord != Ordering::Less,
    };
    Ok(Value::boolean(result))
}

/// durationLT when `less` holds, durationGTE otherwise.
pub fn duration_compare(ops: Operands<'_>, less: bool) -> Result<Value, EvalError> {
    let operator = if less { "durationLT" } else { "durationGTE" };
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    require_single(&ops, operator)?;
    Operands::require(ops.exclusively_duration(), operator, "duration operands")?;
    let d: Vec<_> = ops
        .iter()
        .filter_map(|v| v.as_single().and_then(Scalar::as_duration))
        .collect();
    Ok(Value::boolean(if less { d[0] < d[1] } else { d[0] >= d[1] }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{BaseType, Point};
    use time::Duration;

    #[test]
    fn match_compares_containers_by_cardinality() {
        let a = Value::multiple(BaseType::Integer, vec![Scalar::Integer(1), Scalar::Integer(2)])
            .unwrap();
        let b = Value::multiple(BaseType::Integer, vec![Scalar::Integer(2), Scalar::Integer(1)])
            .unwrap();
        let ops = [a, b];
        assert_eq!(match_values(Operands::new(&ops)).unwrap(), Value::boolean(true));

        let mixed = [Value::integer(1), Value::float(1.0)];
        assert!(matches!(
            match_values(Operands::new(&mixed)),
            Err(EvalError::OperatorType { operator: "match", .. })
        ));
    }

    #[test]
    fn match_accepts_records() {
        let r = Value::record([("a", Some(Scalar::Integer(1)))]);
        let ops = [r.clone(), r];
        assert_eq!(match_values(Operands::new(&ops)).unwrap(), Value::boolean(true));
    }

    #[test]
    fn string_match_modes() {
        let ops = [Value::string("Hello World"), Value::string("world")];
        assert_eq!(
            string_match(Operands::new(&ops), false, true).unwrap(),
            Value::boolean(true)
        );
        assert_eq!(
            string_match(Operands::new(&ops), true, true).unwrap(),
            Value::boolean(false)
        );
        assert_eq!(
            string_match(Operands::new(&ops), false, false).unwrap(),
            Value::boolean(false)
        );
    }

    #[test]
    fn substring_looks_for_the_first_in_the_second() {
        let ops = [Value::string("lo W"), Value::string("Hello World")];
        assert_eq!(substring(Operands::new(&ops), true).unwrap(), Value::boolean(true));
        let ops = [Value::string("LO W"), Value::string("Hello World")];
        assert_eq!(substring(Operands::new(&ops), true).unwrap(), Value::boolean(false));
        assert_eq!(substring(Operands::new(&ops), false).unwrap(), Value::boolean(true));
    }

    #[test]
    fn equal_with_tolerance() {
        let ops = [Value::float(10.0), Value::float(10.5)];
        let exact = equal(Operands::new(&ops), ToleranceMode::Exact, (0.0, 0.0), true, true);
        assert_eq!(exact.unwrap(), Value::boolean(false));
        let abs = equal(Operands::new(&ops), ToleranceMode::Absolute, (1.0, 0.5), true, true);
        assert_eq!(abs.unwrap(), Value::boolean(true));
        let open = equal(Operands::new(&ops), ToleranceMode::Absolute, (1.0, 0.5), true, false);
        assert_eq!(open.unwrap(), Value::boolean(false));
        let rel = equal(Operands::new(&ops), ToleranceMode::Relative, (10.0, 10.0), true, true);
        assert_eq!(rel.unwrap(), Value::boolean(true));
    }

    #[test]
    fn equal_rounded_to_significant_figures() {
        let ops = [Value::float(3.175), Value::float(3.249)];
        assert_eq!(
            equal_rounded(Operands::new(&ops), RoundingMode::SignificantFigures, 2).unwrap(),
            Value::boolean(true)
        );
        assert_eq!(
            equal_rounded(Operands::new(&ops), RoundingMode::DecimalPlaces, 2).unwrap(),
            Value::boolean(false)
        );
    }

    #[test]
    fn inside_a_circle() {
        let ops = [Value::point(3, 3)];
        assert_eq!(
            inside(Operands::new(&ops), Shape::Circle, &[0, 0, 5]).unwrap(),
            Value::boolean(true)
        );
        let far = [Value::point(6, 6)];
        assert_eq!(
            inside(Operands::new(&far), Shape::Circle, &[0, 0, 5]).unwrap(),
            Value::boolean(false)
        );
        let wrong = [Value::integer(1)];
        assert!(inside(Operands::new(&wrong), Shape::Default, &[]).is_err());
        let many = [Value::multiple(
            BaseType::Point,
            vec![Scalar::Point(Point::new(9, 9)), Scalar::Point(Point::new(1, 1))],
        )
        .unwrap()];
        assert_eq!(
            inside(Operands::new(&many), Shape::Circle, &[0, 0, 5]).unwrap(),
            Value::boolean(true)
        );
    }

    #[test]
    fn ordering_comparisons_mix_integers_and_floats() {
        let ops = [Value::integer(2), Value::float(2.5)];
        assert_eq!(
            numeric_compare(Operands::new(&ops), &OperatorKind::Lt).unwrap(),
            Value::boolean(true)
        );
        assert_eq!(
            numeric_compare(Operands::new(&ops), &OperatorKind::Gte).unwrap(),
            Value::boolean(false)
        );
        let with_null = [Value::integer(2), Value::Null];
        assert_eq!(
            numeric_compare(Operands::new(&with_null), &OperatorKind::Gt).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn duration_comparisons() {
        let ops = [
            Value::duration(Duration::seconds(30)),
            Value::duration(Duration::seconds(60)),
        ];
        assert_eq!(duration_compare(Operands::new(&ops), true).unwrap(), Value::boolean(true));
        assert_eq!(duration_compare(Operands::new(&ops), false).unwrap(), Value::boolean(false));
    }
}
