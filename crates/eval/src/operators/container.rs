//! Container operators.
//!
//! multiple, ordered and repeat ignore null operands and collapse to null
//! when nothing is left. Every result container is homogeneous.

use qti_core::{BaseType, Container, Scalar, Value};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::EvalError;
use crate::operands::Operands;

/// Declared base type of the first container operand, else the run-time
/// base type of the first scalar.
fn result_base_type(ops: &Operands<'_>) -> Option<BaseType> {
    ops.iter()
        .find_map(|v| v.as_container().map(Container::base_type))
        .or_else(|| ops.iter().find_map(|v| v.as_single().map(Scalar::base_type)))
}

fn collect(ops: &Operands<'_>) -> Vec<Scalar> {
    let mut out = Vec::new();
    for v in ops.iter() {
        match v {
            Value::Single(s) => out.push(s.clone()),
            Value::Multiple(c) | Value::Ordered(c) => out.extend(c.iter().cloned()),
            _ => {}
        }
    }
    out
}

fn build(
    ops: &Operands<'_>,
    ordered: bool,
    scalars: Vec<Scalar>,
) -> Result<Value, EvalError> {
    let Some(base_type) = result_base_type(ops) else {
        return Ok(Value::Null);
    };
    if scalars.is_empty() {
        return Ok(Value::Null);
    }
    let container = Container::with_values(base_type, scalars)?;
    Ok(if ordered {
        Value::Ordered(container)
    } else {
        Value::Multiple(container)
    })
}

fn gather(ops: Operands<'_>, ordered: bool) -> Result<Value, EvalError> {
    let operator = if ordered { "ordered" } else { "multiple" };
    let present: Vec<Value> = ops.iter().filter(|v| !v.is_null()).cloned().collect();
    let present = Operands::new(&present);
    if present.is_empty() {
        return Ok(Value::Null);
    }
    let shape_ok = if ordered {
        present.exclusively_single_or_ordered()
    } else {
        present.exclusively_single_or_multiple()
    };
    let constraint = if ordered {
        "single or ordered operands"
    } else {
        "single or multiple operands"
    };
    Operands::require(shape_ok, operator, constraint)?;
    Operands::require(present.same_base_type(), operator, "operands of the same base type")?;
    build(&present, ordered, collect(&present))
}

pub fn multiple(ops: Operands<'_>) -> Result<Value, EvalError> {
    gather(ops, false)
}

pub fn ordered(ops: Operands<'_>) -> Result<Value, EvalError> {
    gather(ops, true)
}

/// Number of values in the container; 0 for null.
pub fn container_size(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::integer(0));
    }
    Operands::require(
        ops.exclusively_multiple_or_ordered(),
        "containerSize",
        "a multiple or ordered operand",
    )?;
    let len = ops[0].as_container().map_or(0, Container::len);
    Ok(Value::integer(len as i64))
}

pub fn is_null(ops: Operands<'_>) -> Result<Value, EvalError> {
    Ok(Value::boolean(ops[0].is_null()))
}

/// The n-th value (1-based) of an ordered container; null out of range.
pub fn index(ops: Operands<'_>, n: i64) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        matches!(ops[0], Value::Ordered(_)),
        "index",
        "an ordered operand",
    )?;
    let picked = usize::try_from(n - 1)
        .ok()
        .and_then(|i| ops[0].as_container().and_then(|c| c.values().get(i)));
    Ok(picked.cloned().map(Value::Single).unwrap_or_default())
}

/// A record field; null when the field is absent or null.
pub fn field_value(ops: Operands<'_>, field: &str) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(ops.exclusively_record(), "fieldValue", "a record operand")?;
    let value = ops[0].as_record().and_then(|r| r.get(field)).cloned();
    Ok(value.map(Value::Single).unwrap_or_default())
}

/// A uniformly drawn value of the container.
pub fn random(ops: Operands<'_>, rng: &mut StdRng) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_multiple_or_ordered(),
        "random",
        "a multiple or ordered operand",
    )?;
    let values = ops[0].as_container().map(Container::values).unwrap_or_default();
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let i = rng.gen_range(0..values.len());
    Ok(Value::Single(values[i].clone()))
}

fn single_and_container(ops: &Operands<'_>, operator: &'static str) -> Result<(), EvalError> {
    Operands::require(
        matches!(ops[0], Value::Single(_))
            && matches!(ops[1], Value::Multiple(_) | Value::Ordered(_)),
        operator,
        "a single operand followed by a multiple or ordered one",
    )?;
    Operands::require(ops.same_base_type(), operator, "operands of the same base type")
}

/// Whether the first operand occurs in the container.
pub fn member(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    single_and_container(&ops, "member")?;
    let (Some(needle), Some(haystack)) = (ops[0].as_single(), ops[1].as_container()) else {
        return Ok(Value::Null);
    };
    Ok(Value::boolean(haystack.contains(needle)))
}

/// The container without any occurrence of the first operand.
pub fn delete(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    single_and_container(&ops, "delete")?;
    let (Some(needle), Some(haystack)) = (ops[0].as_single(), ops[1].as_container()) else {
        return Ok(Value::Null);
    };
    let kept: Vec<Scalar> = haystack.iter().filter(|s| *s != needle).cloned().collect();
    if kept.is_empty() {
        return Ok(Value::Null);
    }
    let container = Container::with_values(haystack.base_type(), kept)?;
    Ok(match ops[1] {
        Value::Ordered(_) => Value::Ordered(container),
        _ => Value::Multiple(container),
    })
}

/// Multiple: every value of the second occurs in the first at least as
/// often. Ordered: the second is a contiguous run of the first.
pub fn contains(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_multiple_or_ordered() && ops.same_cardinality(),
        "contains",
        "two multiple or two ordered operands",
    )?;
    Operands::require(ops.same_base_type(), "contains", "operands of the same base type")?;
    let (Some(outer), Some(inner)) = (ops[0].as_container(), ops[1].as_container()) else {
        return Ok(Value::Null);
    };
    let found = match ops[0] {
        Value::Ordered(_) => outer
            .values()
            .windows(inner.len())
            .any(|w| w == inner.values()),
        _ => inner.iter().all(|s| outer.count(s) >= inner.count(s)),
    };
    Ok(Value::boolean(found))
}

/// The operands concatenated `n` times into an ordered container; null
/// when `n` is below 1.
pub fn repeat(ops: Operands<'_>, n: i64) -> Result<Value, EvalError> {
    if n < 1 {
        return Ok(Value::Null);
    }
    let present: Vec<Value> = ops.iter().filter(|v| !v.is_null()).cloned().collect();
    let present = Operands::new(&present);
    if present.is_empty() {
        return Ok(Value::Null);
    }
    Operands::require(
        present.exclusively_single_or_ordered(),
        "repeat",
        "single or ordered operands",
    )?;
    Operands::require(present.same_base_type(), "repeat", "operands of the same base type")?;
    let once = collect(&present);
    let mut all = Vec::new();
    for _ in 0..n {
        all.extend(once.iter().cloned());
    }
    build(&present, true, all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ints(ordered: bool, xs: &[i64]) -> Value {
        let scalars = xs.iter().map(|x| Scalar::Integer(*x)).collect();
        if ordered {
            Value::ordered(BaseType::Integer, scalars).unwrap()
        } else {
            Value::multiple(BaseType::Integer, scalars).unwrap()
        }
    }

    #[test]
    fn multiple_flattens_and_skips_nulls() {
        let values = [Value::integer(1), Value::Null, ints(false, &[2, 3])];
        assert_eq!(multiple(Operands::new(&values)).unwrap(), ints(false, &[1, 2, 3]));
        assert_eq!(multiple(Operands::new(&[Value::Null])).unwrap(), Value::Null);
        let mixed = [Value::integer(1), Value::string("a")];
        assert!(multiple(Operands::new(&mixed)).is_err());
    }

    #[test]
    fn ordered_rejects_multiple_operands() {
        let values = [ints(false, &[1])];
        assert!(ordered(Operands::new(&values)).is_err());
    }

    #[test]
    fn container_size_of_null_is_zero() {
        assert_eq!(container_size(Operands::new(&[Value::Null])).unwrap(), Value::integer(0));
        assert_eq!(
            container_size(Operands::new(&[ints(true, &[4, 5])])).unwrap(),
            Value::integer(2)
        );
    }

    #[test]
    fn index_out_of_range_is_null() {
        let values = [ints(true, &[4, 5, 6])];
        assert_eq!(index(Operands::new(&values), 2).unwrap(), Value::integer(5));
        assert_eq!(index(Operands::new(&values), 4).unwrap(), Value::Null);
    }

    #[test]
    fn field_values() {
        let values = [Value::record([
            ("a", Some(Scalar::Integer(1))),
            ("b", None),
        ])];
        assert_eq!(field_value(Operands::new(&values), "a").unwrap(), Value::integer(1));
        assert_eq!(field_value(Operands::new(&values), "b").unwrap(), Value::Null);
        assert_eq!(field_value(Operands::new(&values), "c").unwrap(), Value::Null);
    }

    #[test]
    fn random_draws_a_member() {
        let mut rng = StdRng::seed_from_u64(1);
        let values = [ints(false, &[7, 8, 9])];
        for _ in 0..20 {
            let v = random(Operands::new(&values), &mut rng).unwrap();
            assert!(matches!(v.as_i64(), Some(7..=9)));
        }
    }

    #[test]
    fn member_and_delete() {
        let values = [Value::integer(2), ints(false, &[1, 2, 2, 3])];
        assert_eq!(member(Operands::new(&values)).unwrap(), Value::boolean(true));
        assert_eq!(delete(Operands::new(&values)).unwrap(), ints(false, &[1, 3]));
        let only = [Value::integer(2), ints(true, &[2, 2])];
        assert_eq!(delete(Operands::new(&only)).unwrap(), Value::Null);
    }

    #[test]
    fn contains_is_bag_or_run() {
        let bag = [ints(false, &[1, 2, 2, 3]), ints(false, &[2, 2])];
        assert_eq!(contains(Operands::new(&bag)).unwrap(), Value::boolean(true));
        let too_many = [ints(false, &[1, 2]), ints(false, &[2, 2])];
        assert_eq!(contains(Operands::new(&too_many)).unwrap(), Value::boolean(false));

        let run = [ints(true, &[1, 2, 3]), ints(true, &[2, 3])];
        assert_eq!(contains(Operands::new(&run)).unwrap(), Value::boolean(true));
        let gap = [ints(true, &[1, 2, 3]), ints(true, &[1, 3])];
        assert_eq!(contains(Operands::new(&gap)).unwrap(), Value::boolean(false));

        let mixed = [ints(true, &[1]), ints(false, &[1])];
        assert!(contains(Operands::new(&mixed)).is_err());
    }

    #[test]
    fn repeat_concatenates() {
        let values = [Value::integer(1), ints(true, &[2])];
        assert_eq!(repeat(Operands::new(&values), 2).unwrap(), ints(true, &[1, 2, 1, 2]));
        assert_eq!(repeat(Operands::new(&values), 0).unwrap(), Value::Null);
    }
}
