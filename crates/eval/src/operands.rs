//! Operand gating predicates.
//!
//! Operators check their already-evaluated operands against these before
//! running. A null operand (including an empty container) never satisfies
//! a type predicate, so operators must decide on null propagation first.
//! Non-empty records satisfy `same_base_type` and `same_cardinality` among
//! themselves even though they have neither.

use std::ops::Deref;

use qti_core::{BaseType, Scalar, Value};

use crate::error::EvalError;

#[derive(Debug, Clone, Copy)]
pub struct Operands<'a> {
    values: &'a [Value],
}

impl<'a> Operands<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Operands { values }
    }

    pub fn contains_null(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }

    fn all(&self, f: impl Fn(&Value) -> bool) -> bool {
        self.values.iter().all(|v| !v.is_null() && f(v))
    }

    pub fn exclusively_single(&self) -> bool {
        self.all(|v| matches!(v, Value::Single(_)))
    }

    pub fn exclusively_multiple_or_ordered(&self) -> bool {
        self.all(|v| matches!(v, Value::Multiple(_) | Value::Ordered(_)))
    }

    pub fn exclusively_single_or_multiple(&self) -> bool {
        self.all(|v| matches!(v, Value::Single(_) | Value::Multiple(_)))
    }

    pub fn exclusively_single_or_ordered(&self) -> bool {
        self.all(|v| matches!(v, Value::Single(_) | Value::Ordered(_)))
    }

    pub fn exclusively_record(&self) -> bool {
        self.all(|v| matches!(v, Value::Record(_)))
    }

    pub fn anything_but_record(&self) -> bool {
        self.all(|v| !matches!(v, Value::Record(_)))
    }

    fn all_scalars(&self, f: impl Fn(&Scalar) -> bool) -> bool {
        self.all(|v| match v {
            Value::Single(s) => f(s),
            Value::Multiple(c) | Value::Ordered(c) => c.iter().all(&f),
            _ => false,
        })
    }

    pub fn exclusively_boolean(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::Boolean(_)))
    }

    pub fn exclusively_integer(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::Integer(_)))
    }

    pub fn exclusively_numeric(&self) -> bool {
        self.all_scalars(Scalar::is_numeric)
    }

    /// Strings, identifiers and URIs.
    pub fn exclusively_string(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::String(_)))
    }

    pub fn exclusively_point(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::Point(_)))
    }

    pub fn exclusively_duration(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::Duration(_)))
    }

    /// Pairs or directed pairs.
    pub fn exclusively_pair(&self) -> bool {
        self.all_scalars(|s| matches!(s, Scalar::Pair(_) | Scalar::DirectedPair(_)))
    }

    pub fn same_base_type(&self) -> bool {
        if self.exclusively_record() {
            return true;
        }
        let mut kinds = self.values.iter().map(value_kind);
        match kinds.next() {
            Some(Some(first)) => kinds.all(|k| k == Some(first)),
            Some(None) => false,
            None => true,
        }
    }

    pub fn same_cardinality(&self) -> bool {
        if self.contains_null() {
            return false;
        }
        let mut shapes = self.values.iter().map(std::mem::discriminant);
        match shapes.next() {
            Some(first) => shapes.all(|s| s == first),
            None => true,
        }
    }

    /// Fail with an `OperatorType` error unless `ok` holds.
    pub fn require(ok: bool, operator: &'static str, constraint: &str) -> Result<(), EvalError> {
        if ok {
            Ok(())
        } else {
            Err(EvalError::OperatorType {
                operator,
                constraint: constraint.to_string(),
            })
        }
    }
}

impl Deref for Operands<'_> {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        self.values
    }
}

/// The run-time base type shared by every scalar of a non-null value.
/// Records and mixed containers have none.
pub fn value_kind(value: &Value) -> Option<BaseType> {
    if value.is_null() {
        return None;
    }
    match value {
        Value::Single(s) => Some(s.base_type()),
        Value::Multiple(c) | Value::Ordered(c) => {
            let mut kinds = c.iter().map(Scalar::base_type);
            let first = kinds.next()?;
            kinds.all(|k| k == first).then_some(first)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::Container;

    fn ints(values: &[i64]) -> Value {
        Value::Multiple(
            Container::with_values(
                BaseType::Integer,
                values.iter().map(|i| Scalar::Integer(*i)).collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn nulls_never_satisfy_type_predicates() {
        let values = [Value::integer(1), Value::Null];
        let ops = Operands::new(&values);
        assert!(ops.contains_null());
        assert!(!ops.exclusively_single());
        assert!(!ops.exclusively_integer());

        let empty = [Value::Multiple(Container::new(BaseType::Integer))];
        assert!(!Operands::new(&empty).exclusively_multiple_or_ordered());
    }

    #[test]
    fn numeric_covers_integers_and_floats_in_containers() {
        let values = [Value::float(1.5), ints(&[1, 2])];
        let ops = Operands::new(&values);
        assert!(ops.exclusively_numeric());
        assert!(!ops.exclusively_integer());
        assert!(ops.exclusively_single_or_multiple());
        assert!(!ops.same_cardinality());
    }

    #[test]
    fn records_share_base_type_and_cardinality() {
        let values = [
            Value::record([("a", Some(Scalar::Integer(1)))]),
            Value::record([("b", Some(Scalar::String("x".into())))]),
        ];
        let ops = Operands::new(&values);
        assert!(ops.same_base_type());
        assert!(ops.same_cardinality());
        assert!(!ops.anything_but_record());
    }

    #[test]
    fn same_base_type_compares_runtime_kinds() {
        let values = [Value::integer(1), ints(&[3])];
        assert!(Operands::new(&values).same_base_type());
        let mixed = [Value::integer(1), Value::float(1.0)];
        assert!(!Operands::new(&mixed).same_base_type());
    }
}
