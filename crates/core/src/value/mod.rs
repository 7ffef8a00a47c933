//! Runtime value model.
//!
//! A `Value` is null, a single scalar, a multiple/ordered container or a
//! record. Null semantics follow QTI: the empty string, an empty container
//! and a record without fields are all null.

mod container;
mod scalar;

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Duration;

pub use container::{Container, Record};
pub use scalar::{is_identifier, is_uri, DirectedPair, Pair, Point, QtiFile, Scalar};

use crate::enums::{BaseType, Cardinality};
use crate::error::ModelError;

/// A runtime value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "cardinality", content = "value", rename_all = "camelCase")]
pub enum Value {
    #[default]
    Null,
    Single(Scalar),
    Multiple(Container),
    Ordered(Container),
    Record(Record),
}

impl Value {
    pub fn boolean(b: bool) -> Value {
        Value::Single(Scalar::Boolean(b))
    }

    pub fn integer(i: i64) -> Value {
        Value::Single(Scalar::Integer(i))
    }

    pub fn float(f: f64) -> Value {
        Value::Single(Scalar::Float(f))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Single(Scalar::String(s.into()))
    }

    /// Identifiers are carried as strings.
    pub fn identifier(s: impl Into<String>) -> Value {
        Value::string(s)
    }

    pub fn duration(d: Duration) -> Value {
        Value::Single(Scalar::Duration(d))
    }

    pub fn point(x: i64, y: i64) -> Value {
        Value::Single(Scalar::Point(Point::new(x, y)))
    }

    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> Value {
        Value::Single(Scalar::Pair(Pair::new(first, second)))
    }

    pub fn directed_pair(source: impl Into<String>, target: impl Into<String>) -> Value {
        Value::Single(Scalar::DirectedPair(DirectedPair::new(source, target)))
    }

    pub fn multiple(base_type: BaseType, values: Vec<Scalar>) -> Result<Value, ModelError> {
        Ok(Value::Multiple(Container::with_values(base_type, values)?))
    }

    pub fn ordered(base_type: BaseType, values: Vec<Scalar>) -> Result<Value, ModelError> {
        Ok(Value::Ordered(Container::with_values(base_type, values)?))
    }

    pub fn record<I, K>(fields: I) -> Value
    where
        I: IntoIterator<Item = (K, Option<Scalar>)>,
        K: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// QTI null: `Null`, the empty string, an empty container or an empty record.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Single(s) => s.is_null(),
            Value::Multiple(c) | Value::Ordered(c) => c.is_empty(),
            Value::Record(r) => r.is_empty(),
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        infer_cardinality(self)
    }

    pub fn base_type(&self) -> Option<BaseType> {
        infer_base_type(self)
    }

    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            Value::Single(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_single().and_then(Scalar::as_bool)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_single().and_then(Scalar::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_single().and_then(Scalar::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_single().and_then(Scalar::as_str)
    }

    /// The container of a multiple or ordered value.
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Multiple(c) | Value::Ordered(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Short shape description for error messages, e.g. `multiple integer`.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Single(s) => format!("single {}", s.base_type()),
            Value::Multiple(c) => format!("multiple {}", c.base_type()),
            Value::Ordered(c) => format!("ordered {}", c.base_type()),
            Value::Record(_) => "record".to_string(),
        }
    }
}

/// QTI equality: multiple containers compare as bags, ordered containers
/// as sequences. Any two null values are equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() && other.is_null() {
            return true;
        }
        match (self, other) {
            (Value::Single(a), Value::Single(b)) => a == b,
            (Value::Multiple(a), Value::Multiple(b)) => a.bag_eq(b),
            (Value::Ordered(a), Value::Ordered(b)) => a.seq_eq(b),
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Single(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Single(s) => write!(f, "{}", s),
            Value::Multiple(c) | Value::Ordered(c) => {
                let open = if matches!(self, Value::Ordered(_)) { '<' } else { '[' };
                let close = if open == '<' { '>' } else { ']' };
                write!(f, "{}", open)?;
                for (i, v) in c.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "{}", close)
            }
            Value::Record(r) => {
                f.write_str("{")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    match v {
                        Some(v) => write!(f, "{}: {}", k, v)?,
                        None => write!(f, "{}: NULL", k)?,
                    }
                }
                f.write_str("}")
            }
        }
    }
}

// ──────────────────────────────────────────────
// Compliance and inference
// ──────────────────────────────────────────────

/// Whether `scalar` may be held by a value of `base_type`.
pub fn is_scalar_compliant(base_type: BaseType, scalar: &Scalar) -> bool {
    match base_type {
        BaseType::Boolean => matches!(scalar, Scalar::Boolean(_)),
        BaseType::Integer => matches!(scalar, Scalar::Integer(_)),
        BaseType::Float => matches!(scalar, Scalar::Float(_)),
        BaseType::String => matches!(scalar, Scalar::String(_)),
        BaseType::Identifier => matches!(scalar, Scalar::String(s) if is_identifier(s)),
        BaseType::Uri => matches!(scalar, Scalar::String(s) if is_uri(s)),
        BaseType::IntOrIdentifier => match scalar {
            Scalar::Integer(_) => true,
            Scalar::String(s) => is_identifier(s),
            _ => false,
        },
        BaseType::Duration => matches!(scalar, Scalar::Duration(_)),
        BaseType::Point => matches!(scalar, Scalar::Point(_)),
        BaseType::Pair => matches!(scalar, Scalar::Pair(_)),
        BaseType::DirectedPair => matches!(scalar, Scalar::DirectedPair(_)),
        BaseType::File => matches!(scalar, Scalar::File(_)),
    }
}

/// Whether `value` is compliant with `base_type`.
///
/// Null is always compliant. A container is compliant when every element
/// is. A non-empty record never is: records have no base type.
pub fn is_base_type_compliant(base_type: BaseType, value: &Value) -> bool {
    if value.is_null() {
        return true;
    }
    match value {
        Value::Null => true,
        Value::Single(s) => is_scalar_compliant(base_type, s),
        Value::Multiple(c) | Value::Ordered(c) => {
            c.iter().all(|s| is_scalar_compliant(base_type, s))
        }
        Value::Record(_) => false,
    }
}

/// Name-based compliance check, for callers holding a base type by its QTI
/// name. An unknown name is a configuration error.
pub fn is_base_type_compliant_named(base_type: &str, value: &Value) -> Result<bool, ModelError> {
    let bt = BaseType::from_name(base_type)?;
    Ok(is_base_type_compliant(bt, value))
}

/// Derive the base type of a value. Records and `Null` have none.
pub fn infer_base_type(value: &Value) -> Option<BaseType> {
    match value {
        Value::Null | Value::Record(_) => None,
        Value::Single(s) => Some(s.base_type()),
        Value::Multiple(c) | Value::Ordered(c) => Some(c.base_type()),
    }
}

/// Derive the cardinality of a value. Records and `Null` have none.
pub fn infer_cardinality(value: &Value) -> Option<Cardinality> {
    match value {
        Value::Null | Value::Record(_) => None,
        Value::Single(_) => Some(Cardinality::Single),
        Value::Multiple(_) => Some(Cardinality::Multiple),
        Value::Ordered(_) => Some(Cardinality::Ordered),
    }
}

/// Whether `value` fits a variable declared with `cardinality` and
/// `base_type`. Null fits every declaration.
pub fn is_declaration_compliant(
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: &Value,
) -> bool {
    if value.is_null() {
        return true;
    }
    match (cardinality, value) {
        (Cardinality::Record, Value::Record(_)) => true,
        (Cardinality::Single, Value::Single(_))
        | (Cardinality::Multiple, Value::Multiple(_))
        | (Cardinality::Ordered, Value::Ordered(_)) => match base_type {
            Some(bt) => is_base_type_compliant(bt, value),
            None => false,
        },
        _ => false,
    }
}
