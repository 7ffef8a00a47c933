//! Containers: homogeneous multiple/ordered sequences and records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::scalar::Scalar;
use super::is_scalar_compliant;
use crate::enums::BaseType;
use crate::error::ModelError;

/// A homogeneous sequence of scalars sharing one declared base type.
///
/// Whether order is significant is decided by the `Value` variant holding
/// the container (`Multiple` or `Ordered`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ContainerRepr", into = "ContainerRepr")]
pub struct Container {
    base_type: BaseType,
    values: Vec<Scalar>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerRepr {
    base_type: BaseType,
    values: Vec<Scalar>,
}

impl TryFrom<ContainerRepr> for Container {
    type Error = ModelError;

    fn try_from(repr: ContainerRepr) -> Result<Self, Self::Error> {
        Container::with_values(repr.base_type, repr.values)
    }
}

impl From<Container> for ContainerRepr {
    fn from(c: Container) -> Self {
        ContainerRepr {
            base_type: c.base_type,
            values: c.values,
        }
    }
}

impl Container {
    pub fn new(base_type: BaseType) -> Self {
        Container {
            base_type,
            values: Vec::new(),
        }
    }

    /// Build a container, rejecting any scalar not compliant with `base_type`.
    pub fn with_values(base_type: BaseType, values: Vec<Scalar>) -> Result<Self, ModelError> {
        let mut container = Container::new(base_type);
        for v in values {
            container.push(v)?;
        }
        Ok(container)
    }

    pub fn push(&mut self, value: Scalar) -> Result<(), ModelError> {
        if !is_scalar_compliant(self.base_type, &value) {
            return Err(ModelError::NotCompliant {
                expected: self.base_type.to_string(),
                what: "baseType",
                value: value.to_string(),
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scalar> {
        self.values.iter()
    }

    pub fn contains(&self, value: &Scalar) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Number of elements equal to `value`.
    pub fn count(&self, value: &Scalar) -> usize {
        self.values.iter().filter(|v| *v == value).count()
    }

    /// Multiset equality: same elements with the same multiplicities.
    pub fn bag_eq(&self, other: &Container) -> bool {
        self.len() == other.len() && self.values.iter().all(|v| self.count(v) == other.count(v))
    }

    /// Sequence equality.
    pub fn seq_eq(&self, other: &Container) -> bool {
        self.values == other.values
    }
}

/// Named fields holding heterogeneously typed scalars. A record has no
/// cardinality or base type of its own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record(BTreeMap<String, Option<Scalar>>);

impl Record {
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Option<Scalar>) {
        self.0.insert(field.into(), value);
    }

    /// The scalar in `field`, `None` when absent or null.
    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.0.get(field).and_then(|v| v.as_ref())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<Scalar>)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Option<Scalar>)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Option<Scalar>)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_non_compliant_scalars() {
        let mut c = Container::new(BaseType::Integer);
        assert!(c.push(Scalar::Integer(1)).is_ok());
        assert!(c.push(Scalar::Float(1.5)).is_err());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn identifier_containers_check_lexical_form() {
        let ok = Container::with_values(
            BaseType::Identifier,
            vec![Scalar::String("ChoiceA".to_string())],
        );
        assert!(ok.is_ok());
        let bad = Container::with_values(
            BaseType::Identifier,
            vec![Scalar::String("not an id".to_string())],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn bag_equality_ignores_order_but_not_multiplicity() {
        let a = Container::with_values(
            BaseType::Integer,
            vec![Scalar::Integer(1), Scalar::Integer(2), Scalar::Integer(2)],
        )
        .unwrap();
        let b = Container::with_values(
            BaseType::Integer,
            vec![Scalar::Integer(2), Scalar::Integer(1), Scalar::Integer(2)],
        )
        .unwrap();
        let c = Container::with_values(
            BaseType::Integer,
            vec![Scalar::Integer(1), Scalar::Integer(1), Scalar::Integer(2)],
        )
        .unwrap();
        assert!(a.bag_eq(&b));
        assert!(!a.seq_eq(&b));
        assert!(!a.bag_eq(&c));
    }

    #[test]
    fn deserialization_enforces_compliance() {
        let json = serde_json::json!({
            "baseType": "integer",
            "values": [{ "baseType": "string", "value": "x" }]
        });
        assert!(serde_json::from_value::<Container>(json).is_err());
    }
}
