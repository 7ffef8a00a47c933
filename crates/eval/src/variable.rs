//! Variables and the variable store.
//!
//! A `State` is scoped to one item session or to the test. Item states are
//! seeded from the item's declarations plus the built-in `numAttempts`,
//! `duration` and `completionStatus` variables.

use std::collections::BTreeMap;
use std::fmt;

use qti_core::declaration::{
    COMPLETION_NOT_ATTEMPTED, COMPLETION_STATUS, DURATION, NUM_ATTEMPTS,
};
use qti_core::{
    is_declaration_compliant, AreaMapping, AssessmentItem, AssessmentTest, BaseType, Cardinality,
    Container, LookupTable, Mapping, OutcomeDeclaration, ResponseDeclaration, Scalar,
    TemplateDeclaration, Value,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableKind {
    Response,
    Outcome,
    Template,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Response => f.write_str("response"),
            VariableKind::Outcome => f.write_str("outcome"),
            VariableKind::Template => f.write_str("template"),
        }
    }
}

/// A value does not fit a variable's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub identifier: String,
    pub kind: VariableKind,
    pub cardinality: Cardinality,
    /// `None` for records.
    pub base_type: Option<BaseType>,
    pub value: Value,
    pub default_value: Option<Value>,
    /// Responses only.
    pub correct_response: Option<Value>,
    pub mapping: Option<Mapping>,
    pub area_mapping: Option<AreaMapping>,
    /// Outcomes only.
    pub lookup_table: Option<LookupTable>,
}

impl Variable {
    pub fn new(
        identifier: impl Into<String>,
        kind: VariableKind,
        cardinality: Cardinality,
        base_type: Option<BaseType>,
    ) -> Self {
        let mut v = Variable {
            identifier: identifier.into(),
            kind,
            cardinality,
            base_type,
            value: Value::Null,
            default_value: None,
            correct_response: None,
            mapping: None,
            area_mapping: None,
            lookup_table: None,
        };
        v.value = v.initial_value();
        v
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self.value = self.initial_value();
        self
    }

    pub fn from_response(decl: &ResponseDeclaration) -> Self {
        let mut v = Variable::new(
            decl.identifier.clone(),
            VariableKind::Response,
            decl.cardinality,
            decl.base_type,
        );
        v.default_value = decl.default_value.clone();
        v.correct_response = decl.correct_response.clone();
        v.mapping = decl.mapping.clone();
        v.area_mapping = decl.area_mapping.clone();
        v.value = v.initial_value();
        v
    }

    pub fn from_outcome(decl: &OutcomeDeclaration) -> Self {
        let mut v = Variable::new(
            decl.identifier.clone(),
            VariableKind::Outcome,
            decl.cardinality,
            decl.base_type,
        );
        v.default_value = decl.default_value.clone();
        v.lookup_table = decl.lookup_table.clone();
        v.value = v.initial_value();
        v
    }

    pub fn from_template(decl: &TemplateDeclaration) -> Self {
        let mut v = Variable::new(
            decl.identifier.clone(),
            VariableKind::Template,
            decl.cardinality,
            decl.base_type,
        );
        v.default_value = decl.default_value.clone();
        v.value = v.initial_value();
        v
    }

    /// The value the variable holds after initialization or reset.
    ///
    /// Single numeric outcomes without a default start at zero; everything
    /// else starts at its default, or null.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default_value {
            return default.clone();
        }
        match (self.kind, self.cardinality, self.base_type) {
            (VariableKind::Outcome, Cardinality::Single, Some(BaseType::Integer)) => {
                Value::integer(0)
            }
            (VariableKind::Outcome, Cardinality::Single, Some(BaseType::Float)) => Value::float(0.0),
            _ => Value::Null,
        }
    }

    pub fn reset(&mut self) {
        self.value = self.initial_value();
    }

    /// Declared shape, e.g. `multiple identifier`.
    pub fn declared(&self) -> String {
        match self.base_type {
            Some(bt) => format!("{} {}", self.cardinality, bt),
            None => self.cardinality.to_string(),
        }
    }

    /// Check `value` against the declaration, promoting integers to float
    /// when the variable is declared float. Returns the value to store.
    pub fn coerce(&self, value: Value) -> Result<Value, TypeMismatch> {
        if is_declaration_compliant(self.cardinality, self.base_type, &value) {
            return Ok(value);
        }
        if self.base_type == Some(BaseType::Float) {
            if let Some(promoted) = promote_to_float(&value) {
                if is_declaration_compliant(self.cardinality, self.base_type, &promoted) {
                    return Ok(promoted);
                }
            }
        }
        Err(TypeMismatch {
            expected: self.declared(),
            actual: value.describe(),
        })
    }

    pub fn assign(&mut self, value: Value) -> Result<(), TypeMismatch> {
        self.value = self.coerce(value)?;
        Ok(())
    }
}

fn promote_to_float(value: &Value) -> Option<Value> {
    let promote = |c: &Container| -> Option<Container> {
        let floats = c
            .iter()
            .map(|s| s.as_i64().map(|i| Scalar::Float(i as f64)))
            .collect::<Option<Vec<_>>>()?;
        Container::with_values(BaseType::Float, floats).ok()
    };
    match value {
        Value::Single(Scalar::Integer(i)) => Some(Value::float(*i as f64)),
        Value::Multiple(c) if c.base_type() == BaseType::Integer => {
            promote(c).map(Value::Multiple)
        }
        Value::Ordered(c) if c.base_type() == BaseType::Integer => promote(c).map(Value::Ordered),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// State
// ──────────────────────────────────────────────

/// A variable store keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    variables: BTreeMap<String, Variable>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    /// Variables of an item: its declarations plus the built-ins it does
    /// not declare itself.
    pub fn for_item(item: &AssessmentItem) -> Self {
        let mut state = State::new();
        state.insert(
            Variable::new(
                NUM_ATTEMPTS,
                VariableKind::Response,
                Cardinality::Single,
                Some(BaseType::Integer),
            )
            .with_default(Value::integer(0)),
        );
        state.insert(
            Variable::new(
                DURATION,
                VariableKind::Response,
                Cardinality::Single,
                Some(BaseType::Duration),
            )
            .with_default(Value::duration(time::Duration::ZERO)),
        );
        state.insert(
            Variable::new(
                COMPLETION_STATUS,
                VariableKind::Outcome,
                Cardinality::Single,
                Some(BaseType::Identifier),
            )
            .with_default(Value::identifier(COMPLETION_NOT_ATTEMPTED)),
        );
        for decl in &item.response_declarations {
            state.insert(Variable::from_response(decl));
        }
        for decl in &item.outcome_declarations {
            state.insert(Variable::from_outcome(decl));
        }
        for decl in &item.template_declarations {
            state.insert(Variable::from_template(decl));
        }
        state
    }

    /// Test-level variables: the outcome declarations and `duration`.
    pub fn for_test(test: &AssessmentTest) -> Self {
        let mut state = State::new();
        state.insert(
            Variable::new(
                DURATION,
                VariableKind::Response,
                Cardinality::Single,
                Some(BaseType::Duration),
            )
            .with_default(Value::duration(time::Duration::ZERO)),
        );
        for decl in &test.outcome_declarations {
            state.insert(Variable::from_outcome(decl));
        }
        state
    }

    /// Insert or replace a variable.
    pub fn insert(&mut self, variable: Variable) {
        self.variables.insert(variable.identifier.clone(), variable);
    }

    pub fn get(&self, identifier: &str) -> Option<&Variable> {
        self.variables.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut Variable> {
        self.variables.get_mut(identifier)
    }

    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.variables.get(identifier).map(|v| &v.value)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.variables.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Reset every variable of `kind` to its initial value.
    pub fn reset(&mut self, kind: VariableKind) {
        for v in self.variables.values_mut().filter(|v| v.kind == kind) {
            v.reset();
        }
    }

    /// Current values by identifier.
    pub fn values(&self) -> BTreeMap<String, Value> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}
