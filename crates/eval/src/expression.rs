//! Expression evaluation.
//!
//! Evaluation is a depth-first reduction: operands are evaluated left to
//! right, then handed to the operator. Nothing here mutates a `State`; the
//! only side effect is drawing from the environment's random generator.
//!
//! Item-level expressions resolve identifiers against one item `State`.
//! Test-level expressions resolve them against the test `State` first and
//! then, for `ITEM.VAR` and `ITEM.k.VAR` forms, through a [`TestScope`].

use std::collections::BTreeSet;

use qti_core::{
    AssessmentItemRef, BaseType, Cardinality, Container, Expression, FloatOrVariableRef,
    IntegerOrVariableRef, ItemSubset, MathConstant, ModelError, Scalar, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::EngineConfig;
use crate::error::EvalError;
use crate::mapping;
use crate::operands::value_kind;
use crate::operators::{self, PatternCache};
use crate::variable::{State, Variable, VariableKind};

// ──────────────────────────────────────────────
// Environment
// ──────────────────────────────────────────────

/// Per-session evaluation resources: the random generator and the
/// compiled pattern cache.
#[derive(Debug)]
pub struct Environment {
    pub rng: StdRng,
    pub patterns: PatternCache,
    pub config: EngineConfig,
}

impl Environment {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Environment {
            rng,
            patterns: PatternCache::new(config.pattern_size_limit, config.pattern_nest_limit),
            config,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(EngineConfig::default())
    }
}

// ──────────────────────────────────────────────
// Test scope
// ──────────────────────────────────────────────

/// An item session as seen by test-level expressions.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'s> {
    pub item_ref: &'s AssessmentItemRef,
    /// Identifiers of the enclosing sections, outermost first.
    pub sections: &'s [String],
    pub state: &'s State,
    pub presented: bool,
    pub responded: bool,
}

impl ItemView<'_> {
    /// Whether every response with a correct response matches it. Items
    /// without correct responses are never correct.
    pub fn is_correct(&self) -> bool {
        let mut declared = false;
        for v in self.state.iter() {
            if v.kind != VariableKind::Response {
                continue;
            }
            if let Some(correct) = &v.correct_response {
                declared = true;
                if v.value.is_null() || v.value != *correct {
                    return false;
                }
            }
        }
        declared
    }

    fn in_subset(&self, subset: &ItemSubset) -> bool {
        if let Some(section) = &subset.section_identifier {
            if !self.sections.iter().any(|s| s == section) {
                return false;
            }
        }
        if !subset.include_categories.is_empty()
            && !subset
                .include_categories
                .iter()
                .any(|c| self.item_ref.has_category(c))
        {
            return false;
        }
        !subset
            .exclude_categories
            .iter()
            .any(|c| self.item_ref.has_category(c))
    }
}

/// Test-level context: access to the item sessions of a running test.
pub trait TestScope {
    /// Every selected item occurrence of the test, in route order.
    fn items(&self) -> Vec<ItemView<'_>>;

    /// The item occurrence named by `item_ref`; `occurrence` is 1-based and
    /// defaults to the first occurrence.
    fn item(&self, item_ref: &str, occurrence: Option<usize>) -> Option<ItemView<'_>> {
        let n = occurrence.unwrap_or(1);
        self.items()
            .into_iter()
            .filter(|v| v.item_ref.identifier == item_ref)
            .nth(n.checked_sub(1)?)
    }
}

// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

pub struct EvalContext<'a> {
    pub state: &'a State,
    pub scope: Option<&'a dyn TestScope>,
    pub env: &'a mut Environment,
}

impl<'a> EvalContext<'a> {
    pub fn new(state: &'a State, env: &'a mut Environment) -> Self {
        EvalContext {
            state,
            scope: None,
            env,
        }
    }

    pub fn with_scope(state: &'a State, scope: &'a dyn TestScope, env: &'a mut Environment) -> Self {
        EvalContext {
            state,
            scope: Some(scope),
            env,
        }
    }

    /// The variable `identifier` and, for item references at test level,
    /// the item reference it was resolved through.
    fn lookup(&self, identifier: &str) -> Result<(&Variable, Option<&AssessmentItemRef>), EvalError> {
        if let Some(v) = self.state.get(identifier) {
            return Ok((v, None));
        }
        if let Some(scope) = self.scope {
            if let Some((item_ref, occurrence, var)) = split_item_reference(identifier) {
                if let Some(view) = scope.item(item_ref, occurrence) {
                    if let Some(v) = view.state.get(var) {
                        return Ok((v, Some(view.item_ref)));
                    }
                }
            }
        }
        Err(EvalError::UnknownVariable(identifier.to_string()))
    }

    /// Current value of a variable, wherever it lives.
    pub fn value_of(&self, identifier: &str) -> Result<&Value, EvalError> {
        self.lookup(identifier).map(|(v, _)| &v.value)
    }

    pub fn resolve_integer(
        &self,
        reference: &IntegerOrVariableRef,
        component: &'static str,
        attribute: &'static str,
    ) -> Result<i64, EvalError> {
        match reference {
            IntegerOrVariableRef::Integer(i) => Ok(*i),
            IntegerOrVariableRef::Variable(id) => {
                let value = self.value_of(id)?;
                value.as_i64().ok_or_else(|| EvalError::AttributeReference {
                    component,
                    attribute,
                    identifier: id.clone(),
                    message: format!("expected a single integer, found {}", value.describe()),
                })
            }
        }
    }

    pub fn resolve_float(
        &self,
        reference: &FloatOrVariableRef,
        component: &'static str,
        attribute: &'static str,
    ) -> Result<f64, EvalError> {
        match reference {
            FloatOrVariableRef::Float(f) => Ok(*f),
            FloatOrVariableRef::Variable(id) => {
                let value = self.value_of(id)?;
                value.as_f64().ok_or_else(|| EvalError::AttributeReference {
                    component,
                    attribute,
                    identifier: id.clone(),
                    message: format!("expected a single numeric, found {}", value.describe()),
                })
            }
        }
    }
}

/// Split `ITEM.VAR` or `ITEM.k.VAR`.
fn split_item_reference(identifier: &str) -> Option<(&str, Option<usize>, &str)> {
    let mut parts = identifier.splitn(3, '.');
    let item = parts.next()?;
    let second = parts.next()?;
    match parts.next() {
        Some(var) => second.parse().ok().map(|k| (item, Some(k), var)),
        None => Some((item, None, second)),
    }
}

// ──────────────────────────────────────────────
// Evaluation
// ──────────────────────────────────────────────

/// An expression whose tree has passed construction-time validation.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionEngine<'e> {
    expression: &'e Expression,
}

impl<'e> ExpressionEngine<'e> {
    pub fn new(expression: &'e Expression) -> Result<Self, ModelError> {
        expression.validate()?;
        Ok(ExpressionEngine { expression })
    }

    pub fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
        evaluate(self.expression, ctx)
    }
}

/// Evaluate `expr`. The tree is expected to be valid; see
/// [`ExpressionEngine`].
pub fn evaluate(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<Value, EvalError> {
    let value = match expr {
        Expression::BaseValue { value, .. } => Value::Single(value.clone()),
        Expression::Null => Value::Null,
        Expression::Variable {
            identifier,
            weight_identifier,
        } => variable(ctx, identifier, weight_identifier.as_deref())?,
        Expression::Default { identifier } => {
            let (v, _) = ctx.lookup(identifier)?;
            v.default_value.clone().unwrap_or_default()
        }
        Expression::Correct { identifier } => {
            let (v, _) = ctx.lookup(identifier)?;
            if v.kind != VariableKind::Response {
                return Err(EvalError::Declaration {
                    expression: expr.name(),
                    identifier: identifier.clone(),
                    message: format!("{} variables have no correct response", v.kind),
                });
            }
            v.correct_response.clone().unwrap_or_default()
        }
        Expression::MapResponse { identifier } => {
            let (v, _) = ctx.lookup(identifier)?;
            mapping::map_response(v)?
        }
        Expression::MapResponsePoint { identifier } => {
            let (v, _) = ctx.lookup(identifier)?;
            mapping::map_response_point(v)?
        }
        Expression::RandomInteger { min, max, step } => {
            let name = expr.name();
            let min = ctx.resolve_integer(min, name, "min")?;
            let max = ctx.resolve_integer(max, name, "max")?;
            let step = ctx.resolve_integer(step, name, "step")?;
            random_integer(ctx.env, min, max, step)?
        }
        Expression::RandomFloat { min, max } => {
            let min = ctx.resolve_float(min, expr.name(), "min")?;
            let max = ctx.resolve_float(max, expr.name(), "max")?;
            if min > max {
                return Err(ModelError::InvalidAttribute {
                    component: expr.name().to_string(),
                    attribute: "max",
                    message: format!("max ({}) is lower than min ({})", max, min),
                }
                .into());
            }
            if min == max {
                Value::float(min)
            } else {
                Value::float(ctx.env.rng.gen_range(min..=max))
            }
        }
        Expression::MathConstant(MathConstant::Pi) => Value::float(std::f64::consts::PI),
        Expression::MathConstant(MathConstant::E) => Value::float(std::f64::consts::E),
        Expression::NumberSelected(subset) => {
            Value::integer(count_items(ctx, expr, subset, |_| true)?)
        }
        Expression::NumberPresented(subset) => {
            Value::integer(count_items(ctx, expr, subset, |v| v.presented)?)
        }
        Expression::NumberResponded(subset) => {
            Value::integer(count_items(ctx, expr, subset, |v| v.responded)?)
        }
        Expression::NumberCorrect(subset) => {
            Value::integer(count_items(ctx, expr, subset, |v| v.is_correct())?)
        }
        Expression::NumberIncorrect(subset) => Value::integer(count_items(ctx, expr, subset, |v| {
            v.responded && !v.is_correct()
        })?),
        Expression::TestVariables {
            subset,
            variable_identifier,
            base_type,
            weight_identifier,
        } => test_variables(
            ctx,
            expr,
            subset,
            variable_identifier,
            *base_type,
            weight_identifier.as_deref(),
        )?,
        Expression::Operator(op) => {
            let mut operands = Vec::with_capacity(op.operands.len());
            for operand in &op.operands {
                operands.push(evaluate(operand, ctx)?);
            }
            operators::apply(&op.kind, &operands, ctx)?
        }
    };
    trace!(expression = expr.name(), result = %value, "evaluated");
    Ok(value)
}

fn variable(
    ctx: &EvalContext<'_>,
    identifier: &str,
    weight_identifier: Option<&str>,
) -> Result<Value, EvalError> {
    let (v, item_ref) = ctx.lookup(identifier)?;
    let weight = match (item_ref, weight_identifier) {
        (Some(item_ref), Some(w)) => item_ref.weight(w),
        _ => None,
    };
    match weight {
        Some(w) if v.kind == VariableKind::Outcome => Ok(apply_weight(&v.value, w)),
        _ => Ok(v.value.clone()),
    }
}

/// Scale numeric values by `weight`; the result is always float.
fn apply_weight(value: &Value, weight: f64) -> Value {
    let scale = |c: &Container| {
        let scaled: Option<Vec<Scalar>> = c
            .iter()
            .map(|s| s.as_f64().map(|f| Scalar::Float(f * weight)))
            .collect();
        scaled.and_then(|s| Container::with_values(BaseType::Float, s).ok())
    };
    match value {
        Value::Single(s) if s.is_numeric() => s
            .as_f64()
            .map(|f| Value::float(f * weight))
            .unwrap_or_default(),
        Value::Multiple(c) => scale(c).map(Value::Multiple).unwrap_or_else(|| value.clone()),
        Value::Ordered(c) => scale(c).map(Value::Ordered).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn random_integer(env: &mut Environment, min: i64, max: i64, step: i64) -> Result<Value, EvalError> {
    if min > max || step < 1 {
        return Err(ModelError::InvalidAttribute {
            component: "randomInteger".to_string(),
            attribute: if step < 1 { "step" } else { "max" },
            message: format!("cannot draw from [{}, {}] with step {}", min, max, step),
        }
        .into());
    }
    let slots = (max - min) / step;
    let k = env.rng.gen_range(0..=slots);
    Ok(Value::integer(min + k * step))
}

fn scope_items<'c>(
    ctx: &'c EvalContext<'_>,
    expr: &Expression,
) -> Result<Vec<ItemView<'c>>, EvalError> {
    match ctx.scope {
        Some(scope) => Ok(scope.items()),
        None => Err(EvalError::NoTestContext {
            expression: expr.name(),
        }),
    }
}

fn count_items(
    ctx: &EvalContext<'_>,
    expr: &Expression,
    subset: &ItemSubset,
    pred: impl Fn(&ItemView<'_>) -> bool,
) -> Result<i64, EvalError> {
    let items = scope_items(ctx, expr)?;
    // An item selected twice counts once per occurrence.
    Ok(items
        .iter()
        .filter(|v| v.in_subset(subset) && pred(*v))
        .count() as i64)
}

/// Collect one single-cardinality variable across the item subset.
///
/// With a base type filter only variables of that base type count;
/// without one only numeric variables do. The result is a multiple
/// container, float as soon as a float or a weight is involved.
fn test_variables(
    ctx: &EvalContext<'_>,
    expr: &Expression,
    subset: &ItemSubset,
    variable_identifier: &str,
    base_type: Option<BaseType>,
    weight_identifier: Option<&str>,
) -> Result<Value, EvalError> {
    let items = scope_items(ctx, expr)?;
    let mut collected: Vec<Scalar> = Vec::new();
    let mut kinds = BTreeSet::new();
    let mut weighted = false;

    for view in items.iter().filter(|v| v.in_subset(subset)) {
        let Some(var) = view.state.get(variable_identifier) else {
            continue;
        };
        if var.cardinality != Cardinality::Single || var.value.is_null() {
            continue;
        }
        let Some(kind) = value_kind(&var.value) else {
            continue;
        };
        let wanted = match base_type {
            Some(bt) => declared_matches(var, bt),
            None => kind.is_numeric(),
        };
        if !wanted {
            continue;
        }
        let Some(scalar) = var.value.as_single() else {
            continue;
        };
        let weight = weight_identifier.and_then(|w| view.item_ref.weight(w));
        match (weight, scalar.as_f64()) {
            (Some(w), Some(f)) if var.kind == VariableKind::Outcome => {
                weighted = true;
                kinds.insert(BaseType::Float);
                collected.push(Scalar::Float(f * w));
            }
            _ => {
                kinds.insert(kind);
                collected.push(scalar.clone());
            }
        }
    }

    if collected.is_empty() {
        return Ok(Value::Null);
    }
    let result_type = match base_type {
        Some(bt) if !bt.is_numeric() => bt,
        _ if weighted || kinds.contains(&BaseType::Float) => BaseType::Float,
        Some(bt) => bt,
        None => BaseType::Integer,
    };
    if result_type == BaseType::Float {
        collected = collected
            .into_iter()
            .map(|s| s.as_f64().map(Scalar::Float).unwrap_or(s))
            .collect();
    }
    Ok(Value::Multiple(Container::with_values(result_type, collected)?))
}

fn declared_matches(var: &Variable, base_type: BaseType) -> bool {
    var.base_type == Some(base_type)
        || (var.base_type.is_none() && value_kind(&var.value) == Some(base_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::{OperatorKind, Point};

    fn state() -> State {
        let mut s = State::new();
        s.insert(
            Variable::new("N", VariableKind::Template, Cardinality::Single, Some(BaseType::Integer))
                .with_default(Value::integer(4)),
        );
        s
    }

    #[test]
    fn variables_and_defaults_resolve() {
        let s = state();
        let mut env = Environment::default();
        let mut ctx = EvalContext::new(&s, &mut env);
        assert_eq!(
            evaluate(&Expression::variable("N"), &mut ctx).unwrap(),
            Value::integer(4)
        );
        assert_eq!(
            evaluate(&Expression::variable("MISSING"), &mut ctx),
            Err(EvalError::UnknownVariable("MISSING".to_string()))
        );
    }

    #[test]
    fn random_integer_honours_step_and_bounds() {
        let s = state();
        let mut env = Environment::new(EngineConfig::seeded(11));
        let mut ctx = EvalContext::new(&s, &mut env);
        let expr = Expression::RandomInteger {
            min: 2.into(),
            max: IntegerOrVariableRef::Variable("N".to_string()),
            step: 2.into(),
        };
        for _ in 0..50 {
            let v = evaluate(&expr, &mut ctx).unwrap().as_i64().unwrap();
            assert!(v == 2 || v == 4, "drew {}", v);
        }
    }

    #[test]
    fn seeded_environments_draw_the_same_sequence() {
        let s = state();
        let expr = Expression::RandomFloat {
            min: 0.0.into(),
            max: 1.0.into(),
        };
        let draw = |seed| {
            let mut env = Environment::new(EngineConfig::seeded(seed));
            let mut ctx = EvalContext::new(&s, &mut env);
            (0..5)
                .map(|_| evaluate(&expr, &mut ctx).unwrap().as_f64().unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
    }

    #[test]
    fn test_level_expressions_need_a_scope() {
        let s = state();
        let mut env = Environment::default();
        let mut ctx = EvalContext::new(&s, &mut env);
        assert_eq!(
            evaluate(&Expression::NumberSelected(ItemSubset::default()), &mut ctx),
            Err(EvalError::NoTestContext {
                expression: "numberSelected"
            })
        );
    }

    #[test]
    fn operators_see_evaluated_operands() {
        let s = state();
        let mut env = Environment::default();
        let mut ctx = EvalContext::new(&s, &mut env);
        let expr = Expression::op(
            OperatorKind::Sum,
            vec![Expression::variable("N"), Expression::integer(3)],
        );
        assert_eq!(evaluate(&expr, &mut ctx).unwrap(), Value::integer(7));

        let inside = Expression::op(
            OperatorKind::Inside {
                shape: qti_core::Shape::Rect,
                coords: vec![0, 0, 10, 10],
            },
            vec![Expression::base_value(Scalar::Point(Point::new(3, 4)))],
        );
        assert_eq!(evaluate(&inside, &mut ctx).unwrap(), Value::boolean(true));
    }

    #[test]
    fn item_references_split_on_dots() {
        assert_eq!(split_item_reference("Q1.SCORE"), Some(("Q1", None, "SCORE")));
        assert_eq!(split_item_reference("Q1.2.SCORE"), Some(("Q1", Some(2), "SCORE")));
        assert_eq!(split_item_reference("SCORE"), None);
        assert_eq!(split_item_reference("Q1.x.SCORE"), None);
    }
}
