//! Rule processing.
//!
//! A [`ProcessingEngine`] runs one rule list for one pass (response, outcome
//! or template processing) against a mutable `State`. The list is checked
//! against the pass when the engine is built, so a set-template rule can
//! never reach a response processing run.
//!
//! Template processing carries the constraint loop: a false or null
//! `templateConstraint` restarts the pass from the state it started with.

use qti_core::{ExitKind, ModelError, ProcessingKind, Rule, Value};
use tracing::{debug, warn};

use crate::error::{EvalError, RuleError};
use crate::expression::{evaluate, EvalContext, Environment, TestScope};
use crate::mapping;
use crate::variable::{State, VariableKind};

/// How a processing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Every rule ran.
    Continue,
    /// An exit rule stopped the pass.
    Exited(ExitKind),
}

/// Control signal while walking a rule list.
enum Step {
    Next,
    Exit(ExitKind),
    Restart,
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ProcessingEngine<'r> {
    kind: ProcessingKind,
    rules: &'r [Rule],
}

impl<'r> ProcessingEngine<'r> {
    /// Bind `rules` to a pass. Rules foreign to the pass and invalid
    /// expressions are rejected here.
    pub fn new(kind: ProcessingKind, rules: &'r [Rule]) -> Result<Self, ModelError> {
        kind.check(rules)?;
        rules.iter().try_for_each(Rule::validate)?;
        Ok(ProcessingEngine { kind, rules })
    }

    pub fn kind(&self) -> ProcessingKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the pass. `scope` gives test-level expressions access to the
    /// item sessions and is only needed for outcome processing of a test.
    pub fn run(
        &self,
        state: &mut State,
        scope: Option<&dyn TestScope>,
        env: &mut Environment,
    ) -> Result<Flow, RuleError> {
        if self.kind != ProcessingKind::Template {
            return match self.execute(self.rules, state, scope, env)? {
                Step::Exit(kind) => Ok(Flow::Exited(kind)),
                Step::Next | Step::Restart => Ok(Flow::Continue),
            };
        }

        let initial = state.clone();
        let max = env.config.template_max_iterations.max(1);
        for iteration in 1..=max {
            match self.execute(self.rules, state, scope, env)? {
                Step::Next => return Ok(Flow::Continue),
                Step::Exit(kind) => return Ok(Flow::Exited(kind)),
                Step::Restart => {
                    debug!(iteration, "template constraint failed, restarting");
                    *state = initial.clone();
                }
            }
        }
        warn!(
            iterations = max,
            "template constraints never satisfied, using default template values"
        );
        state.reset(VariableKind::Template);
        Ok(Flow::Continue)
    }

    fn execute(
        &self,
        rules: &[Rule],
        state: &mut State,
        scope: Option<&dyn TestScope>,
        env: &mut Environment,
    ) -> Result<Step, RuleError> {
        for rule in rules {
            match self.execute_rule(rule, state, scope, env)? {
                Step::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Step::Next)
    }

    fn execute_rule(
        &self,
        rule: &Rule,
        state: &mut State,
        scope: Option<&dyn TestScope>,
        env: &mut Environment,
    ) -> Result<Step, RuleError> {
        match rule {
            Rule::SetOutcomeValue {
                identifier,
                expression,
            } => {
                check_target(rule, state, identifier, &[VariableKind::Outcome])?;
                let value = eval(rule, expression, state, scope, env)?;
                assign(rule, state, identifier, value)?;
            }
            Rule::SetTemplateValue {
                identifier,
                expression,
            } => {
                check_target(rule, state, identifier, &[VariableKind::Template])?;
                let value = eval(rule, expression, state, scope, env)?;
                assign(rule, state, identifier, value)?;
            }
            Rule::SetCorrectResponse {
                identifier,
                expression,
            } => {
                check_target(rule, state, identifier, &[VariableKind::Response])?;
                let value = eval(rule, expression, state, scope, env)?;
                let value = coerce(rule, state, identifier, value)?;
                if let Some(var) = state.get_mut(identifier) {
                    var.correct_response = (!value.is_null()).then_some(value);
                }
            }
            Rule::SetDefaultValue {
                identifier,
                expression,
            } => {
                check_target(
                    rule,
                    state,
                    identifier,
                    &[VariableKind::Response, VariableKind::Outcome],
                )?;
                let value = eval(rule, expression, state, scope, env)?;
                let value = coerce(rule, state, identifier, value)?;
                if let Some(var) = state.get_mut(identifier) {
                    var.default_value = (!value.is_null()).then_some(value);
                }
            }
            Rule::LookupOutcomeValue {
                identifier,
                expression,
            } => {
                check_target(rule, state, identifier, &[VariableKind::Outcome])?;
                let table = state
                    .get(identifier)
                    .and_then(|v| v.lookup_table.clone())
                    .ok_or_else(|| RuleError::MissingLookupTable {
                        identifier: identifier.clone(),
                    })?;
                let source = eval(rule, expression, state, scope, env)?;
                let target = mapping::lookup(&table, &source).map_err(|message| {
                    RuleError::Evaluation {
                        rule: rule.name(),
                        target: Some(identifier.clone()),
                        source: EvalError::Declaration {
                            expression: "lookupOutcomeValue",
                            identifier: identifier.clone(),
                            message,
                        },
                    }
                })?;
                let value = target.map(Value::Single).unwrap_or_default();
                assign(rule, state, identifier, value)?;
            }
            Rule::Condition(condition) => {
                for branch in &condition.branches {
                    let guard = eval(rule, &branch.guard, state, scope, env)?;
                    if guard_holds(rule, &guard)? {
                        return self.execute(&branch.rules, state, scope, env);
                    }
                }
                if let Some(otherwise) = &condition.otherwise {
                    return self.execute(otherwise, state, scope, env);
                }
            }
            Rule::Exit(kind) => {
                debug!(rule = rule.name(), pass = %self.kind, "processing exited");
                return Ok(Step::Exit(*kind));
            }
            Rule::TemplateConstraint { expression } => {
                let value = eval(rule, expression, state, scope, env)?;
                if !guard_holds(rule, &value)? {
                    return Ok(Step::Restart);
                }
            }
            Rule::Fragment(rules) => return self.execute(rules, state, scope, env),
        }
        Ok(Step::Next)
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn eval(
    rule: &Rule,
    expression: &qti_core::Expression,
    state: &State,
    scope: Option<&dyn TestScope>,
    env: &mut Environment,
) -> Result<Value, RuleError> {
    let mut ctx = EvalContext { state, scope, env };
    evaluate(expression, &mut ctx).map_err(|source| RuleError::Evaluation {
        rule: rule.name(),
        target: rule.target().map(str::to_string),
        source,
    })
}

/// Null guards are false. Anything else must be a single boolean.
fn guard_holds(rule: &Rule, value: &Value) -> Result<bool, RuleError> {
    if value.is_null() {
        return Ok(false);
    }
    value.as_bool().ok_or_else(|| RuleError::GuardType {
        rule: rule.name(),
        actual: value.describe(),
    })
}

fn check_target(
    rule: &Rule,
    state: &State,
    identifier: &str,
    kinds: &[VariableKind],
) -> Result<(), RuleError> {
    let var = state.get(identifier).ok_or_else(|| RuleError::UnknownTarget {
        rule: rule.name(),
        identifier: identifier.to_string(),
    })?;
    if kinds.contains(&var.kind) {
        Ok(())
    } else {
        Err(RuleError::WrongTargetKind {
            rule: rule.name(),
            identifier: identifier.to_string(),
            kind: var.kind,
        })
    }
}

fn coerce(rule: &Rule, state: &State, identifier: &str, value: Value) -> Result<Value, RuleError> {
    let var = state.get(identifier).ok_or_else(|| RuleError::UnknownTarget {
        rule: rule.name(),
        identifier: identifier.to_string(),
    })?;
    var.coerce(value).map_err(|m| RuleError::TypeMismatch {
        rule: rule.name(),
        identifier: identifier.to_string(),
        expected: m.expected,
        actual: m.actual,
    })
}

fn assign(rule: &Rule, state: &mut State, identifier: &str, value: Value) -> Result<(), RuleError> {
    let value = coerce(rule, state, identifier, value)?;
    if let Some(var) = state.get_mut(identifier) {
        var.value = value;
    }
    Ok(())
}
