//! Rule trees for response, outcome and template processing.

use std::fmt;

use crate::error::ModelError;
use crate::expression::Expression;

/// The processing pass a rule list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingKind {
    /// Item-level responseProcessing.
    Response,
    /// Test-level outcomeProcessing.
    Outcome,
    /// Item-level templateProcessing.
    Template,
}

impl ProcessingKind {
    pub fn name(self) -> &'static str {
        match self {
            ProcessingKind::Response => "responseProcessing",
            ProcessingKind::Outcome => "outcomeProcessing",
            ProcessingKind::Template => "templateProcessing",
        }
    }

    /// Whether `rule` itself may appear in this pass. Children of
    /// conditions and fragments are checked by [`ProcessingKind::check`].
    pub fn permits(self, rule: &Rule) -> bool {
        use ProcessingKind::*;
        match rule {
            Rule::SetOutcomeValue { .. } | Rule::LookupOutcomeValue { .. } => {
                matches!(self, Response | Outcome)
            }
            Rule::SetTemplateValue { .. }
            | Rule::SetCorrectResponse { .. }
            | Rule::SetDefaultValue { .. }
            | Rule::TemplateConstraint { .. } => self == Template,
            Rule::Condition(_) | Rule::Fragment(_) => true,
            Rule::Exit(kind) => kind.pass() == self,
        }
    }

    /// Check every rule of a list, recursively.
    pub fn check(self, rules: &[Rule]) -> Result<(), ModelError> {
        for rule in rules {
            if !self.permits(rule) {
                return Err(ModelError::RuleNotAllowed {
                    rule: rule.name(),
                    pass: self,
                });
            }
            match rule {
                Rule::Condition(c) => {
                    for branch in &c.branches {
                        self.check(&branch.rules)?;
                    }
                    if let Some(otherwise) = &c.otherwise {
                        self.check(otherwise)?;
                    }
                }
                Rule::Fragment(rules) => self.check(rules)?,
                _ => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for ProcessingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which pass an exit rule terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    Response,
    Test,
    Template,
}

impl ExitKind {
    pub fn pass(self) -> ProcessingKind {
        match self {
            ExitKind::Response => ProcessingKind::Response,
            ExitKind::Test => ProcessingKind::Outcome,
            ExitKind::Template => ProcessingKind::Template,
        }
    }
}

/// One `if`/`elseIf` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub guard: Expression,
    pub rules: Vec<Rule>,
}

/// An if / else-if / else chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The `if` branch followed by every `elseIf` branch.
    pub branches: Vec<ConditionalBranch>,
    pub otherwise: Option<Vec<Rule>>,
}

impl Condition {
    pub fn when(guard: Expression, rules: Vec<Rule>) -> Self {
        Condition {
            branches: vec![ConditionalBranch { guard, rules }],
            otherwise: None,
        }
    }

    pub fn or_when(mut self, guard: Expression, rules: Vec<Rule>) -> Self {
        self.branches.push(ConditionalBranch { guard, rules });
        self
    }

    pub fn otherwise(mut self, rules: Vec<Rule>) -> Self {
        self.otherwise = Some(rules);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    SetOutcomeValue {
        identifier: String,
        expression: Expression,
    },
    SetTemplateValue {
        identifier: String,
        expression: Expression,
    },
    SetCorrectResponse {
        identifier: String,
        expression: Expression,
    },
    SetDefaultValue {
        identifier: String,
        expression: Expression,
    },
    /// Evaluate `expression` and map it through the lookup table of the
    /// outcome `identifier`.
    LookupOutcomeValue {
        identifier: String,
        expression: Expression,
    },
    Condition(Condition),
    Exit(ExitKind),
    TemplateConstraint {
        expression: Expression,
    },
    /// A processing fragment: a nested rule list executed in place.
    Fragment(Vec<Rule>),
}

impl Rule {
    pub fn set_outcome(identifier: impl Into<String>, expression: Expression) -> Rule {
        Rule::SetOutcomeValue {
            identifier: identifier.into(),
            expression,
        }
    }

    pub fn set_template(identifier: impl Into<String>, expression: Expression) -> Rule {
        Rule::SetTemplateValue {
            identifier: identifier.into(),
            expression,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::SetOutcomeValue { .. } => "setOutcomeValue",
            Rule::SetTemplateValue { .. } => "setTemplateValue",
            Rule::SetCorrectResponse { .. } => "setCorrectResponse",
            Rule::SetDefaultValue { .. } => "setDefaultValue",
            Rule::LookupOutcomeValue { .. } => "lookupOutcomeValue",
            Rule::Condition(_) => "condition",
            Rule::Exit(ExitKind::Response) => "exitResponse",
            Rule::Exit(ExitKind::Test) => "exitTest",
            Rule::Exit(ExitKind::Template) => "exitTemplate",
            Rule::TemplateConstraint { .. } => "templateConstraint",
            Rule::Fragment(_) => "processingFragment",
        }
    }

    /// The variable a rule writes to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Rule::SetOutcomeValue { identifier, .. }
            | Rule::SetTemplateValue { identifier, .. }
            | Rule::SetCorrectResponse { identifier, .. }
            | Rule::SetDefaultValue { identifier, .. }
            | Rule::LookupOutcomeValue { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Validate every expression reachable from this rule.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Rule::SetOutcomeValue { identifier, expression }
            | Rule::SetTemplateValue { identifier, expression }
            | Rule::SetCorrectResponse { identifier, expression }
            | Rule::SetDefaultValue { identifier, expression }
            | Rule::LookupOutcomeValue { identifier, expression } => {
                if identifier.is_empty() {
                    return Err(ModelError::MissingAttribute {
                        component: self.name().to_string(),
                        attribute: "identifier",
                    });
                }
                expression.validate()
            }
            Rule::TemplateConstraint { expression } => expression.validate(),
            Rule::Condition(c) => {
                if c.branches.is_empty() {
                    return Err(ModelError::MissingAttribute {
                        component: self.name().to_string(),
                        attribute: "if",
                    });
                }
                for branch in &c.branches {
                    branch.guard.validate()?;
                    branch.rules.iter().try_for_each(Rule::validate)?;
                }
                if let Some(otherwise) = &c.otherwise {
                    otherwise.iter().try_for_each(Rule::validate)?;
                }
                Ok(())
            }
            Rule::Fragment(rules) => rules.iter().try_for_each(Rule::validate),
            Rule::Exit(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_rules_belong_to_their_own_pass() {
        assert!(ProcessingKind::Template.permits(&Rule::Exit(ExitKind::Template)));
        assert!(!ProcessingKind::Template.permits(&Rule::Exit(ExitKind::Response)));
        assert!(!ProcessingKind::Response.permits(&Rule::Exit(ExitKind::Test)));
        assert!(ProcessingKind::Outcome.permits(&Rule::Exit(ExitKind::Test)));
    }

    #[test]
    fn foreign_rules_nested_in_conditions_are_found() {
        let rules = vec![Rule::Condition(
            Condition::when(Expression::boolean(true), vec![])
                .otherwise(vec![Rule::set_template("T", Expression::integer(1))]),
        )];
        assert_eq!(
            ProcessingKind::Response.check(&rules),
            Err(ModelError::RuleNotAllowed {
                rule: "setTemplateValue",
                pass: ProcessingKind::Response,
            })
        );
        assert!(ProcessingKind::Template.check(&rules).is_ok());
    }

    #[test]
    fn condition_without_branches_is_invalid() {
        let rule = Rule::Condition(Condition {
            branches: vec![],
            otherwise: Some(vec![]),
        });
        assert!(rule.validate().is_err());
    }
}
