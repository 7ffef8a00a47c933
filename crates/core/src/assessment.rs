//! Item and test structure.
//!
//! An `AssessmentTest` owns its test parts, a test part its sections and a
//! section its child sections and item references. Nodes are shared through
//! `Arc` so that many sessions can run over one definition without copies.
//!
//! Item-session control and time limits may be declared at several levels;
//! the runtime resolves the effective policy (nearest declaration wins for
//! session control, every level applies for time limits).

use std::collections::BTreeSet;
use std::sync::Arc;

use time::Duration;

use crate::declaration::{
    OutcomeDeclaration, ResponseDeclaration, ResponseValidityConstraint, TemplateDeclaration,
};
use crate::enums::{NavigationMode, SubmissionMode};
use crate::error::ModelError;
use crate::expression::Expression;
use crate::rule::{ProcessingKind, Rule};

/// Target of a branch rule leaving the current section.
pub const EXIT_SECTION: &str = "EXIT_SECTION";
/// Target of a branch rule leaving the current test part.
pub const EXIT_TESTPART: &str = "EXIT_TESTPART";
/// Target of a branch rule ending the test.
pub const EXIT_TEST: &str = "EXIT_TEST";

// ──────────────────────────────────────────────
// Control policies
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSessionControl {
    /// 0 means unlimited.
    pub max_attempts: u32,
    pub show_feedback: bool,
    pub allow_review: bool,
    pub show_solution: bool,
    pub allow_comment: bool,
    pub allow_skipping: bool,
    pub validate_responses: bool,
}

impl Default for ItemSessionControl {
    fn default() -> Self {
        ItemSessionControl {
            max_attempts: 1,
            show_feedback: false,
            allow_review: true,
            show_solution: false,
            allow_comment: false,
            allow_skipping: true,
            validate_responses: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeLimits {
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
    pub allow_late_submission: bool,
}

impl TimeLimits {
    pub fn max(max_time: Duration) -> Self {
        TimeLimits {
            min_time: None,
            max_time: Some(max_time),
            allow_late_submission: false,
        }
    }
}

/// How many children of a section are drawn for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub select: usize,
    pub with_replacement: bool,
    /// Only items carrying one of these categories are eligible (empty: all).
    pub include_categories: Vec<String>,
    /// Items carrying one of these categories are never eligible.
    pub exclude_categories: Vec<String>,
}

impl Selection {
    pub fn new(select: usize) -> Self {
        Selection {
            select,
            with_replacement: false,
            include_categories: Vec::new(),
            exclude_categories: Vec::new(),
        }
    }

    pub fn with_replacement(mut self) -> Self {
        self.with_replacement = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ordering {
    pub shuffle: bool,
}

/// A conditional jump taken when the owning component is left.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRule {
    pub target: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    pub identifier: String,
    pub value: f64,
}

// ──────────────────────────────────────────────
// Items
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentItem {
    pub identifier: String,
    pub title: String,
    pub adaptive: bool,
    pub time_dependent: bool,
    pub response_declarations: Vec<ResponseDeclaration>,
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    pub template_declarations: Vec<TemplateDeclaration>,
    pub template_processing: Vec<Rule>,
    pub response_processing: Vec<Rule>,
    pub validity_constraints: Vec<ResponseValidityConstraint>,
}

impl AssessmentItem {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        AssessmentItem {
            title: identifier.clone(),
            identifier,
            adaptive: false,
            time_dependent: false,
            response_declarations: Vec::new(),
            outcome_declarations: Vec::new(),
            template_declarations: Vec::new(),
            template_processing: Vec::new(),
            response_processing: Vec::new(),
            validity_constraints: Vec::new(),
        }
    }

    pub fn with_response(mut self, decl: ResponseDeclaration) -> Self {
        self.response_declarations.push(decl);
        self
    }

    pub fn with_outcome(mut self, decl: OutcomeDeclaration) -> Self {
        self.outcome_declarations.push(decl);
        self
    }

    pub fn with_template(mut self, decl: TemplateDeclaration) -> Self {
        self.template_declarations.push(decl);
        self
    }

    pub fn with_response_processing(mut self, rules: Vec<Rule>) -> Self {
        self.response_processing = rules;
        self
    }

    pub fn with_template_processing(mut self, rules: Vec<Rule>) -> Self {
        self.template_processing = rules;
        self
    }

    pub fn with_validity(mut self, constraint: ResponseValidityConstraint) -> Self {
        self.validity_constraints.push(constraint);
        self
    }

    pub fn response_declaration(&self, identifier: &str) -> Option<&ResponseDeclaration> {
        self.response_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    pub fn outcome_declaration(&self, identifier: &str) -> Option<&OutcomeDeclaration> {
        self.outcome_declarations
            .iter()
            .find(|d| d.identifier == identifier)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let scope = format!("item '{}'", self.identifier);
        let mut seen = BTreeSet::new();
        let ids = self
            .response_declarations
            .iter()
            .map(|d| &d.identifier)
            .chain(self.outcome_declarations.iter().map(|d| &d.identifier))
            .chain(self.template_declarations.iter().map(|d| &d.identifier));
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(ModelError::DuplicateIdentifier {
                    identifier: id.clone(),
                    scope,
                });
            }
        }

        self.response_declarations
            .iter()
            .try_for_each(ResponseDeclaration::validate)?;
        self.outcome_declarations
            .iter()
            .try_for_each(OutcomeDeclaration::validate)?;
        self.template_declarations
            .iter()
            .try_for_each(TemplateDeclaration::validate)?;

        ProcessingKind::Template.check(&self.template_processing)?;
        ProcessingKind::Response.check(&self.response_processing)?;
        self.template_processing
            .iter()
            .chain(self.response_processing.iter())
            .try_for_each(Rule::validate)?;

        for c in &self.validity_constraints {
            if self.response_declaration(&c.response_identifier).is_none() {
                return Err(ModelError::InvalidAttribute {
                    component: scope,
                    attribute: "responseIdentifier",
                    message: format!(
                        "validity constraint names undeclared response '{}'",
                        c.response_identifier
                    ),
                });
            }
            c.validate()?;
        }
        Ok(())
    }
}

/// An item placed in a test.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentItemRef {
    pub identifier: String,
    pub item: Arc<AssessmentItem>,
    pub categories: Vec<String>,
    pub required: bool,
    pub fixed: bool,
    pub pre_conditions: Vec<Expression>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub weights: Vec<Weight>,
}

impl AssessmentItemRef {
    pub fn new(identifier: impl Into<String>, item: Arc<AssessmentItem>) -> Self {
        AssessmentItemRef {
            identifier: identifier.into(),
            item,
            categories: Vec::new(),
            required: false,
            fixed: false,
            pre_conditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            weights: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn with_pre_condition(mut self, expression: Expression) -> Self {
        self.pre_conditions.push(expression);
        self
    }

    pub fn with_branch_rule(mut self, target: impl Into<String>, expression: Expression) -> Self {
        self.branch_rules.push(BranchRule {
            target: target.into(),
            expression,
        });
        self
    }

    pub fn with_session_control(mut self, control: ItemSessionControl) -> Self {
        self.item_session_control = Some(control);
        self
    }

    pub fn with_time_limits(mut self, limits: TimeLimits) -> Self {
        self.time_limits = Some(limits);
        self
    }

    pub fn with_weight(mut self, identifier: impl Into<String>, value: f64) -> Self {
        self.weights.push(Weight {
            identifier: identifier.into(),
            value,
        });
        self
    }

    pub fn weight(&self, identifier: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.identifier == identifier)
            .map(|w| w.value)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

// ──────────────────────────────────────────────
// Sections, parts and tests
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SectionPart {
    Section(Arc<AssessmentSection>),
    Item(Arc<AssessmentItemRef>),
}

impl SectionPart {
    pub fn identifier(&self) -> &str {
        match self {
            SectionPart::Section(s) => &s.identifier,
            SectionPart::Item(i) => &i.identifier,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            SectionPart::Section(s) => s.required,
            SectionPart::Item(i) => i.required,
        }
    }

    pub fn is_fixed(&self) -> bool {
        match self {
            SectionPart::Section(s) => s.fixed,
            SectionPart::Item(i) => i.fixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSection {
    pub identifier: String,
    pub title: String,
    pub visible: bool,
    pub required: bool,
    pub fixed: bool,
    pub selection: Option<Selection>,
    pub ordering: Option<Ordering>,
    pub pre_conditions: Vec<Expression>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub children: Vec<SectionPart>,
}

impl AssessmentSection {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        AssessmentSection {
            title: identifier.clone(),
            identifier,
            visible: true,
            required: false,
            fixed: false,
            selection: None,
            ordering: None,
            pre_conditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            children: Vec::new(),
        }
    }

    pub fn with_item(mut self, item_ref: AssessmentItemRef) -> Self {
        self.children.push(SectionPart::Item(Arc::new(item_ref)));
        self
    }

    pub fn with_section(mut self, section: AssessmentSection) -> Self {
        self.children.push(SectionPart::Section(Arc::new(section)));
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn shuffled(mut self) -> Self {
        self.ordering = Some(Ordering { shuffle: true });
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn with_pre_condition(mut self, expression: Expression) -> Self {
        self.pre_conditions.push(expression);
        self
    }

    pub fn with_branch_rule(mut self, target: impl Into<String>, expression: Expression) -> Self {
        self.branch_rules.push(BranchRule {
            target: target.into(),
            expression,
        });
        self
    }

    pub fn with_session_control(mut self, control: ItemSessionControl) -> Self {
        self.item_session_control = Some(control);
        self
    }

    pub fn with_time_limits(mut self, limits: TimeLimits) -> Self {
        self.time_limits = Some(limits);
        self
    }

    /// Every item reference below this section, depth first.
    pub fn item_refs(&self) -> Vec<&Arc<AssessmentItemRef>> {
        let mut out = Vec::new();
        for child in &self.children {
            match child {
                SectionPart::Item(i) => out.push(i),
                SectionPart::Section(s) => out.extend(s.item_refs()),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestPart {
    pub identifier: String,
    pub navigation_mode: NavigationMode,
    pub submission_mode: SubmissionMode,
    pub pre_conditions: Vec<Expression>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub sections: Vec<Arc<AssessmentSection>>,
}

impl TestPart {
    pub fn new(
        identifier: impl Into<String>,
        navigation_mode: NavigationMode,
        submission_mode: SubmissionMode,
    ) -> Self {
        TestPart {
            identifier: identifier.into(),
            navigation_mode,
            submission_mode,
            pre_conditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: AssessmentSection) -> Self {
        self.sections.push(Arc::new(section));
        self
    }

    pub fn with_pre_condition(mut self, expression: Expression) -> Self {
        self.pre_conditions.push(expression);
        self
    }

    pub fn with_branch_rule(mut self, target: impl Into<String>, expression: Expression) -> Self {
        self.branch_rules.push(BranchRule {
            target: target.into(),
            expression,
        });
        self
    }

    pub fn with_session_control(mut self, control: ItemSessionControl) -> Self {
        self.item_session_control = Some(control);
        self
    }

    pub fn with_time_limits(mut self, limits: TimeLimits) -> Self {
        self.time_limits = Some(limits);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentTest {
    pub identifier: String,
    pub title: String,
    pub outcome_declarations: Vec<OutcomeDeclaration>,
    pub outcome_processing: Vec<Rule>,
    pub time_limits: Option<TimeLimits>,
    pub test_parts: Vec<Arc<TestPart>>,
}

impl AssessmentTest {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        AssessmentTest {
            title: identifier.clone(),
            identifier,
            outcome_declarations: Vec::new(),
            outcome_processing: Vec::new(),
            time_limits: None,
            test_parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: TestPart) -> Self {
        self.test_parts.push(Arc::new(part));
        self
    }

    pub fn with_outcome(mut self, decl: OutcomeDeclaration) -> Self {
        self.outcome_declarations.push(decl);
        self
    }

    pub fn with_outcome_processing(mut self, rules: Vec<Rule>) -> Self {
        self.outcome_processing = rules;
        self
    }

    pub fn with_time_limits(mut self, limits: TimeLimits) -> Self {
        self.time_limits = Some(limits);
        self
    }

    /// Validate the whole test: declarations, rules, expressions, the items
    /// it references and the uniqueness of structural identifiers.
    pub fn validate(&self) -> Result<(), ModelError> {
        let scope = format!("test '{}'", self.identifier);
        if self.test_parts.is_empty() {
            return Err(ModelError::MissingAttribute {
                component: scope,
                attribute: "testPart",
            });
        }

        let mut outcomes = BTreeSet::new();
        for decl in &self.outcome_declarations {
            if !outcomes.insert(decl.identifier.as_str()) {
                return Err(ModelError::DuplicateIdentifier {
                    identifier: decl.identifier.clone(),
                    scope,
                });
            }
            decl.validate()?;
        }
        ProcessingKind::Outcome.check(&self.outcome_processing)?;
        self.outcome_processing
            .iter()
            .try_for_each(Rule::validate)?;

        let mut structure = BTreeSet::new();
        for part in &self.test_parts {
            claim(&mut structure, &part.identifier, &scope)?;
            validate_guards(&part.pre_conditions, &part.branch_rules)?;
            if part.sections.is_empty() {
                return Err(ModelError::MissingAttribute {
                    component: format!("testPart '{}'", part.identifier),
                    attribute: "assessmentSection",
                });
            }
            for section in &part.sections {
                validate_section(section, &mut structure, &scope)?;
            }
        }
        Ok(())
    }
}

fn claim<'a>(
    seen: &mut BTreeSet<&'a str>,
    identifier: &'a str,
    scope: &str,
) -> Result<(), ModelError> {
    if seen.insert(identifier) {
        Ok(())
    } else {
        Err(ModelError::DuplicateIdentifier {
            identifier: identifier.to_string(),
            scope: scope.to_string(),
        })
    }
}

fn validate_guards(pre_conditions: &[Expression], branch_rules: &[BranchRule]) -> Result<(), ModelError> {
    pre_conditions.iter().try_for_each(Expression::validate)?;
    branch_rules
        .iter()
        .try_for_each(|b| b.expression.validate())
}

fn validate_section<'a>(
    section: &'a AssessmentSection,
    seen: &mut BTreeSet<&'a str>,
    scope: &str,
) -> Result<(), ModelError> {
    claim(seen, &section.identifier, scope)?;
    validate_guards(&section.pre_conditions, &section.branch_rules)?;
    for child in &section.children {
        match child {
            SectionPart::Section(s) => validate_section(s, seen, scope)?,
            SectionPart::Item(i) => {
                claim(seen, &i.identifier, scope)?;
                validate_guards(&i.pre_conditions, &i.branch_rules)?;
                i.item.validate()?;
            }
        }
    }
    Ok(())
}
