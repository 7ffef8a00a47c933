//! Test navigation.
//!
//! A [`TestSession`] owns the route, the test-level variables and one item
//! session per route position. Transitions are the only mutators of the
//! position; each one first credits elapsed time and enforces maximum time
//! limits, outermost first, then performs the requested move.
//!
//! Rejected transitions return an error before anything is mutated.
//! Validity problems (responses, minimum times) never reject a move on
//! their own; they are reported in the [`MoveReport`].

pub mod item;
pub mod snapshot;
pub mod timing;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use qti_core::{
    AssessmentTest, Expression, NavigationMode, ProcessingKind, SubmissionMode, Value,
    EXIT_SECTION, EXIT_TEST, EXIT_TESTPART,
};
use qti_core::declaration::DURATION;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, EvalError, NavigationError, RuleError};
use crate::expression::{evaluate, EvalContext, Environment, ItemView, TestScope};
use crate::route::{Route, RouteItem};
use crate::rules::ProcessingEngine;
use crate::validity::{self, Violation};
use crate::variable::{State, VariableKind};

pub use item::{ItemSession, ItemSessionState};
pub use snapshot::SessionSnapshot;
pub use timing::{LimitLevel, TimeLimitExit, Timing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    NotStarted,
    Interacting,
    Suspended,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::NotStarted => "not started",
            SessionState::Interacting => "interacting",
            SessionState::Suspended => "suspended",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What a transition did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveReport {
    /// Position after the transition; `None` once the test is closed.
    pub position: Option<usize>,
    /// Set when a maximum time limit forced the transition instead of the
    /// requested one.
    pub forced: Option<TimeLimitExit>,
    /// Positions passed over because their pre-conditions did not hold.
    pub skipped: Vec<usize>,
    /// Branch target followed, if any.
    pub branched_to: Option<String>,
    pub violations: Vec<Violation>,
}

impl MoveReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Where navigation goes after leaving a position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Jump {
    Next,
    Position(usize),
    EndOfPart,
    EndOfTest,
}

/// Whose branch rule is being resolved.
#[derive(Debug, Clone, Copy)]
enum Owner<'a> {
    Item,
    Section(&'a str),
    TestPart,
}

// ──────────────────────────────────────────────
// Test scope over the item sessions
// ──────────────────────────────────────────────

struct SessionScope<'s> {
    route: &'s Route,
    items: &'s [ItemSession],
}

impl TestScope for SessionScope<'_> {
    fn items(&self) -> Vec<ItemView<'_>> {
        self.route
            .iter()
            .zip(self.items)
            .map(|(r, s)| ItemView {
                item_ref: &r.item_ref,
                sections: &r.section_ids,
                state: &s.variables,
                presented: s.presented,
                responded: s.responded,
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────

pub struct TestSession {
    test: Arc<AssessmentTest>,
    route: Route,
    position: usize,
    state: SessionState,
    test_state: State,
    items: Vec<ItemSession>,
    timing: Timing,
    env: Environment,
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("test", &self.test.identifier)
            .field("state", &self.state)
            .field("position", &self.position)
            .field("route_len", &self.route.len())
            .finish()
    }
}

impl TestSession {
    /// Validate `test`, build the route and declare an item session per
    /// route item. Template processing runs when an item is first entered.
    pub fn new(test: Arc<AssessmentTest>, config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        test.validate()?;
        let mut env = Environment::new(config);
        let route = Route::build(&test, &mut env.rng)?;
        let items = route
            .iter()
            .map(|r| ItemSession::declared(Arc::clone(&r.item_ref.item), r.session_control()))
            .collect();
        debug!(test = %test.identifier, items = route.len(), "test session created");
        Ok(TestSession {
            test_state: State::for_test(&test),
            test,
            route,
            position: 0,
            state: SessionState::NotStarted,
            items,
            timing: Timing::default(),
            env,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn test(&self) -> &AssessmentTest {
        &self.test
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Current position; `None` unless the session is running.
    pub fn position(&self) -> Option<usize> {
        matches!(self.state, SessionState::Interacting | SessionState::Suspended)
            .then_some(self.position)
    }

    pub fn current(&self) -> Option<&RouteItem> {
        self.position().and_then(|p| self.route.get(p))
    }

    pub fn current_item_session(&self) -> Option<&ItemSession> {
        self.position().and_then(|p| self.items.get(p))
    }

    pub fn item_session(&self, position: usize) -> Option<&ItemSession> {
        self.items.get(position)
    }

    pub fn test_variables(&self) -> &State {
        &self.test_state
    }

    /// A test-level variable, or `ITEM.VAR` / `ITEM.k.VAR` of an item
    /// session.
    pub fn value(&self, identifier: &str) -> Option<Value> {
        if let Some(v) = self.test_state.value(identifier) {
            return Some(v.clone());
        }
        let (item, rest) = identifier.split_once('.')?;
        let (occurrence, var) = match rest.split_once('.') {
            Some((k, var)) => (k.parse().ok()?, var),
            None => (1, rest),
        };
        let scope = self.scope();
        let view = scope.item(item, Some(occurrence))?;
        view.state.value(var).cloned()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    fn scope(&self) -> SessionScope<'_> {
        SessionScope {
            route: &self.route,
            items: &self.items,
        }
    }

    fn require(&self, operation: &'static str, expected: SessionState) -> Result<(), NavigationError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NavigationError::IllegalTransition {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn current_route_item(&self) -> Result<RouteItem, NavigationError> {
        self.route
            .get(self.position)
            .cloned()
            .ok_or(NavigationError::PositionOutOfRange {
                position: self.position,
                len: self.route.len(),
            })
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Start the test and enter the first route item whose pre-conditions
    /// hold.
    pub fn begin(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("begin", SessionState::NotStarted)?;
        self.timing.start(now);
        self.state = SessionState::Interacting;
        debug!(test = %self.test.identifier, "test begun");
        let mut report = MoveReport::default();
        self.enter_from(0, None, &mut report)?;
        Ok(report)
    }

    /// Begin an attempt on the current item.
    pub fn begin_attempt(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("begin_attempt", SessionState::Interacting)?;
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }
        self.items[self.position].begin_attempt()?;
        report.position = Some(self.position);
        Ok(report)
    }

    /// End the attempt on the current item with `responses`.
    ///
    /// Responses are type-checked and bound, then validated. With
    /// `validate_responses` set, invalid responses reject the call;
    /// otherwise the violations are reported. Response processing runs now
    /// in individual submission mode and at the end of the test part in
    /// simultaneous mode.
    pub fn end_attempt(
        &mut self,
        responses: BTreeMap<String, Value>,
        now: OffsetDateTime,
    ) -> Result<MoveReport, NavigationError> {
        self.require("end_attempt", SessionState::Interacting)?;
        let p = self.position;
        if self.items[p].status != ItemSessionState::Interacting {
            return Err(NavigationError::IllegalTransition {
                operation: "end_attempt",
                state: format!("item session {:?}", self.items[p].status),
            });
        }
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }

        let session = &self.items[p];
        let bound = session.bind(&responses)?;
        let validity = validity::check_item(&session.item, &bound, &mut self.env.patterns)?;
        if session.control.validate_responses && !validity.is_valid() {
            return Err(NavigationError::InvalidResponses {
                item: session.identifier().to_string(),
                violations: validity.messages(),
            });
        }
        report.violations.extend(validity.violations);

        let route_item = self.current_route_item()?;
        let session = &mut self.items[p];
        session.variables = bound;
        session.responded = true;
        match route_item.test_part.submission_mode {
            SubmissionMode::Individual => {
                session.process_responses(&mut self.env)?;
                session.after_attempt();
                self.outcome_processing()?;
            }
            SubmissionMode::Simultaneous => {
                session.pending = true;
                session.after_attempt();
            }
        }
        debug!(item = %route_item.key(), "attempt ended");
        report.position = Some(p);
        Ok(report)
    }

    /// Leave the current item, following branch rules.
    pub fn move_next(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("move_next", SessionState::Interacting)?;
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }
        let p = self.position;
        let route_item = self.current_route_item()?;
        let linear = route_item.test_part.navigation_mode == NavigationMode::Linear;
        let session = &self.items[p];
        if linear && !session.responded && !session.control.allow_skipping {
            return Err(NavigationError::SkippingForbidden {
                item: route_item.key(),
            });
        }

        let jump = self.branch_target(p, &route_item, &mut report)?;
        let part = self.route.part_range(p);
        let target = match &jump {
            Jump::Next => p + 1,
            Jump::Position(q) => *q,
            Jump::EndOfPart | Jump::EndOfTest => part.end,
        };
        self.leaving_checks(p, target, &mut report);
        self.leave_item(p, linear);

        if jump == Jump::EndOfTest {
            self.finish_part(part)?;
            return self.finish_test(report);
        }
        self.enter_from(target, Some(part), &mut report)?;
        Ok(report)
    }

    /// Go back to the previous enterable item of a non-linear test part.
    pub fn move_back(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("move_back", SessionState::Interacting)?;
        let p = self.position;
        let route_item = self.current_route_item()?;
        self.require_non_linear("move_back", &route_item)?;
        let part = self.route.part_range(p);
        let mut skipped = Vec::new();
        let mut target = None;
        for q in (part.start..p).rev() {
            if self.pre_conditions_hold(q)? {
                target = Some(q);
                break;
            }
            skipped.push(q);
        }
        let Some(q) = target else {
            return Err(NavigationError::IllegalTransition {
                operation: "move_back",
                state: format!("at the start of test part '{}'", route_item.test_part.identifier),
            });
        };
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }
        report.skipped = skipped;
        self.leaving_checks(p, q, &mut report);
        self.leave_item(p, false);
        self.enter_at(q, &mut report)?;
        Ok(report)
    }

    /// Jump to `position` within the current non-linear test part.
    pub fn jump_to(
        &mut self,
        position: usize,
        now: OffsetDateTime,
    ) -> Result<MoveReport, NavigationError> {
        self.require("jump_to", SessionState::Interacting)?;
        let p = self.position;
        let route_item = self.current_route_item()?;
        self.require_non_linear("jump_to", &route_item)?;
        let key = self
            .route
            .get(position)
            .ok_or(NavigationError::PositionOutOfRange {
                position,
                len: self.route.len(),
            })?
            .key();
        if !self.route.part_range(p).contains(&position) {
            return Err(NavigationError::OutsideTestPart {
                position,
                part: route_item.test_part.identifier.clone(),
            });
        }
        if !self.pre_conditions_hold(position)? {
            return Err(NavigationError::PreConditionFailed { item: key });
        }
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }
        self.leaving_checks(p, position, &mut report);
        self.leave_item(p, false);
        self.enter_at(position, &mut report)?;
        Ok(report)
    }

    pub fn suspend(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("suspend", SessionState::Interacting)?;
        let mut report = MoveReport::default();
        if self.tick(now, &mut report)? {
            return Ok(report);
        }
        self.timing.stop();
        self.state = SessionState::Suspended;
        debug!(test = %self.test.identifier, "test suspended");
        report.position = Some(self.position);
        Ok(report)
    }

    pub fn resume(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        self.require("resume", SessionState::Suspended)?;
        self.timing.start(now);
        self.state = SessionState::Interacting;
        debug!(test = %self.test.identifier, "test resumed");
        Ok(MoveReport {
            position: Some(self.position),
            ..MoveReport::default()
        })
    }

    /// End the test from wherever it is.
    pub fn end_test(&mut self, now: OffsetDateTime) -> Result<MoveReport, NavigationError> {
        if matches!(self.state, SessionState::NotStarted | SessionState::Closed) {
            return Err(NavigationError::IllegalTransition {
                operation: "end_test",
                state: self.state.to_string(),
            });
        }
        let mut report = MoveReport::default();
        if self.state == SessionState::Interacting && self.tick(now, &mut report)? {
            return Ok(report);
        }
        let part = self.route.part_range(self.position);
        self.finish_part(part)?;
        self.finish_test(report)
    }

    fn require_non_linear(
        &self,
        operation: &'static str,
        route_item: &RouteItem,
    ) -> Result<(), NavigationError> {
        if route_item.test_part.navigation_mode == NavigationMode::Linear {
            return Err(NavigationError::LinearMode {
                operation,
                part: route_item.test_part.identifier.clone(),
            });
        }
        Ok(())
    }

    // ── Entering and leaving ─────────────────────────────────────────

    /// Enter the first position from `q` on whose pre-conditions hold.
    /// Leaving the test part `leaving` finishes it; running off the route
    /// finishes the test.
    fn enter_from(
        &mut self,
        mut q: usize,
        mut leaving: Option<Range<usize>>,
        report: &mut MoveReport,
    ) -> Result<(), NavigationError> {
        loop {
            if let Some(part) = leaving.take() {
                if part.contains(&q) {
                    leaving = Some(part);
                } else {
                    self.finish_part(part)?;
                }
            }
            if q >= self.route.len() {
                *report = self.finish_test(std::mem::take(report))?;
                return Ok(());
            }
            if leaving.is_none() {
                leaving = Some(self.route.part_range(q));
            }
            if self.pre_conditions_hold(q)? {
                self.enter_at(q, report)?;
                return Ok(());
            }
            report.skipped.push(q);
            q += 1;
        }
    }

    fn enter_at(&mut self, q: usize, report: &mut MoveReport) -> Result<(), NavigationError> {
        let session = &mut self.items[q];
        session.instantiate(&mut self.env)?;
        session.resume_attempt();
        session.presented = true;
        self.position = q;
        report.position = Some(q);
        if let Some(r) = self.route.get(q) {
            debug!(item = %r.key(), position = q, "entered route item");
        }
        Ok(())
    }

    fn leave_item(&mut self, p: usize, linear: bool) {
        let session = &mut self.items[p];
        if linear {
            session.close();
        } else {
            session.interrupt();
        }
    }

    /// Minimum times of the components left by moving from `p` to
    /// `target`.
    fn leaving_checks(&self, p: usize, target: usize, report: &mut MoveReport) {
        let Some(route_item) = self.route.get(p) else {
            return;
        };
        let part = self.route.part_range(p);
        for (component, limits) in route_item.time_limits() {
            let left = if component == route_item.test_part.identifier {
                !part.contains(&target)
            } else if component == route_item.item_ref.identifier {
                true
            } else {
                self.route
                    .section_range(p, component)
                    .is_some_and(|r| !r.contains(&target))
            };
            let spent = if component == route_item.item_ref.identifier {
                self.items[p].duration
            } else {
                self.timing.get(component)
            };
            if left && timing::min_not_reached(limits, spent) {
                report.violations.push(Violation::MinTimeNotReached {
                    component: component.to_string(),
                    required: limits.min_time.unwrap_or_default(),
                    spent,
                });
            }
        }
    }

    /// Deferred response processing, then test outcome processing.
    fn finish_part(&mut self, part: Range<usize>) -> Result<(), NavigationError> {
        for q in part.clone() {
            let session = &mut self.items[q];
            if session.pending {
                session.process_responses(&mut self.env)?;
            }
            session.close();
        }
        self.outcome_processing()?;
        if let Some(r) = self.route.get(part.start) {
            debug!(test_part = %r.test_part.identifier, "test part finished");
        }
        Ok(())
    }

    fn finish_test(&mut self, mut report: MoveReport) -> Result<MoveReport, NavigationError> {
        for session in &mut self.items {
            session.close();
        }
        self.outcome_processing()?;
        self.timing.stop();
        self.state = SessionState::Closed;
        report.position = None;
        debug!(test = %self.test.identifier, "test closed");
        Ok(report)
    }

    // ── Expressions at test level ────────────────────────────────────

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, NavigationError> {
        let scope = SessionScope {
            route: &self.route,
            items: &self.items,
        };
        let mut ctx = EvalContext::with_scope(&self.test_state, &scope, &mut self.env);
        Ok(evaluate(expression, &mut ctx)?)
    }

    /// Null is false; anything but a single boolean is an error.
    fn guard(&mut self, expression: &Expression, rule: &'static str) -> Result<bool, NavigationError> {
        let value = self.evaluate(expression)?;
        if value.is_null() {
            return Ok(false);
        }
        value.as_bool().ok_or_else(|| {
            RuleError::GuardType {
                rule,
                actual: value.describe(),
            }
            .into()
        })
    }

    fn pre_conditions_hold(&mut self, q: usize) -> Result<bool, NavigationError> {
        let Some(route_item) = self.route.get(q).cloned() else {
            return Ok(false);
        };
        for expression in route_item.pre_conditions() {
            if !self.guard(expression, "preCondition")? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn outcome_processing(&mut self) -> Result<(), NavigationError> {
        let test = Arc::clone(&self.test);
        let engine = ProcessingEngine::new(ProcessingKind::Outcome, &test.outcome_processing)
            .map_err(EvalError::from)?;
        self.test_state.reset(VariableKind::Outcome);
        let scope = SessionScope {
            route: &self.route,
            items: &self.items,
        };
        engine.run(&mut self.test_state, Some(&scope), &mut self.env)?;
        Ok(())
    }

    // ── Branching ────────────────────────────────────────────────────

    /// The first true branch rule of the item, then of every section
    /// ending at `p` innermost first, then of the test part when `p` ends
    /// it.
    fn branch_target(
        &mut self,
        p: usize,
        route_item: &RouteItem,
        report: &mut MoveReport,
    ) -> Result<Jump, NavigationError> {
        for rule in &route_item.item_ref.branch_rules {
            if self.guard(&rule.expression, "branchRule")? {
                report.branched_to = Some(rule.target.clone());
                return self.resolve_target(p, route_item, &rule.target, Owner::Item);
            }
        }
        for section in route_item.sections.iter().rev() {
            let ends_here = self
                .route
                .section_range(p, &section.identifier)
                .is_some_and(|r| r.end == p + 1);
            if !ends_here {
                break;
            }
            for rule in &section.branch_rules {
                if self.guard(&rule.expression, "branchRule")? {
                    report.branched_to = Some(rule.target.clone());
                    let owner = Owner::Section(&section.identifier);
                    return self.resolve_target(p, route_item, &rule.target, owner);
                }
            }
        }
        if self.route.part_range(p).end == p + 1 {
            for rule in &route_item.test_part.branch_rules {
                if self.guard(&rule.expression, "branchRule")? {
                    report.branched_to = Some(rule.target.clone());
                    return self.resolve_target(p, route_item, &rule.target, Owner::TestPart);
                }
            }
        }
        Ok(Jump::Next)
    }

    fn resolve_target(
        &self,
        p: usize,
        route_item: &RouteItem,
        target: &str,
        owner: Owner<'_>,
    ) -> Result<Jump, NavigationError> {
        let rejected = |message: &str| NavigationError::BranchTarget {
            from: route_item.key(),
            target: target.to_string(),
            message: message.to_string(),
        };
        let part = self.route.part_range(p);

        match target {
            EXIT_TEST => return Ok(Jump::EndOfTest),
            EXIT_TESTPART => return Ok(Jump::EndOfPart),
            EXIT_SECTION => {
                let section = match owner {
                    Owner::Item => route_item.section_ids.last(),
                    Owner::Section(id) => {
                        let at = route_item.section_ids.iter().position(|s| s == id);
                        at.and_then(|i| i.checked_sub(1))
                            .and_then(|i| route_item.section_ids.get(i))
                    }
                    Owner::TestPart => None,
                };
                let end = section
                    .and_then(|s| self.route.section_range(p, s))
                    .map_or(part.end, |r| r.end);
                return Ok(Jump::Position(end));
            }
            _ => {}
        }

        if self.test.test_parts.iter().any(|t| t.identifier == target) {
            if !matches!(owner, Owner::TestPart) {
                return Err(rejected("only test parts may branch to another test part"));
            }
            return match self.route.first_of_part(target) {
                Some(q) if q > p => Ok(Jump::Position(q)),
                Some(_) => Err(rejected("backward branching is not allowed")),
                None => Ok(Jump::EndOfPart),
            };
        }

        let positions: Vec<usize> = (0..self.route.len())
            .filter(|q| {
                self.route.get(*q).is_some_and(|r| {
                    r.identifier() == target
                        || (r.in_section(target)
                            && (*q == 0
                                || !self
                                    .route
                                    .get(*q - 1)
                                    .is_some_and(|prev| prev.in_section(target))))
                })
            })
            .collect();
        if positions.is_empty() {
            return Err(rejected("no such item, section or test part on the route"));
        }
        if route_item.in_section(target) {
            return Err(rejected("cannot branch into the enclosing section"));
        }
        if let Some(q) = positions.iter().copied().find(|q| *q > p && part.contains(q)) {
            return Ok(Jump::Position(q));
        }
        if positions.iter().any(|q| !part.contains(q)) {
            return Err(rejected("target is outside the current test part"));
        }
        Err(rejected("backward branching is not allowed"))
    }

    // ── Time ─────────────────────────────────────────────────────────

    /// Credit the time since the previous transition and force the end of
    /// the outermost component whose maximum time is exceeded. Returns
    /// whether a transition was forced.
    fn tick(&mut self, now: OffsetDateTime, report: &mut MoveReport) -> Result<bool, NavigationError> {
        let elapsed = self.timing.elapse(now);
        let p = self.position;
        let route_item = self.current_route_item()?;
        let test_id = self.test.identifier.clone();
        self.timing.add(&test_id, elapsed);
        self.timing.add(&route_item.test_part.identifier, elapsed);
        for s in &route_item.section_ids {
            self.timing.add(s, elapsed);
        }
        self.items[p].add_duration(elapsed);
        let test_duration = self.timing.get(&test_id);
        if let Some(var) = self.test_state.get_mut(DURATION) {
            var.value = Value::duration(test_duration);
        }

        let part = self.route.part_range(p);
        if let Some(limits) = &self.test.time_limits {
            if timing::max_exceeded(limits, test_duration) {
                warn!(test = %test_id, "maximum test time exceeded, closing the test");
                report.forced = Some(TimeLimitExit {
                    level: LimitLevel::Test,
                    component: test_id,
                    spent: test_duration,
                });
                self.finish_part(part.clone())?;
                *report = self.finish_test(std::mem::take(report))?;
                return Ok(true);
            }
        }

        for (component, limits) in route_item.time_limits() {
            let (level, spent, end) = if component == route_item.test_part.identifier {
                (LimitLevel::TestPart, self.timing.get(component), part.end)
            } else if component == route_item.item_ref.identifier {
                (LimitLevel::Item, self.items[p].duration, p + 1)
            } else {
                let end = self
                    .route
                    .section_range(p, component)
                    .map_or(p + 1, |r| r.end);
                (LimitLevel::Section, self.timing.get(component), end)
            };
            if timing::max_exceeded(limits, spent) {
                warn!(component, ?level, "maximum time exceeded, forcing exit");
                report.forced = Some(TimeLimitExit {
                    level,
                    component: component.to_string(),
                    spent,
                });
                self.items[p].close();
                self.enter_from(end, Some(part.clone()), report)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests;
