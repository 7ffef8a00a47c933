use super::*;
use qti_core::{
    AssessmentItem, AssessmentItemRef, AssessmentSection, BaseType, Cardinality, Condition,
    ItemSessionControl, ItemSubset, OperatorKind, OutcomeDeclaration, ResponseDeclaration,
    ResponseValidityConstraint, Rule, TemplateDeclaration, TestPart, TimeLimits,
};
use time::macros::datetime;
use time::Duration;

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn at(seconds: i64) -> OffsetDateTime {
    datetime!(2024-03-01 09:00 UTC) + Duration::seconds(seconds)
}

/// One identifier response, correct when it is `A`; SCORE is 1 or 0.
fn item(id: &str) -> Arc<AssessmentItem> {
    let correct = Expression::op(
        OperatorKind::Match,
        vec![Expression::variable("RESPONSE"), Expression::identifier("A")],
    );
    Arc::new(
        AssessmentItem::new(id)
            .with_response(
                ResponseDeclaration::new("RESPONSE", Cardinality::Single, Some(BaseType::Identifier))
                    .with_correct(Value::identifier("A")),
            )
            .with_outcome(OutcomeDeclaration::new(
                "SCORE",
                Cardinality::Single,
                Some(BaseType::Float),
            ))
            .with_response_processing(vec![Rule::Condition(
                Condition::when(correct, vec![Rule::set_outcome("SCORE", Expression::float(1.0))])
                    .otherwise(vec![Rule::set_outcome("SCORE", Expression::float(0.0))]),
            )]),
    )
}

fn item_ref(id: &str) -> AssessmentItemRef {
    AssessmentItemRef::new(id, item(id))
}

fn section(id: &str, refs: Vec<AssessmentItemRef>) -> AssessmentSection {
    refs.into_iter()
        .fold(AssessmentSection::new(id), |s, r| s.with_item(r))
}

fn test_with(part: TestPart) -> Arc<AssessmentTest> {
    Arc::new(
        AssessmentTest::new("T")
            .with_outcome(OutcomeDeclaration::new(
                "NCORRECT",
                Cardinality::Single,
                Some(BaseType::Integer),
            ))
            .with_outcome_processing(vec![Rule::set_outcome(
                "NCORRECT",
                Expression::NumberCorrect(ItemSubset::default()),
            )])
            .with_part(part),
    )
}

fn part(
    navigation: NavigationMode,
    submission: SubmissionMode,
    refs: Vec<AssessmentItemRef>,
) -> TestPart {
    TestPart::new("P", navigation, submission).with_section(section("S", refs))
}

fn three(navigation: NavigationMode) -> Arc<AssessmentTest> {
    test_with(part(
        navigation,
        SubmissionMode::Individual,
        vec![item_ref("Q1"), item_ref("Q2"), item_ref("Q3")],
    ))
}

fn started(test: Arc<AssessmentTest>) -> TestSession {
    let mut session = TestSession::new(test, EngineConfig::seeded(7)).unwrap();
    session.begin(at(0)).unwrap();
    session
}

fn answer(value: &str) -> BTreeMap<String, Value> {
    BTreeMap::from([("RESPONSE".to_string(), Value::identifier(value))])
}

fn respond(session: &mut TestSession, value: &str, now: OffsetDateTime) -> MoveReport {
    session.begin_attempt(now).unwrap();
    session.end_attempt(answer(value), now).unwrap()
}

// ──────────────────────────────────────────────
// Linear navigation
// ──────────────────────────────────────────────

#[test]
fn linear_walk_reaches_the_end_of_the_test() {
    let mut s = started(three(NavigationMode::Linear));
    assert_eq!(s.position(), Some(0));
    assert!(s.item_session(0).unwrap().presented);

    respond(&mut s, "A", at(5));
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
    assert_eq!(s.value("Q1.SCORE"), Some(Value::float(1.0)));

    assert_eq!(s.move_next(at(6)).unwrap().position, Some(1));
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Closed);
    s.move_next(at(7)).unwrap();
    let report = s.move_next(at(8)).unwrap();
    assert_eq!(report.position, None);
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.position(), None);
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
}

#[test]
fn linear_parts_refuse_backward_moves_and_jumps() {
    let mut s = started(three(NavigationMode::Linear));
    s.move_next(at(1)).unwrap();
    assert!(matches!(
        s.move_back(at(2)),
        Err(NavigationError::LinearMode { operation: "move_back", .. })
    ));
    assert!(matches!(
        s.jump_to(2, at(2)),
        Err(NavigationError::LinearMode { .. })
    ));
    assert_eq!(s.position(), Some(1));
}

#[test]
fn skipping_can_be_forbidden() {
    let control = ItemSessionControl {
        allow_skipping: false,
        ..ItemSessionControl::default()
    };
    let test = test_with(
        part(
            NavigationMode::Linear,
            SubmissionMode::Individual,
            vec![item_ref("Q1"), item_ref("Q2")],
        )
        .with_session_control(control),
    );
    let mut s = started(test);
    assert!(matches!(
        s.move_next(at(1)),
        Err(NavigationError::SkippingForbidden { .. })
    ));
    respond(&mut s, "B", at(2));
    assert_eq!(s.move_next(at(3)).unwrap().position, Some(1));
}

#[test]
fn transitions_check_the_session_state() {
    let mut s = TestSession::new(three(NavigationMode::Linear), EngineConfig::seeded(1)).unwrap();
    assert_eq!(s.position(), None);
    assert!(matches!(
        s.move_next(at(0)),
        Err(NavigationError::IllegalTransition { operation: "move_next", .. })
    ));
    s.begin(at(0)).unwrap();
    assert!(s.begin(at(1)).is_err());
    assert!(matches!(
        s.end_attempt(answer("A"), at(1)),
        Err(NavigationError::IllegalTransition { operation: "end_attempt", .. })
    ));
}

// ──────────────────────────────────────────────
// Pre-conditions and branching
// ──────────────────────────────────────────────

#[test]
fn failed_pre_conditions_skip_items() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1"),
            item_ref("Q2").with_pre_condition(Expression::boolean(false)),
            item_ref("Q3"),
        ],
    ));
    let mut s = started(test);
    let report = s.move_next(at(1)).unwrap();
    assert_eq!(report.position, Some(2));
    assert_eq!(report.skipped, vec![1]);
    assert!(!s.item_session(1).unwrap().presented);
}

#[test]
fn skipped_items_are_never_instantiated() {
    let templated = (*item("Q2"))
        .clone()
        .with_template(TemplateDeclaration::new(
            "T",
            Cardinality::Single,
            Some(BaseType::Integer),
        ))
        .with_template_processing(vec![Rule::set_template("T", Expression::integer(1337))]);
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1"),
            AssessmentItemRef::new("Q2", Arc::new(templated))
                .with_pre_condition(Expression::boolean(false)),
            item_ref("Q3"),
        ],
    ));
    let mut s = started(test);
    assert!(s.item_session(0).unwrap().instantiated);
    assert_eq!(s.move_next(at(1)).unwrap().skipped, vec![1]);
    let skipped = s.item_session(1).unwrap();
    assert!(!skipped.instantiated);
    assert!(skipped.variables.value("T").unwrap().is_null());
}

#[test]
fn pre_conditions_see_earlier_outcomes() {
    let passed = Expression::op(
        OperatorKind::Gte,
        vec![Expression::variable("NCORRECT"), Expression::integer(1)],
    );
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![item_ref("Q1"), item_ref("BONUS").with_pre_condition(passed)],
    ));

    let mut wrong = started(Arc::clone(&test));
    respond(&mut wrong, "B", at(1));
    wrong.move_next(at(2)).unwrap();
    assert_eq!(wrong.state(), SessionState::Closed);

    let mut right = started(test);
    respond(&mut right, "A", at(1));
    assert_eq!(right.move_next(at(2)).unwrap().position, Some(1));
}

#[test]
fn branch_rules_jump_forward() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1").with_branch_rule("Q3", Expression::boolean(true)),
            item_ref("Q2"),
            item_ref("Q3"),
        ],
    ));
    let mut s = started(test);
    let report = s.move_next(at(1)).unwrap();
    assert_eq!(report.position, Some(2));
    assert_eq!(report.branched_to.as_deref(), Some("Q3"));
    assert!(!s.item_session(1).unwrap().presented);
}

#[test]
fn backward_branches_are_rejected() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1"),
            item_ref("Q2").with_branch_rule("Q1", Expression::boolean(true)),
        ],
    ));
    let mut s = started(test);
    s.move_next(at(1)).unwrap();
    assert!(matches!(
        s.move_next(at(2)),
        Err(NavigationError::BranchTarget { .. })
    ));
    assert_eq!(s.position(), Some(1));
}

#[test]
fn unknown_branch_targets_are_rejected() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![item_ref("Q1").with_branch_rule("NOWHERE", Expression::boolean(true))],
    ));
    let mut s = started(test);
    assert!(matches!(
        s.move_next(at(1)),
        Err(NavigationError::BranchTarget { .. })
    ));
}

#[test]
fn exit_test_branch_closes_the_test() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1").with_branch_rule(EXIT_TEST, Expression::boolean(true)),
            item_ref("Q2"),
        ],
    ));
    let mut s = started(test);
    respond(&mut s, "A", at(1));
    s.move_next(at(2)).unwrap();
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
}

#[test]
fn exit_section_leaves_the_enclosing_section() {
    let inner = section(
        "INNER",
        vec![
            item_ref("Q1").with_branch_rule(EXIT_SECTION, Expression::boolean(true)),
            item_ref("Q2"),
        ],
    );
    let outer = AssessmentSection::new("OUTER")
        .with_section(inner)
        .with_item(item_ref("Q3"));
    let test = test_with(
        TestPart::new("P", NavigationMode::Linear, SubmissionMode::Individual).with_section(outer),
    );
    let mut s = started(test);
    assert_eq!(s.move_next(at(1)).unwrap().position, Some(2));
    assert_eq!(s.current().unwrap().identifier(), "Q3");
}

#[test]
fn exit_section_from_an_outermost_section_ends_the_part() {
    let first = section("S1", vec![item_ref("Q1")])
        .with_branch_rule(EXIT_SECTION, Expression::boolean(true));
    let test = test_with(
        TestPart::new("P", NavigationMode::Linear, SubmissionMode::Individual)
            .with_section(first)
            .with_section(section("S2", vec![item_ref("Q2")])),
    );
    let mut s = started(test);
    let report = s.move_next(at(1)).unwrap();
    assert_eq!(report.position, None);
    assert_eq!(s.state(), SessionState::Closed);
    assert!(!s.item_session(1).unwrap().presented);
}

#[test]
fn null_branch_guards_are_false() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1").with_branch_rule("Q3", Expression::Null),
            item_ref("Q2"),
            item_ref("Q3"),
        ],
    ));
    let mut s = started(test);
    assert_eq!(s.move_next(at(1)).unwrap().position, Some(1));
}

// ──────────────────────────────────────────────
// Attempts and submission
// ──────────────────────────────────────────────

#[test]
fn attempts_are_limited_by_session_control() {
    let mut s = started(three(NavigationMode::NonLinear));
    respond(&mut s, "B", at(1));
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Closed);
    assert!(matches!(
        s.begin_attempt(at(2)),
        Err(NavigationError::AttemptLimit { max_attempts: 1, .. })
    ));
}

#[test]
fn simultaneous_submission_defers_response_processing() {
    let test = test_with(part(
        NavigationMode::NonLinear,
        SubmissionMode::Simultaneous,
        vec![item_ref("Q1"), item_ref("Q2")],
    ));
    let mut s = started(test);
    respond(&mut s, "A", at(1));
    let q1 = s.item_session(0).unwrap();
    assert!(q1.pending);
    assert_eq!(q1.variables.value("SCORE"), Some(&Value::float(0.0)));

    s.move_next(at(2)).unwrap();
    s.move_next(at(3)).unwrap();
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.value("Q1.SCORE"), Some(Value::float(1.0)));
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
}

#[test]
fn invalid_responses_are_rejected_when_validation_is_on() {
    let mut strict = (*item("Q1")).clone();
    strict
        .validity_constraints
        .push(ResponseValidityConstraint::new("RESPONSE", 1, 1));
    let control = ItemSessionControl {
        validate_responses: true,
        ..ItemSessionControl::default()
    };
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![AssessmentItemRef::new("Q1", Arc::new(strict)).with_session_control(control)],
    ));
    let mut s = started(test);
    s.begin_attempt(at(1)).unwrap();
    assert!(matches!(
        s.end_attempt(BTreeMap::new(), at(2)),
        Err(NavigationError::InvalidResponses { .. })
    ));
    let q1 = s.item_session(0).unwrap();
    assert_eq!(q1.status, ItemSessionState::Interacting);
    assert!(!q1.responded);

    let report = s.end_attempt(answer("A"), at(3)).unwrap();
    assert!(report.is_valid());
}

#[test]
fn invalid_responses_are_reported_when_validation_is_off() {
    let mut loose = (*item("Q1")).clone();
    loose
        .validity_constraints
        .push(ResponseValidityConstraint::new("RESPONSE", 1, 1));
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![AssessmentItemRef::new("Q1", Arc::new(loose))],
    ));
    let mut s = started(test);
    s.begin_attempt(at(1)).unwrap();
    let report = s.end_attempt(BTreeMap::new(), at(2)).unwrap();
    assert!(!report.is_valid());
    assert!(matches!(
        report.violations[0],
        Violation::TooFewResponses { min: 1, count: 0, .. }
    ));
}

#[test]
fn responses_must_match_declarations() {
    let mut s = started(three(NavigationMode::Linear));
    s.begin_attempt(at(1)).unwrap();
    let wrong = BTreeMap::from([("RESPONSE".to_string(), Value::integer(3))]);
    assert!(matches!(
        s.end_attempt(wrong, at(2)),
        Err(NavigationError::ResponseBinding { .. })
    ));
}

// ──────────────────────────────────────────────
// Non-linear navigation
// ──────────────────────────────────────────────

#[test]
fn non_linear_parts_allow_jumps_and_review() {
    let mut s = started(three(NavigationMode::NonLinear));
    assert_eq!(s.jump_to(2, at(1)).unwrap().position, Some(2));
    assert_eq!(s.move_back(at(2)).unwrap().position, Some(1));
    assert_eq!(s.move_back(at(3)).unwrap().position, Some(0));
    assert!(matches!(
        s.move_back(at(4)),
        Err(NavigationError::IllegalTransition { .. })
    ));
    assert!(matches!(
        s.jump_to(9, at(5)),
        Err(NavigationError::PositionOutOfRange { position: 9, len: 3 })
    ));
}

#[test]
fn jumps_stay_inside_the_test_part() {
    let test = Arc::new(
        AssessmentTest::new("T")
            .with_part(part(
                NavigationMode::NonLinear,
                SubmissionMode::Individual,
                vec![item_ref("Q1")],
            ))
            .with_part(
                TestPart::new("P2", NavigationMode::NonLinear, SubmissionMode::Individual)
                    .with_section(section("S2", vec![item_ref("Q2")])),
            ),
    );
    let mut s = started(test);
    assert!(matches!(
        s.jump_to(1, at(1)),
        Err(NavigationError::OutsideTestPart { position: 1, .. })
    ));
    assert_eq!(s.move_next(at(2)).unwrap().position, Some(1));
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Closed);
}

#[test]
fn returning_to_an_item_continues_its_open_attempt() {
    let mut s = started(three(NavigationMode::NonLinear));
    s.begin_attempt(at(1)).unwrap();
    s.jump_to(1, at(2)).unwrap();
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Suspended);
    s.jump_to(0, at(3)).unwrap();
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Interacting);

    s.end_attempt(answer("A"), at(4)).unwrap();
    let q1 = s.item_session(0).unwrap();
    assert_eq!(q1.attempts, 1);
    assert_eq!(q1.status, ItemSessionState::Closed);
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
}

#[test]
fn finished_attempts_stay_suspended_on_return() {
    let control = ItemSessionControl {
        max_attempts: 2,
        ..ItemSessionControl::default()
    };
    let test = test_with(part(
        NavigationMode::NonLinear,
        SubmissionMode::Individual,
        vec![item_ref("Q1").with_session_control(control), item_ref("Q2")],
    ));
    let mut s = started(test);
    respond(&mut s, "B", at(1));
    s.move_next(at(2)).unwrap();
    s.move_back(at(3)).unwrap();
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Suspended);
    assert!(matches!(
        s.end_attempt(answer("A"), at(4)),
        Err(NavigationError::IllegalTransition { .. })
    ));
    respond(&mut s, "A", at(5));
    assert_eq!(s.item_session(0).unwrap().attempts, 2);
}

#[test]
fn jumps_respect_pre_conditions() {
    let test = test_with(part(
        NavigationMode::NonLinear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1"),
            item_ref("Q2").with_pre_condition(Expression::boolean(false)),
        ],
    ));
    let mut s = started(test);
    assert!(matches!(
        s.jump_to(1, at(1)),
        Err(NavigationError::PreConditionFailed { .. })
    ));
}

// ──────────────────────────────────────────────
// Time
// ──────────────────────────────────────────────

#[test]
fn item_time_limit_forces_the_next_item() {
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![
            item_ref("Q1").with_time_limits(TimeLimits::max(Duration::seconds(60))),
            item_ref("Q2"),
        ],
    ));
    let mut s = started(test);
    let report = s.begin_attempt(at(61)).unwrap();
    let forced = report.forced.unwrap();
    assert_eq!(forced.level, LimitLevel::Item);
    assert_eq!(forced.component, "Q1");
    assert_eq!(report.position, Some(1));
    assert_eq!(s.item_session(0).unwrap().status, ItemSessionState::Closed);
    assert_eq!(s.item_session(1).unwrap().attempts, 0);
}

#[test]
fn late_submission_is_not_forced() {
    let limits = TimeLimits {
        allow_late_submission: true,
        ..TimeLimits::max(Duration::seconds(60))
    };
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![item_ref("Q1").with_time_limits(limits), item_ref("Q2")],
    ));
    let mut s = started(test);
    let report = s.begin_attempt(at(120)).unwrap();
    assert!(report.forced.is_none());
    assert_eq!(s.position(), Some(0));
}

#[test]
fn test_time_limit_closes_the_test() {
    let test = Arc::new(
        (*three(NavigationMode::NonLinear))
            .clone()
            .with_time_limits(TimeLimits::max(Duration::minutes(10))),
    );
    let mut s = started(test);
    respond(&mut s, "A", at(60));
    let report = s.move_next(at(601)).unwrap();
    assert_eq!(report.forced.unwrap().level, LimitLevel::Test);
    assert_eq!(report.position, None);
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(1)));
}

#[test]
fn rejected_moves_do_not_credit_time() {
    let mut linear = started(three(NavigationMode::Linear));
    assert!(matches!(
        linear.move_back(at(30)),
        Err(NavigationError::LinearMode { .. })
    ));
    assert!(matches!(
        linear.jump_to(1, at(30)),
        Err(NavigationError::LinearMode { .. })
    ));
    assert_eq!(linear.item_session(0).unwrap().duration, Duration::ZERO);
    assert_eq!(linear.timing().get("T"), Duration::ZERO);

    let mut free = started(three(NavigationMode::NonLinear));
    assert!(free.jump_to(7, at(30)).is_err());
    assert!(free.move_back(at(30)).is_err());
    assert_eq!(free.item_session(0).unwrap().duration, Duration::ZERO);
}

#[test]
fn leaving_before_the_minimum_time_is_reported() {
    let limits = TimeLimits {
        min_time: Some(Duration::seconds(30)),
        ..TimeLimits::default()
    };
    let test = test_with(part(
        NavigationMode::Linear,
        SubmissionMode::Individual,
        vec![item_ref("Q1").with_time_limits(limits), item_ref("Q2")],
    ));
    let mut s = started(test);
    let report = s.move_next(at(10)).unwrap();
    assert_eq!(report.position, Some(1));
    assert_eq!(
        report.violations,
        vec![Violation::MinTimeNotReached {
            component: "Q1".to_string(),
            required: Duration::seconds(30),
            spent: Duration::seconds(10),
        }]
    );
}

#[test]
fn suspended_time_is_not_counted() {
    let mut s = started(three(NavigationMode::Linear));
    s.suspend(at(10)).unwrap();
    assert_eq!(s.state(), SessionState::Suspended);
    assert!(s.move_next(at(50)).is_err());
    s.resume(at(100)).unwrap();
    s.move_next(at(110)).unwrap();
    assert_eq!(s.timing().get("T"), Duration::seconds(20));
    assert_eq!(s.item_session(0).unwrap().duration, Duration::seconds(20));
    assert_eq!(s.value("duration"), Some(Value::duration(Duration::seconds(20))));
}

// ──────────────────────────────────────────────
// Ending and snapshots
// ──────────────────────────────────────────────

#[test]
fn end_test_runs_outcome_processing() {
    let mut s = started(three(NavigationMode::NonLinear));
    respond(&mut s, "A", at(1));
    s.jump_to(2, at(2)).unwrap();
    respond(&mut s, "A", at(3));
    s.end_test(at(4)).unwrap();
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.value("NCORRECT"), Some(Value::integer(2)));
    assert!(s.end_test(at(5)).is_err());
}

#[test]
fn snapshots_restore_the_session() {
    let test = three(NavigationMode::NonLinear);
    let mut s = started(Arc::clone(&test));
    respond(&mut s, "A", at(5));
    s.move_next(at(8)).unwrap();

    let json = s.snapshot().to_json().unwrap();
    let snapshot = SessionSnapshot::from_json(&json).unwrap();
    let mut restored = TestSession::restore(test, EngineConfig::seeded(7), &snapshot).unwrap();

    assert_eq!(restored.position(), Some(1));
    assert_eq!(restored.state(), SessionState::Interacting);
    assert_eq!(restored.value("Q1.SCORE"), Some(Value::float(1.0)));
    assert_eq!(restored.value("NCORRECT"), Some(Value::integer(1)));
    assert_eq!(restored.timing().get("T"), Duration::seconds(8));
    assert_eq!(restored.snapshot(), s.snapshot());

    respond(&mut restored, "A", at(9));
    assert_eq!(restored.value("NCORRECT"), Some(Value::integer(2)));
}

#[test]
fn snapshots_of_other_tests_are_rejected() {
    let s = started(three(NavigationMode::Linear));
    let snapshot = s.snapshot();
    let other = Arc::new(
        AssessmentTest::new("OTHER").with_part(part(
            NavigationMode::Linear,
            SubmissionMode::Individual,
            vec![item_ref("Q1")],
        )),
    );
    assert!(matches!(
        TestSession::restore(other, EngineConfig::default(), &snapshot),
        Err(NavigationError::SnapshotMismatch { .. })
    ));

    let mut tampered = snapshot.clone();
    tampered.items[0]
        .variables
        .get_mut("SCORE")
        .unwrap()
        .value = Value::string("lots");
    assert!(matches!(
        TestSession::restore(three(NavigationMode::Linear), EngineConfig::default(), &tampered),
        Err(NavigationError::SnapshotMismatch { .. })
    ));
}
