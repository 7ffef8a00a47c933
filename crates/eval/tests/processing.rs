//! Template, response and outcome processing driven through item and
//! test sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use qti_core::{
    AssessmentItem, AssessmentItemRef, AssessmentSection, AssessmentTest, BaseType, Cardinality,
    Expression, IntegerOrVariableRef, ItemSessionControl, ItemSubset, MapEntry, Mapping,
    NavigationMode, OperatorKind, OutcomeDeclaration, ResponseDeclaration, Rule, Scalar,
    StatsFunction, SubmissionMode, TemplateDeclaration, TestPart, Value,
};
use qti_eval::{EngineConfig, Environment, ItemSession, TestSession};
use time::macros::datetime;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn declared(id: &str, card: Cardinality, bt: BaseType) -> ResponseDeclaration {
    ResponseDeclaration::new(id, card, Some(bt))
}

fn score() -> OutcomeDeclaration {
    OutcomeDeclaration::new("SCORE", Cardinality::Single, Some(BaseType::Float))
}

fn random_integer(min: i64, max: i64) -> Expression {
    Expression::RandomInteger {
        min: IntegerOrVariableRef::Integer(min),
        max: IntegerOrVariableRef::Integer(max),
        step: IntegerOrVariableRef::Integer(1),
    }
}

fn templated() -> Arc<AssessmentItem> {
    Arc::new(
        AssessmentItem::new("Q")
            .with_template(TemplateDeclaration::new(
                "X",
                Cardinality::Single,
                Some(BaseType::Integer),
            ))
            .with_response(declared("RESPONSE", Cardinality::Single, BaseType::Integer))
            .with_outcome(score())
            .with_template_processing(vec![
                Rule::set_template("X", random_integer(1, 100)),
                Rule::TemplateConstraint {
                    expression: Expression::op(
                        OperatorKind::Gt,
                        vec![Expression::variable("X"), Expression::integer(50)],
                    ),
                },
                Rule::SetCorrectResponse {
                    identifier: "RESPONSE".to_string(),
                    expression: Expression::variable("X"),
                },
                Rule::SetDefaultValue {
                    identifier: "RESPONSE".to_string(),
                    expression: Expression::integer(0),
                },
            ])
            .with_response_processing(vec![Rule::Condition(
                qti_core::Condition::when(
                    Expression::op(
                        OperatorKind::Match,
                        vec![
                            Expression::variable("RESPONSE"),
                            Expression::Correct {
                                identifier: "RESPONSE".to_string(),
                            },
                        ],
                    ),
                    vec![Rule::set_outcome("SCORE", Expression::float(1.0))],
                ),
            )]),
    )
}

fn instantiate(item: Arc<AssessmentItem>, seed: u64) -> ItemSession {
    let mut env = Environment::new(EngineConfig::seeded(seed));
    ItemSession::new(item, ItemSessionControl::default(), &mut env).unwrap()
}

// ──────────────────────────────────────────────
// Template processing
// ──────────────────────────────────────────────

#[test]
fn seeded_template_processing_is_reproducible() {
    for seed in [1, 2, 3, 99] {
        let a = instantiate(templated(), seed);
        let b = instantiate(templated(), seed);
        assert_eq!(a.variables.value("X"), b.variables.value("X"));
        let x = a.variables.value("X").and_then(Value::as_i64).unwrap();
        assert!((51..=100).contains(&x), "constraint violated: {x}");
    }
}

#[test]
fn template_processing_sets_correct_and_default_responses() {
    let session = instantiate(templated(), 5);
    let x = session.variables.value("X").cloned().unwrap();
    let response = session.variables.get("RESPONSE").unwrap();
    assert_eq!(response.correct_response.as_ref(), Some(&x));
    assert_eq!(response.value, Value::integer(0));
}

#[test]
fn responses_are_scored_against_templated_correct_responses() {
    let mut session = instantiate(templated(), 5);
    let mut env = Environment::new(EngineConfig::seeded(5));
    let x = session.variables.value("X").cloned().unwrap();

    session.begin_attempt().unwrap();
    session.variables = session
        .bind(&BTreeMap::from([("RESPONSE".to_string(), x)]))
        .unwrap();
    session.process_responses(&mut env).unwrap();
    assert_eq!(session.variables.value("SCORE"), Some(&Value::float(1.0)));
}

// ──────────────────────────────────────────────
// Response processing
// ──────────────────────────────────────────────

#[test]
fn mapped_responses_honour_bounds() {
    let mapping = Mapping::new(vec![
        MapEntry::new(Scalar::String("A".into()), 1.0),
        MapEntry::new(Scalar::String("B".into()), 0.5),
        MapEntry::new(Scalar::String("C".into()), -2.0),
    ])
    .unwrap()
    .with_bounds(Some(0.0), None);
    let item = Arc::new(
        AssessmentItem::new("Q")
            .with_response(
                declared("RESPONSE", Cardinality::Multiple, BaseType::Identifier)
                    .with_mapping(mapping),
            )
            .with_outcome(score())
            .with_response_processing(vec![Rule::set_outcome(
                "SCORE",
                Expression::MapResponse {
                    identifier: "RESPONSE".to_string(),
                },
            )]),
    );
    let choices = |ids: &[&str]| {
        let scalars = ids.iter().map(|s| Scalar::String(s.to_string())).collect();
        BTreeMap::from([(
            "RESPONSE".to_string(),
            Value::multiple(BaseType::Identifier, scalars).unwrap(),
        )])
    };
    let mut env = Environment::default();

    let mut session = instantiate(Arc::clone(&item), 0);
    session.variables = session.bind(&choices(&["A", "B"])).unwrap();
    session.process_responses(&mut env).unwrap();
    assert_eq!(session.variables.value("SCORE"), Some(&Value::float(1.5)));

    let mut session = instantiate(item, 0);
    session.variables = session.bind(&choices(&["C"])).unwrap();
    session.process_responses(&mut env).unwrap();
    assert_eq!(session.variables.value("SCORE"), Some(&Value::float(0.0)));
}

// ──────────────────────────────────────────────
// Outcome processing
// ──────────────────────────────────────────────

fn fixed_score(id: &str, value: f64) -> AssessmentItemRef {
    let item = AssessmentItem::new(id)
        .with_outcome(score())
        .with_response_processing(vec![Rule::set_outcome("SCORE", Expression::float(value))]);
    AssessmentItemRef::new(id, Arc::new(item))
}

#[test]
fn outcome_processing_aggregates_weighted_item_outcomes() {
    let mean = Expression::op(
        OperatorKind::StatsOperator(StatsFunction::Mean),
        vec![Expression::TestVariables {
            subset: ItemSubset::default(),
            variable_identifier: "SCORE".to_string(),
            base_type: None,
            weight_identifier: Some("W".to_string()),
        }],
    );
    let weighted = Expression::Variable {
        identifier: "Q1.SCORE".to_string(),
        weight_identifier: Some("W".to_string()),
    };
    let section = AssessmentSection::new("S")
        .with_item(fixed_score("Q1", 1.0).with_weight("W", 3.0))
        .with_item(fixed_score("Q2", 0.5));
    let float_outcome = |id: &str| {
        OutcomeDeclaration::new(id, Cardinality::Single, Some(BaseType::Float))
    };
    let test = Arc::new(
        AssessmentTest::new("T")
            .with_outcome(float_outcome("MEAN"))
            .with_outcome(float_outcome("Q1_WEIGHTED"))
            .with_outcome_processing(vec![
                Rule::set_outcome("MEAN", mean),
                Rule::set_outcome("Q1_WEIGHTED", weighted),
            ])
            .with_part(
                TestPart::new("P", NavigationMode::NonLinear, SubmissionMode::Individual)
                    .with_section(section),
            ),
    );

    let now = datetime!(2024-03-01 09:00 UTC);
    let mut session = TestSession::new(test, EngineConfig::seeded(1)).unwrap();
    session.begin(now).unwrap();
    for _ in 0..2 {
        session.begin_attempt(now).unwrap();
        session.end_attempt(BTreeMap::new(), now).unwrap();
        session.move_next(now).unwrap();
    }
    assert_eq!(session.value("Q1_WEIGHTED"), Some(Value::float(3.0)));
    assert_eq!(session.value("MEAN"), Some(Value::float(1.75)));
}

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[test]
fn configuration_loads_from_toml() {
    let config = EngineConfig::from_toml_str("seed = 3\ntemplate_max_iterations = 5\n").unwrap();
    assert_eq!(config.seed, Some(3));
    assert_eq!(config.template_max_iterations, 5);
    assert_eq!(config.pattern_nest_limit, EngineConfig::default().pattern_nest_limit);

    assert!(EngineConfig::from_toml_str("template_max_iterations = 0").is_err());
    assert!(EngineConfig::from_toml_str("seed = \"many\"").is_err());
}
