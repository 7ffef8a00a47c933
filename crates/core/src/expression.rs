//! Expression trees.
//!
//! Expressions are immutable once built. `Expression::validate` checks the
//! construction-time contract of every node: operand arity, mandatory
//! attributes and attribute ranges. The evaluator refuses trees that do not
//! validate, so operand-count errors never surface during evaluation.

use std::fmt;

use crate::enums::BaseType;
use crate::error::ModelError;
use crate::shape::Shape;
use crate::value::{is_scalar_compliant, Scalar};

// ──────────────────────────────────────────────
// Attribute values
// ──────────────────────────────────────────────

/// An integer attribute given inline or as a reference to a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegerOrVariableRef {
    Integer(i64),
    Variable(String),
}

impl From<i64> for IntegerOrVariableRef {
    fn from(i: i64) -> Self {
        IntegerOrVariableRef::Integer(i)
    }
}

/// A float attribute given inline or as a reference to a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum FloatOrVariableRef {
    Float(f64),
    Variable(String),
}

impl From<f64> for FloatOrVariableRef {
    fn from(f: f64) -> Self {
        FloatOrVariableRef::Float(f)
    }
}

/// Filter selecting the items of a test that an item-subset expression
/// aggregates over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSubset {
    pub section_identifier: Option<String>,
    pub include_categories: Vec<String>,
    pub exclude_categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathConstant {
    Pi,
    E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    Exact,
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    SignificantFigures,
    DecimalPlaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFunction {
    Mean,
    SampleVariance,
    SampleSd,
    PopVariance,
    PopSd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFunction {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Atan2,
    Asec,
    Acsc,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Log,
    Ln,
    Exp,
    Abs,
    Signum,
    Floor,
    Ceil,
    ToDegrees,
    ToRadians,
}

const MATH_FUNCTION_NAMES: [(&str, MathFunction); 28] = [
    ("sin", MathFunction::Sin),
    ("cos", MathFunction::Cos),
    ("tan", MathFunction::Tan),
    ("sec", MathFunction::Sec),
    ("csc", MathFunction::Csc),
    ("cot", MathFunction::Cot),
    ("asin", MathFunction::Asin),
    ("acos", MathFunction::Acos),
    ("atan", MathFunction::Atan),
    ("atan2", MathFunction::Atan2),
    ("asec", MathFunction::Asec),
    ("acsc", MathFunction::Acsc),
    ("acot", MathFunction::Acot),
    ("sinh", MathFunction::Sinh),
    ("cosh", MathFunction::Cosh),
    ("tanh", MathFunction::Tanh),
    ("sech", MathFunction::Sech),
    ("csch", MathFunction::Csch),
    ("coth", MathFunction::Coth),
    ("log", MathFunction::Log),
    ("ln", MathFunction::Ln),
    ("exp", MathFunction::Exp),
    ("abs", MathFunction::Abs),
    ("signum", MathFunction::Signum),
    ("floor", MathFunction::Floor),
    ("ceil", MathFunction::Ceil),
    ("toDegrees", MathFunction::ToDegrees),
    ("toRadians", MathFunction::ToRadians),
];

impl MathFunction {
    pub fn from_name(name: &str) -> Result<MathFunction, ModelError> {
        MATH_FUNCTION_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
            .ok_or_else(|| ModelError::UnknownConstant {
                kind: "mathOperator name",
                name: name.to_string(),
            })
    }

    pub fn name(self) -> &'static str {
        MATH_FUNCTION_NAMES
            .iter()
            .find(|(_, f)| *f == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }
}

impl StatsFunction {
    pub fn from_name(name: &str) -> Result<StatsFunction, ModelError> {
        match name {
            "mean" => Ok(StatsFunction::Mean),
            "sampleVariance" => Ok(StatsFunction::SampleVariance),
            "sampleSD" => Ok(StatsFunction::SampleSd),
            "popVariance" => Ok(StatsFunction::PopVariance),
            "popSD" => Ok(StatsFunction::PopSd),
            other => Err(ModelError::UnknownConstant {
                kind: "statsOperator name",
                name: other.to_string(),
            }),
        }
    }
}

impl RoundingMode {
    pub fn from_name(name: &str) -> Result<RoundingMode, ModelError> {
        match name {
            "significantFigures" => Ok(RoundingMode::SignificantFigures),
            "decimalPlaces" => Ok(RoundingMode::DecimalPlaces),
            other => Err(ModelError::UnknownConstant {
                kind: "roundingMode",
                name: other.to_string(),
            }),
        }
    }
}

impl ToleranceMode {
    pub fn from_name(name: &str) -> Result<ToleranceMode, ModelError> {
        match name {
            "exact" => Ok(ToleranceMode::Exact),
            "absolute" => Ok(ToleranceMode::Absolute),
            "relative" => Ok(ToleranceMode::Relative),
            other => Err(ModelError::UnknownConstant {
                kind: "toleranceMode",
                name: other.to_string(),
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

/// Operand count accepted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "exactly {}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorKind {
    // logic
    And,
    Or,
    Not,
    AnyN {
        min: IntegerOrVariableRef,
        max: IntegerOrVariableRef,
    },
    // comparison
    Match,
    StringMatch {
        case_sensitive: bool,
        substring: bool,
    },
    PatternMatch {
        pattern: String,
    },
    Equal {
        tolerance_mode: ToleranceMode,
        /// One value (symmetric) or two (lower, upper).
        tolerance: Vec<FloatOrVariableRef>,
        include_lower_bound: bool,
        include_upper_bound: bool,
    },
    EqualRounded {
        rounding_mode: RoundingMode,
        figures: IntegerOrVariableRef,
    },
    Inside {
        shape: Shape,
        coords: Vec<i64>,
    },
    Lt,
    Gt,
    Lte,
    Gte,
    DurationLt,
    DurationGte,
    // arithmetic
    Sum,
    Product,
    Subtract,
    Divide,
    Power,
    IntegerDivide,
    IntegerModulus,
    Truncate,
    Round,
    RoundTo {
        rounding_mode: RoundingMode,
        figures: IntegerOrVariableRef,
    },
    IntegerToFloat,
    Min,
    Max,
    Gcd,
    Lcm,
    MathOperator(MathFunction),
    StatsOperator(StatsFunction),
    // containers
    Multiple,
    Ordered,
    ContainerSize,
    IsNull,
    Index {
        n: IntegerOrVariableRef,
    },
    FieldValue {
        field_identifier: String,
    },
    Random,
    Member,
    Delete,
    Contains,
    Repeat {
        number_repeats: IntegerOrVariableRef,
    },
    // text
    Substring {
        case_sensitive: bool,
    },
}

impl OperatorKind {
    /// The QTI element name of the operator.
    pub fn name(&self) -> &'static str {
        use OperatorKind::*;
        match self {
            And => "and",
            Or => "or",
            Not => "not",
            AnyN { .. } => "anyN",
            Match => "match",
            StringMatch { .. } => "stringMatch",
            PatternMatch { .. } => "patternMatch",
            Equal { .. } => "equal",
            EqualRounded { .. } => "equalRounded",
            Inside { .. } => "inside",
            Lt => "lt",
            Gt => "gt",
            Lte => "lte",
            Gte => "gte",
            DurationLt => "durationLT",
            DurationGte => "durationGTE",
            Sum => "sum",
            Product => "product",
            Subtract => "subtract",
            Divide => "divide",
            Power => "power",
            IntegerDivide => "integerDivide",
            IntegerModulus => "integerModulus",
            Truncate => "truncate",
            Round => "round",
            RoundTo { .. } => "roundTo",
            IntegerToFloat => "integerToFloat",
            Min => "min",
            Max => "max",
            Gcd => "gcd",
            Lcm => "lcm",
            MathOperator(_) => "mathOperator",
            StatsOperator(_) => "statsOperator",
            Multiple => "multiple",
            Ordered => "ordered",
            ContainerSize => "containerSize",
            IsNull => "isNull",
            Index { .. } => "index",
            FieldValue { .. } => "fieldValue",
            Random => "random",
            Member => "member",
            Delete => "delete",
            Contains => "contains",
            Repeat { .. } => "repeat",
            Substring { .. } => "substring",
        }
    }

    pub fn arity(&self) -> Arity {
        use OperatorKind::*;
        match self {
            Not | PatternMatch { .. } | Inside { .. } | Truncate | Round | RoundTo { .. }
            | IntegerToFloat | StatsOperator(_) | ContainerSize | IsNull | Index { .. }
            | FieldValue { .. } | Random => Arity::Exactly(1),
            MathOperator(MathFunction::Atan2) => Arity::Exactly(2),
            MathOperator(_) => Arity::Exactly(1),
            Match | StringMatch { .. } | Equal { .. } | EqualRounded { .. } | Lt | Gt | Lte
            | Gte | DurationLt | DurationGte | Subtract | Divide | Power | IntegerDivide
            | IntegerModulus | Member | Delete | Contains | Substring { .. } => Arity::Exactly(2),
            And | Or | AnyN { .. } | Sum | Product | Min | Max | Gcd | Lcm | Repeat { .. } => {
                Arity::AtLeast(1)
            }
            Multiple | Ordered => Arity::AtLeast(0),
        }
    }

    fn validate_attributes(&self) -> Result<(), ModelError> {
        let invalid = |attribute: &'static str, message: String| ModelError::InvalidAttribute {
            component: self.name().to_string(),
            attribute,
            message,
        };
        match self {
            OperatorKind::AnyN {
                min: IntegerOrVariableRef::Integer(min),
                max: IntegerOrVariableRef::Integer(max),
            } if min > max => Err(invalid(
                "min",
                format!("min ({}) is greater than max ({})", min, max),
            )),
            OperatorKind::Equal {
                tolerance_mode,
                tolerance,
                ..
            } => {
                if *tolerance_mode != ToleranceMode::Exact && tolerance.is_empty() {
                    return Err(ModelError::MissingAttribute {
                        component: self.name().to_string(),
                        attribute: "tolerance",
                    });
                }
                if tolerance.len() > 2 {
                    return Err(invalid(
                        "tolerance",
                        format!("{} values given, at most 2 allowed", tolerance.len()),
                    ));
                }
                for t in tolerance {
                    if let FloatOrVariableRef::Float(f) = t {
                        if *f < 0.0 {
                            return Err(invalid("tolerance", format!("{} is negative", f)));
                        }
                    }
                }
                Ok(())
            }
            OperatorKind::EqualRounded {
                rounding_mode,
                figures: IntegerOrVariableRef::Integer(figures),
            }
            | OperatorKind::RoundTo {
                rounding_mode,
                figures: IntegerOrVariableRef::Integer(figures),
            } => check_figures(*rounding_mode, *figures)
                .map_err(|message| invalid("figures", message)),
            OperatorKind::PatternMatch { pattern } if pattern.is_empty() => {
                Err(ModelError::MissingAttribute {
                    component: self.name().to_string(),
                    attribute: "pattern",
                })
            }
            OperatorKind::Inside { shape, coords } => shape.validate_coords(coords),
            OperatorKind::FieldValue { field_identifier } if field_identifier.is_empty() => {
                Err(ModelError::MissingAttribute {
                    component: self.name().to_string(),
                    attribute: "fieldIdentifier",
                })
            }
            _ => Ok(()),
        }
    }
}

/// Significant figures must be at least 1, decimal places at least 0.
pub fn check_figures(mode: RoundingMode, figures: i64) -> Result<(), String> {
    match mode {
        RoundingMode::SignificantFigures if figures < 1 => Err(format!(
            "{} significant figure(s) requested, at least 1 required",
            figures
        )),
        RoundingMode::DecimalPlaces if figures < 0 => Err(format!(
            "{} decimal place(s) requested, at least 0 required",
            figures
        )),
        _ => Ok(()),
    }
}

/// An operator applied to sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub kind: OperatorKind,
    pub operands: Vec<Expression>,
}

// ──────────────────────────────────────────────
// Expression nodes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    BaseValue {
        base_type: BaseType,
        value: Scalar,
    },
    /// Value of a variable. At test level the identifier may be prefixed
    /// with an item reference (`ITEM.VAR`, `ITEM.2.VAR`), and item outcomes
    /// may be scaled by a weight of the item reference.
    Variable {
        identifier: String,
        weight_identifier: Option<String>,
    },
    Default {
        identifier: String,
    },
    Correct {
        identifier: String,
    },
    MapResponse {
        identifier: String,
    },
    MapResponsePoint {
        identifier: String,
    },
    Null,
    RandomInteger {
        min: IntegerOrVariableRef,
        max: IntegerOrVariableRef,
        step: IntegerOrVariableRef,
    },
    RandomFloat {
        min: FloatOrVariableRef,
        max: FloatOrVariableRef,
    },
    MathConstant(MathConstant),
    NumberCorrect(ItemSubset),
    NumberIncorrect(ItemSubset),
    NumberPresented(ItemSubset),
    NumberResponded(ItemSubset),
    NumberSelected(ItemSubset),
    TestVariables {
        subset: ItemSubset,
        variable_identifier: String,
        base_type: Option<BaseType>,
        weight_identifier: Option<String>,
    },
    Operator(Operator),
}

impl Expression {
    // Builders used throughout the tests and by hosts assembling trees by hand.

    pub fn base_value(value: Scalar) -> Expression {
        Expression::BaseValue {
            base_type: value.base_type(),
            value,
        }
    }

    pub fn integer(i: i64) -> Expression {
        Expression::base_value(Scalar::Integer(i))
    }

    pub fn float(f: f64) -> Expression {
        Expression::base_value(Scalar::Float(f))
    }

    pub fn boolean(b: bool) -> Expression {
        Expression::base_value(Scalar::Boolean(b))
    }

    pub fn string(s: impl Into<String>) -> Expression {
        Expression::base_value(Scalar::String(s.into()))
    }

    pub fn identifier(s: impl Into<String>) -> Expression {
        Expression::BaseValue {
            base_type: BaseType::Identifier,
            value: Scalar::String(s.into()),
        }
    }

    pub fn variable(identifier: impl Into<String>) -> Expression {
        Expression::Variable {
            identifier: identifier.into(),
            weight_identifier: None,
        }
    }

    pub fn op(kind: OperatorKind, operands: Vec<Expression>) -> Expression {
        Expression::Operator(Operator { kind, operands })
    }

    /// The QTI element name of the node.
    pub fn name(&self) -> &'static str {
        match self {
            Expression::BaseValue { .. } => "baseValue",
            Expression::Variable { .. } => "variable",
            Expression::Default { .. } => "default",
            Expression::Correct { .. } => "correct",
            Expression::MapResponse { .. } => "mapResponse",
            Expression::MapResponsePoint { .. } => "mapResponsePoint",
            Expression::Null => "null",
            Expression::RandomInteger { .. } => "randomInteger",
            Expression::RandomFloat { .. } => "randomFloat",
            Expression::MathConstant(_) => "mathConstant",
            Expression::NumberCorrect(_) => "numberCorrect",
            Expression::NumberIncorrect(_) => "numberIncorrect",
            Expression::NumberPresented(_) => "numberPresented",
            Expression::NumberResponded(_) => "numberResponded",
            Expression::NumberSelected(_) => "numberSelected",
            Expression::TestVariables { .. } => "testVariables",
            Expression::Operator(op) => op.kind.name(),
        }
    }

    /// Whether the node only makes sense inside a test (item-subset
    /// aggregates).
    pub fn is_test_level(&self) -> bool {
        matches!(
            self,
            Expression::NumberCorrect(_)
                | Expression::NumberIncorrect(_)
                | Expression::NumberPresented(_)
                | Expression::NumberResponded(_)
                | Expression::NumberSelected(_)
                | Expression::TestVariables { .. }
        )
    }

    /// Validate the whole tree rooted at this node.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Expression::BaseValue { base_type, value } => {
                if is_scalar_compliant(*base_type, value) {
                    Ok(())
                } else {
                    Err(ModelError::NotCompliant {
                        expected: base_type.to_string(),
                        what: "baseType",
                        value: value.to_string(),
                    })
                }
            }
            Expression::Variable { identifier, .. }
            | Expression::Default { identifier }
            | Expression::Correct { identifier }
            | Expression::MapResponse { identifier }
            | Expression::MapResponsePoint { identifier } => {
                if identifier.is_empty() {
                    Err(ModelError::MissingAttribute {
                        component: self.name().to_string(),
                        attribute: "identifier",
                    })
                } else {
                    Ok(())
                }
            }
            Expression::RandomInteger {
                min: IntegerOrVariableRef::Integer(min),
                max: IntegerOrVariableRef::Integer(max),
                step,
            } => {
                if min > max {
                    return Err(ModelError::InvalidAttribute {
                        component: self.name().to_string(),
                        attribute: "max",
                        message: format!("max ({}) is lower than min ({})", max, min),
                    });
                }
                if let IntegerOrVariableRef::Integer(step) = step {
                    if *step < 1 {
                        return Err(ModelError::InvalidAttribute {
                            component: self.name().to_string(),
                            attribute: "step",
                            message: format!("step must be positive, {} given", step),
                        });
                    }
                }
                Ok(())
            }
            Expression::RandomFloat {
                min: FloatOrVariableRef::Float(min),
                max: FloatOrVariableRef::Float(max),
            } if min > max => Err(ModelError::InvalidAttribute {
                component: self.name().to_string(),
                attribute: "max",
                message: format!("max ({}) is lower than min ({})", max, min),
            }),
            Expression::TestVariables {
                variable_identifier,
                ..
            } if variable_identifier.is_empty() => Err(ModelError::MissingAttribute {
                component: self.name().to_string(),
                attribute: "variableIdentifier",
            }),
            Expression::Operator(op) => {
                let arity = op.kind.arity();
                if !arity.accepts(op.operands.len()) {
                    return Err(ModelError::Arity {
                        operator: op.kind.name(),
                        expected: arity.to_string(),
                        got: op.operands.len(),
                    });
                }
                op.kind.validate_attributes()?;
                op.operands.iter().try_for_each(Expression::validate)
            }
            _ => Ok(()),
        }
    }
}
