//! Operator implementations, grouped by family.
//!
//! [`apply`] resolves operator attributes that may reference variables,
//! then hands the evaluated operands to the family module.

mod arithmetic;
mod comparison;
mod container;
mod logic;
mod math;
mod pattern;

pub use arithmetic::round_to;
pub use pattern::{translate_xsd_pattern, PatternCache};

use qti_core::{check_figures, ModelError, OperatorKind, ToleranceMode, Value};

use crate::error::EvalError;
use crate::expression::EvalContext;
use crate::operands::Operands;

fn invalid(kind: &OperatorKind, attribute: &'static str, message: String) -> EvalError {
    ModelError::InvalidAttribute {
        component: kind.name().to_string(),
        attribute,
        message,
    }
    .into()
}

/// Apply `kind` to already evaluated operands.
pub(crate) fn apply(
    kind: &OperatorKind,
    operands: &[Value],
    ctx: &mut EvalContext<'_>,
) -> Result<Value, EvalError> {
    let ops = Operands::new(operands);
    let name = kind.name();
    match kind {
        OperatorKind::And => logic::and(ops),
        OperatorKind::Or => logic::or(ops),
        OperatorKind::Not => logic::not(ops),
        OperatorKind::AnyN { min, max } => {
            let min = ctx.resolve_integer(min, name, "min")?;
            let max = ctx.resolve_integer(max, name, "max")?;
            if min > max {
                return Err(invalid(
                    kind,
                    "max",
                    format!("max ({}) is lower than min ({})", max, min),
                ));
            }
            logic::any_n(ops, min, max)
        }

        OperatorKind::Match => comparison::match_values(ops),
        OperatorKind::StringMatch {
            case_sensitive,
            substring,
        } => comparison::string_match(ops, *case_sensitive, *substring),
        OperatorKind::PatternMatch { pattern: p } => {
            pattern::pattern_match(ops, p, &mut ctx.env.patterns)
        }
        OperatorKind::Equal {
            tolerance_mode,
            tolerance,
            include_lower_bound,
            include_upper_bound,
        } => {
            let window = match (tolerance_mode, tolerance.as_slice()) {
                (ToleranceMode::Exact, _) | (_, []) => (0.0, 0.0),
                (_, [t0]) => {
                    let t0 = ctx.resolve_float(t0, name, "tolerance")?;
                    (t0, t0)
                }
                (_, [t0, t1, ..]) => (
                    ctx.resolve_float(t0, name, "tolerance")?,
                    ctx.resolve_float(t1, name, "tolerance")?,
                ),
            };
            comparison::equal(
                ops,
                *tolerance_mode,
                window,
                *include_lower_bound,
                *include_upper_bound,
            )
        }
        OperatorKind::EqualRounded {
            rounding_mode,
            figures,
        } => {
            let figures = ctx.resolve_integer(figures, name, "figures")?;
            check_figures(*rounding_mode, figures).map_err(|m| invalid(kind, "figures", m))?;
            comparison::equal_rounded(ops, *rounding_mode, figures)
        }
        OperatorKind::Inside { shape, coords } => comparison::inside(ops, *shape, coords),
        OperatorKind::Lt | OperatorKind::Gt | OperatorKind::Lte | OperatorKind::Gte => {
            comparison::numeric_compare(ops, kind)
        }
        OperatorKind::DurationLt => comparison::duration_compare(ops, true),
        OperatorKind::DurationGte => comparison::duration_compare(ops, false),

        OperatorKind::Sum => arithmetic::sum(ops),
        OperatorKind::Product => arithmetic::product(ops),
        OperatorKind::Subtract => arithmetic::subtract(ops),
        OperatorKind::Divide => arithmetic::divide(ops),
        OperatorKind::Power => arithmetic::power(ops),
        OperatorKind::IntegerDivide => arithmetic::integer_divide(ops),
        OperatorKind::IntegerModulus => arithmetic::integer_modulus(ops),
        OperatorKind::Truncate => arithmetic::truncate(ops),
        OperatorKind::Round => arithmetic::round(ops),
        OperatorKind::RoundTo {
            rounding_mode,
            figures,
        } => {
            let figures = ctx.resolve_integer(figures, name, "figures")?;
            check_figures(*rounding_mode, figures).map_err(|m| invalid(kind, "figures", m))?;
            arithmetic::round_to_operator(ops, *rounding_mode, figures)
        }
        OperatorKind::IntegerToFloat => arithmetic::integer_to_float(ops),
        OperatorKind::Min => arithmetic::extremum(ops, true),
        OperatorKind::Max => arithmetic::extremum(ops, false),
        OperatorKind::Gcd => arithmetic::gcd(ops),
        OperatorKind::Lcm => arithmetic::lcm(ops),
        OperatorKind::MathOperator(f) => math::math_operator(ops, *f),
        OperatorKind::StatsOperator(f) => math::stats_operator(ops, *f),

        OperatorKind::Multiple => container::multiple(ops),
        OperatorKind::Ordered => container::ordered(ops),
        OperatorKind::ContainerSize => container::container_size(ops),
        OperatorKind::IsNull => container::is_null(ops),
        OperatorKind::Index { n } => {
            let n = ctx.resolve_integer(n, name, "n")?;
            if n < 1 {
                return Err(invalid(kind, "n", format!("index {} is not strictly positive", n)));
            }
            container::index(ops, n)
        }
        OperatorKind::FieldValue { field_identifier } => {
            container::field_value(ops, field_identifier)
        }
        OperatorKind::Random => container::random(ops, &mut ctx.env.rng),
        OperatorKind::Member => container::member(ops),
        OperatorKind::Delete => container::delete(ops),
        OperatorKind::Contains => container::contains(ops),
        OperatorKind::Repeat { number_repeats } => {
            let n = ctx.resolve_integer(number_repeats, name, "numberRepeats")?;
            container::repeat(ops, n)
        }

        OperatorKind::Substring { case_sensitive } => comparison::substring(ops, *case_sensitive),
    }
}
