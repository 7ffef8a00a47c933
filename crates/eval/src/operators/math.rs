//! mathOperator and statsOperator.

use qti_core::{MathFunction, Scalar, StatsFunction, Value};

use super::arithmetic::{finite, to_integer};
use crate::error::EvalError;
use crate::operands::Operands;

/// Float result, except signum, floor and ceil which give integers.
/// Results outside the real numbers are null.
pub fn math_operator(ops: Operands<'_>, function: MathFunction) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_single(),
        "mathOperator",
        "single cardinality operands",
    )?;
    Operands::require(ops.exclusively_numeric(), "mathOperator", "numeric operands")?;
    let x = ops[0].as_f64().unwrap_or_default();

    let f = match function {
        MathFunction::Sin => x.sin(),
        MathFunction::Cos => x.cos(),
        MathFunction::Tan => x.tan(),
        MathFunction::Sec => 1.0 / x.cos(),
        MathFunction::Csc => 1.0 / x.sin(),
        MathFunction::Cot => 1.0 / x.tan(),
        MathFunction::Asin => x.asin(),
        MathFunction::Acos => x.acos(),
        MathFunction::Atan => x.atan(),
        MathFunction::Atan2 => {
            let Some(y) = ops.get(1).and_then(Value::as_f64) else {
                return Ok(Value::Null);
            };
            x.atan2(y)
        }
        MathFunction::Asec => (1.0 / x).acos(),
        MathFunction::Acsc => (1.0 / x).asin(),
        MathFunction::Acot => (1.0 / x).atan(),
        MathFunction::Sinh => x.sinh(),
        MathFunction::Cosh => x.cosh(),
        MathFunction::Tanh => x.tanh(),
        MathFunction::Sech => 1.0 / x.cosh(),
        MathFunction::Csch => 1.0 / x.sinh(),
        MathFunction::Coth => 1.0 / x.tanh(),
        MathFunction::Log => x.log10(),
        MathFunction::Ln => x.ln(),
        MathFunction::Exp => x.exp(),
        MathFunction::Abs => x.abs(),
        MathFunction::ToDegrees => x.to_degrees(),
        MathFunction::ToRadians => x.to_radians(),
        MathFunction::Signum => {
            let sign = if x > 0.0 {
                1
            } else if x < 0.0 {
                -1
            } else {
                0
            };
            return Ok(Value::integer(sign));
        }
        MathFunction::Floor => return Ok(to_integer(x.floor())),
        MathFunction::Ceil => return Ok(to_integer(x.ceil())),
    };
    Ok(finite(f))
}

/// Statistics over one multiple or ordered numeric container. Sample
/// statistics need at least two values.
pub fn stats_operator(ops: Operands<'_>, function: StatsFunction) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    Operands::require(
        ops.exclusively_multiple_or_ordered(),
        "statsOperator",
        "a multiple or ordered operand",
    )?;
    Operands::require(ops.exclusively_numeric(), "statsOperator", "numeric operands")?;
    let xs: Vec<f64> = match &ops[0] {
        Value::Multiple(c) | Value::Ordered(c) => c.iter().filter_map(Scalar::as_f64).collect(),
        _ => Vec::new(),
    };
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let squares = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    let sample = xs.len() >= 2;

    let result = match function {
        StatsFunction::Mean => Some(mean),
        StatsFunction::PopVariance => Some(squares / n),
        StatsFunction::PopSd => Some((squares / n).sqrt()),
        StatsFunction::SampleVariance if sample => Some(squares / (n - 1.0)),
        StatsFunction::SampleSd if sample => Some((squares / (n - 1.0)).sqrt()),
        StatsFunction::SampleVariance | StatsFunction::SampleSd => None,
    };
    Ok(result.map(finite).unwrap_or_default())
}
