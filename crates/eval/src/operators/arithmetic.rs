//! Numeric operators.
//!
//! Integer results are produced only when every operand is an integer;
//! a single float operand turns the result into a float. Division-like
//! operators yield null instead of a non-finite float.

use qti_core::{RoundingMode, Scalar, Value};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::EvalError;
use crate::operands::Operands;

enum Numbers {
    Integers(Vec<i64>),
    Floats(Vec<f64>),
}

fn flatten(ops: &Operands<'_>) -> Vec<Scalar> {
    let mut out = Vec::new();
    for v in ops.iter() {
        match v {
            Value::Single(s) => out.push(s.clone()),
            Value::Multiple(c) | Value::Ordered(c) => out.extend(c.iter().cloned()),
            _ => {}
        }
    }
    out
}

fn numbers(scalars: &[Scalar]) -> Numbers {
    let ints: Option<Vec<i64>> = scalars.iter().map(Scalar::as_i64).collect();
    match ints {
        Some(ints) => Numbers::Integers(ints),
        None => Numbers::Floats(scalars.iter().filter_map(Scalar::as_f64).collect()),
    }
}

fn single_numbers(ops: &Operands<'_>, operator: &'static str) -> Result<Numbers, EvalError> {
    Operands::require(ops.exclusively_single(), operator, "single cardinality operands")?;
    Operands::require(ops.exclusively_numeric(), operator, "numeric operands")?;
    Ok(numbers(&flatten(ops)))
}

fn container_numbers(ops: &Operands<'_>, operator: &'static str) -> Result<Numbers, EvalError> {
    Operands::require(
        ops.anything_but_record(),
        operator,
        "single, multiple or ordered operands",
    )?;
    Operands::require(ops.exclusively_numeric(), operator, "numeric operands")?;
    Ok(numbers(&flatten(ops)))
}

fn single_integers(ops: &Operands<'_>, operator: &'static str) -> Result<Vec<i64>, EvalError> {
    Operands::require(ops.exclusively_single(), operator, "single cardinality operands")?;
    Operands::require(ops.exclusively_integer(), operator, "integer operands")?;
    Ok(flatten(ops).iter().filter_map(Scalar::as_i64).collect())
}

pub(super) fn finite(f: f64) -> Value {
    if f.is_finite() {
        Value::float(f)
    } else {
        Value::Null
    }
}

fn fold_numbers(
    nums: Numbers,
    operator: &'static str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match nums {
        Numbers::Integers(ints) => {
            let mut it = ints.into_iter();
            let first = it.next().unwrap_or_default();
            it.try_fold(first, int_op)
                .map(Value::integer)
                .ok_or(EvalError::Overflow { operator })
        }
        Numbers::Floats(floats) => {
            let mut it = floats.into_iter();
            let first = it.next().unwrap_or_default();
            Ok(finite(it.fold(first, float_op)))
        }
    }
}

pub fn sum(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let nums = single_numbers(&ops, "sum")?;
    fold_numbers(nums, "sum", i64::checked_add, |a, b| a + b)
}

pub fn product(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let nums = single_numbers(&ops, "product")?;
    fold_numbers(nums, "product", i64::checked_mul, |a, b| a * b)
}

pub fn subtract(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let nums = single_numbers(&ops, "subtract")?;
    fold_numbers(nums, "subtract", i64::checked_sub, |a, b| a - b)
}

/// Always a float. Division by zero is null.
pub fn divide(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let (x, y) = float_pair(&ops, "divide")?;
    if y == 0.0 {
        return Ok(Value::Null);
    }
    Ok(finite(x / y))
}

/// Always a float; null when the result is not finite.
pub fn power(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let (x, y) = float_pair(&ops, "power")?;
    Ok(finite(x.powf(y)))
}

fn float_pair(ops: &Operands<'_>, operator: &'static str) -> Result<(f64, f64), EvalError> {
    Operands::require(ops.exclusively_single(), operator, "single cardinality operands")?;
    Operands::require(ops.exclusively_numeric(), operator, "numeric operands")?;
    let f: Vec<f64> = ops.iter().filter_map(Value::as_f64).collect();
    Ok((f[0], f[1]))
}

/// Floor division; null when dividing by zero.
pub fn integer_divide(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let n = single_integers(&ops, "integerDivide")?;
    Ok(floor_div(n[0], n[1]).map(Value::integer).unwrap_or_default())
}

/// `x - y * integerDivide(x, y)`; null when dividing by zero.
pub fn integer_modulus(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let n = single_integers(&ops, "integerModulus")?;
    let (x, y) = (n[0], n[1]);
    let Some(q) = floor_div(x, y) else {
        return Ok(Value::Null);
    };
    let r = y
        .checked_mul(q)
        .and_then(|p| x.checked_sub(p))
        .ok_or(EvalError::Overflow {
            operator: "integerModulus",
        })?;
    Ok(Value::integer(r))
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    if y == 0 {
        return None;
    }
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

pub(super) fn to_integer(f: f64) -> Value {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::integer(f as i64)
    } else {
        Value::Null
    }
}

/// Toward zero.
pub fn truncate(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    match single_numbers(&ops, "truncate")? {
        Numbers::Integers(i) => Ok(Value::integer(i[0])),
        Numbers::Floats(f) => Ok(to_integer(f[0].trunc())),
    }
}

/// Nearest integer; halves round toward positive infinity.
pub fn round(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    match single_numbers(&ops, "round")? {
        Numbers::Integers(i) => Ok(Value::integer(i[0])),
        Numbers::Floats(f) => Ok(to_integer((f[0] + 0.5).floor())),
    }
}

/// Round `x` to `figures` significant figures or decimal places, halves
/// away from zero. `None` when `x` has no decimal representation.
pub fn round_to(x: f64, mode: RoundingMode, figures: i64) -> Option<f64> {
    if !x.is_finite() {
        return None;
    }
    let d = Decimal::from_f64(x)?;
    let digits = u32::try_from(figures).ok()?;
    let rounded = match mode {
        RoundingMode::SignificantFigures => {
            if digits == 0 {
                return None;
            }
            d.round_sf_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)?
        }
        RoundingMode::DecimalPlaces => {
            d.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
        }
    };
    rounded.to_f64()
}

pub fn round_to_operator(
    ops: Operands<'_>,
    mode: RoundingMode,
    figures: i64,
) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    single_numbers(&ops, "roundTo")?;
    let x = ops[0].as_f64().unwrap_or_default();
    Ok(round_to(x, mode, figures).map(Value::float).unwrap_or_default())
}

pub fn integer_to_float(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let i = single_integers(&ops, "integerToFloat")?;
    Ok(Value::float(i[0] as f64))
}

/// min when `smallest`, max otherwise. Container operands contribute every
/// element.
pub fn extremum(ops: Operands<'_>, smallest: bool) -> Result<Value, EvalError> {
    let operator = if smallest { "min" } else { "max" };
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    match container_numbers(&ops, operator)? {
        Numbers::Integers(i) => {
            let r = if smallest { i.iter().min() } else { i.iter().max() };
            Ok(r.copied().map(Value::integer).unwrap_or_default())
        }
        Numbers::Floats(f) => {
            let r = f
                .into_iter()
                .reduce(|a, b| if smallest { a.min(b) } else { a.max(b) });
            Ok(r.map(finite).unwrap_or_default())
        }
    }
}

fn gcd2(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    i64::try_from(a).unwrap_or(i64::MAX)
}

fn container_integers(ops: &Operands<'_>, operator: &'static str) -> Result<Vec<i64>, EvalError> {
    Operands::require(
        ops.anything_but_record(),
        operator,
        "single, multiple or ordered operands",
    )?;
    Operands::require(ops.exclusively_integer(), operator, "integer operands")?;
    Ok(flatten(ops).iter().filter_map(Scalar::as_i64).collect())
}

/// gcd(0, 0) is 0.
pub fn gcd(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let ints = container_integers(&ops, "gcd")?;
    Ok(Value::integer(ints.into_iter().fold(0, gcd2)))
}

/// Any zero operand makes the result 0.
pub fn lcm(ops: Operands<'_>) -> Result<Value, EvalError> {
    if ops.contains_null() {
        return Ok(Value::Null);
    }
    let ints = container_integers(&ops, "lcm")?;
    if ints.contains(&0) {
        return Ok(Value::integer(0));
    }
    let mut acc: i64 = 1;
    for i in ints {
        let g = gcd2(acc, i);
        acc = (acc / g)
            .checked_mul(i.abs())
            .ok_or(EvalError::Overflow { operator: "lcm" })?;
    }
    Ok(Value::integer(acc))
}
