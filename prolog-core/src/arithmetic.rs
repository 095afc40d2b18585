//! Arithmetic evaluation and the predicates built on it.
use std::cmp::Ordering;

use crate::error::{PrologResult, RuntimeError};
use crate::rules::Indicator;
use crate::terms::*;
use crate::vm::{Alternative, Machine};

fn overflow() -> RuntimeError {
    RuntimeError::evaluation_error("int_overflow")
}

fn not_evaluable(name: &Symbol, arity: usize) -> RuntimeError {
    RuntimeError::type_error(
        "evaluable",
        Indicator::new(name.as_str(), arity).to_term(),
    )
}

/// Reject infinite and undefined float results.
fn check_float(f: f64) -> PrologResult<Numeric> {
    if f.is_nan() {
        Err(RuntimeError::evaluation_error("undefined").into())
    } else if f.is_infinite() {
        Err(RuntimeError::evaluation_error("float_overflow").into())
    } else {
        Ok(Numeric::Float(f))
    }
}

fn integer(n: Numeric) -> PrologResult<i64> {
    match n {
        Numeric::Integer(i) => Ok(i),
        Numeric::Float(_) => Err(RuntimeError::type_error("integer", Term::number(n)).into()),
    }
}

/// Round a float to an integer, failing when it does not fit.
fn to_integer(f: f64) -> PrologResult<Numeric> {
    if f.is_finite() && f >= i64::MIN as f64 && f < -(i64::MIN as f64) {
        Ok(Numeric::Integer(f as i64))
    } else {
        Err(overflow().into())
    }
}

fn checked(result: Option<Numeric>) -> PrologResult<Numeric> {
    match result {
        Some(Numeric::Float(f)) => check_float(f),
        Some(n) => Ok(n),
        None => Err(overflow().into()),
    }
}

fn divide(left: Numeric, right: Numeric) -> PrologResult<Numeric> {
    match (left, right) {
        (_, Numeric::Integer(0)) => Err(RuntimeError::evaluation_error("zero_divisor").into()),
        (_, Numeric::Float(f)) if f == 0.0 => {
            Err(RuntimeError::evaluation_error("zero_divisor").into())
        }
        (Numeric::Integer(a), Numeric::Integer(b)) => match (a.checked_rem(b), a.checked_div(b)) {
            (Some(0), Some(q)) => Ok(Numeric::Integer(q)),
            (Some(_), _) => check_float(a as f64 / b as f64),
            _ => Err(overflow().into()),
        },
        (l, r) => checked(l / r),
    }
}

fn int_op(
    left: Numeric,
    right: Numeric,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> PrologResult<Numeric> {
    let (a, b) = (integer(left)?, integer(right)?);
    op(a, b).map(Numeric::Integer).ok_or_else(|| overflow().into())
}

fn int_division(
    left: Numeric,
    right: Numeric,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> PrologResult<Numeric> {
    if integer(right)? == 0 {
        return Err(RuntimeError::evaluation_error("zero_divisor").into());
    }
    int_op(left, right, op)
}

fn power(left: Numeric, right: Numeric) -> PrologResult<Numeric> {
    match (left, right) {
        (Numeric::Integer(base), Numeric::Integer(exp)) => {
            if exp < 0 {
                return match base {
                    1 => Ok(Numeric::Integer(1)),
                    -1 => Ok(Numeric::Integer(if exp % 2 == 0 { 1 } else { -1 })),
                    0 => Err(RuntimeError::evaluation_error("zero_divisor").into()),
                    _ => Err(RuntimeError::type_error("float", Term::integer(base)).into()),
                };
            }
            u32::try_from(exp)
                .ok()
                .and_then(|exp| base.checked_pow(exp))
                .map(Numeric::Integer)
                .ok_or_else(|| overflow().into())
        }
        (l, r) => check_float(l.as_f64().powf(r.as_f64())),
    }
}

fn eval_binary(name: &Symbol, left: Numeric, right: Numeric) -> PrologResult<Numeric> {
    match name.as_str() {
        "+" => checked(left + right),
        "-" => checked(left - right),
        "*" => checked(left * right),
        "/" => divide(left, right),
        "//" => int_division(left, right, i64::checked_div),
        "rem" => int_division(left, right, i64::checked_rem),
        "mod" => int_division(left, right, |a, b| {
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }),
        "div" => int_division(left, right, |a, b| {
            let q = a.checked_div(b)?;
            Some(if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }),
        "min" => Ok(if right.compare_value(&left) == Some(Ordering::Less) { right } else { left }),
        "max" => Ok(if right.compare_value(&left) == Some(Ordering::Greater) { right } else { left }),
        "**" => check_float(left.as_f64().powf(right.as_f64())),
        "^" => power(left, right),
        ">>" => int_op(left, right, |a, b| u32::try_from(b).ok().and_then(|b| a.checked_shr(b))),
        "<<" => int_op(left, right, |a, b| u32::try_from(b).ok().and_then(|b| a.checked_shl(b))),
        "/\\" => int_op(left, right, |a, b| Some(a & b)),
        "\\/" => int_op(left, right, |a, b| Some(a | b)),
        "xor" => int_op(left, right, |a, b| Some(a ^ b)),
        "atan2" | "atan" => check_float(left.as_f64().atan2(right.as_f64())),
        _ => Err(not_evaluable(name, 2).into()),
    }
}

fn eval_unary(name: &Symbol, n: Numeric) -> PrologResult<Numeric> {
    let float = n.as_f64();
    match name.as_str() {
        "-" => match n {
            Numeric::Integer(i) => i.checked_neg().map(Numeric::Integer).ok_or_else(|| overflow().into()),
            Numeric::Float(f) => Ok(Numeric::Float(-f)),
        },
        "+" => Ok(n),
        "abs" => match n {
            Numeric::Integer(i) => i.checked_abs().map(Numeric::Integer).ok_or_else(|| overflow().into()),
            Numeric::Float(f) => Ok(Numeric::Float(f.abs())),
        },
        "sign" => Ok(match n {
            Numeric::Integer(i) => Numeric::Integer(i.signum()),
            Numeric::Float(f) if f == 0.0 => Numeric::Float(0.0),
            Numeric::Float(f) => Numeric::Float(f.signum()),
        }),
        "\\" => Ok(Numeric::Integer(!integer(n)?)),
        "float" => Ok(Numeric::Float(float)),
        "integer" => match n {
            Numeric::Integer(_) => Ok(n),
            Numeric::Float(f) => to_integer(f.round()),
        },
        "float_integer_part" => Ok(Numeric::Float(float.trunc())),
        "float_fractional_part" => Ok(Numeric::Float(float.fract())),
        "truncate" | "floor" | "ceiling" | "round" => match n {
            Numeric::Integer(_) => Ok(n),
            Numeric::Float(f) => to_integer(match name.as_str() {
                "truncate" => f.trunc(),
                "floor" => f.floor(),
                "ceiling" => f.ceil(),
                _ => f.round(),
            }),
        },
        "sqrt" if float < 0.0 => Err(RuntimeError::evaluation_error("undefined").into()),
        "sqrt" => check_float(float.sqrt()),
        "log" if float <= 0.0 => Err(RuntimeError::evaluation_error("undefined").into()),
        "log" => check_float(float.ln()),
        "exp" => check_float(float.exp()),
        "sin" => check_float(float.sin()),
        "cos" => check_float(float.cos()),
        "tan" => check_float(float.tan()),
        "asin" => check_float(float.asin()),
        "acos" => check_float(float.acos()),
        "atan" => check_float(float.atan()),
        "succ" => checked(n + Numeric::Integer(1)),
        _ => Err(not_evaluable(name, 1).into()),
    }
}

fn eval_constant(name: &Symbol) -> PrologResult<Numeric> {
    match name.as_str() {
        "pi" => Ok(Numeric::Float(std::f64::consts::PI)),
        "e" => Ok(Numeric::Float(std::f64::consts::E)),
        "max_tagged_integer" => Ok(Numeric::Integer(i64::MAX)),
        "min_tagged_integer" => Ok(Numeric::Integer(i64::MIN)),
        "epsilon" => Ok(Numeric::Float(f64::EPSILON)),
        _ => Err(not_evaluable(name, 0).into()),
    }
}

/// Evaluate an arithmetic expression.
pub(crate) fn eval(m: &Machine, expr: &Term) -> PrologResult<Numeric> {
    let expr = m.deref(expr);
    match expr.value() {
        Value::Number(n) => Ok(*n),
        Value::Variable(_) => Err(RuntimeError::Instantiation.into()),
        Value::Atom(name) => eval_constant(name),
        Value::String(_) => Err(RuntimeError::type_error("evaluable", expr.clone()).into()),
        Value::Compound(Compound { name, args }) => match args.as_slice() {
            [arg] => eval_unary(name, eval(m, arg)?),
            [left, right] => eval_binary(name, eval(m, left)?, eval(m, right)?),
            _ => Err(not_evaluable(name, args.len()).into()),
        },
    }
}

/// `Result is Expression`.
pub(crate) fn is(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let value = eval(m, &args[1])?;
    Ok(m.unify(&args[0], &Term::number(value)))
}

fn compare(m: &Machine, args: &[Term]) -> PrologResult<Option<Ordering>> {
    let left = eval(m, &args[0])?;
    let right = eval(m, &args[1])?;
    Ok(left.compare_value(&right))
}

pub(crate) fn equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(compare(m, args)? == Some(Ordering::Equal))
}

pub(crate) fn not_equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(compare(m, args)? != Some(Ordering::Equal))
}

pub(crate) fn less(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(compare(m, args)? == Some(Ordering::Less))
}

pub(crate) fn greater(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(compare(m, args)? == Some(Ordering::Greater))
}

pub(crate) fn less_or_equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(
        compare(m, args)?,
        Some(Ordering::Less) | Some(Ordering::Equal)
    ))
}

pub(crate) fn greater_or_equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(
        compare(m, args)?,
        Some(Ordering::Greater) | Some(Ordering::Equal)
    ))
}

/// An integer argument, or `None` when it is unbound.
fn integer_arg(m: &Machine, term: &Term) -> PrologResult<Option<i64>> {
    let term = m.deref(term);
    match term.value() {
        Value::Variable(_) => Ok(None),
        Value::Number(Numeric::Integer(i)) => Ok(Some(*i)),
        _ => Err(RuntimeError::type_error("integer", term.clone()).into()),
    }
}

/// `succ(X, Y)`: `Y` is `X + 1`, both natural numbers.
pub(crate) fn succ(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let not_less_than_zero =
        |term: &Term| RuntimeError::type_error("not_less_than_zero", term.clone());
    match (integer_arg(m, &args[0])?, integer_arg(m, &args[1])?) {
        (Some(x), _) if x < 0 => Err(not_less_than_zero(&m.deref(&args[0])).into()),
        (_, Some(y)) if y < 0 => Err(not_less_than_zero(&m.deref(&args[1])).into()),
        (Some(x), _) => {
            let y = x.checked_add(1).ok_or_else(overflow)?;
            Ok(m.unify(&args[1], &Term::integer(y)))
        }
        (None, Some(0)) => Ok(false),
        (None, Some(y)) => Ok(m.unify(&args[0], &Term::integer(y - 1))),
        (None, None) => Err(RuntimeError::Instantiation.into()),
    }
}

/// `between(Low, High, X)`. `High` may be `inf` or `infinite`.
pub(crate) fn between(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let low = integer_arg(m, &args[0])?.ok_or(RuntimeError::Instantiation)?;
    let high_term = m.deref(&args[1]);
    let high = match high_term.value() {
        Value::Atom(name) if name.0 == "inf" || name.0 == "infinite" => None,
        _ => Some(integer_arg(m, &high_term)?.ok_or(RuntimeError::Instantiation)?),
    };
    match integer_arg(m, &args[2])? {
        Some(x) => Ok(x >= low && high.map_or(true, |high| x <= high)),
        None if high.map_or(false, |high| low > high) => Ok(false),
        None => {
            m.next_between(args[2].clone(), low, high)?;
            Ok(true)
        }
    }
}

impl Machine {
    /// Bind `var` to `next`, leaving a choice for `next + 1` up to `high`.
    pub(crate) fn next_between(
        &mut self,
        var: Term,
        next: i64,
        high: Option<i64>,
    ) -> PrologResult<()> {
        if high.map_or(true, |high| next < high) {
            if let Some(after) = next.checked_add(1) {
                self.push_choice(Alternative::Between {
                    var: var.clone(),
                    next: after,
                    high,
                })?;
            }
        }
        if !self.unify(&var, &Term::integer(next)) {
            self.fail();
        }
        Ok(())
    }
}
