// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Scalar operators, applied once per lane for vector operands.

use spmd_ast::ScalarType;
use spmd_mir::{BinOp, UnaryOp};

use super::RuntimeError;
use crate::value::Scalar;

/// Apply `op` to one pair of lanes. In lane-wise mode an integer division
/// by zero yields 0 instead of failing: the lane may be masked off, and
/// masked lanes still run every operation.
pub(super) fn binary(op: BinOp, a: Scalar, b: Scalar, lane_wise: bool) -> Result<Scalar, RuntimeError> {
    match (a, b) {
        (Scalar::Bool(x), Scalar::Bool(y)) => bool_binary(op, x, y),
        (Scalar::Int(x), Scalar::Int(y)) => int_binary(op, x, y, lane_wise),
        (Scalar::Float(_), _) | (_, Scalar::Float(_)) => float_binary(op, a.as_float(), b.as_float()),
        _ => Err(RuntimeError::TypeError(format!("cannot apply {:?} to {:?} and {:?}", op, a, b))),
    }
}

fn bool_binary(op: BinOp, x: bool, y: bool) -> Result<Scalar, RuntimeError> {
    let r = match op {
        BinOp::And => x && y,
        BinOp::Or => x || y,
        BinOp::Xor | BinOp::Ne => x != y,
        BinOp::AndNot => x && !y,
        BinOp::Eq => x == y,
        _ => return Err(RuntimeError::TypeError(format!("{:?} is not defined on bool", op))),
    };
    Ok(Scalar::Bool(r))
}

fn int_binary(op: BinOp, x: i64, y: i64, lane_wise: bool) -> Result<Scalar, RuntimeError> {
    let v = match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div | BinOp::Rem if y == 0 => {
            if lane_wise {
                0
            } else {
                return Err(RuntimeError::DivisionByZero);
            }
        }
        BinOp::Div => x.wrapping_div(y),
        BinOp::Rem => x.wrapping_rem(y),
        BinOp::And => x & y,
        BinOp::Or => x | y,
        BinOp::Xor => x ^ y,
        BinOp::AndNot => x & !y,
        BinOp::Shl => x.wrapping_shl(y as u32),
        BinOp::Shr => x.wrapping_shr(y as u32),
        BinOp::Eq => return Ok(Scalar::Bool(x == y)),
        BinOp::Ne => return Ok(Scalar::Bool(x != y)),
        BinOp::Lt => return Ok(Scalar::Bool(x < y)),
        BinOp::Gt => return Ok(Scalar::Bool(x > y)),
        BinOp::Le => return Ok(Scalar::Bool(x <= y)),
        BinOp::Ge => return Ok(Scalar::Bool(x >= y)),
    };
    Ok(Scalar::Int(v))
}

fn float_binary(op: BinOp, x: f64, y: f64) -> Result<Scalar, RuntimeError> {
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Rem => x % y,
        BinOp::Eq => return Ok(Scalar::Bool(x == y)),
        BinOp::Ne => return Ok(Scalar::Bool(x != y)),
        BinOp::Lt => return Ok(Scalar::Bool(x < y)),
        BinOp::Gt => return Ok(Scalar::Bool(x > y)),
        BinOp::Le => return Ok(Scalar::Bool(x <= y)),
        BinOp::Ge => return Ok(Scalar::Bool(x >= y)),
        _ => return Err(RuntimeError::TypeError(format!("{:?} is not defined on floats", op))),
    };
    Ok(Scalar::Float(v))
}

pub(super) fn unary(op: UnaryOp, a: Scalar) -> Result<Scalar, RuntimeError> {
    match (op, a) {
        (UnaryOp::Neg, Scalar::Int(v)) => Ok(Scalar::Int(v.wrapping_neg())),
        (UnaryOp::Neg, Scalar::Float(v)) => Ok(Scalar::Float(-v)),
        (UnaryOp::Not, Scalar::Bool(b)) => Ok(Scalar::Bool(!b)),
        (UnaryOp::Not, Scalar::Int(v)) => Ok(Scalar::Int(!v)),
        _ => Err(RuntimeError::TypeError(format!("cannot apply {:?} to {:?}", op, a))),
    }
}

pub(super) fn cast(a: Scalar, target: ScalarType) -> Scalar {
    if target == ScalarType::Bool {
        return Scalar::Bool(match a {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        });
    }
    if target.is_float() {
        return normalize(Scalar::Float(a.as_float()), target);
    }
    let v = match a {
        Scalar::Int(v) => v,
        Scalar::Float(v) => v as i64,
        Scalar::Bool(b) => i64::from(b),
    };
    Scalar::Int(wrap(v, target))
}

/// Bring a computed lane back into the range of its declared type.
pub(super) fn normalize(a: Scalar, ty: ScalarType) -> Scalar {
    match a {
        Scalar::Int(v) if ty.is_float() => normalize(Scalar::Float(v as f64), ty),
        Scalar::Int(v) if ty.is_integer() => Scalar::Int(wrap(v, ty)),
        Scalar::Float(v) if ty == ScalarType::F32 => Scalar::Float(f64::from(v as f32)),
        other => other,
    }
}

/// Two's-complement wrap to the width of `ty`. `u64` keeps its bit pattern.
pub(super) fn wrap(v: i64, ty: ScalarType) -> i64 {
    match ty {
        ScalarType::I8 => i64::from(v as i8),
        ScalarType::I16 => i64::from(v as i16),
        ScalarType::I32 => i64::from(v as i32),
        ScalarType::U8 => i64::from(v as u8),
        ScalarType::U16 => i64::from(v as u16),
        ScalarType::U32 => i64::from(v as u32),
        _ => v,
    }
}

/// Smallest and largest value of an integer type.
pub(super) fn int_range(ty: ScalarType) -> (i64, i64) {
    match ty {
        ScalarType::I8 => (i8::MIN.into(), i8::MAX.into()),
        ScalarType::I16 => (i16::MIN.into(), i16::MAX.into()),
        ScalarType::I32 => (i32::MIN.into(), i32::MAX.into()),
        ScalarType::U8 => (0, u8::MAX.into()),
        ScalarType::U16 => (0, u16::MAX.into()),
        ScalarType::U32 => (0, u32::MAX.into()),
        ScalarType::U64 => (0, i64::MAX),
        _ => (i64::MIN, i64::MAX),
    }
}
