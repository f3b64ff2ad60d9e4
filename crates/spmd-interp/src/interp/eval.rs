// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Rvalue evaluation.

use spmd_ast::ScalarType;
use spmd_mir::{MirOperand, MirRValue, MirType};

use super::operators::{binary, cast, normalize, unary};
use super::{lanes, read_elements, Frame, RuntimeError};
use crate::value::{Scalar, Value};

impl<'m> Frame<'m> {
    pub(super) fn eval_rvalue(&self, rvalue: &MirRValue, ty: &MirType) -> Result<Value, RuntimeError> {
        let value = match rvalue {
            MirRValue::Use(op) => self.operand(op)?,
            MirRValue::BinaryOp { op, left, right } => {
                let (a, b) = (self.operand(left)?, self.operand(right)?);
                lane_wise2(&a, &b, |x, y, lw| binary(*op, x, y, lw))?
            }
            MirRValue::UnaryOp { op, operand } => {
                let a = self.operand(operand)?;
                map_lanes(&a, |x| unary(*op, x))?
            }
            MirRValue::Cast { value, target_ty } => {
                let target = target_ty.elem().ok_or_else(|| type_error("cast to a non-scalar type"))?;
                let a = self.operand(value)?;
                map_lanes(&a, |x| Ok(cast(x, target)))?
            }
            MirRValue::Splat { value, lanes } => {
                let s = self.scalar(value)?;
                Value::from_lanes(vec![s; *lanes as usize])
            }
            MirRValue::LaneIndex { elem, lanes } => Value::Vector(
                (0..*lanes)
                    .map(|i| if elem.is_float() { Scalar::Float(f64::from(i)) } else { Scalar::Int(i64::from(i)) })
                    .collect(),
            ),
            MirRValue::MaskConst { lanes, value } => Value::Mask(vec![*value; *lanes as usize]),
            MirRValue::Select { mask, if_true, if_false } => {
                let mask = self.mask(mask)?;
                lanes::select(&mask, &self.operand(if_true)?, &self.operand(if_false)?)?
            }
            MirRValue::Load { base, index, mask } => {
                let mask = mask.as_ref().map(|m| self.mask(m)).transpose()?;
                let zero = Scalar::zero(ty.elem().unwrap_or(ScalarType::I32));
                load(&self.operand(base)?, &self.operand(index)?, mask.as_deref(), zero)?
            }
            MirRValue::Reduce { op, elem, value, mask } => {
                let mask = mask.as_ref().map(|m| self.mask(m)).transpose()?;
                let lanes = self.lanes(value)?;
                Value::Scalar(lanes::reduce(*op, *elem, &lanes, mask.as_deref())?)
            }
            MirRValue::LaneBroadcast { value, lane } => {
                Value::from_lanes(lanes::broadcast(&self.lanes(value)?, self.int(lane)?))
            }
            MirRValue::Rotate { value, offset } => {
                Value::from_lanes(lanes::rotate(&self.lanes(value)?, self.int(offset)?))
            }
            MirRValue::Swizzle { value, indices } => {
                Value::from_lanes(lanes::swizzle(&self.lanes(value)?, &self.lanes(indices)?)?)
            }
            MirRValue::ShiftLanes { value, amount, dir } => {
                Value::from_lanes(lanes::shift(&self.lanes(value)?, self.int(amount)?, *dir))
            }
            MirRValue::ExtractLanes { value } => {
                Value::Array(self.lanes(value)?.into_iter().map(Value::Scalar).collect())
            }
            MirRValue::Slice { value, group, lanes } => {
                Value::from_lanes(lanes::slice(&self.lanes(value)?, *group, *lanes))
            }
            MirRValue::Compose { parts, lanes } => {
                let parts = parts.iter().map(|p| self.lanes(p)).collect::<Result<Vec<_>, _>>()?;
                Value::from_lanes(lanes::compose(parts, *lanes))
            }
            MirRValue::GroupMask { total, group, lanes } => {
                Value::Mask(lanes::group_mask(*total, *group, *lanes))
            }
            MirRValue::Aggregate { elems } => {
                Value::Array(elems.iter().map(|e| self.operand(e)).collect::<Result<_, _>>()?)
            }
        };
        Ok(normalize_value(value, ty))
    }

    fn scalar(&self, op: &MirOperand) -> Result<Scalar, RuntimeError> {
        let v = self.operand(op)?;
        v.as_scalar().ok_or_else(|| type_error(format!("expected a scalar, found {}", v.type_name())))
    }

    fn int(&self, op: &MirOperand) -> Result<i64, RuntimeError> {
        self.scalar(op)?.as_int().ok_or_else(|| type_error("expected an integer"))
    }

    fn lanes(&self, op: &MirOperand) -> Result<Vec<Scalar>, RuntimeError> {
        let v = self.operand(op)?;
        v.lanes().ok_or_else(|| type_error(format!("expected lanes, found {}", v.type_name())))
    }

    pub(super) fn mask(&self, op: &MirOperand) -> Result<Vec<bool>, RuntimeError> {
        let v = self.operand(op)?;
        v.as_mask()
            .map(<[bool]>::to_vec)
            .ok_or_else(|| type_error(format!("expected a mask, found {}", v.type_name())))
    }
}

fn type_error(msg: impl Into<String>) -> RuntimeError {
    RuntimeError::TypeError(msg.into())
}

/// Apply `f` per lane; scalars pair with every lane of a vector.
fn lane_wise2(
    a: &Value,
    b: &Value,
    f: impl Fn(Scalar, Scalar, bool) -> Result<Scalar, RuntimeError>,
) -> Result<Value, RuntimeError> {
    match (a.lanes(), b.lanes(), a.as_scalar(), b.as_scalar()) {
        (Some(xs), Some(ys), _, _) => {
            if xs.len() != ys.len() {
                return Err(type_error(format!("lane counts {} and {} differ", xs.len(), ys.len())));
            }
            let lanes = xs.into_iter().zip(ys).map(|(x, y)| f(x, y, true)).collect::<Result<_, _>>()?;
            Ok(Value::from_lanes(lanes))
        }
        (Some(xs), None, _, Some(y)) => {
            let lanes = xs.into_iter().map(|x| f(x, y, true)).collect::<Result<_, _>>()?;
            Ok(Value::from_lanes(lanes))
        }
        (None, Some(ys), Some(x), _) => {
            let lanes = ys.into_iter().map(|y| f(x, y, true)).collect::<Result<_, _>>()?;
            Ok(Value::from_lanes(lanes))
        }
        (None, None, Some(x), Some(y)) => Ok(Value::Scalar(f(x, y, false)?)),
        _ => Err(type_error(format!("cannot combine {} and {}", a.type_name(), b.type_name()))),
    }
}

fn map_lanes(a: &Value, f: impl Fn(Scalar) -> Result<Scalar, RuntimeError>) -> Result<Value, RuntimeError> {
    match (a.lanes(), a.as_scalar()) {
        (Some(xs), _) => Ok(Value::from_lanes(xs.into_iter().map(f).collect::<Result<_, _>>()?)),
        (None, Some(x)) => Ok(Value::Scalar(f(x)?)),
        _ => Err(type_error(format!("expected a scalar or vector, found {}", a.type_name()))),
    }
}

/// Element read. A vector index gathers; inactive lanes read `zero` and
/// are not bounds-checked.
fn load(base: &Value, index: &Value, mask: Option<&[bool]>, zero: Scalar) -> Result<Value, RuntimeError> {
    read_elements(base, |elems| match index {
        Value::Scalar(s) => {
            let i = super::checked_index(*s, elems.len())?;
            Ok(elems[i].clone())
        }
        Value::Vector(indices) => {
            let mut lanes = Vec::with_capacity(indices.len());
            for (lane, idx) in indices.iter().enumerate() {
                if !mask.map_or(true, |m| m.get(lane).copied().unwrap_or(false)) {
                    lanes.push(zero);
                    continue;
                }
                let i = super::checked_index(*idx, elems.len())?;
                let s = elems[i]
                    .as_scalar()
                    .ok_or_else(|| type_error("gather from a non-scalar element"))?;
                lanes.push(s);
            }
            Ok(Value::from_lanes(lanes))
        }
        other => Err(type_error(format!("cannot index with {}", other.type_name()))),
    })
}

/// Wrap integer lanes and round `f32` lanes to their declared type.
fn normalize_value(value: Value, ty: &MirType) -> Value {
    match (value, ty) {
        (Value::Scalar(s), MirType::Scalar(t)) => Value::Scalar(normalize(s, *t)),
        (Value::Vector(lanes), MirType::Vector { elem, .. }) => {
            Value::Vector(lanes.into_iter().map(|s| normalize(s, *elem)).collect())
        }
        (Value::Array(elems), MirType::Array { elem, .. }) => {
            Value::Array(elems.into_iter().map(|e| normalize_value(e, elem)).collect())
        }
        (value, _) => value,
    }
}
