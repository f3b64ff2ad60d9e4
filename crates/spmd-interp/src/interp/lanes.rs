// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cross-lane operations: permutations, reductions, group slicing.

use spmd_ast::ScalarType;
use spmd_mir::{BinOp, LaneShift};
use spmd_types::ReduceKind;

use super::operators::{binary, int_range, normalize, wrap};
use super::RuntimeError;
use crate::value::{Scalar, Value};

fn active(mask: Option<&[bool]>, lane: usize) -> bool {
    mask.map_or(true, |m| m.get(lane).copied().unwrap_or(false))
}

/// Value a lane contributes when it is masked off.
pub(super) fn identity(op: ReduceKind, elem: ScalarType) -> Scalar {
    let float = elem.is_float();
    match op {
        ReduceKind::Add | ReduceKind::Or | ReduceKind::Xor => Scalar::zero(elem),
        ReduceKind::Mul if float => Scalar::Float(1.0),
        ReduceKind::Mul => Scalar::Int(1),
        ReduceKind::Max if float => Scalar::Float(f64::NEG_INFINITY),
        ReduceKind::Max => Scalar::Int(int_range(elem).0),
        ReduceKind::Min if float => Scalar::Float(f64::INFINITY),
        ReduceKind::Min => Scalar::Int(int_range(elem).1),
        ReduceKind::And => Scalar::Int(wrap(-1, elem)),
        ReduceKind::All => Scalar::Bool(true),
        ReduceKind::Any => Scalar::Bool(false),
        ReduceKind::FindFirstSet => Scalar::Int(-1),
        ReduceKind::Count => Scalar::Int(0),
    }
}

/// Fold active lanes in increasing lane order.
pub(super) fn reduce(
    op: ReduceKind,
    elem: ScalarType,
    lanes: &[Scalar],
    mask: Option<&[bool]>,
) -> Result<Scalar, RuntimeError> {
    let mut hits = lanes
        .iter()
        .enumerate()
        .filter(|(i, _)| active(mask, *i))
        .map(|(i, s)| (i, s.as_bool() == Some(true)));
    match op {
        ReduceKind::All => return Ok(Scalar::Bool(hits.all(|(_, b)| b))),
        ReduceKind::Any => return Ok(Scalar::Bool(hits.any(|(_, b)| b))),
        ReduceKind::Count => return Ok(Scalar::Int(hits.filter(|(_, b)| *b).count() as i64)),
        ReduceKind::FindFirstSet => {
            let first = hits.find(|(_, b)| *b).map_or(-1, |(i, _)| i as i64);
            return Ok(Scalar::Int(first));
        }
        _ => {}
    }

    let mut acc = identity(op, elem);
    for (i, lane) in lanes.iter().enumerate() {
        if !active(mask, i) {
            continue;
        }
        acc = match op {
            ReduceKind::Add => binary(BinOp::Add, acc, *lane, true)?,
            ReduceKind::Mul => binary(BinOp::Mul, acc, *lane, true)?,
            ReduceKind::Or => binary(BinOp::Or, acc, *lane, true)?,
            ReduceKind::And => binary(BinOp::And, acc, *lane, true)?,
            ReduceKind::Xor => binary(BinOp::Xor, acc, *lane, true)?,
            ReduceKind::Max => pick(acc, *lane, BinOp::Gt)?,
            ReduceKind::Min => pick(acc, *lane, BinOp::Lt)?,
            _ => acc,
        };
        acc = normalize(acc, elem);
    }
    Ok(acc)
}

fn pick(acc: Scalar, lane: Scalar, better: BinOp) -> Result<Scalar, RuntimeError> {
    match binary(better, lane, acc, true)? {
        Scalar::Bool(true) => Ok(lane),
        _ => Ok(acc),
    }
}

/// Per lane `mask ? t : f`, recursing into arrays of vectors.
pub(super) fn select(mask: &[bool], t: &Value, f: &Value) -> Result<Value, RuntimeError> {
    match (t, f) {
        (Value::Array(ts), Value::Array(fs)) if ts.len() == fs.len() => ts
            .iter()
            .zip(fs)
            .map(|(t, f)| select(mask, t, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => {
            let (ts, fs) = match (t.lanes(), f.lanes()) {
                (Some(ts), Some(fs)) if ts.len() == fs.len() => (ts, fs),
                _ => {
                    return Err(RuntimeError::TypeError(format!(
                        "select between {} and {}",
                        t.type_name(),
                        f.type_name()
                    )));
                }
            };
            let lanes = ts
                .into_iter()
                .zip(fs)
                .enumerate()
                .map(|(i, (t, f))| if active(Some(mask), i) { t } else { f })
                .collect();
            Ok(Value::from_lanes(lanes))
        }
    }
}

fn lane_index(v: i64, width: usize) -> usize {
    v.rem_euclid(width as i64) as usize
}

pub(super) fn broadcast(lanes: &[Scalar], lane: i64) -> Vec<Scalar> {
    if lanes.is_empty() {
        return Vec::new();
    }
    let picked = lanes[lane_index(lane, lanes.len())];
    vec![picked; lanes.len()]
}

/// `out[i] = v[(i + offset) mod W]`
pub(super) fn rotate(lanes: &[Scalar], offset: i64) -> Vec<Scalar> {
    let w = lanes.len();
    (0..w).map(|i| lanes[lane_index(i as i64 + offset, w)]).collect()
}

/// `out[i] = v[indices[i] mod W]`
pub(super) fn swizzle(lanes: &[Scalar], indices: &[Scalar]) -> Result<Vec<Scalar>, RuntimeError> {
    let w = lanes.len();
    indices
        .iter()
        .map(|idx| {
            let idx = idx
                .as_int()
                .ok_or_else(|| RuntimeError::TypeError("swizzle index must be an integer".into()))?;
            Ok(lanes[lane_index(idx, w)])
        })
        .collect()
}

/// Lanes move toward higher (`Left`) or lower (`Right`) indices; vacated
/// lanes are zero.
pub(super) fn shift(lanes: &[Scalar], amount: i64, dir: LaneShift) -> Vec<Scalar> {
    let w = lanes.len();
    let n = amount.clamp(0, w as i64) as usize;
    let zero = lanes.first().map_or(Scalar::Int(0), |s| zero_like(*s));
    (0..w)
        .map(|i| match dir {
            LaneShift::Left if i >= n => lanes[i - n],
            LaneShift::Right if i + n < w => lanes[i + n],
            _ => zero,
        })
        .collect()
}

pub(super) fn zero_like(s: Scalar) -> Scalar {
    match s {
        Scalar::Int(_) => Scalar::Int(0),
        Scalar::Float(_) => Scalar::Float(0.0),
        Scalar::Bool(_) => Scalar::Bool(false),
    }
}

/// Lanes `[group*width, (group+1)*width)`, zero past the end.
pub(super) fn slice(lanes: &[Scalar], group: u32, width: u32) -> Vec<Scalar> {
    let zero = lanes.first().map_or(Scalar::Int(0), |s| zero_like(*s));
    let start = (group * width) as usize;
    (0..width as usize).map(|i| lanes.get(start + i).copied().unwrap_or(zero)).collect()
}

pub(super) fn compose(parts: Vec<Vec<Scalar>>, width: u32) -> Vec<Scalar> {
    parts.into_iter().flatten().take(width as usize).collect()
}

pub(super) fn group_mask(total: u32, group: u32, width: u32) -> Vec<bool> {
    (0..width).map(|i| group * width + i < total).collect()
}
