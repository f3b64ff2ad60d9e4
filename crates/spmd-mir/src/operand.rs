// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! MIR operands and rvalues.

use spmd_ast::ScalarType;
use spmd_types::ReduceKind;

use crate::MirType;

pub use crate::function::LocalId;

#[derive(Debug, Clone, PartialEq)]
pub enum MirOperand {
    Local(LocalId),
    Constant(MirConst),
}

impl MirOperand {
    pub fn int(v: i64) -> Self {
        MirOperand::Constant(MirConst::Int(v))
    }

    pub fn bool(v: bool) -> Self {
        MirOperand::Constant(MirConst::Bool(v))
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            MirOperand::Local(id) => Some(*id),
            MirOperand::Constant(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MirConst {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Right-hand side of an assignment. Arithmetic is lane-wise when the
/// operands are vectors or masks.
#[derive(Debug, Clone, PartialEq)]
pub enum MirRValue {
    Use(MirOperand),
    BinaryOp {
        op: BinOp,
        left: MirOperand,
        right: MirOperand,
    },
    UnaryOp {
        op: UnaryOp,
        operand: MirOperand,
    },
    Cast {
        value: MirOperand,
        target_ty: MirType,
    },
    /// Uniform value copied into every lane.
    Splat {
        value: MirOperand,
        lanes: u32,
    },
    /// `[0, 1, .., lanes-1]`
    LaneIndex {
        elem: ScalarType,
        lanes: u32,
    },
    MaskConst {
        lanes: u32,
        value: bool,
    },
    /// Per lane: `mask ? if_true : if_false`.
    Select {
        mask: MirOperand,
        if_true: MirOperand,
        if_false: MirOperand,
    },
    /// Element read. A vector `index` gathers one element per lane; lanes
    /// outside `mask` read zero and never touch memory.
    Load {
        base: MirOperand,
        index: MirOperand,
        mask: Option<MirOperand>,
    },
    /// Fold lanes into a scalar, lanes outside `mask` contributing the
    /// identity of `op`.
    Reduce {
        op: ReduceKind,
        elem: ScalarType,
        value: MirOperand,
        mask: Option<MirOperand>,
    },
    LaneBroadcast {
        value: MirOperand,
        lane: MirOperand,
    },
    /// `out[i] = value[(i + offset) mod lanes]`
    Rotate {
        value: MirOperand,
        offset: MirOperand,
    },
    /// `out[i] = value[indices[i] mod lanes]`
    Swizzle {
        value: MirOperand,
        indices: MirOperand,
    },
    /// Move lanes up (`Left`) or down (`Right`), filling with zero.
    ShiftLanes {
        value: MirOperand,
        amount: MirOperand,
        dir: LaneShift,
    },
    /// Lanes of a vector into an array, in lane order.
    ExtractLanes {
        value: MirOperand,
    },
    /// Lanes `[group*lanes, (group+1)*lanes)` of a wider vector or mask,
    /// zero-filled past its end.
    Slice {
        value: MirOperand,
        group: u32,
        lanes: u32,
    },
    /// Concatenate group vectors and keep the first `lanes` lanes.
    Compose {
        parts: Vec<MirOperand>,
        lanes: u32,
    },
    /// Mask of the lanes of `group` that fall below `total`.
    GroupMask {
        total: u32,
        group: u32,
        lanes: u32,
    },
    Aggregate {
        elems: Vec<MirOperand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneShift {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    /// `left & !right`, the mask complement used when splitting a branch.
    AndNot,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    /// Callee takes the execution mask as its first argument.
    pub takes_mask: bool,
    pub is_extern: bool,
}
