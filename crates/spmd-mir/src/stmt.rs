// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! MIR statements and terminators.

use crate::{BlockId, FunctionRef, LocalId, MirOperand, MirRValue};

#[derive(Debug, Clone, PartialEq)]
pub enum MirStmt {
    Assign {
        dst: LocalId,
        rvalue: MirRValue,
    },
    /// `base[index] = value`, skipped when `guard` is false.
    Store {
        base: LocalId,
        index: MirOperand,
        value: MirOperand,
        guard: Option<MirOperand>,
    },
    /// Per active lane `i`: `base[index_i] = value_i`. Scalar operands are
    /// shared by all lanes. Inactive lanes never touch memory.
    MaskedStore {
        base: LocalId,
        index: MirOperand,
        value: MirOperand,
        mask: MirOperand,
    },
    Call {
        dst: Option<LocalId>,
        func: FunctionRef,
        args: Vec<MirOperand>,
    },
}

/// Block terminator. Branch and switch conditions are always uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum MirTerminator {
    Return {
        value: Option<MirOperand>,
    },
    Goto {
        target: BlockId,
    },
    Branch {
        cond: MirOperand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: MirOperand,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    Unreachable,
}
