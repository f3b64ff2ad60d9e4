// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement nodes.

use crate::{Expr, NodeId, Span, Type};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { id: NodeId::DUMMY, kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    Expr(Expr),
    /// `let name: ty = init`
    Let { name: String, ty: Type, init: Expr },
    /// Destructuring binding of a builtin that yields several values.
    LetTuple { names: Vec<(String, Type)>, init: Expr },
    /// Assignment to an identifier or an index expression.
    Assign { target: Expr, value: Expr },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        /// Condition differs across lanes.
        is_varying: bool,
    },
    Switch {
        tag: Expr,
        cases: Vec<SwitchCase>,
        default: Vec<Stmt>,
        is_varying: bool,
    },
    /// `for binding in start..end`
    For {
        binding: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
        mode: LoopMode,
    },
    While { cond: Expr, body: Vec<Stmt> },
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchCase {
    pub values: Vec<i64>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// How a `for` loop distributes its iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopMode {
    /// One index per iteration.
    Sequential,
    /// One index per lane, `lanes` indices per iteration. The lane count is
    /// resolved from the function unless the front-end pinned it.
    DataParallel { lanes: Option<u32> },
}

impl LoopMode {
    pub fn is_data_parallel(self) -> bool {
        matches!(self, LoopMode::DataParallel { .. })
    }
}
