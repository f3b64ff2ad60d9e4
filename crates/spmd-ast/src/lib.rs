// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Typed statement tree handed to the SPMD lowering.
//!
//! A front-end produces this tree after name resolution and type checking:
//! every expression already carries its resolved uniform/varying [`Type`],
//! and every `if`/`switch`/loop says whether it diverges across lanes.

pub mod build;
pub mod decl;
pub mod expr;
pub mod span;
pub mod stmt;
pub mod ty;

pub use decl::{Decl, DeclKind, ExternDecl, FnDecl, Param, Program};
pub use expr::{BinOp, Expr, ExprKind, UnaryOp};
pub use span::{LineMap, Span};
pub use stmt::{LoopMode, Stmt, StmtKind, SwitchCase};
pub use ty::{BaseType, ScalarType, Type};

/// Unique identifier for tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}
