// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Lowering failures. The first error in a function stops its lowering.

use std::fmt;

use spmd_ast::Span;
use spmd_types::{AssignmentError, CastError, VisibilityError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoweringError {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    ControlFlow(#[from] ControlFlowError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Visibility(#[from] VisibilityError),
    #[error("unresolved variable `{name}`")]
    UnresolvedVariable { name: String, span: Span },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String, span: Span },
    #[error("`{function}` takes {expected} arguments, {found} given")]
    ArityMismatch { function: String, expected: usize, found: usize, span: Span },
    #[error("lane count mismatch: expected {expected}, found {found}")]
    LaneCountMismatch { expected: u32, found: u32, span: Span },
    #[error("{message}")]
    InvalidConstruct { message: String, span: Span },
}

impl LoweringError {
    pub(crate) fn invalid(message: impl Into<String>, span: Span) -> Self {
        LoweringError::InvalidConstruct { message: message.into(), span }
    }

    pub fn span(&self) -> Span {
        match self {
            LoweringError::Assignment(e) => e.span(),
            LoweringError::Cast(e) => e.span(),
            LoweringError::ControlFlow(e) => e.span(),
            LoweringError::Context(e) => e.span(),
            LoweringError::Visibility(e) => e.span(),
            LoweringError::UnresolvedVariable { span, .. }
            | LoweringError::UnknownFunction { span, .. }
            | LoweringError::ArityMismatch { span, .. }
            | LoweringError::LaneCountMismatch { span, .. }
            | LoweringError::InvalidConstruct { span, .. } => *span,
        }
    }
}

/// Statement leaving a loop body or function early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Break,
    Return,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Break => f.write_str("break"),
            ExitKind::Return => f.write_str("return"),
        }
    }
}

/// Why an early exit would leave lanes behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// The exit sits under a varying `if` or `switch`.
    VaryingCondition,
    /// An earlier `continue` under varying control already disabled some
    /// lanes for the rest of the iteration.
    MaskAltered,
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCause::VaryingCondition => f.write_str("under a varying condition"),
            ExitCause::MaskAltered => f.write_str("after a varying `continue` altered the mask"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlFlowError {
    #[error("`{exit}` {cause}")]
    VaryingExitForbidden { exit: ExitKind, cause: ExitCause, span: Span },
    #[error(transparent)]
    Nesting(#[from] NestingError),
}

impl ControlFlowError {
    pub fn span(&self) -> Span {
        match self {
            ControlFlowError::VaryingExitForbidden { span, .. } => *span,
            ControlFlowError::Nesting(e) => e.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NestingError {
    #[error("data-parallel loop nested inside another data-parallel loop")]
    SpmdLoopNesting { span: Span, outer: Span },
    #[error("data-parallel loop inside SPMD function `{function}`")]
    SpmdFunctionContainsLoop { function: String, span: Span },
}

impl NestingError {
    pub fn span(&self) -> Span {
        match self {
            NestingError::SpmdLoopNesting { span, .. }
            | NestingError::SpmdFunctionContainsLoop { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    #[error("`{builtin}` needs a lane context (a data-parallel loop or SPMD function)")]
    NoLaneContext { builtin: &'static str, span: Span },
}

impl ContextError {
    pub fn span(&self) -> Span {
        match self {
            ContextError::NoLaneContext { span, .. } => *span,
        }
    }
}
