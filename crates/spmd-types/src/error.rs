// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type-rule violations.

use spmd_ast::{Span, Type};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssignmentError {
    #[error("cannot assign {from} to {to}: a varying value cannot become uniform")]
    VaryingToUniform { from: Type, to: Type, span: Span },
    #[error("cannot assign {from} to {to} without an explicit decomposition")]
    ConstraintMismatch { from: Type, to: Type, span: Span },
    #[error("cannot assign {from} to {to}: element types differ")]
    BaseMismatch { from: Type, to: Type, span: Span },
    #[error("{ty} needs {required} bits, over the {limit}-bit register limit")]
    RegisterCapacityExceeded { ty: Type, required: u64, limit: u32, span: Span },
    #[error("cannot write uniform variable `{name}` under varying control flow")]
    UniformWriteUnderVaryingControl { name: String, span: Span },
}

impl AssignmentError {
    pub fn span(&self) -> Span {
        match self {
            AssignmentError::VaryingToUniform { span, .. }
            | AssignmentError::ConstraintMismatch { span, .. }
            | AssignmentError::BaseMismatch { span, .. }
            | AssignmentError::RegisterCapacityExceeded { span, .. }
            | AssignmentError::UniformWriteUnderVaryingControl { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CastError {
    #[error(
        "cannot cast {from} to {to}: {lanes} lanes need {required} bits, \
         over the {limit}-bit register limit"
    )]
    RegisterCapacityExceeded {
        from: Type,
        to: Type,
        lanes: u32,
        required: u64,
        limit: u32,
        span: Span,
    },
    #[error("cannot cast {from} to {to}: a varying value cannot become uniform")]
    VaryingToUniform { from: Type, to: Type, span: Span },
    #[error("cannot cast {from} to {to}: casts keep the lane count")]
    LaneCountChange { from: Type, to: Type, span: Span },
    #[error("cannot cast {from} to {to}")]
    Unsupported { from: Type, to: Type, span: Span },
}

impl CastError {
    pub fn span(&self) -> Span {
        match self {
            CastError::RegisterCapacityExceeded { span, .. }
            | CastError::VaryingToUniform { span, .. }
            | CastError::LaneCountChange { span, .. }
            | CastError::Unsupported { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisibilityError {
    #[error("public function `{name}` takes varying parameters")]
    PublicSpmdFunction { name: String, span: Span },
}

impl VisibilityError {
    pub fn span(&self) -> Span {
        match self {
            VisibilityError::PublicSpmdFunction { span, .. } => *span,
        }
    }
}
