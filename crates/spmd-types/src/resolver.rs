// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Assignment and cast legality between uniform and varying types.

use spmd_ast::{BaseType, Span, Type};

use crate::{AssignmentError, CastError, TargetConfig};

/// Where a value is being assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignContext {
    /// `let` bindings, assignments, and returns.
    Binding,
    /// Passing an argument to a parameter.
    Argument,
}

/// What the lowering must emit to move a value into its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Direct,
    /// Splat a uniform value across `lanes` lanes, or across the function's
    /// lane count when `None`.
    Broadcast { lanes: Option<u32> },
    /// Split a constrained varying value of `lanes` lanes into groups of the
    /// destination's lane count.
    Decompose { lanes: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Same element width.
    Same,
    /// Narrower target element.
    Downcast,
    /// Wider target element; checked against the register limit.
    Upcast,
}

pub struct TypeResolver<'a> {
    config: &'a TargetConfig,
}

impl<'a> TypeResolver<'a> {
    pub fn new(config: &'a TargetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TargetConfig {
        self.config
    }

    /// Constrained varying values must fit in one register.
    pub fn check_well_formed(&self, ty: &Type, span: Span) -> Result<(), AssignmentError> {
        if let Type::ConstrainedVarying(base, n) = ty {
            let required = u64::from(*n) * u64::from(base.bits());
            if required > u64::from(self.config.register_limit_bits) {
                return Err(AssignmentError::RegisterCapacityExceeded {
                    ty: ty.clone(),
                    required,
                    limit: self.config.register_limit_bits,
                    span,
                });
            }
        }
        Ok(())
    }

    pub fn check_assign(
        &self,
        from: &Type,
        to: &Type,
        ctx: AssignContext,
        span: Span,
    ) -> Result<Coercion, AssignmentError> {
        if from.is_varying() && to.is_uniform() {
            return Err(AssignmentError::VaryingToUniform {
                from: from.clone(),
                to: to.clone(),
                span,
            });
        }
        if from.base() != to.base() {
            return Err(AssignmentError::BaseMismatch { from: from.clone(), to: to.clone(), span });
        }

        let mismatch = || AssignmentError::ConstraintMismatch {
            from: from.clone(),
            to: to.clone(),
            span,
        };

        match (from, to) {
            (Type::Void, Type::Void)
            | (Type::Uniform(_), Type::Uniform(_))
            | (Type::Varying(_), Type::Varying(_)) => Ok(Coercion::Direct),
            (Type::Uniform(_), Type::Varying(_)) => Ok(Coercion::Broadcast { lanes: None }),
            (Type::Uniform(_), Type::ConstrainedVarying(_, n)) => {
                self.check_well_formed(to, span)?;
                Ok(Coercion::Broadcast { lanes: Some(*n) })
            }
            (Type::ConstrainedVarying(_, n), Type::ConstrainedVarying(_, m)) if n == m => {
                Ok(Coercion::Direct)
            }
            (Type::ConstrainedVarying(_, n), Type::Varying(_))
                if ctx == AssignContext::Argument =>
            {
                Ok(Coercion::Decompose { lanes: *n })
            }
            _ => Err(mismatch()),
        }
    }

    /// `lanes` is the function's lane count, used for unconstrained varying
    /// targets.
    pub fn check_cast(
        &self,
        from: &Type,
        to: &Type,
        lanes: Option<u32>,
        span: Span,
    ) -> Result<CastKind, CastError> {
        if from.is_varying() && to.is_uniform() {
            return Err(CastError::VaryingToUniform { from: from.clone(), to: to.clone(), span });
        }
        match (from, to) {
            (Type::ConstrainedVarying(_, n), Type::ConstrainedVarying(_, m)) if n != m => {
                return Err(CastError::LaneCountChange { from: from.clone(), to: to.clone(), span });
            }
            (Type::ConstrainedVarying(..), Type::Varying(_))
            | (Type::Varying(_), Type::ConstrainedVarying(..)) => {
                return Err(CastError::LaneCountChange { from: from.clone(), to: to.clone(), span });
            }
            _ => {}
        }

        let unsupported = || CastError::Unsupported { from: from.clone(), to: to.clone(), span };
        let (Some(src), Some(dst)) = (from.base(), to.base()) else {
            return Err(unsupported());
        };

        let kind = match (src, dst) {
            (BaseType::Scalar(a), BaseType::Scalar(b)) => {
                if b.bits() > a.bits() {
                    CastKind::Upcast
                } else if b.bits() < a.bits() {
                    CastKind::Downcast
                } else {
                    CastKind::Same
                }
            }
            (BaseType::Ptr(_), BaseType::Ptr(_)) => CastKind::Same,
            (a, b) if a == b => CastKind::Same,
            _ => return Err(unsupported()),
        };

        if kind == CastKind::Upcast {
            let lane_count = match to {
                Type::ConstrainedVarying(_, n) => *n,
                Type::Varying(_) => lanes.unwrap_or(self.config.default_lanes),
                _ => 1,
            };
            let required = u64::from(lane_count) * u64::from(dst.bits());
            let limit = self.config.register_limit_bits;
            if required > u64::from(limit) {
                return Err(CastError::RegisterCapacityExceeded {
                    from: from.clone(),
                    to: to.clone(),
                    lanes: lane_count,
                    required,
                    limit,
                    span,
                });
            }
        }
        Ok(kind)
    }
}
