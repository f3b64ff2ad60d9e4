// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Builtin lowering: lane queries, cross-lane permutations, reductions and
//! constrained-value decomposition.

use spmd_ast::{BaseType, Expr, ExprKind, ScalarType, Span, Type};
use spmd_types::{AssignmentError, Builtin, ReduceKind};

use super::errors::ContextError;
use super::{LoweringError, MirLowerer};
use crate::{LaneShift, MirOperand, MirRValue, MirType};

impl<'a> MirLowerer<'a> {
    pub(super) fn lower_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        expr: &Expr,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        if args.len() != builtin.arity() {
            return Err(LoweringError::ArityMismatch {
                function: builtin.name().to_string(),
                expected: builtin.arity(),
                found: args.len(),
                span: expr.span,
            });
        }
        if builtin.needs_lane_context() && !self.has_lane_context() {
            return Err(ContextError::NoLaneContext { builtin: builtin.name(), span: expr.span }.into());
        }

        let ty = self.lower_type(&expr.ty, expr.span)?;
        let rvalue = match builtin {
            Builtin::LaneIndex => {
                let elem = expr.ty.scalar().unwrap_or(ScalarType::I32);
                let lanes = ty.lanes().ok_or_else(|| {
                    LoweringError::invalid("lanes.Index() must produce a varying value", expr.span)
                })?;
                MirRValue::LaneIndex { elem, lanes }
            }
            Builtin::Broadcast => {
                let (value, lane) = self.lower_permute_args(builtin, args)?;
                MirRValue::LaneBroadcast { value, lane }
            }
            Builtin::Rotate => {
                let (value, offset) = self.lower_permute_args(builtin, args)?;
                MirRValue::Rotate { value, offset }
            }
            Builtin::ShiftLeft | Builtin::ShiftRight => {
                let (value, amount) = self.lower_permute_args(builtin, args)?;
                let dir = if builtin == Builtin::ShiftLeft { LaneShift::Left } else { LaneShift::Right };
                MirRValue::ShiftLanes { value, amount, dir }
            }
            Builtin::Swizzle => {
                let value = self.lower_lanes_arg(&args[0], builtin)?;
                let indices = self.lower_lanes_arg(&args[1], builtin)?;
                MirRValue::Swizzle { value, indices }
            }
            Builtin::Reduce(kind) => self.lower_reduce(kind, &args[0], expr)?,
            Builtin::From => {
                let value = self.lower_lanes_arg(&args[0], builtin)?;
                let lanes = self.lanes_of(&args[0])?;
                match &ty {
                    MirType::Array { len, .. } if *len == lanes => {}
                    MirType::Array { len, .. } => {
                        return Err(LoweringError::LaneCountMismatch {
                            expected: *len,
                            found: lanes,
                            span: expr.span,
                        });
                    }
                    _ => {
                        return Err(LoweringError::invalid(
                            "reduce.From produces a uniform array",
                            expr.span,
                        ));
                    }
                }
                MirRValue::ExtractLanes { value }
            }
            Builtin::FromConstrained => {
                return Err(LoweringError::invalid(
                    "lanes.FromConstrained must be bound with a tuple `let`",
                    expr.span,
                ));
            }
        };
        let result = self.builder.emit(ty.clone(), rvalue);
        Ok((MirOperand::Local(result), ty))
    }

    /// `(varying value, uniform amount)`
    fn lower_permute_args(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
    ) -> Result<(MirOperand, MirOperand), LoweringError> {
        let value = self.lower_lanes_arg(&args[0], builtin)?;
        let amount = &args[1];
        if amount.ty.is_varying() {
            return Err(LoweringError::invalid(
                format!("`{}` takes a uniform lane amount", builtin.name()),
                amount.span,
            ));
        }
        let (amount_op, _) = self.lower_expr(amount)?;
        Ok((value, amount_op))
    }

    /// Lower an argument that must hold one value per lane; uniform values
    /// are broadcast.
    fn lower_lanes_arg(&mut self, arg: &Expr, builtin: Builtin) -> Result<MirOperand, LoweringError> {
        let (op, _) = self.lower_expr(arg)?;
        match &arg.ty {
            Type::Uniform(base) => {
                let target = Type::Varying(base.clone());
                self.coerce(op, &arg.ty, &target, arg.span)
            }
            Type::Varying(_) | Type::ConstrainedVarying(..) => Ok(op),
            Type::Void => Err(LoweringError::invalid(
                format!("`{}` needs a value", builtin.name()),
                arg.span,
            )),
        }
    }

    fn lanes_of(&self, arg: &Expr) -> Result<u32, LoweringError> {
        match &arg.ty {
            Type::ConstrainedVarying(_, n) => Ok(*n),
            _ => self
                .lanes
                .ok_or_else(|| LoweringError::invalid("varying value outside any lane context", arg.span)),
        }
    }

    fn lower_reduce(
        &mut self,
        kind: ReduceKind,
        arg: &Expr,
        expr: &Expr,
    ) -> Result<MirRValue, LoweringError> {
        let elem = arg
            .ty
            .scalar()
            .ok_or_else(|| LoweringError::invalid("reductions take scalar lanes", arg.span))?;
        if kind.is_predicate() != (elem == ScalarType::Bool) {
            let want = if kind.is_predicate() { "a bool" } else { "a numeric" };
            return Err(LoweringError::invalid(
                format!("reduce.{} takes {} operand, found {}", kind.name(), want, arg.ty),
                arg.span,
            ));
        }
        if !expr.ty.is_uniform() {
            return Err(LoweringError::invalid("reductions produce a uniform value", expr.span));
        }
        let value = self.lower_lanes_arg(arg, Builtin::Reduce(kind))?;
        // Constrained lanes are not execution lanes: all of them fold while
        // any execution lane is active, none otherwise.
        let mask = match (&arg.ty, self.current_mask()) {
            (_, None) => None,
            (Type::ConstrainedVarying(_, n), Some(current)) => {
                let any = self.any_lane(current);
                let gate = self.builder.emit(
                    MirType::Mask { lanes: *n },
                    MirRValue::Splat { value: MirOperand::Local(any), lanes: *n },
                );
                Some(MirOperand::Local(gate))
            }
            (_, Some(current)) => Some(MirOperand::Local(current)),
        };
        Ok(MirRValue::Reduce { op: kind, elem, value, mask })
    }

    /// `let (groups, masks) = lanes.FromConstrained(v);`
    pub(super) fn lower_let_tuple(
        &mut self,
        names: &[(String, Type)],
        init: &Expr,
        span: Span,
    ) -> Result<(), LoweringError> {
        let arg = match &init.kind {
            ExprKind::Call { callee, args }
                if Builtin::from_name(callee) == Some(Builtin::FromConstrained) =>
            {
                match args.as_slice() {
                    [arg] => arg,
                    _ => {
                        return Err(LoweringError::ArityMismatch {
                            function: callee.clone(),
                            expected: 1,
                            found: args.len(),
                            span: init.span,
                        });
                    }
                }
            }
            _ => {
                return Err(LoweringError::invalid(
                    "tuple bindings take the result of lanes.FromConstrained",
                    init.span,
                ));
            }
        };
        let [(groups_name, groups_ty), (masks_name, masks_ty)] = names else {
            return Err(LoweringError::invalid("lanes.FromConstrained yields two values", span));
        };
        let (elem, total) = match &arg.ty {
            Type::ConstrainedVarying(base, n) => (base.clone(), *n),
            other => {
                return Err(LoweringError::invalid(
                    format!("lanes.FromConstrained expects a constrained varying value, found {}", other),
                    arg.span,
                ));
            }
        };

        let width = self.lanes.unwrap_or_else(|| self.ctx.config.lanes_for(&elem));
        let groups = total.div_ceil(width);
        let expected_groups = Type::Varying(BaseType::array(elem.clone(), groups));
        let expected_masks = Type::Varying(BaseType::array(BaseType::Scalar(ScalarType::Bool), groups));
        for (declared, expected) in [(groups_ty, &expected_groups), (masks_ty, &expected_masks)] {
            if declared != expected {
                return Err(AssignmentError::BaseMismatch {
                    from: expected.clone(),
                    to: declared.clone(),
                    span,
                }
                .into());
            }
        }
        log::trace!("decompose {} into {} group(s) of {} lanes", arg.ty, groups, width);

        let (value, _) = self.lower_expr(arg)?;
        let lane_ty = self.lower_type_at(&Type::Varying(elem), Some(width), arg.span)?;
        let mask_ty = MirType::Mask { lanes: width };
        let mut parts = Vec::with_capacity(groups as usize);
        let mut masks = Vec::with_capacity(groups as usize);
        for group in 0..groups {
            let part = self.builder.emit(
                lane_ty.clone(),
                MirRValue::Slice { value: value.clone(), group, lanes: width },
            );
            let mask = self
                .builder
                .emit(mask_ty.clone(), MirRValue::GroupMask { total, group, lanes: width });
            parts.push(MirOperand::Local(part));
            masks.push(MirOperand::Local(mask));
        }

        let groups_local = self
            .builder
            .alloc_local(groups_name.clone(), MirType::array(lane_ty, groups));
        self.builder.assign(groups_local, MirRValue::Aggregate { elems: parts });
        let masks_local = self
            .builder
            .alloc_local(masks_name.clone(), MirType::array(mask_ty, groups));
        self.builder.assign(masks_local, MirRValue::Aggregate { elems: masks });

        self.bind(groups_name, groups_local, groups_ty.clone());
        self.bind(masks_name, masks_local, masks_ty.clone());
        Ok(())
    }
}
