// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Call lowering and mask threading.
//!
//! SPMD callees take the execution mask as argument 0. The mask passed is
//! the caller's active mask (which already folds in any loop tail) or, when
//! every lane is known active, an all-ones constant of the callee's width.
//!
//! When the caller's lane count differs from the callee's, the varying
//! arguments are cut into callee-width groups (the last one padded), one
//! call is emitted per group with that group's mask, and varying results
//! are stitched back together. Passing a constrained varying value to an
//! unconstrained parameter goes through the same path.

use spmd_ast::{Expr, ScalarType, Span, Type};
use spmd_types::{AssignContext, Coercion, FnSignature, ReduceKind, SignatureKind};

use super::{LoweringError, MirLowerer};
use crate::{BinOp, FunctionRef, LocalId, MirConst, MirOperand, MirRValue, MirStmt, MirTerminator, MirType};

/// Mask source for an SPMD call.
#[derive(Debug, Clone, Copy)]
enum CallMask {
    Active(LocalId),
    AllOnes,
}

/// How one argument reaches the callee.
enum ArgShape {
    /// Same value for every group.
    Fixed(MirOperand),
    /// One lane per caller lane; sliced when the call is split.
    Lanes(MirOperand),
}

impl<'a> MirLowerer<'a> {
    pub(super) fn lower_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        let sig = self
            .ctx
            .signatures
            .get(callee)
            .cloned()
            .ok_or_else(|| LoweringError::UnknownFunction { name: callee.to_string(), span: expr.span })?;
        if args.len() != sig.params.len() {
            return Err(LoweringError::ArityMismatch {
                function: callee.to_string(),
                expected: sig.params.len(),
                found: args.len(),
                span: expr.span,
            });
        }
        let func = FunctionRef {
            name: sig.name.clone(),
            takes_mask: sig.kind.is_spmd(),
            is_extern: sig.is_extern,
        };

        let (op, result_ty) = match sig.kind {
            SignatureKind::Ordinary => self.lower_plain_call(&sig, func, args, expr.span)?,
            SignatureKind::Spmd { mask_lanes } => {
                self.lower_spmd_call(&sig, func, mask_lanes, args, expr.span)?
            }
        };

        let expected = self.lower_type(&expr.ty, expr.span)?;
        if result_ty == expected {
            Ok((op, expected))
        } else if sig.ret.is_uniform() {
            Ok((self.coerce(op, &sig.ret, &expr.ty, expr.span)?, expected))
        } else {
            Err(LoweringError::LaneCountMismatch {
                expected: expected.lanes().unwrap_or(1),
                found: result_ty.lanes().unwrap_or(1),
                span: expr.span,
            })
        }
    }

    fn lower_plain_call(
        &mut self,
        sig: &FnSignature,
        func: FunctionRef,
        args: &[Expr],
        span: Span,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        let mut ops = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&sig.params) {
            let (op, _) = self.lower_expr(arg)?;
            ops.push(self.coerce(op, &arg.ty, param, arg.span)?);
        }
        let ret_ty = self.lower_type_at(&sig.ret, None, span)?;
        let dst = (ret_ty != MirType::Void).then(|| self.builder.alloc_temp(ret_ty.clone()));
        let call = MirStmt::Call { dst, func, args: ops };
        match self.store_mask() {
            Some(mask) => self.push_guarded_call(mask, call, dst, &ret_ty),
            None => self.builder.push_stmt(call),
        }
        Ok((result_operand(dst), ret_ty))
    }

    /// An ordinary call under a mask runs only if some lane is active. A
    /// skipped call leaves its result zeroed.
    fn push_guarded_call(&mut self, mask: LocalId, call: MirStmt, dst: Option<LocalId>, ret_ty: &MirType) {
        if let Some(dst) = dst {
            if let Some(zero) = self.zero_operand(ret_ty) {
                self.builder.assign(dst, MirRValue::Use(zero));
            }
        }
        let any = self.any_lane(mask);
        let call_block = self.builder.create_block();
        let join = self.builder.create_block();
        self.builder.terminate(MirTerminator::Branch {
            cond: MirOperand::Local(any),
            then_block: call_block,
            else_block: join,
        });
        self.builder.switch_to_block(call_block);
        self.builder.push_stmt(call);
        self.builder.terminate(MirTerminator::Goto { target: join });
        self.builder.switch_to_block(join);
    }

    fn zero_operand(&mut self, ty: &MirType) -> Option<MirOperand> {
        let zero_scalar = |s: ScalarType| {
            MirOperand::Constant(if s == ScalarType::Bool {
                MirConst::Bool(false)
            } else if s.is_float() {
                MirConst::Float(0.0)
            } else {
                MirConst::Int(0)
            })
        };
        match ty {
            MirType::Scalar(s) => Some(zero_scalar(*s)),
            MirType::Vector { elem, lanes } => {
                let v = self
                    .builder
                    .emit(ty.clone(), MirRValue::Splat { value: zero_scalar(*elem), lanes: *lanes });
                Some(MirOperand::Local(v))
            }
            MirType::Mask { lanes } => {
                let m = self.builder.emit(ty.clone(), MirRValue::MaskConst { lanes: *lanes, value: false });
                Some(MirOperand::Local(m))
            }
            MirType::Array { elem, len } => {
                let elems = (0..*len).map(|_| self.zero_operand(elem)).collect::<Option<Vec<_>>>()?;
                let a = self.builder.emit(ty.clone(), MirRValue::Aggregate { elems });
                Some(MirOperand::Local(a))
            }
            MirType::Void | MirType::Ptr(_) => None,
        }
    }

    fn lower_spmd_call(
        &mut self,
        sig: &FnSignature,
        func: FunctionRef,
        callee_lanes: u32,
        args: &[Expr],
        span: Span,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        let mut shapes = Vec::with_capacity(args.len());
        let mut width: Option<u32> = None;
        for (arg, param) in args.iter().zip(&sig.params) {
            let (op, _) = self.lower_expr(arg)?;
            let coercion =
                self.resolver.check_assign(&arg.ty, param, AssignContext::Argument, arg.span)?;
            let arg_width = match coercion {
                Coercion::Direct if matches!(arg.ty, Type::Varying(_)) => self.lanes,
                Coercion::Decompose { lanes } => Some(lanes),
                Coercion::Direct | Coercion::Broadcast { .. } => None,
            };
            let shape = match coercion {
                Coercion::Broadcast { lanes } => {
                    let lanes = lanes.unwrap_or(callee_lanes);
                    let ty = self.lower_type_at(param, Some(lanes), arg.span)?;
                    let splat = self.builder.emit(ty, MirRValue::Splat { value: op, lanes });
                    ArgShape::Fixed(MirOperand::Local(splat))
                }
                _ if arg_width.is_some() => ArgShape::Lanes(op),
                _ => ArgShape::Fixed(op),
            };
            if let Some(found) = arg_width {
                match width {
                    Some(expected) if expected != found => {
                        return Err(LoweringError::LaneCountMismatch { expected, found, span: arg.span });
                    }
                    _ => width = Some(found),
                }
            }
            shapes.push((shape, param));
        }

        let mask = match self.store_mask() {
            Some(m) => CallMask::Active(m),
            None => CallMask::AllOnes,
        };
        let active_width = match mask {
            CallMask::Active(_) => self.lanes,
            CallMask::AllOnes => None,
        };
        let source = width.or(active_width).unwrap_or(callee_lanes);
        let split = source != callee_lanes;
        let groups = if source > callee_lanes { source.div_ceil(callee_lanes) } else { 1 };
        log::trace!(
            "call `{}`: {} lanes into {} group(s) of {}",
            func.name,
            source,
            groups,
            callee_lanes
        );

        let gate = match mask {
            CallMask::Active(m) if self.lanes != Some(source) => {
                Some(self.any_lane_gate(m, callee_lanes))
            }
            _ => None,
        };
        let ret_ty = self.lower_type_at(&sig.ret, Some(callee_lanes), span)?;

        let mut results = Vec::with_capacity(groups as usize);
        for group in 0..groups {
            let group_mask = self.group_mask(mask, gate, source, group, callee_lanes, split);
            let mut call_args = vec![group_mask];
            for (shape, param) in &shapes {
                let arg = match shape {
                    ArgShape::Fixed(op) => op.clone(),
                    ArgShape::Lanes(op) if split => {
                        let ty = self.lower_type_at(param, Some(callee_lanes), span)?;
                        let slice = self.builder.emit(
                            ty,
                            MirRValue::Slice { value: op.clone(), group, lanes: callee_lanes },
                        );
                        MirOperand::Local(slice)
                    }
                    ArgShape::Lanes(op) => op.clone(),
                };
                call_args.push(arg);
            }
            let dst = (ret_ty != MirType::Void).then(|| self.builder.alloc_temp(ret_ty.clone()));
            self.builder.push_stmt(MirStmt::Call { dst, func: func.clone(), args: call_args });
            results.push(dst);
        }

        match (&sig.ret, results.as_slice()) {
            (_, [single]) if !split || !matches!(sig.ret, Type::Varying(_)) => {
                Ok((result_operand(*single), ret_ty))
            }
            (Type::Varying(_), parts) => {
                let parts: Vec<MirOperand> = parts.iter().map(|d| result_operand(*d)).collect();
                let ty = self.lower_type_at(&sig.ret, Some(source), span)?;
                let composed = self
                    .builder
                    .emit(ty.clone(), MirRValue::Compose { parts, lanes: source });
                Ok((MirOperand::Local(composed), ty))
            }
            (Type::Void, _) => Ok((result_operand(None), MirType::Void)),
            _ => Err(LoweringError::invalid(
                format!("`{}` returns {} but the call is split into lane groups", sig.name, sig.ret),
                span,
            )),
        }
    }

    /// Callee-width mask with every lane set iff any caller lane is active.
    fn any_lane_gate(&mut self, mask: LocalId, lanes: u32) -> LocalId {
        let any = self.builder.emit(
            MirType::bool(),
            MirRValue::Reduce {
                op: ReduceKind::Any,
                elem: ScalarType::Bool,
                value: MirOperand::Local(mask),
                mask: None,
            },
        );
        self.builder.emit(
            MirType::Mask { lanes },
            MirRValue::Splat { value: MirOperand::Local(any), lanes },
        )
    }

    fn group_mask(
        &mut self,
        mask: CallMask,
        gate: Option<LocalId>,
        source: u32,
        group: u32,
        lanes: u32,
        split: bool,
    ) -> MirOperand {
        let mask_ty = MirType::Mask { lanes };
        let padding = split.then(|| {
            self.builder.emit(mask_ty.clone(), MirRValue::GroupMask { total: source, group, lanes })
        });
        let caller = match (mask, gate) {
            (_, Some(gate)) => Some(gate),
            (CallMask::Active(m), None) if split => Some(self.builder.emit(
                mask_ty.clone(),
                MirRValue::Slice { value: MirOperand::Local(m), group, lanes },
            )),
            (CallMask::Active(m), None) => Some(m),
            (CallMask::AllOnes, None) => None,
        };
        let combined = match (caller, padding) {
            (Some(c), Some(p)) => self.builder.emit(
                mask_ty,
                MirRValue::BinaryOp {
                    op: BinOp::And,
                    left: MirOperand::Local(c),
                    right: MirOperand::Local(p),
                },
            ),
            (Some(c), None) => c,
            (None, Some(p)) => p,
            (None, None) => self.builder.emit(mask_ty, MirRValue::MaskConst { lanes, value: true }),
        };
        MirOperand::Local(combined)
    }
}

fn result_operand(dst: Option<LocalId>) -> MirOperand {
    match dst {
        Some(local) => MirOperand::Local(local),
        None => MirOperand::int(0),
    }
}
