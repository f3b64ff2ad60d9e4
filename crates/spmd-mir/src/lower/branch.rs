// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Conditional lowering.
//!
//! A uniform `if`/`switch` becomes an ordinary branch. A varying one is
//! linearized: every arm is emitted back to back under its own mask, outer
//! variables the arm writes are redirected to shadow copies, and the
//! shadows are blended back with `select` once all arms have run.

use spmd_ast::{Expr, ScalarType, Span, Stmt, SwitchCase, Type};

use super::mask::FrameKind;
use super::stmt::{assigned_names, contains_continue};
use super::{LoweringError, MirLowerer};
use crate::{BinOp, LocalId, MirOperand, MirRValue, MirTerminator, MirType};

/// Outer variable redirected to a shadow while an arm runs.
struct Shadow {
    target: LocalId,
    shadow: LocalId,
}

/// What lowering one arm left behind.
struct ArmResult {
    entry: LocalId,
    shadows: Vec<Shadow>,
    continued: bool,
}

impl<'a> MirLowerer<'a> {
    // =================================================================
    // Uniform
    // =================================================================

    pub(super) fn lower_uniform_if(
        &mut self,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: &[Stmt],
        span: Span,
    ) -> Result<(), LoweringError> {
        let cond_op = self.lower_uniform_cond(cond, span)?;
        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let merge_block = self.builder.create_block();

        self.builder.terminate(MirTerminator::Branch { cond: cond_op, then_block, else_block });

        self.builder.switch_to_block(then_block);
        self.lower_block(then_body)?;
        if self.builder.current_block_unterminated() {
            self.builder.terminate(MirTerminator::Goto { target: merge_block });
        }

        self.builder.switch_to_block(else_block);
        self.lower_block(else_body)?;
        if self.builder.current_block_unterminated() {
            self.builder.terminate(MirTerminator::Goto { target: merge_block });
        }

        self.builder.switch_to_block(merge_block);
        Ok(())
    }

    pub(super) fn lower_uniform_switch(
        &mut self,
        tag: &Expr,
        cases: &[SwitchCase],
        default: &[Stmt],
        span: Span,
    ) -> Result<(), LoweringError> {
        if !tag.ty.is_uniform() {
            return Err(LoweringError::invalid("uniform switch on a varying tag", span));
        }
        let (tag_op, _) = self.lower_expr(tag)?;
        let merge_block = self.builder.create_block();
        let default_block = self.builder.create_block();
        let case_blocks: Vec<_> = cases.iter().map(|_| self.builder.create_block()).collect();

        let targets = cases
            .iter()
            .zip(&case_blocks)
            .flat_map(|(case, block)| case.values.iter().map(move |v| (*v, *block)))
            .collect();
        self.builder.terminate(MirTerminator::Switch {
            value: tag_op,
            cases: targets,
            default: default_block,
        });

        for (case, block) in cases.iter().zip(case_blocks) {
            self.builder.switch_to_block(block);
            self.lower_block(&case.body)?;
            if self.builder.current_block_unterminated() {
                self.builder.terminate(MirTerminator::Goto { target: merge_block });
            }
        }
        self.builder.switch_to_block(default_block);
        self.lower_block(default)?;
        if self.builder.current_block_unterminated() {
            self.builder.terminate(MirTerminator::Goto { target: merge_block });
        }

        self.builder.switch_to_block(merge_block);
        Ok(())
    }

    /// Branch conditions must be uniform; MIR never branches on lane data.
    pub(super) fn lower_uniform_cond(&mut self, cond: &Expr, span: Span) -> Result<MirOperand, LoweringError> {
        if cond.ty != Type::uniform(ScalarType::Bool) {
            return Err(LoweringError::invalid(
                format!("branch condition must be uniform bool, found {}", cond.ty),
                span,
            ));
        }
        Ok(self.lower_expr(cond)?.0)
    }

    // =================================================================
    // Varying
    // =================================================================

    pub(super) fn lower_varying_if(
        &mut self,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: &[Stmt],
        span: Span,
    ) -> Result<(), LoweringError> {
        let mask_ty = self.mask_ty(span)?;
        let cond_op = self.lower_mask_operand(cond)?;
        let current = self.enclosing_mask(span)?;

        let then_mask = self.builder.emit(
            mask_ty.clone(),
            MirRValue::BinaryOp { op: BinOp::And, left: MirOperand::Local(current), right: cond_op.clone() },
        );
        let else_mask = self.builder.emit(
            mask_ty,
            MirRValue::BinaryOp { op: BinOp::AndNot, left: MirOperand::Local(current), right: cond_op },
        );
        log::trace!("varying if at {:?}: then _{}, else _{}", span, then_mask.0, else_mask.0);

        self.enter_varying();
        let arms = [(then_mask, then_body), (else_mask, else_body)]
            .into_iter()
            .map(|(mask, body)| self.lower_arm(mask, body))
            .collect::<Result<Vec<_>, _>>();
        self.leave_varying();
        self.merge_arms(arms?, span)
    }

    /// `caseMask_k = cur & (tag == v_k) & !matched`; default gets
    /// `cur & !matched`. Arms are then lowered and merged in source order.
    pub(super) fn lower_varying_switch(
        &mut self,
        tag: &Expr,
        cases: &[SwitchCase],
        default: &[Stmt],
        span: Span,
    ) -> Result<(), LoweringError> {
        let mask_ty = self.mask_ty(span)?;
        let lanes = mask_ty.lanes().unwrap_or(1);
        let (tag_op, tag_mir) = self.lower_expr(tag)?;
        let tag_lanes = tag_mir.lanes().unwrap_or(lanes);
        if tag_lanes != lanes {
            return Err(LoweringError::LaneCountMismatch { expected: lanes, found: tag_lanes, span });
        }
        let elem = tag.ty.scalar().unwrap_or(ScalarType::I32);
        let current = self.enclosing_mask(span)?;

        let matched = self.builder.alloc_temp(mask_ty.clone());
        self.builder.assign(matched, MirRValue::MaskConst { lanes, value: false });

        let mut arm_masks = Vec::with_capacity(cases.len() + 1);
        for case in cases {
            let mut hit: Option<LocalId> = None;
            for value in &case.values {
                let splat = self.builder.emit(
                    MirType::Vector { elem, lanes },
                    MirRValue::Splat { value: MirOperand::int(*value), lanes },
                );
                let eq = self.builder.emit(
                    mask_ty.clone(),
                    MirRValue::BinaryOp {
                        op: BinOp::Eq,
                        left: tag_op.clone(),
                        right: MirOperand::Local(splat),
                    },
                );
                hit = Some(match hit {
                    None => eq,
                    Some(prev) => self.builder.emit(
                        mask_ty.clone(),
                        MirRValue::BinaryOp {
                            op: BinOp::Or,
                            left: MirOperand::Local(prev),
                            right: MirOperand::Local(eq),
                        },
                    ),
                });
            }
            let hit = match hit {
                Some(h) => MirOperand::Local(h),
                None => MirOperand::bool(false),
            };
            let active = self.builder.emit(
                mask_ty.clone(),
                MirRValue::BinaryOp { op: BinOp::And, left: MirOperand::Local(current), right: hit },
            );
            let case_mask = self.builder.emit(
                mask_ty.clone(),
                MirRValue::BinaryOp {
                    op: BinOp::AndNot,
                    left: MirOperand::Local(active),
                    right: MirOperand::Local(matched),
                },
            );
            self.builder.assign(
                matched,
                MirRValue::BinaryOp {
                    op: BinOp::Or,
                    left: MirOperand::Local(matched),
                    right: MirOperand::Local(case_mask),
                },
            );
            arm_masks.push((case_mask, case.body.as_slice()));
        }
        let default_mask = self.builder.emit(
            mask_ty,
            MirRValue::BinaryOp {
                op: BinOp::AndNot,
                left: MirOperand::Local(current),
                right: MirOperand::Local(matched),
            },
        );
        arm_masks.push((default_mask, default));

        self.enter_varying();
        let arms = arm_masks
            .into_iter()
            .map(|(mask, body)| self.lower_arm(mask, body))
            .collect::<Result<Vec<_>, _>>();
        self.leave_varying();
        self.merge_arms(arms?, span)
    }

    /// Varying condition as a mask operand.
    fn lower_mask_operand(&mut self, cond: &Expr) -> Result<MirOperand, LoweringError> {
        let (op, _) = self.lower_expr(cond)?;
        if cond.ty != Type::varying(ScalarType::Bool) {
            return Err(LoweringError::invalid(
                format!("varying condition must be varying bool, found {}", cond.ty),
                cond.span,
            ));
        }
        Ok(op)
    }

    /// Mask the new arms are carved out of.
    fn enclosing_mask(&mut self, span: Span) -> Result<LocalId, LoweringError> {
        self.current_mask()
            .ok_or_else(|| LoweringError::invalid("varying control flow without lanes", span))
    }

    fn enter_varying(&mut self) {
        if let Some(region) = self.regions.last_mut() {
            region.state.enter_varying();
        }
    }

    fn leave_varying(&mut self) {
        if let Some(region) = self.regions.last_mut() {
            region.state.leave_varying();
        }
    }

    /// Lower one arm under `mask`, redirecting writes to outer varying
    /// variables into shadows.
    fn lower_arm(&mut self, mask: LocalId, body: &[Stmt]) -> Result<ArmResult, LoweringError> {
        let continued = contains_continue(body);
        self.push_frame(FrameKind::Branch, Some(mask), continued);
        self.push_scope();

        let mut shadows = Vec::new();
        for name in assigned_names(body) {
            let Ok(outer) = self.lookup(&name, Span::default()) else {
                continue;
            };
            if !outer.ty.is_varying() {
                continue;
            }
            let ty = self.builder.local_ty(outer.local).clone();
            let shadow = self.builder.alloc_local(name.clone(), ty);
            self.builder.assign(shadow, MirRValue::Use(MirOperand::Local(outer.local)));
            self.bind(&name, shadow, outer.ty.clone());
            shadows.push(Shadow { target: outer.local, shadow });
        }

        let result = body.iter().try_for_each(|stmt| self.lower_stmt(stmt));
        self.pop_scope();
        self.pop_frame();
        result?;
        Ok(ArmResult { entry: mask, shadows, continued })
    }

    /// Blend each arm's shadows back under the arm's entry mask, then drop
    /// lanes that took a `continue` from the enclosing frame.
    fn merge_arms(&mut self, arms: Vec<ArmResult>, span: Span) -> Result<(), LoweringError> {
        let mut continued = false;
        for arm in &arms {
            for Shadow { target, shadow } in &arm.shadows {
                self.builder.assign(
                    *target,
                    MirRValue::Select {
                        mask: MirOperand::Local(arm.entry),
                        if_true: MirOperand::Local(*shadow),
                        if_false: MirOperand::Local(*target),
                    },
                );
            }
            continued |= arm.continued;
        }
        if continued {
            let cont = self
                .regions
                .last()
                .and_then(|r| r.loop_ctx.as_ref())
                .and_then(|l| l.cont_mask)
                .ok_or_else(|| LoweringError::invalid("`continue` outside of a loop", span))?;
            self.exclude_lanes(cont, span)?;
        }
        Ok(())
    }
}
