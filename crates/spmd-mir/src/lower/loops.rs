// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Loop lowering.
//!
//! A data-parallel `for i in start..end` runs `W` indices per iteration:
//!
//! ```text
//! header: branch base < end ? body : exit
//! body:   i    = splat(base) + lane_index
//!         tail = lane_index < splat(end - base)   (omitted when provably full)
//!         mask = enclosing & tail
//!         ...body under mask...
//! latch:  base = base + W; goto header
//! ```
//!
//! Indices narrower than 64 bits keep `base` and `end` in `i64`, so the
//! step past the last chunk never wraps back below `end`.
//!
//! Sequential loops and `while` keep one index per iteration but still get
//! an iteration frame, so a varying `continue` inside them is masked too.

use spmd_ast::{BaseType, Expr, ScalarType, Span, Stmt, Type};

use super::control::{LoopContext, Region};
use super::errors::{ControlFlowError, NestingError};
use super::mask::FrameKind;
use super::stmt::contains_continue;
use super::{LoweringError, MirLowerer};
use crate::{BinOp, BlockId, LocalId, LoopDescriptor, MirOperand, MirRValue, MirTerminator, MirType};

impl<'a> MirLowerer<'a> {
    /// Innermost enclosing data-parallel loop, if any.
    pub(super) fn enclosing_data_parallel(&self) -> Option<Span> {
        self.regions
            .iter()
            .rev()
            .filter_map(|r| r.loop_ctx.as_ref())
            .find(|l| l.data_parallel)
            .map(|l| l.span)
    }

    /// Lane-dependent builtins are meaningful here.
    pub(super) fn has_lane_context(&self) -> bool {
        self.kind.is_spmd() || self.enclosing_data_parallel().is_some()
    }

    pub(super) fn lower_data_parallel_for(
        &mut self,
        binding: &str,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
        hint: Option<u32>,
        span: Span,
    ) -> Result<(), LoweringError> {
        if self.kind.is_spmd() {
            return Err(ControlFlowError::from(NestingError::SpmdFunctionContainsLoop {
                function: self.fn_name.clone(),
                span,
            })
            .into());
        }
        let nested = self.enclosing_data_parallel();
        if let Some(outer) = nested {
            return Err(ControlFlowError::from(NestingError::SpmdLoopNesting { span, outer }).into());
        }
        let lanes = self
            .lanes
            .ok_or_else(|| LoweringError::invalid("data-parallel loop without lanes", span))?;
        if let Some(found) = hint.filter(|h| *h != lanes) {
            return Err(LoweringError::LaneCountMismatch { expected: lanes, found, span });
        }
        let index_elem = self.range_elem(start, end, span)?;

        let trip_count = match (start.as_int(), end.as_int()) {
            (Some(lo), Some(hi)) => hi.checked_sub(lo).map(|n| n.max(0)),
            _ => None,
        };
        let needs_tail_mask = trip_count.map_or(true, |n| n % i64::from(lanes) != 0);

        let counter_elem = if index_elem.bits() < 64 { ScalarType::I64 } else { index_elem };
        let widened = counter_elem != index_elem;
        let scalar_ty = MirType::Scalar(index_elem);
        let counter_ty = MirType::Scalar(counter_elem);
        let vector_ty = MirType::Vector { elem: index_elem, lanes };
        let mask_ty = MirType::Mask { lanes };

        let (start_op, _) = self.lower_expr(start)?;
        let (end_op, _) = self.lower_expr(end)?;
        let start_op = self.convert(start_op, &counter_ty, widened);
        let end_op = self.convert(end_op, &counter_ty, widened);
        let base = self.builder.alloc_local(format!("{}.base", binding), counter_ty.clone());
        self.builder.assign(base, MirRValue::Use(start_op));
        let end_local = self.builder.emit(counter_ty.clone(), MirRValue::Use(end_op));

        let blocks = self.loop_blocks();
        self.enter_header(&blocks, base, end_local);

        // body: lane indices, tail, iteration mask
        self.builder.switch_to_block(blocks.body);
        let lane_index = self
            .builder
            .emit(vector_ty.clone(), MirRValue::LaneIndex { elem: index_elem, lanes });
        let lane_base = self.convert(MirOperand::Local(base), &scalar_ty, widened);
        let base_splat = self
            .builder
            .emit(vector_ty.clone(), MirRValue::Splat { value: lane_base, lanes });
        let index = self.builder.alloc_local(binding.to_string(), vector_ty.clone());
        self.builder.assign(
            index,
            MirRValue::BinaryOp {
                op: BinOp::Add,
                left: MirOperand::Local(base_splat),
                right: MirOperand::Local(lane_index),
            },
        );

        let enclosing = self.current_mask();
        let entry = if needs_tail_mask {
            let tail = if widened {
                self.remaining_lanes_mask(base, end_local, lanes)
            } else {
                let end_splat = self.builder.emit(
                    vector_ty,
                    MirRValue::Splat { value: MirOperand::Local(end_local), lanes },
                );
                self.builder.emit(
                    mask_ty.clone(),
                    MirRValue::BinaryOp {
                        op: BinOp::Lt,
                        left: MirOperand::Local(index),
                        right: MirOperand::Local(end_splat),
                    },
                )
            };
            match enclosing {
                Some(outer) => self.builder.emit(
                    mask_ty,
                    MirRValue::BinaryOp {
                        op: BinOp::And,
                        left: MirOperand::Local(outer),
                        right: MirOperand::Local(tail),
                    },
                ),
                None => tail,
            }
        } else {
            match enclosing {
                Some(outer) => outer,
                None => self.builder.emit(mask_ty, MirRValue::MaskConst { lanes, value: true }),
            }
        };

        let descriptor = LoopDescriptor {
            header: blocks.header,
            exit: blocks.exit,
            index_elem,
            lanes,
            needs_tail_mask,
            trip_count,
            nested_in_data_parallel: nested.is_some(),
            span,
        };
        log::debug!("vectorizing loop in `{}`: {:?}", self.fn_name, descriptor);

        let index_ty = Type::Varying(BaseType::Scalar(index_elem));
        self.lower_loop_body(binding, index, index_ty, Some(entry), body, &blocks, true, span)?;

        // latch: advance by a full vector of indices
        self.builder.switch_to_block(blocks.latch);
        self.advance(base, i64::from(lanes));
        self.builder.terminate(MirTerminator::Goto { target: blocks.header });

        self.builder.switch_to_block(blocks.exit);
        self.builder.record_loop(descriptor);
        Ok(())
    }

    pub(super) fn lower_sequential_for(
        &mut self,
        binding: &str,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), LoweringError> {
        let index_elem = self.range_elem(start, end, span)?;
        let scalar_ty = MirType::Scalar(index_elem);

        let (start_op, _) = self.lower_expr(start)?;
        let (end_op, _) = self.lower_expr(end)?;
        let counter = self.builder.alloc_local(format!("{}.base", binding), scalar_ty.clone());
        self.builder.assign(counter, MirRValue::Use(start_op));
        let end_local = self.builder.emit(scalar_ty.clone(), MirRValue::Use(end_op));

        let blocks = self.loop_blocks();
        self.enter_header(&blocks, counter, end_local);

        self.builder.switch_to_block(blocks.body);
        let index = self.builder.alloc_local(binding.to_string(), scalar_ty);
        self.builder.assign(index, MirRValue::Use(MirOperand::Local(counter)));
        let entry = self.current_mask();
        let index_ty = Type::Uniform(BaseType::Scalar(index_elem));
        self.lower_loop_body(binding, index, index_ty, entry, body, &blocks, false, span)?;

        self.builder.switch_to_block(blocks.latch);
        self.advance(counter, 1);
        self.builder.terminate(MirTerminator::Goto { target: blocks.header });

        self.builder.switch_to_block(blocks.exit);
        Ok(())
    }

    pub(super) fn lower_while(&mut self, cond: &Expr, body: &[Stmt], span: Span) -> Result<(), LoweringError> {
        let header = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit = self.builder.create_block();

        self.builder.terminate(MirTerminator::Goto { target: header });
        self.builder.switch_to_block(header);
        let cond_op = self.lower_uniform_cond(cond, span)?;
        self.builder.terminate(MirTerminator::Branch {
            cond: cond_op,
            then_block: body_block,
            else_block: exit,
        });

        self.builder.switch_to_block(body_block);
        let cont_mask = self.alloc_continue_mask(body);
        let entry = self.current_mask();
        self.regions.push(Region::for_loop(LoopContext {
            data_parallel: false,
            continue_block: header,
            exit_block: exit,
            cont_mask,
            span,
        }));
        self.push_frame(FrameKind::Iteration, entry, contains_continue(body));
        let result = self.lower_block(body);
        self.pop_frame();
        self.regions.pop();
        result?;
        if self.builder.current_block_unterminated() {
            self.builder.terminate(MirTerminator::Goto { target: header });
        }

        self.builder.switch_to_block(exit);
        Ok(())
    }

    // =================================================================
    // Helpers
    // =================================================================

    /// Element type of a `start..end` range; both bounds must be uniform
    /// integers of the same type.
    fn range_elem(&self, start: &Expr, end: &Expr, span: Span) -> Result<ScalarType, LoweringError> {
        if !start.ty.is_uniform() || !end.ty.is_uniform() {
            return Err(LoweringError::invalid("loop bounds must be uniform", span));
        }
        match (start.ty.scalar(), end.ty.scalar()) {
            (Some(a), Some(b)) if a == b && a.is_integer() => Ok(a),
            _ => Err(LoweringError::invalid(
                format!("loop bounds must be integers of one type, found {} and {}", start.ty, end.ty),
                span,
            )),
        }
    }

    fn loop_blocks(&mut self) -> LoopBlocks {
        LoopBlocks {
            header: self.builder.create_block(),
            body: self.builder.create_block(),
            latch: self.builder.create_block(),
            exit: self.builder.create_block(),
        }
    }

    /// Jump to the header and test `counter < end` there.
    fn enter_header(&mut self, blocks: &LoopBlocks, counter: LocalId, end: LocalId) {
        self.builder.terminate(MirTerminator::Goto { target: blocks.header });
        self.builder.switch_to_block(blocks.header);
        let cond = self.builder.emit(
            MirType::bool(),
            MirRValue::BinaryOp {
                op: BinOp::Lt,
                left: MirOperand::Local(counter),
                right: MirOperand::Local(end),
            },
        );
        self.builder.terminate(MirTerminator::Branch {
            cond: MirOperand::Local(cond),
            then_block: blocks.body,
            else_block: blocks.exit,
        });
    }

    /// Cast `value` to `ty` when the loop counter is widened.
    fn convert(&mut self, value: MirOperand, ty: &MirType, widened: bool) -> MirOperand {
        if !widened {
            return value;
        }
        let local = self.builder.emit(ty.clone(), MirRValue::Cast { value, target_ty: ty.clone() });
        MirOperand::Local(local)
    }

    /// `lane_index < splat(end - base)`, computed on the `i64` counter.
    fn remaining_lanes_mask(&mut self, base: LocalId, end: LocalId, lanes: u32) -> LocalId {
        let wide_ty = MirType::Vector { elem: ScalarType::I64, lanes };
        let remaining = self.builder.emit(
            MirType::Scalar(ScalarType::I64),
            MirRValue::BinaryOp {
                op: BinOp::Sub,
                left: MirOperand::Local(end),
                right: MirOperand::Local(base),
            },
        );
        let lane_index = self
            .builder
            .emit(wide_ty.clone(), MirRValue::LaneIndex { elem: ScalarType::I64, lanes });
        let remaining = self
            .builder
            .emit(wide_ty, MirRValue::Splat { value: MirOperand::Local(remaining), lanes });
        self.builder.emit(
            MirType::Mask { lanes },
            MirRValue::BinaryOp {
                op: BinOp::Lt,
                left: MirOperand::Local(lane_index),
                right: MirOperand::Local(remaining),
            },
        )
    }

    fn advance(&mut self, counter: LocalId, step: i64) {
        self.builder.assign(
            counter,
            MirRValue::BinaryOp {
                op: BinOp::Add,
                left: MirOperand::Local(counter),
                right: MirOperand::int(step),
            },
        );
    }

    /// Continue mask for a body with a `continue`, cleared every iteration.
    fn alloc_continue_mask(&mut self, body: &[Stmt]) -> Option<LocalId> {
        let lanes = self.lanes?;
        if !contains_continue(body) {
            return None;
        }
        let cont = self.builder.alloc_local("__continue".to_string(), MirType::Mask { lanes });
        self.builder.assign(cont, MirRValue::MaskConst { lanes, value: false });
        Some(cont)
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_loop_body(
        &mut self,
        binding: &str,
        index: LocalId,
        index_ty: Type,
        entry: Option<LocalId>,
        body: &[Stmt],
        blocks: &LoopBlocks,
        data_parallel: bool,
        span: Span,
    ) -> Result<(), LoweringError> {
        let cont_mask = self.alloc_continue_mask(body);
        self.regions.push(Region::for_loop(LoopContext {
            data_parallel,
            continue_block: blocks.latch,
            exit_block: blocks.exit,
            cont_mask,
            span,
        }));
        self.push_frame(FrameKind::Iteration, entry, contains_continue(body));
        self.push_scope();
        self.bind(binding, index, index_ty);

        let result = body.iter().try_for_each(|stmt| self.lower_stmt(stmt));

        self.pop_scope();
        self.pop_frame();
        self.regions.pop();
        result?;
        if self.builder.current_block_unterminated() {
            self.builder.terminate(MirTerminator::Goto { target: blocks.latch });
        }
        Ok(())
    }
}

struct LoopBlocks {
    header: BlockId,
    body: BlockId,
    latch: BlockId,
    exit: BlockId,
}
