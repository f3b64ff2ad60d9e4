// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Execution-mask frames.
//!
//! A frame is opened at function entry, at the start of every loop
//! iteration, and for each arm of a varying branch. `entry` is the mask the
//! frame started with and never changes; `current` shrinks when a varying
//! `continue` disables lanes. Frames that can never shrink share one local
//! for both.

use spmd_ast::Span;

use super::{Binding, LoweringError, MirLowerer};
use crate::{BinOp, LocalId, MirOperand, MirRValue, MirType};
use spmd_ast::ScalarType;
use spmd_types::{AssignmentError, ReduceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FrameKind {
    Function,
    Iteration,
    Branch,
}

#[derive(Debug, Clone)]
pub(super) struct MaskFrame {
    pub kind: FrameKind,
    pub entry: Option<LocalId>,
    pub current: Option<LocalId>,
    /// Some lanes of `entry` were disabled inside this frame.
    pub narrowed: bool,
}

impl MaskFrame {
    pub fn new(kind: FrameKind, mask: Option<LocalId>) -> Self {
        MaskFrame { kind, entry: mask, current: mask, narrowed: false }
    }
}

impl<'a> MirLowerer<'a> {
    pub(super) fn frame(&self) -> &MaskFrame {
        // The function frame is pushed before any statement is lowered.
        &self.frames[self.frames.len() - 1]
    }

    pub(super) fn current_mask(&self) -> Option<LocalId> {
        self.frames.last().and_then(|f| f.current)
    }

    pub(super) fn mask_ty(&self, span: Span) -> Result<MirType, LoweringError> {
        let lanes = self
            .lanes
            .ok_or_else(|| LoweringError::invalid("varying control flow without lanes", span))?;
        Ok(MirType::Mask { lanes })
    }

    /// Open a frame whose mask starts as `entry`. A frame that may shrink
    /// gets its own mutable copy.
    pub(super) fn push_frame(&mut self, kind: FrameKind, entry: Option<LocalId>, may_narrow: bool) {
        let current = match entry {
            Some(mask) if may_narrow => {
                let ty = self.builder.local_ty(mask).clone();
                let copy = self.builder.alloc_local("__mask".to_string(), ty);
                self.builder.assign(copy, MirRValue::Use(MirOperand::Local(mask)));
                Some(copy)
            }
            other => other,
        };
        self.frames.push(MaskFrame { kind, entry, current, narrowed: false });
    }

    pub(super) fn pop_frame(&mut self) -> Option<MaskFrame> {
        self.frames.pop()
    }

    /// `current &= !lanes` in the innermost frame.
    pub(super) fn exclude_lanes(&mut self, lanes: LocalId, span: Span) -> Result<(), LoweringError> {
        let current = self.current_mask().ok_or_else(|| {
            LoweringError::invalid("varying continue without an execution mask", span)
        })?;
        self.builder.assign(
            current,
            MirRValue::BinaryOp {
                op: BinOp::AndNot,
                left: MirOperand::Local(current),
                right: MirOperand::Local(lanes),
            },
        );
        self.mark_narrowed();
        Ok(())
    }

    /// Disable every lane of the innermost frame.
    pub(super) fn clear_current(&mut self, span: Span) -> Result<(), LoweringError> {
        let current = self.current_mask().ok_or_else(|| {
            LoweringError::invalid("varying continue without an execution mask", span)
        })?;
        let lanes = self.mask_ty(span)?.lanes().unwrap_or(1);
        self.builder.assign(current, MirRValue::MaskConst { lanes, value: false });
        self.mark_narrowed();
        Ok(())
    }

    fn mark_narrowed(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.narrowed = true;
        }
    }

    /// Mask for memory writes, `None` where every lane is known active.
    pub(super) fn store_mask(&self) -> Option<LocalId> {
        let frame = self.frames.last()?;
        let statically_full =
            frame.kind == FrameKind::Function && !self.kind.is_spmd() && !frame.narrowed;
        if statically_full {
            None
        } else {
            frame.current
        }
    }

    /// Uniform `reduce.Any(mask)`, the guard for scalar side effects.
    pub(super) fn any_lane(&mut self, mask: LocalId) -> LocalId {
        self.builder.emit(
            MirType::bool(),
            MirRValue::Reduce {
                op: ReduceKind::Any,
                elem: ScalarType::Bool,
                value: MirOperand::Local(mask),
                mask: None,
            },
        )
    }

    /// Write `value` to a variable, masking lanes that are not active.
    ///
    /// A variable declared in the current frame whose mask never shrank is
    /// overwritten plainly; anything else is blended with `select`.
    pub(super) fn write_local(
        &mut self,
        name: &str,
        binding: &Binding,
        value: MirOperand,
        span: Span,
    ) -> Result<(), LoweringError> {
        if binding.ty.is_uniform() {
            let under_varying = self.frames[binding.frame + 1..]
                .iter()
                .any(|f| f.kind == FrameKind::Branch);
            if under_varying {
                return Err(AssignmentError::UniformWriteUnderVaryingControl {
                    name: name.to_string(),
                    span,
                }
                .into());
            }
            self.builder.assign(binding.local, MirRValue::Use(value));
            return Ok(());
        }

        let depth = self.frames.len() - 1;
        let (current, narrowed) = (self.frame().current, self.frame().narrowed);
        let plain = binding.frame == depth && !narrowed;
        match current {
            Some(mask) if !plain => {
                self.builder.assign(
                    binding.local,
                    MirRValue::Select {
                        mask: MirOperand::Local(mask),
                        if_true: value,
                        if_false: MirOperand::Local(binding.local),
                    },
                );
            }
            _ => self.builder.assign(binding.local, MirRValue::Use(value)),
        }
        Ok(())
    }
}
