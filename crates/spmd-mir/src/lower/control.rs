// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Early-exit legality.
//!
//! Each loop body (and the function body) owns one [`ControlFlowState`].
//! Entering a varying `if`/`switch` raises `varying_depth`; a `continue`
//! taken while it is raised disables lanes for the rest of the iteration
//! and sets the sticky `mask_altered` flag. `break` and `return` need all
//! lanes to agree, so both conditions forbid them.

use spmd_ast::Span;

use super::errors::{ControlFlowError, ExitCause, ExitKind};
use crate::{BlockId, LocalId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlowState {
    pub varying_depth: u32,
    pub mask_altered: bool,
}

impl ControlFlowState {
    pub fn enter_varying(&mut self) {
        self.varying_depth += 1;
    }

    pub fn leave_varying(&mut self) {
        self.varying_depth = self.varying_depth.saturating_sub(1);
    }

    pub fn is_divergent(&self) -> bool {
        self.varying_depth > 0
    }

    pub fn note_continue(&mut self) {
        if self.varying_depth > 0 {
            self.mask_altered = true;
        }
    }

    /// Varying condition is reported first; it holds regardless of any
    /// earlier `continue`.
    pub fn check_exit(&self, exit: ExitKind, span: Span) -> Result<(), ControlFlowError> {
        let cause = if self.varying_depth > 0 {
            ExitCause::VaryingCondition
        } else if self.mask_altered {
            ExitCause::MaskAltered
        } else {
            return Ok(());
        };
        Err(ControlFlowError::VaryingExitForbidden { exit, cause, span })
    }
}

/// Targets and bookkeeping of one loop being lowered.
#[derive(Debug, Clone)]
pub(super) struct LoopContext {
    pub data_parallel: bool,
    pub continue_block: BlockId,
    pub exit_block: BlockId,
    /// Lanes that took a varying `continue` this iteration.
    pub cont_mask: Option<LocalId>,
    pub span: Span,
}

/// The function body or one loop body.
#[derive(Debug, Clone)]
pub(super) struct Region {
    pub state: ControlFlowState,
    pub loop_ctx: Option<LoopContext>,
}

impl Region {
    pub fn function() -> Self {
        Region { state: ControlFlowState::default(), loop_ctx: None }
    }

    pub fn for_loop(ctx: LoopContext) -> Self {
        Region { state: ControlFlowState::default(), loop_ctx: Some(ctx) }
    }
}
