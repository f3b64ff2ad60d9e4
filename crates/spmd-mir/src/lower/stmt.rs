// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statement lowering.

use indexmap::IndexSet;
use spmd_ast::{Expr, ExprKind, LoopMode, Span, Stmt, StmtKind, Type};

use super::errors::ExitKind;
use super::{LoweringError, MirLowerer};
use crate::{BinOp, MirOperand, MirRValue, MirStmt, MirTerminator};

impl<'a> MirLowerer<'a> {
    pub(super) fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), LoweringError> {
        self.push_scope();
        let result = stmts.iter().try_for_each(|stmt| self.lower_stmt(stmt));
        self.pop_scope();
        result
    }

    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LoweringError> {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.lower_expr(e)?;
                Ok(())
            }
            StmtKind::Let { name, ty, init } => self.lower_let(name, ty, init, stmt.span),
            StmtKind::LetTuple { names, init } => self.lower_let_tuple(names, init, stmt.span),
            StmtKind::Assign { target, value } => self.lower_assign(target, value, stmt.span),
            // A uniform predicate is never masked, whatever the producer flagged.
            StmtKind::If { cond, then_body, else_body, is_varying } => {
                if *is_varying && cond.ty.is_varying() {
                    self.lower_varying_if(cond, then_body, else_body, stmt.span)
                } else {
                    self.lower_uniform_if(cond, then_body, else_body, stmt.span)
                }
            }
            StmtKind::Switch { tag, cases, default, is_varying } => {
                if *is_varying && tag.ty.is_varying() {
                    self.lower_varying_switch(tag, cases, default, stmt.span)
                } else {
                    self.lower_uniform_switch(tag, cases, default, stmt.span)
                }
            }
            StmtKind::For { binding, start, end, body, mode } => match mode {
                LoopMode::Sequential => self.lower_sequential_for(binding, start, end, body, stmt.span),
                LoopMode::DataParallel { lanes } => {
                    self.lower_data_parallel_for(binding, start, end, body, *lanes, stmt.span)
                }
            },
            StmtKind::While { cond, body } => self.lower_while(cond, body, stmt.span),
            StmtKind::Break => self.lower_break(stmt.span),
            StmtKind::Continue => self.lower_continue(stmt.span),
            StmtKind::Return(value) => self.lower_return(value.as_ref(), stmt.span),
        }
    }

    fn lower_let(&mut self, name: &str, ty: &Type, init: &Expr, span: Span) -> Result<(), LoweringError> {
        self.resolver.check_well_formed(ty, span)?;
        let (op, _) = self.lower_expr(init)?;
        let op = self.coerce(op, &init.ty, ty, init.span)?;
        let mir_ty = self.lower_type(ty, span)?;
        let local = self.builder.alloc_local(name.to_string(), mir_ty);
        self.builder.assign(local, MirRValue::Use(op));
        self.bind(name, local, ty.clone());
        Ok(())
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr, span: Span) -> Result<(), LoweringError> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let binding = self.lookup(name, target.span)?;
                let (op, _) = self.lower_expr(value)?;
                let op = self.coerce(op, &value.ty, &binding.ty, value.span)?;
                self.write_local(name, &binding, op, span)
            }
            ExprKind::Index { object, index } => {
                self.lower_store(object, index, value, &target.ty, span)
            }
            _ => Err(LoweringError::invalid("cannot assign to this expression", target.span)),
        }
    }

    /// `object[index] = value`. Lane-wise stores under a mask become masked
    /// stores; a uniform store under a mask runs if any lane is active.
    fn lower_store(
        &mut self,
        object: &Expr,
        index: &Expr,
        value: &Expr,
        elem_ty: &Type,
        span: Span,
    ) -> Result<(), LoweringError> {
        let name = object.as_ident().ok_or_else(|| {
            LoweringError::invalid("stores go through a named array or pointer", object.span)
        })?;
        let binding = self.lookup(name, object.span)?;
        if binding.ty.is_varying() && index.ty.is_varying() {
            return Err(LoweringError::invalid(
                "varying index into a varying array",
                index.span,
            ));
        }
        let (idx, _) = self.lower_expr(index)?;
        let (val, _) = self.lower_expr(value)?;
        let val = self.coerce(val, &value.ty, elem_ty, value.span)?;

        let lane_wise = index.ty.is_varying() || elem_ty.is_varying() || binding.ty.is_varying();
        let stmt = match self.store_mask() {
            Some(mask) if lane_wise => MirStmt::MaskedStore {
                base: binding.local,
                index: idx,
                value: val,
                mask: MirOperand::Local(mask),
            },
            Some(mask) => {
                let any = self.any_lane(mask);
                MirStmt::Store {
                    base: binding.local,
                    index: idx,
                    value: val,
                    guard: Some(MirOperand::Local(any)),
                }
            }
            None => MirStmt::Store { base: binding.local, index: idx, value: val, guard: None },
        };
        log::trace!("store to `{}` at {:?}: {}", name, span, stmt);
        self.builder.push_stmt(stmt);
        Ok(())
    }

    // =================================================================
    // Early exits
    // =================================================================

    /// Continue past a terminator in a fresh block that nothing jumps to.
    pub(super) fn start_dead_block(&mut self) {
        let dead = self.builder.create_block();
        self.builder.switch_to_block(dead);
    }

    fn lower_break(&mut self, span: Span) -> Result<(), LoweringError> {
        let region = self.regions.last().filter(|r| r.loop_ctx.is_some()).ok_or_else(|| {
            LoweringError::invalid("`break` outside of a loop", span)
        })?;
        region.state.check_exit(ExitKind::Break, span)?;
        let exit_block = region.loop_ctx.as_ref().map(|l| l.exit_block).ok_or_else(|| {
            LoweringError::invalid("`break` outside of a loop", span)
        })?;
        self.builder.terminate(MirTerminator::Goto { target: exit_block });
        self.start_dead_block();
        Ok(())
    }

    /// Uniform `continue` jumps to the latch. Under varying control the
    /// active lanes join the iteration's continue mask and go dark for the
    /// rest of the body.
    fn lower_continue(&mut self, span: Span) -> Result<(), LoweringError> {
        let region = self.regions.last_mut().filter(|r| r.loop_ctx.is_some()).ok_or_else(|| {
            LoweringError::invalid("`continue` outside of a loop", span)
        })?;
        region.state.note_continue();
        let divergent = region.state.is_divergent();
        let Some(ctx) = region.loop_ctx.clone() else {
            return Err(LoweringError::invalid("`continue` outside of a loop", span));
        };

        if !divergent {
            self.builder.terminate(MirTerminator::Goto { target: ctx.continue_block });
            self.start_dead_block();
            return Ok(());
        }

        let cont = ctx.cont_mask.ok_or_else(|| {
            LoweringError::invalid("varying `continue` without a continue mask", span)
        })?;
        let current = self.current_mask().ok_or_else(|| {
            LoweringError::invalid("varying `continue` without an execution mask", span)
        })?;
        self.builder.assign(
            cont,
            MirRValue::BinaryOp {
                op: BinOp::Or,
                left: MirOperand::Local(cont),
                right: MirOperand::Local(current),
            },
        );
        self.clear_current(span)
    }

    fn lower_return(&mut self, value: Option<&Expr>, span: Span) -> Result<(), LoweringError> {
        for region in self.regions.iter().rev() {
            region.state.check_exit(ExitKind::Return, span)?;
        }
        let value = match value {
            Some(e) => {
                if self.ret == Type::Void {
                    return Err(LoweringError::invalid(
                        format!("`{}` returns no value", self.fn_name),
                        e.span,
                    ));
                }
                let (op, _) = self.lower_expr(e)?;
                let ret = self.ret.clone();
                Some(self.coerce(op, &e.ty, &ret, e.span)?)
            }
            None => None,
        };
        self.builder.terminate(MirTerminator::Return { value });
        self.start_dead_block();
        Ok(())
    }
}

// =================================================================
// Pre-scans
// =================================================================

/// Does `stmts` contain a `continue` that targets the enclosing loop (not
/// one nested inside `stmts`)?
pub(super) fn contains_continue(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Continue => true,
        StmtKind::If { then_body, else_body, .. } => {
            contains_continue(then_body) || contains_continue(else_body)
        }
        StmtKind::Switch { cases, default, .. } => {
            cases.iter().any(|c| contains_continue(&c.body)) || contains_continue(default)
        }
        _ => false,
    })
}

/// Names assigned anywhere in `stmts`, in first-write order.
pub(super) fn assigned_names(stmts: &[Stmt]) -> IndexSet<String> {
    let mut names = IndexSet::new();
    collect_assigned(stmts, &mut names);
    names
}

fn collect_assigned(stmts: &[Stmt], names: &mut IndexSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => {
                if let Some(name) = target.as_ident() {
                    names.insert(name.to_string());
                }
            }
            StmtKind::If { then_body, else_body, .. } => {
                collect_assigned(then_body, names);
                collect_assigned(else_body, names);
            }
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    collect_assigned(&case.body, names);
                }
                collect_assigned(default, names);
            }
            StmtKind::For { body, .. } | StmtKind::While { body, .. } => {
                collect_assigned(body, names);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_ast::build::*;
    use spmd_ast::ScalarType;

    #[test]
    fn continue_in_nested_loop_is_not_ours() {
        let body = vec![seq_for("j", i32_lit(0), i32_lit(4), vec![continue_()])];
        assert!(!contains_continue(&body));
        let body = vec![if_varying(ident("c", Type::varying(ScalarType::Bool)), vec![continue_()], vec![])];
        assert!(contains_continue(&body));
    }

    #[test]
    fn assigned_names_in_order() {
        let v = Type::varying(ScalarType::I32);
        let body = vec![
            assign(ident("b", v.clone()), ident("a", v.clone())),
            if_uniform(boolean(true), vec![assign(ident("a", v.clone()), i32_lit(1))], vec![]),
            assign(ident("b", v.clone()), i32_lit(2)),
            assign(index(ident("arr", v.clone()), i32_lit(0), v.clone()), i32_lit(3)),
        ];
        let names: Vec<_> = assigned_names(&body).into_iter().collect();
        assert_eq!(names, ["b", "a"]);
    }
}
