// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Effective lane count of a function.
//!
//! Every function runs at a single lane count. SPMD functions take it from
//! their parameters (it becomes the width of the mask parameter). Other
//! functions take it from the narrowest varying element anywhere in their
//! body, so the widest vector that still fits a register is used.

use spmd_ast::{Expr, ExprKind, FnDecl, LoopMode, Stmt, StmtKind, Type};

use crate::TargetConfig;

pub struct LaneResolver<'a> {
    config: &'a TargetConfig,
}

impl<'a> LaneResolver<'a> {
    pub fn new(config: &'a TargetConfig) -> Self {
        Self { config }
    }

    /// Mask width for a function with these parameter types, `None` when
    /// none of them is varying.
    pub fn spmd_lanes(&self, params: &[Type]) -> Option<u32> {
        let mut saw_varying = false;
        let mut narrowest: Option<u32> = None;
        let mut constrained: Option<u32> = None;
        for ty in params {
            match ty {
                Type::Varying(base) => {
                    saw_varying = true;
                    if let Some(bits) = base.lane_bits() {
                        narrowest = Some(narrowest.map_or(bits, |n| n.min(bits)));
                    }
                }
                Type::ConstrainedVarying(_, n) => {
                    constrained = Some(constrained.map_or(*n, |c| c.min(*n)));
                }
                _ => {}
            }
        }
        match narrowest {
            Some(bits) => Some(self.config.lanes_for_bits(bits)),
            None if saw_varying => Some(self.config.default_lanes),
            None => constrained,
        }
    }

    /// Lane count of a function, `None` if it never needs one.
    pub fn function_lanes(&self, decl: &FnDecl) -> Option<u32> {
        let params: Vec<Type> = decl.params.iter().map(|p| p.ty.clone()).collect();
        if let Some(lanes) = self.spmd_lanes(&params) {
            return Some(lanes);
        }

        let mut scan = BodyScan::default();
        scan.stmts(&decl.body);
        match scan.narrowest_bits {
            Some(bits) => Some(self.config.lanes_for_bits(bits)),
            None if scan.saw_varying || scan.data_parallel => Some(self.config.default_lanes),
            None => None,
        }
    }
}

#[derive(Default)]
struct BodyScan {
    narrowest_bits: Option<u32>,
    saw_varying: bool,
    data_parallel: bool,
}

impl BodyScan {
    fn ty(&mut self, ty: &Type) {
        if let Type::Varying(base) = ty {
            self.saw_varying = true;
            if let Some(bits) = base.lane_bits() {
                self.narrowest_bits = Some(self.narrowest_bits.map_or(bits, |n| n.min(bits)));
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr(e),
            StmtKind::Let { ty, init, .. } => {
                self.ty(ty);
                self.expr(init);
            }
            StmtKind::LetTuple { names, init } => {
                for (_, ty) in names {
                    self.ty(ty);
                }
                self.expr(init);
            }
            StmtKind::Assign { target, value } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::If { cond, then_body, else_body, .. } => {
                self.expr(cond);
                self.stmts(then_body);
                self.stmts(else_body);
            }
            StmtKind::Switch { tag, cases, default, .. } => {
                self.expr(tag);
                for case in cases {
                    self.stmts(&case.body);
                }
                self.stmts(default);
            }
            StmtKind::For { start, end, body, mode, .. } => {
                if let LoopMode::DataParallel { .. } = mode {
                    self.data_parallel = true;
                    // The loop index is varying over the bound's type.
                    if let Some(base) = start.ty.base() {
                        self.ty(&Type::Varying(base.clone()));
                    }
                }
                self.expr(start);
                self.expr(end);
                self.stmts(body);
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.stmts(body);
            }
            StmtKind::Return(Some(e)) => self.expr(e),
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        self.ty(&expr.ty);
        match &expr.kind {
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            ExprKind::Cast(inner) => self.expr(inner),
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Bool(_) | ExprKind::Ident(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_ast::build::*;
    use spmd_ast::ScalarType;

    #[test]
    fn spmd_lanes_from_narrowest_param() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        let params = [
            Type::varying(ScalarType::F32),
            Type::varying(ScalarType::U8),
            Type::uniform(ScalarType::I64),
        ];
        assert_eq!(r.spmd_lanes(&params), Some(16));
        assert_eq!(r.spmd_lanes(&[Type::uniform(ScalarType::I32)]), None);
    }

    #[test]
    fn spmd_lanes_constrained_only() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        let params = [Type::constrained(ScalarType::U32, 8), Type::constrained(ScalarType::U8, 32)];
        assert_eq!(r.spmd_lanes(&params), Some(8));
        let mixed = [Type::constrained(ScalarType::U8, 32), Type::varying(ScalarType::I64)];
        assert_eq!(r.spmd_lanes(&mixed), Some(2));
    }

    #[test]
    fn bool_params_use_default() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        assert_eq!(r.spmd_lanes(&[Type::varying(ScalarType::Bool)]), Some(4));
    }

    #[test]
    fn ordinary_function_scans_body() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        let f = func(
            "f",
            vec![param("a", Type::Uniform(array_of(ScalarType::U16, 64)))],
            Type::Void,
            vec![spmd_for(
                "i",
                i32_lit(0),
                i32_lit(64),
                vec![let_(
                    "x",
                    Type::varying(ScalarType::U16),
                    index(
                        ident("a", Type::Uniform(array_of(ScalarType::U16, 64))),
                        ident("i", Type::varying(ScalarType::I32)),
                        Type::varying(ScalarType::U16),
                    ),
                )],
            )],
        );
        assert_eq!(r.function_lanes(&f), Some(8));
    }

    #[test]
    fn loop_index_sets_width() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        let f = func(
            "f",
            vec![],
            Type::Void,
            vec![spmd_for("i", int(0, Type::uniform(ScalarType::I64)), int(8, Type::uniform(ScalarType::I64)), vec![])],
        );
        assert_eq!(r.function_lanes(&f), Some(2));
    }

    #[test]
    fn scalar_function_has_no_lanes() {
        let cfg = TargetConfig::default();
        let r = LaneResolver::new(&cfg);
        let f = func(
            "f",
            vec![param("n", Type::uniform(ScalarType::I32))],
            Type::uniform(ScalarType::I32),
            vec![ret(Some(ident("n", Type::uniform(ScalarType::I32))))],
        );
        assert_eq!(r.function_lanes(&f), None);
    }
}
