// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shorthand constructors for building typed trees by hand.
//!
//! Front-ends and tests use these instead of spelling out every node. Nodes
//! get `NodeId::DUMMY` and an empty span; attach a real location with
//! [`Stmt::at`] or [`Expr::at`].

use crate::{
    BaseType, BinOp, Decl, DeclKind, Expr, ExprKind, ExternDecl, FnDecl, LoopMode, NodeId, Param,
    ScalarType, Span, Stmt, StmtKind, SwitchCase, Type, UnaryOp,
};

impl Expr {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Stmt {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

// ── Expressions ──────────────────────────────────────────────

pub fn int(value: i64, ty: Type) -> Expr {
    Expr::new(ExprKind::Int(value), ty, Span::default())
}

/// Uniform `i32` literal.
pub fn i32_lit(value: i64) -> Expr {
    int(value, Type::uniform(ScalarType::I32))
}

pub fn float(value: f64, ty: Type) -> Expr {
    Expr::new(ExprKind::Float(value), ty, Span::default())
}

pub fn boolean(value: bool) -> Expr {
    Expr::new(ExprKind::Bool(value), Type::uniform(ScalarType::Bool), Span::default())
}

pub fn ident(name: &str, ty: Type) -> Expr {
    Expr::new(ExprKind::Ident(name.to_string()), ty, Span::default())
}

pub fn binary(op: BinOp, left: Expr, right: Expr, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
        ty,
        Span::default(),
    )
}

/// Comparison whose result variability follows its operands.
pub fn compare(op: BinOp, left: Expr, right: Expr) -> Expr {
    let ty = match (&left.ty, &right.ty) {
        (Type::ConstrainedVarying(_, n), _) | (_, Type::ConstrainedVarying(_, n)) => {
            Type::constrained(ScalarType::Bool, *n)
        }
        (l, r) if l.is_varying() || r.is_varying() => Type::varying(ScalarType::Bool),
        _ => Type::uniform(ScalarType::Bool),
    };
    binary(op, left, right, ty)
}

pub fn unary(op: UnaryOp, operand: Expr, ty: Type) -> Expr {
    Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, ty, Span::default())
}

pub fn call(callee: &str, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(ExprKind::Call { callee: callee.to_string(), args }, ty, Span::default())
}

pub fn index(object: Expr, idx: Expr, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Index { object: Box::new(object), index: Box::new(idx) },
        ty,
        Span::default(),
    )
}

pub fn cast(expr: Expr, ty: Type) -> Expr {
    Expr::new(ExprKind::Cast(Box::new(expr)), ty, Span::default())
}

pub fn array_of(elem: ScalarType, len: u32) -> BaseType {
    BaseType::array(BaseType::Scalar(elem), len)
}

// ── Statements ───────────────────────────────────────────────

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(expr), Span::default())
}

pub fn let_(name: &str, ty: Type, init: Expr) -> Stmt {
    Stmt::new(StmtKind::Let { name: name.to_string(), ty, init }, Span::default())
}

pub fn let_tuple(names: Vec<(&str, Type)>, init: Expr) -> Stmt {
    let names = names.into_iter().map(|(n, t)| (n.to_string(), t)).collect();
    Stmt::new(StmtKind::LetTuple { names, init }, Span::default())
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::new(StmtKind::Assign { target, value }, Span::default())
}

pub fn if_uniform(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::If { cond, then_body, else_body, is_varying: false },
        Span::default(),
    )
}

pub fn if_varying(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::If { cond, then_body, else_body, is_varying: true },
        Span::default(),
    )
}

pub fn case(values: Vec<i64>, body: Vec<Stmt>) -> SwitchCase {
    SwitchCase { values, body, span: Span::default() }
}

pub fn switch(tag: Expr, cases: Vec<SwitchCase>, default: Vec<Stmt>) -> Stmt {
    let is_varying = tag.ty.is_varying();
    Stmt::new(StmtKind::Switch { tag, cases, default, is_varying }, Span::default())
}

/// Data-parallel `for` over `start..end` with the lane count left to the
/// lowering.
pub fn spmd_for(binding: &str, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
    for_loop(binding, start, end, body, LoopMode::DataParallel { lanes: None })
}

pub fn seq_for(binding: &str, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
    for_loop(binding, start, end, body, LoopMode::Sequential)
}

pub fn for_loop(binding: &str, start: Expr, end: Expr, body: Vec<Stmt>, mode: LoopMode) -> Stmt {
    Stmt::new(
        StmtKind::For { binding: binding.to_string(), start, end, body, mode },
        Span::default(),
    )
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::While { cond, body }, Span::default())
}

pub fn break_() -> Stmt {
    Stmt::new(StmtKind::Break, Span::default())
}

pub fn continue_() -> Stmt {
    Stmt::new(StmtKind::Continue, Span::default())
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::new(StmtKind::Return(value), Span::default())
}

// ── Declarations ─────────────────────────────────────────────

pub fn param(name: &str, ty: Type) -> Param {
    Param { name: name.to_string(), ty, span: Span::default() }
}

pub fn func(name: &str, params: Vec<Param>, ret: Type, body: Vec<Stmt>) -> FnDecl {
    FnDecl { name: name.to_string(), params, ret, body, is_pub: false, span: Span::default() }
}

pub fn pub_func(name: &str, params: Vec<Param>, ret: Type, body: Vec<Stmt>) -> FnDecl {
    FnDecl { is_pub: true, ..func(name, params, ret, body) }
}

pub fn fn_decl(decl: FnDecl) -> Decl {
    let span = decl.span;
    Decl { id: NodeId::DUMMY, kind: DeclKind::Fn(decl), span }
}

pub fn extern_decl(name: &str, params: Vec<Param>, ret: Type) -> Decl {
    Decl {
        id: NodeId::DUMMY,
        kind: DeclKind::Extern(ExternDecl {
            name: name.to_string(),
            params,
            ret,
            is_pub: false,
            span: Span::default(),
        }),
        span: Span::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_follows_operand_variability() {
        let u = compare(BinOp::Lt, i32_lit(1), i32_lit(2));
        assert_eq!(u.ty, Type::uniform(ScalarType::Bool));
        let v = compare(BinOp::Lt, ident("x", Type::varying(ScalarType::I32)), i32_lit(2));
        assert_eq!(v.ty, Type::varying(ScalarType::Bool));
        let c = compare(
            BinOp::Eq,
            ident("y", Type::constrained(ScalarType::U8, 16)),
            int(0, Type::uniform(ScalarType::U8)),
        );
        assert_eq!(c.ty, Type::constrained(ScalarType::Bool, 16));
    }

    #[test]
    fn switch_takes_variability_from_tag() {
        let s = switch(ident("t", Type::varying(ScalarType::I32)), vec![], vec![]);
        assert!(matches!(s.kind, StmtKind::Switch { is_varying: true, .. }));
    }

    #[test]
    fn at_sets_span() {
        let s = break_().at(Span::new(3, 8));
        assert_eq!(s.span, Span::new(3, 8));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn tree_survives_json() {
        let f = func(
            "count",
            vec![param("n", Type::uniform(ScalarType::I32))],
            Type::Void,
            vec![spmd_for("i", i32_lit(0), ident("n", Type::uniform(ScalarType::I32)), vec![])],
        );
        let json = serde_json::to_string(&fn_decl(f.clone())).unwrap();
        let back: Decl = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, DeclKind::Fn(f));
    }
}
