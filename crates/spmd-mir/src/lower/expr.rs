// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Expression lowering.

use spmd_ast::{BinOp as AstBinOp, Expr, ExprKind, Type, UnaryOp as AstUnaryOp};
use spmd_types::Builtin;

use super::{LoweringError, MirLowerer};
use crate::{BinOp, MirConst, MirOperand, MirRValue, MirType, UnaryOp};

impl<'a> MirLowerer<'a> {
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<(MirOperand, MirType), LoweringError> {
        let ty = self.lower_type(&expr.ty, expr.span)?;
        match &expr.kind {
            ExprKind::Int(v) => self.lower_literal(MirConst::Int(*v), expr, ty),
            ExprKind::Float(v) => self.lower_literal(MirConst::Float(*v), expr, ty),
            ExprKind::Bool(b) => self.lower_literal(MirConst::Bool(*b), expr, ty),

            ExprKind::Ident(name) => {
                let binding = self.lookup(name, expr.span)?;
                let op = MirOperand::Local(binding.local);
                if binding.ty == expr.ty {
                    Ok((op, ty))
                } else {
                    Ok((self.coerce(op, &binding.ty, &expr.ty, expr.span)?, ty))
                }
            }

            ExprKind::Binary { op, left, right } => {
                let left_op = self.lower_operand(left, &expr.ty)?;
                let right_op = self.lower_operand(right, &expr.ty)?;
                let result = self.builder.emit(
                    ty.clone(),
                    MirRValue::BinaryOp { op: lower_binop(*op), left: left_op, right: right_op },
                );
                Ok((MirOperand::Local(result), ty))
            }

            ExprKind::Unary { op, operand } => {
                let operand_op = self.lower_operand(operand, &expr.ty)?;
                let op = match op {
                    AstUnaryOp::Neg => UnaryOp::Neg,
                    AstUnaryOp::Not | AstUnaryOp::BitNot => UnaryOp::Not,
                };
                let result = self
                    .builder
                    .emit(ty.clone(), MirRValue::UnaryOp { op, operand: operand_op });
                Ok((MirOperand::Local(result), ty))
            }

            ExprKind::Call { callee, args } => match Builtin::from_name(callee) {
                Some(builtin) => self.lower_builtin(builtin, args, expr),
                None => self.lower_call(callee, args, expr),
            },

            ExprKind::Index { object, index } => {
                if object.ty.is_varying() && index.ty.is_varying() {
                    return Err(LoweringError::invalid(
                        "varying index into a varying array",
                        index.span,
                    ));
                }
                let (base, _) = self.lower_expr(object)?;
                let (idx, _) = self.lower_expr(index)?;
                // Gathers skip inactive lanes; constrained indices are not
                // tied to the execution mask.
                let mask = match &index.ty {
                    Type::Varying(_) => self.current_mask().map(MirOperand::Local),
                    _ => None,
                };
                let result = self
                    .builder
                    .emit(ty.clone(), MirRValue::Load { base, index: idx, mask });
                Ok((MirOperand::Local(result), ty))
            }

            ExprKind::Cast(inner) => self.lower_cast(inner, expr, ty),
        }
    }

    fn lower_literal(
        &mut self,
        value: MirConst,
        expr: &Expr,
        ty: MirType,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        let op = MirOperand::Constant(value);
        match expr.ty.base() {
            Some(base) if expr.ty.is_varying() => {
                let op = self.coerce(op, &Type::Uniform(base.clone()), &expr.ty, expr.span)?;
                Ok((op, ty))
            }
            _ => Ok((op, ty)),
        }
    }

    /// Lower an operand and bring it to the variability of `result`,
    /// keeping its own element type.
    fn lower_operand(&mut self, operand: &Expr, result: &Type) -> Result<MirOperand, LoweringError> {
        let (op, _) = self.lower_expr(operand)?;
        let base = operand
            .ty
            .base()
            .cloned()
            .ok_or_else(|| LoweringError::invalid("operand has no value", operand.span))?;
        let target = result.with_base(base);
        self.coerce(op, &operand.ty, &target, operand.span)
    }

    fn lower_cast(
        &mut self,
        inner: &Expr,
        expr: &Expr,
        ty: MirType,
    ) -> Result<(MirOperand, MirType), LoweringError> {
        self.resolver.check_cast(&inner.ty, &expr.ty, self.lanes, expr.span)?;
        let (op, _) = self.lower_expr(inner)?;

        // Uniform source: convert once, then splat.
        if inner.ty.is_uniform() && expr.ty.is_varying() {
            let base = expr
                .ty
                .base()
                .cloned()
                .ok_or_else(|| LoweringError::invalid("cast to void", expr.span))?;
            let uniform = Type::Uniform(base);
            let scalar_ty = self.lower_type(&uniform, expr.span)?;
            let converted = self.builder.emit(
                scalar_ty.clone(),
                MirRValue::Cast { value: op, target_ty: scalar_ty },
            );
            let op = self.coerce(MirOperand::Local(converted), &uniform, &expr.ty, expr.span)?;
            return Ok((op, ty));
        }

        let result = self
            .builder
            .emit(ty.clone(), MirRValue::Cast { value: op, target_ty: ty.clone() });
        Ok((MirOperand::Local(result), ty))
    }
}

fn lower_binop(op: AstBinOp) -> BinOp {
    match op {
        AstBinOp::Add => BinOp::Add,
        AstBinOp::Sub => BinOp::Sub,
        AstBinOp::Mul => BinOp::Mul,
        AstBinOp::Div => BinOp::Div,
        AstBinOp::Rem => BinOp::Rem,
        AstBinOp::Eq => BinOp::Eq,
        AstBinOp::Ne => BinOp::Ne,
        AstBinOp::Lt => BinOp::Lt,
        AstBinOp::Gt => BinOp::Gt,
        AstBinOp::Le => BinOp::Le,
        AstBinOp::Ge => BinOp::Ge,
        AstBinOp::And | AstBinOp::BitAnd => BinOp::And,
        AstBinOp::Or | AstBinOp::BitOr => BinOp::Or,
        AstBinOp::BitXor => BinOp::Xor,
        AstBinOp::Shl => BinOp::Shl,
        AstBinOp::Shr => BinOp::Shr,
    }
}
