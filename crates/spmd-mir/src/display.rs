// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Textual form of MIR, used in logs and test expectations.

use crate::*;
use std::fmt;

impl fmt::Display for MirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirType::Void => write!(f, "void"),
            MirType::Scalar(s) => write!(f, "{}", s),
            MirType::Vector { elem, lanes } => write!(f, "{}x{}", elem, lanes),
            MirType::Mask { lanes } => write!(f, "mask{}", lanes),
            MirType::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            MirType::Ptr(elem) => write!(f, "*{}", elem),
        }
    }
}

impl fmt::Display for MirOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirOperand::Local(id) => write!(f, "_{}", id.0),
            MirOperand::Constant(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for MirConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirConst::Int(v) => write!(f, "{}", v),
            MirConst::Float(v) => write!(f, "{:?}", v),
            MirConst::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::AndNot => "&!",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

fn masked(f: &mut fmt::Formatter<'_>, mask: &Option<MirOperand>) -> fmt::Result {
    match mask {
        Some(m) => write!(f, " if {}", m),
        None => Ok(()),
    }
}

fn list(f: &mut fmt::Formatter<'_>, items: &[MirOperand]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for MirRValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirRValue::Use(op) => write!(f, "{}", op),
            MirRValue::BinaryOp { op, left, right } => write!(f, "{} {} {}", left, op, right),
            MirRValue::UnaryOp { op, operand } => write!(f, "{}{}", op, operand),
            MirRValue::Cast { value, target_ty } => write!(f, "{} as {}", value, target_ty),
            MirRValue::Splat { value, lanes } => write!(f, "splat<{}>({})", lanes, value),
            MirRValue::LaneIndex { elem, lanes } => write!(f, "lane_index<{}x{}>", elem, lanes),
            MirRValue::MaskConst { lanes, value } => {
                write!(f, "mask<{}>({})", lanes, if *value { "all" } else { "none" })
            }
            MirRValue::Select { mask, if_true, if_false } => {
                write!(f, "select({}, {}, {})", mask, if_true, if_false)
            }
            MirRValue::Load { base, index, mask } => {
                write!(f, "load {}[{}]", base, index)?;
                masked(f, mask)
            }
            MirRValue::Reduce { op, elem, value, mask } => {
                write!(f, "reduce.{}<{}>({})", op.name(), elem, value)?;
                masked(f, mask)
            }
            MirRValue::LaneBroadcast { value, lane } => write!(f, "broadcast({}, {})", value, lane),
            MirRValue::Rotate { value, offset } => write!(f, "rotate({}, {})", value, offset),
            MirRValue::Swizzle { value, indices } => write!(f, "swizzle({}, {})", value, indices),
            MirRValue::ShiftLanes { value, amount, dir } => {
                let name = match dir {
                    LaneShift::Left => "shift_left",
                    LaneShift::Right => "shift_right",
                };
                write!(f, "{}({}, {})", name, value, amount)
            }
            MirRValue::ExtractLanes { value } => write!(f, "extract({})", value),
            MirRValue::Slice { value, group, lanes } => {
                write!(f, "slice<{}>({}, group {})", lanes, value, group)
            }
            MirRValue::Compose { parts, lanes } => {
                write!(f, "compose<{}>(", lanes)?;
                list(f, parts)?;
                write!(f, ")")
            }
            MirRValue::GroupMask { total, group, lanes } => {
                write!(f, "group_mask<{}>({} of {})", lanes, group, total)
            }
            MirRValue::Aggregate { elems } => {
                write!(f, "[")?;
                list(f, elems)?;
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for MirStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirStmt::Assign { dst, rvalue } => write!(f, "_{} = {}", dst.0, rvalue),
            MirStmt::Store { base, index, value, guard } => {
                write!(f, "_{}[{}] = {}", base.0, index, value)?;
                masked(f, guard)
            }
            MirStmt::MaskedStore { base, index, value, mask } => {
                write!(f, "_{}[{}] = {} under {}", base.0, index, value, mask)
            }
            MirStmt::Call { dst, func, args } => {
                if let Some(d) = dst {
                    write!(f, "_{} = ", d.0)?;
                }
                write!(f, "call {}(", func.name)?;
                list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for MirTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirTerminator::Return { value: Some(v) } => write!(f, "return {}", v),
            MirTerminator::Return { value: None } => write!(f, "return"),
            MirTerminator::Goto { target } => write!(f, "goto bb{}", target.0),
            MirTerminator::Branch { cond, then_block, else_block } => {
                write!(f, "branch {} ? bb{} : bb{}", cond, then_block.0, else_block.0)
            }
            MirTerminator::Switch { value, cases, default } => {
                write!(f, "switch {} [", value)?;
                for (v, target) in cases {
                    write!(f, "{} => bb{}, ", v, target.0)?;
                }
                write!(f, "_ => bb{}]", default.0)
            }
            MirTerminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for MirFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "_{}: {}", p.id.0, p.ty)?;
        }
        write!(f, ") -> {}", self.ret_ty)?;
        if let Some(lanes) = self.lanes {
            write!(f, " [lanes {}]", lanes)?;
        }
        writeln!(f, " {{")?;
        for local in self.locals.iter().filter(|l| !l.is_param) {
            match &local.name {
                Some(name) => writeln!(f, "    let _{}: {} // {}", local.id.0, local.ty, name)?,
                None => writeln!(f, "    let _{}: {}", local.id.0, local.ty)?,
            }
        }
        for block in &self.blocks {
            writeln!(f, "  bb{}:", block.id.0)?;
            for stmt in &block.statements {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_ast::ScalarType;
    use spmd_types::{ReduceKind, SignatureKind};

    #[test]
    fn type_forms() {
        assert_eq!(MirType::Vector { elem: ScalarType::F32, lanes: 4 }.to_string(), "f32x4");
        assert_eq!(MirType::Mask { lanes: 16 }.to_string(), "mask16");
        let arr = MirType::array(MirType::Scalar(ScalarType::I32), 10);
        assert_eq!(arr.to_string(), "[i32; 10]");
    }

    #[test]
    fn rvalue_forms() {
        let r = MirRValue::Select {
            mask: MirOperand::Local(LocalId(1)),
            if_true: MirOperand::Local(LocalId(2)),
            if_false: MirOperand::Local(LocalId(3)),
        };
        assert_eq!(r.to_string(), "select(_1, _2, _3)");
        let r = MirRValue::Reduce {
            op: ReduceKind::Add,
            elem: ScalarType::I32,
            value: MirOperand::Local(LocalId(4)),
            mask: Some(MirOperand::Local(LocalId(0))),
        };
        assert_eq!(r.to_string(), "reduce.add<i32>(_4) if _0");
    }

    #[test]
    fn function_listing() {
        let mut b = BlockBuilder::new(
            "f".into(),
            SignatureKind::Spmd { mask_lanes: 4 },
            Some(4),
            MirType::Void,
        );
        let mask = b.add_param("__mask".into(), MirType::Mask { lanes: 4 });
        let t = b.emit(
            MirType::Mask { lanes: 4 },
            MirRValue::UnaryOp { op: UnaryOp::Not, operand: MirOperand::Local(mask) },
        );
        b.push_stmt(MirStmt::MaskedStore {
            base: mask,
            index: MirOperand::int(0),
            value: MirOperand::bool(true),
            mask: MirOperand::Local(t),
        });
        b.terminate(MirTerminator::Return { value: None });
        let text = b.finish().to_string();
        assert!(text.starts_with("fn f(_0: mask4) -> void [lanes 4] {"));
        assert!(text.contains("_1 = !_0"));
        assert!(text.contains("_0[0] = true under _1"));
        assert!(text.trim_end().ends_with("return\n}"));
    }
}
