// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Lowering from the typed tree to mask-explicit MIR.
//!
//! One [`MirLowerer`] lowers one function. It keeps a stack of mask frames
//! (function, loop iteration, varying branch) and a stack of control-flow
//! regions (function body, each loop body), and emits every divergent
//! construct as straight-line code under the frame's mask.

mod branch;
mod builtins;
mod call;
mod control;
mod errors;
mod expr;
mod loops;
mod mask;
mod stmt;

#[cfg(test)]
mod tests;

pub use control::ControlFlowState;
pub use errors::{
    ContextError, ControlFlowError, ExitCause, ExitKind, LoweringError, NestingError,
};

use std::collections::HashMap;

use spmd_ast::{BaseType, FnDecl, Span, Type};
use spmd_types::{
    classify, AssignContext, Coercion, LaneResolver, SignatureKind, SignatureTable, TargetConfig,
    TypeResolver,
};

use crate::{BlockBuilder, LocalId, MirFunction, MirOperand, MirRValue, MirTerminator, MirType};
use control::Region;
use mask::{FrameKind, MaskFrame};

/// Program-wide inputs shared by every function's lowering.
pub struct LoweringContext<'a> {
    pub signatures: &'a SignatureTable,
    pub config: &'a TargetConfig,
}

/// A name in scope.
#[derive(Debug, Clone)]
struct Binding {
    local: LocalId,
    ty: Type,
    /// Mask frame the binding was declared in.
    frame: usize,
}

pub struct MirLowerer<'a> {
    builder: BlockBuilder,
    ctx: &'a LoweringContext<'a>,
    resolver: TypeResolver<'a>,
    fn_name: String,
    kind: SignatureKind,
    lanes: Option<u32>,
    ret: Type,
    scopes: Vec<HashMap<String, Binding>>,
    frames: Vec<MaskFrame>,
    regions: Vec<Region>,
}

/// Lower one function against the program's signatures.
pub fn lower_function(decl: &FnDecl, ctx: &LoweringContext) -> Result<MirFunction, LoweringError> {
    MirLowerer::lower_function(decl, ctx)
}

impl<'a> MirLowerer<'a> {
    pub fn lower_function(
        decl: &FnDecl,
        ctx: &'a LoweringContext<'a>,
    ) -> Result<MirFunction, LoweringError> {
        let kind = match ctx.signatures.get(&decl.name) {
            Some(sig) => sig.kind,
            None => classify(&decl.name, &decl.params, &decl.ret, decl.is_pub, decl.span, ctx.config)
                .0
                .kind,
        };
        let lanes = LaneResolver::new(ctx.config).function_lanes(decl);
        log::debug!("lowering `{}`: {:?}, lanes {:?}", decl.name, kind, lanes);

        let ret_ty = mir_type(&decl.ret, lanes, decl.span)?;
        let mut builder = BlockBuilder::new(decl.name.clone(), kind, lanes, ret_ty);

        // The mask parameter comes first, ahead of the declared parameters.
        let entry_mask = match kind {
            SignatureKind::Spmd { mask_lanes } => {
                Some(builder.add_param("__mask".to_string(), MirType::Mask { lanes: mask_lanes }))
            }
            SignatureKind::Ordinary => None,
        };

        let mut lowerer = MirLowerer {
            builder,
            ctx,
            resolver: TypeResolver::new(ctx.config),
            fn_name: decl.name.clone(),
            kind,
            lanes,
            ret: decl.ret.clone(),
            scopes: vec![HashMap::new()],
            frames: Vec::new(),
            regions: vec![Region::function()],
        };

        for param in &decl.params {
            lowerer.resolver.check_well_formed(&param.ty, param.span)?;
            let ty = lowerer.lower_type(&param.ty, param.span)?;
            let local = lowerer.builder.add_param(param.name.clone(), ty);
            lowerer.bind(&param.name, local, param.ty.clone());
        }

        let function_mask = match (entry_mask, lanes) {
            (Some(mask), _) => Some(mask),
            (None, Some(lanes)) => {
                let all = lowerer.builder.alloc_local("__mask".to_string(), MirType::Mask { lanes });
                lowerer.builder.assign(all, MirRValue::MaskConst { lanes, value: true });
                Some(all)
            }
            (None, None) => None,
        };
        lowerer.frames.push(MaskFrame::new(FrameKind::Function, function_mask));

        lowerer.lower_block(&decl.body)?;

        if lowerer.builder.current_block_unterminated() && decl.ret == Type::Void {
            lowerer.builder.terminate(MirTerminator::Return { value: None });
        }
        Ok(lowerer.builder.finish())
    }

    // =================================================================
    // Scopes
    // =================================================================

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, local: LocalId, ty: Type) {
        let frame = self.frames.len().saturating_sub(1);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Binding { local, ty, frame });
        }
    }

    fn lookup(&self, name: &str, span: Span) -> Result<Binding, LoweringError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| LoweringError::UnresolvedVariable { name: name.to_string(), span })
    }

    // =================================================================
    // Types
    // =================================================================

    fn lower_type(&self, ty: &Type, span: Span) -> Result<MirType, LoweringError> {
        self.lower_type_at(ty, self.lanes, span)
    }

    fn lower_type_at(
        &self,
        ty: &Type,
        lanes: Option<u32>,
        span: Span,
    ) -> Result<MirType, LoweringError> {
        mir_type(ty, lanes, span)
    }

    // =================================================================
    // Coercion
    // =================================================================

    /// Move `op` of type `from` into a slot of type `to`, splatting uniform
    /// values as needed.
    fn coerce(
        &mut self,
        op: MirOperand,
        from: &Type,
        to: &Type,
        span: Span,
    ) -> Result<MirOperand, LoweringError> {
        match self.resolver.check_assign(from, to, AssignContext::Binding, span)? {
            Coercion::Direct => Ok(op),
            Coercion::Broadcast { lanes } => {
                let lanes = lanes.or(self.lanes).ok_or_else(|| {
                    LoweringError::invalid(format!("{} outside any lane context", to), span)
                })?;
                let ty = self.lower_type_at(to, Some(lanes), span)?;
                let splat = self.builder.emit(ty, MirRValue::Splat { value: op, lanes });
                Ok(MirOperand::Local(splat))
            }
            Coercion::Decompose { .. } => Err(LoweringError::invalid(
                "constrained value needs an explicit decomposition here",
                span,
            )),
        }
    }
}

/// `lanes` is the width used for unconstrained varying types.
fn mir_type(ty: &Type, lanes: Option<u32>, span: Span) -> Result<MirType, LoweringError> {
    match ty {
        Type::Void => Ok(MirType::Void),
        Type::Uniform(base) => Ok(uniform_type(base)),
        Type::Varying(base) => {
            let lanes = lanes.ok_or_else(|| {
                LoweringError::invalid(format!("{} outside any lane context", ty), span)
            })?;
            varying_type(base, lanes, span)
        }
        Type::ConstrainedVarying(base, n) => varying_type(base, *n, span),
    }
}

fn uniform_type(base: &BaseType) -> MirType {
    match base {
        BaseType::Scalar(s) => MirType::Scalar(*s),
        BaseType::Array { elem, len } => MirType::array(uniform_type(elem), *len),
        BaseType::Ptr(elem) => MirType::Ptr(Box::new(uniform_type(elem))),
    }
}

fn varying_type(base: &BaseType, lanes: u32, span: Span) -> Result<MirType, LoweringError> {
    match base {
        BaseType::Scalar(spmd_ast::ScalarType::Bool) => Ok(MirType::Mask { lanes }),
        BaseType::Scalar(s) => Ok(MirType::Vector { elem: *s, lanes }),
        BaseType::Array { elem, len } => Ok(MirType::array(varying_type(elem, lanes, span)?, *len)),
        BaseType::Ptr(_) => Err(LoweringError::invalid("varying pointers are not supported", span)),
    }
}
