// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Signature classification.
//!
//! A function is SPMD iff one of its parameters is varying. Every signature
//! is classified once, before any body is lowered, so call sites can thread
//! masks without looking at callee bodies.

use indexmap::IndexMap;
use spmd_ast::{DeclKind, Param, Program, Span, Type};

use crate::{Builtin, LaneResolver, TargetConfig, VisibilityError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Ordinary,
    /// Lowered with a leading `__mask: mask<mask_lanes>` parameter.
    Spmd { mask_lanes: u32 },
}

impl SignatureKind {
    pub fn is_spmd(self) -> bool {
        matches!(self, SignatureKind::Spmd { .. })
    }

    pub fn mask_lanes(self) -> Option<u32> {
        match self {
            SignatureKind::Spmd { mask_lanes } => Some(mask_lanes),
            SignatureKind::Ordinary => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnSignature {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub kind: SignatureKind,
    pub is_extern: bool,
    pub span: Span,
}

/// Classify one function. The signature is returned alongside any
/// visibility violation so callers can keep resolving calls to it.
pub fn classify(
    name: &str,
    params: &[Param],
    ret: &Type,
    is_pub: bool,
    span: Span,
    config: &TargetConfig,
) -> (FnSignature, Option<VisibilityError>) {
    let param_tys: Vec<Type> = params.iter().map(|p| p.ty.clone()).collect();
    let kind = match LaneResolver::new(config).spmd_lanes(&param_tys) {
        Some(mask_lanes) => SignatureKind::Spmd { mask_lanes },
        None => SignatureKind::Ordinary,
    };

    let error = (kind.is_spmd() && is_pub && Builtin::from_name(name).is_none())
        .then(|| VisibilityError::PublicSpmdFunction { name: name.to_string(), span });

    let sig = FnSignature {
        name: name.to_string(),
        params: param_tys,
        ret: ret.clone(),
        kind,
        is_extern: false,
        span,
    };
    (sig, error)
}

/// Signatures of every function in a program, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    sigs: IndexMap<String, FnSignature>,
}

impl SignatureTable {
    pub fn collect(program: &Program, config: &TargetConfig) -> (Self, Vec<VisibilityError>) {
        let mut table = SignatureTable::default();
        let mut errors = Vec::new();
        for decl in &program.decls {
            let (sig, error) = match &decl.kind {
                DeclKind::Fn(f) => classify(&f.name, &f.params, &f.ret, f.is_pub, f.span, config),
                DeclKind::Extern(e) => {
                    let (sig, error) =
                        classify(&e.name, &e.params, &e.ret, e.is_pub, e.span, config);
                    (FnSignature { is_extern: true, ..sig }, error)
                }
            };
            log::trace!("classified `{}` as {:?}", sig.name, sig.kind);
            errors.extend(error);
            table.insert(sig);
        }
        (table, errors)
    }

    pub fn insert(&mut self, sig: FnSignature) {
        self.sigs.insert(sig.name.clone(), sig);
    }

    pub fn get(&self, name: &str) -> Option<&FnSignature> {
        self.sigs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FnSignature> {
        self.sigs.values()
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_ast::build::*;
    use spmd_ast::ScalarType;

    #[test]
    fn varying_param_makes_spmd() {
        let cfg = TargetConfig::default();
        let (sig, err) = classify(
            "scale",
            &[param("x", Type::varying(ScalarType::F32)), param("k", Type::uniform(ScalarType::F32))],
            &Type::varying(ScalarType::F32),
            false,
            Span::default(),
            &cfg,
        );
        assert_eq!(sig.kind, SignatureKind::Spmd { mask_lanes: 4 });
        assert!(err.is_none());
    }

    #[test]
    fn uniform_params_stay_ordinary() {
        let cfg = TargetConfig::default();
        let (sig, err) = classify(
            "sum",
            &[param("n", Type::uniform(ScalarType::I32))],
            &Type::uniform(ScalarType::I32),
            true,
            Span::default(),
            &cfg,
        );
        assert_eq!(sig.kind, SignatureKind::Ordinary);
        assert!(err.is_none());
    }

    #[test]
    fn public_spmd_rejected_unless_builtin() {
        let cfg = TargetConfig::default();
        let params = [param("v", Type::varying(ScalarType::I32))];
        let (_, err) = classify(
            "Scale",
            &params,
            &Type::Void,
            true,
            Span::new(4, 9),
            &cfg,
        );
        assert_eq!(
            err,
            Some(VisibilityError::PublicSpmdFunction { name: "Scale".into(), span: Span::new(4, 9) })
        );
        let (_, err) = classify("reduce.Add", &params, &Type::Void, true, Span::default(), &cfg);
        assert!(err.is_none());
    }

    #[test]
    fn table_keeps_declaration_order() {
        let cfg = TargetConfig::default();
        let program = Program {
            decls: vec![
                fn_decl(func("b", vec![], Type::Void, vec![])),
                extern_decl("ext", vec![param("v", Type::varying(ScalarType::U8))], Type::Void),
                fn_decl(pub_func("a", vec![param("v", Type::varying(ScalarType::I32))], Type::Void, vec![])),
            ],
        };
        let (table, errors) = SignatureTable::collect(&program, &cfg);
        let names: Vec<_> = table.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b", "ext", "a"]);
        assert!(table.get("ext").unwrap().is_extern);
        assert_eq!(table.get("ext").unwrap().kind, SignatureKind::Spmd { mask_lanes: 16 });
        assert_eq!(errors.len(), 1);
    }
}
