// SPDX-License-Identifier: (MIT OR Apache-2.0)

use spmd_ast::build::*;
use spmd_ast::{BaseType, BinOp as AstBinOp, Expr, FnDecl, Program, ScalarType, Stmt, Type};
use spmd_types::{AssignmentError, ReduceKind, SignatureTable, TargetConfig};

use super::*;
use crate::{MirFunction, MirRValue, MirStmt, MirTerminator, MirType};

fn lower_in(decls: Vec<FnDecl>, name: &str) -> Result<MirFunction, LoweringError> {
    let program = Program { decls: decls.into_iter().map(fn_decl).collect() };
    let config = TargetConfig::default();
    let (signatures, _) = SignatureTable::collect(&program, &config);
    let ctx = LoweringContext { signatures: &signatures, config: &config };
    let decl = program.functions().find(|f| f.name == name).unwrap();
    lower_function(decl, &ctx)
}

fn lower_one(decl: FnDecl) -> Result<MirFunction, LoweringError> {
    let name = decl.name.clone();
    lower_in(vec![decl], &name)
}

fn vi32() -> Type {
    Type::varying(ScalarType::I32)
}

fn ui32() -> Type {
    Type::uniform(ScalarType::I32)
}

fn i32_ptr() -> Type {
    Type::Uniform(BaseType::Ptr(Box::new(BaseType::Scalar(ScalarType::I32))))
}

/// `for i in 0..end (data parallel) { body }` inside `fn kernel(out: *i32)`.
fn kernel(end: i64, body: Vec<Stmt>) -> FnDecl {
    func(
        "kernel",
        vec![param("out", i32_ptr())],
        Type::Void,
        vec![spmd_for("i", i32_lit(0), i32_lit(end), body)],
    )
}

fn rvalues(f: &MirFunction) -> Vec<&MirRValue> {
    f.statements()
        .filter_map(|s| match s {
            MirStmt::Assign { rvalue, .. } => Some(rvalue),
            _ => None,
        })
        .collect()
}

fn calls_to<'f>(f: &'f MirFunction, name: &str) -> Vec<&'f MirStmt> {
    f.statements()
        .filter(|s| matches!(s, MirStmt::Call { func, .. } if func.name == name))
        .collect()
}

fn store_at_i() -> Stmt {
    assign(index(ident("out", i32_ptr()), ident("i", vi32()), vi32()), ident("i", vi32()))
}

fn i_below(n: i64) -> Expr {
    compare(AstBinOp::Lt, ident("i", vi32()), i32_lit(n))
}

// =================================================================
// Function shape
// =================================================================

#[test]
fn spmd_function_takes_mask_first() {
    let f = lower_one(func(
        "scale",
        vec![param("x", Type::varying(ScalarType::F32))],
        Type::varying(ScalarType::F32),
        vec![ret(Some(ident("x", Type::varying(ScalarType::F32))))],
    ))
    .unwrap();
    assert_eq!(f.lanes, Some(4));
    let mask = f.mask_param().unwrap();
    assert_eq!(mask.name.as_deref(), Some("__mask"));
    assert_eq!(mask.ty, MirType::Mask { lanes: 4 });
    assert_eq!(f.params[1].ty, MirType::Vector { elem: ScalarType::F32, lanes: 4 });
}

#[test]
fn scalar_function_has_no_lanes() {
    let f = lower_one(func(
        "add",
        vec![param("a", ui32()), param("b", ui32())],
        ui32(),
        vec![ret(Some(binary(AstBinOp::Add, ident("a", ui32()), ident("b", ui32()), ui32())))],
    ))
    .unwrap();
    assert_eq!(f.lanes, None);
    assert!(f.mask_param().is_none());
    assert!(f.loops.is_empty());
}

// =================================================================
// Linearization
// =================================================================

#[test]
fn varying_if_never_branches_on_lane_data() {
    let f = lower_one(kernel(
        16,
        vec![
            let_("x", vi32(), i32_lit(0)),
            if_varying(
                i_below(8),
                vec![assign(ident("x", vi32()), i32_lit(1))],
                vec![assign(ident("x", vi32()), i32_lit(2))],
            ),
            store_at_i(),
        ],
    ))
    .unwrap();

    for block in &f.blocks {
        if let MirTerminator::Branch { cond, .. } = &block.terminator {
            let local = cond.as_local().unwrap();
            assert_eq!(f.local(local).unwrap().ty, MirType::bool());
        }
    }
    let selects = rvalues(&f).into_iter().filter(|r| matches!(r, MirRValue::Select { .. })).count();
    assert_eq!(selects, 2);
}

#[test]
fn both_arms_are_emitted() {
    let f = lower_one(kernel(
        16,
        vec![if_varying(i_below(8), vec![store_at_i()], vec![store_at_i()])],
    ))
    .unwrap();
    let stores = f.statements().filter(|s| matches!(s, MirStmt::MaskedStore { .. })).count();
    assert_eq!(stores, 2);
}

#[test]
fn uniform_predicate_is_never_masked() {
    let ubool = Type::uniform(ScalarType::Bool);
    let decl = func(
        "kernel",
        vec![param("out", i32_ptr()), param("flag", ubool.clone())],
        Type::Void,
        vec![spmd_for(
            "i",
            i32_lit(0),
            i32_lit(16),
            vec![if_varying(ident("flag", ubool), vec![store_at_i(), break_()], vec![])],
        )],
    );
    // `break` is only legal if the predicate was not treated as divergent.
    let f = lower_one(decl).unwrap();
    let and_nots = rvalues(&f)
        .into_iter()
        .filter(|r| matches!(r, MirRValue::BinaryOp { op: crate::BinOp::AndNot, .. }))
        .count();
    assert_eq!(and_nots, 0);
}

#[test]
fn varying_switch_builds_disjoint_case_masks() {
    let f = lower_one(kernel(
        16,
        vec![switch(
            binary(AstBinOp::Rem, ident("i", vi32()), i32_lit(3), vi32()),
            vec![case(vec![0], vec![store_at_i()]), case(vec![1, 2], vec![])],
            vec![],
        )],
    ))
    .unwrap();
    assert!(f.blocks.iter().all(|b| !matches!(b.terminator, MirTerminator::Switch { .. })));
    let and_nots = rvalues(&f)
        .into_iter()
        .filter(|r| matches!(r, MirRValue::BinaryOp { op: crate::BinOp::AndNot, .. }))
        .count();
    // two cases plus the default
    assert_eq!(and_nots, 3);
}

#[test]
fn uniform_switch_stays_a_branch() {
    let f = lower_one(func(
        "pick",
        vec![param("k", ui32())],
        Type::Void,
        vec![switch(ident("k", ui32()), vec![case(vec![1], vec![])], vec![])],
    ))
    .unwrap();
    assert!(f.blocks.iter().any(|b| matches!(b.terminator, MirTerminator::Switch { .. })));
}

#[test]
fn uniform_write_under_varying_if_is_rejected() {
    let err = lower_one(func(
        "count",
        vec![param("out", i32_ptr())],
        Type::Void,
        vec![
            let_("n", ui32(), i32_lit(0)),
            spmd_for(
                "i",
                i32_lit(0),
                i32_lit(8),
                vec![if_varying(i_below(4), vec![assign(ident("n", ui32()), i32_lit(1))], vec![])],
            ),
        ],
    ))
    .unwrap_err();
    assert!(matches!(
        err,
        LoweringError::Assignment(AssignmentError::UniformWriteUnderVaryingControl { ref name, .. })
            if name == "n"
    ));
}

// =================================================================
// Loops
// =================================================================

#[test]
fn loop_descriptor_records_tail() {
    let f = lower_one(kernel(10, vec![store_at_i()])).unwrap();
    assert_eq!(f.loops.len(), 1);
    let l = &f.loops[0];
    assert_eq!(l.lanes, 4);
    assert_eq!(l.trip_count, Some(10));
    assert!(l.needs_tail_mask);
    assert!(f.statements().any(|s| matches!(s, MirStmt::MaskedStore { .. })));
}

#[test]
fn exact_multiple_needs_no_tail() {
    let f = lower_one(kernel(16, vec![store_at_i()])).unwrap();
    assert!(!f.loops[0].needs_tail_mask);
}

#[test]
fn extreme_literal_bounds_fall_back_to_a_tail_mask() {
    let ui64 = Type::uniform(ScalarType::I64);
    let decl = func(
        "kernel",
        vec![],
        Type::Void,
        vec![spmd_for("i", int(i64::MIN, ui64.clone()), int(1, ui64), vec![])],
    );
    let f = lower_one(decl).unwrap();
    assert_eq!(f.loops[0].trip_count, None);
    assert!(f.loops[0].needs_tail_mask);
}

#[test]
fn narrow_index_counts_in_i64() {
    let uu8 = Type::uniform(ScalarType::U8);
    let decl = func(
        "kernel",
        vec![],
        Type::Void,
        vec![spmd_for("i", int(0, uu8.clone()), int(250, uu8), vec![])],
    );
    let f = lower_one(decl).unwrap();
    assert_eq!(f.local_named("i.base").unwrap().ty, MirType::Scalar(ScalarType::I64));
    assert_eq!(f.loops[0].index_elem, ScalarType::U8);
}

#[test]
fn lane_hint_must_match() {
    let decl = func(
        "kernel",
        vec![param("out", i32_ptr())],
        Type::Void,
        vec![for_loop(
            "i",
            i32_lit(0),
            i32_lit(16),
            vec![store_at_i()],
            spmd_ast::LoopMode::DataParallel { lanes: Some(8) },
        )],
    );
    let err = lower_one(decl).unwrap_err();
    assert!(matches!(err, LoweringError::LaneCountMismatch { expected: 4, found: 8, .. }));
}

#[test]
fn varying_continue_is_legal() {
    let f = lower_one(kernel(
        16,
        vec![if_varying(i_below(4), vec![continue_()], vec![]), store_at_i()],
    ))
    .unwrap();
    assert!(f.local_named("__continue").is_some());
}

#[test]
fn break_under_varying_condition_is_rejected() {
    let err = lower_one(kernel(16, vec![if_varying(i_below(4), vec![break_()], vec![])])).unwrap_err();
    assert!(matches!(
        err,
        LoweringError::ControlFlow(ControlFlowError::VaryingExitForbidden {
            exit: ExitKind::Break,
            cause: ExitCause::VaryingCondition,
            ..
        })
    ));
}

#[test]
fn break_after_varying_continue_is_rejected() {
    let err = lower_one(kernel(
        16,
        vec![if_varying(i_below(4), vec![continue_()], vec![]), break_()],
    ))
    .unwrap_err();
    assert!(matches!(
        err,
        LoweringError::ControlFlow(ControlFlowError::VaryingExitForbidden {
            cause: ExitCause::MaskAltered,
            ..
        })
    ));
}

#[test]
fn break_in_inner_sequential_loop_is_judged_alone() {
    let f = lower_one(kernel(
        16,
        vec![
            if_varying(i_below(4), vec![continue_()], vec![]),
            seq_for("j", i32_lit(0), i32_lit(3), vec![break_()]),
        ],
    ));
    assert!(f.is_ok());
}

#[test]
fn nested_data_parallel_loop_is_rejected() {
    let inner = spmd_for("j", i32_lit(0), i32_lit(4), vec![]).at(spmd_ast::Span::new(40, 60));
    let err = lower_one(kernel(16, vec![inner])).unwrap_err();
    match err {
        LoweringError::ControlFlow(ControlFlowError::Nesting(NestingError::SpmdLoopNesting {
            span,
            ..
        })) => assert_eq!(span, spmd_ast::Span::new(40, 60)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn spmd_function_cannot_contain_data_parallel_loop() {
    let err = lower_one(func(
        "inner",
        vec![param("x", vi32())],
        Type::Void,
        vec![spmd_for("i", i32_lit(0), i32_lit(4), vec![])],
    ))
    .unwrap_err();
    assert!(matches!(
        err,
        LoweringError::ControlFlow(ControlFlowError::Nesting(
            NestingError::SpmdFunctionContainsLoop { .. }
        ))
    ));
}

// =================================================================
// Calls
// =================================================================

fn twice() -> FnDecl {
    func(
        "twice",
        vec![param("x", vi32())],
        vi32(),
        vec![ret(Some(binary(AstBinOp::Add, ident("x", vi32()), ident("x", vi32()), vi32())))],
    )
}

#[test]
fn spmd_call_passes_iteration_mask() {
    let caller = kernel(
        10,
        vec![let_("y", vi32(), call("twice", vec![ident("i", vi32())], vi32()))],
    );
    let f = lower_in(vec![twice(), caller], "kernel").unwrap();
    let calls = calls_to(&f, "twice");
    assert_eq!(calls.len(), 1);
    let MirStmt::Call { args, func, .. } = calls[0] else { unreachable!() };
    assert!(func.takes_mask);
    assert_eq!(args.len(), 2);
    let mask = args[0].as_local().unwrap();
    assert_eq!(f.local(mask).unwrap().ty, MirType::Mask { lanes: 4 });
}

#[test]
fn spmd_call_outside_any_mask_passes_all_ones() {
    let caller = func(
        "main",
        vec![],
        Type::Void,
        vec![expr_stmt(call("twice", vec![i32_lit(3)], vi32()))],
    );
    let f = lower_in(vec![twice(), caller], "main").unwrap();
    assert!(rvalues(&f)
        .iter()
        .any(|r| matches!(r, MirRValue::MaskConst { lanes: 4, value: true })));
    assert!(rvalues(&f).iter().any(|r| matches!(r, MirRValue::Splat { lanes: 4, .. })));
}

#[test]
fn wider_caller_splits_call_into_groups() {
    let vi16 = Type::varying(ScalarType::I16);
    let short = |v| int(v, Type::uniform(ScalarType::I16));
    let caller = func(
        "widen",
        vec![param("out", i32_ptr())],
        Type::Void,
        vec![spmd_for(
            "i",
            short(0),
            short(16),
            vec![let_(
                "y",
                vi32(),
                call("twice", vec![cast(ident("i", vi16), vi32())], vi32()),
            )],
        )],
    );
    let f = lower_in(vec![twice(), caller], "widen").unwrap();
    assert_eq!(f.lanes, Some(8));
    assert_eq!(calls_to(&f, "twice").len(), 2);
    assert!(rvalues(&f).iter().any(|r| matches!(r, MirRValue::Compose { lanes: 8, .. })));
    let group_masks = rvalues(&f)
        .into_iter()
        .filter(|r| matches!(r, MirRValue::GroupMask { total: 8, lanes: 4, .. }))
        .count();
    assert_eq!(group_masks, 2);
}

#[test]
fn constrained_argument_is_decomposed() {
    let sink = func("sink", vec![param("x", Type::varying(ScalarType::U32))], Type::Void, vec![]);
    let cv = Type::constrained(ScalarType::U32, 8);
    let caller = func(
        "feed",
        vec![param("v", cv.clone())],
        Type::Void,
        vec![expr_stmt(call("sink", vec![ident("v", cv)], Type::Void))],
    );
    let f = lower_in(vec![sink, caller], "feed").unwrap();
    assert_eq!(f.mask_param().unwrap().ty, MirType::Mask { lanes: 8 });
    assert_eq!(calls_to(&f, "sink").len(), 2);
    let slices = rvalues(&f).into_iter().filter(|r| matches!(r, MirRValue::Slice { lanes: 4, .. })).count();
    // one value slice and one mask slice per group
    assert_eq!(slices, 4);
}

#[test]
fn unknown_function_and_arity() {
    let err = lower_one(func("f", vec![], Type::Void, vec![expr_stmt(call("nope", vec![], Type::Void))]))
        .unwrap_err();
    assert!(matches!(err, LoweringError::UnknownFunction { ref name, .. } if name == "nope"));

    let caller = func("g", vec![], Type::Void, vec![expr_stmt(call("twice", vec![], vi32()))]);
    let err = lower_in(vec![twice(), caller], "g").unwrap_err();
    assert!(matches!(err, LoweringError::ArityMismatch { expected: 1, found: 0, .. }));
}

// =================================================================
// Builtins
// =================================================================

#[test]
fn lane_index_needs_lane_context() {
    let err = lower_one(func(
        "f",
        vec![],
        Type::Void,
        vec![let_("x", vi32(), call("lanes.Index", vec![], vi32()))],
    ))
    .unwrap_err();
    assert!(matches!(err, LoweringError::Context(ContextError::NoLaneContext { .. })));

    let ok = lower_one(kernel(8, vec![let_("x", vi32(), call("lanes.Index", vec![], vi32()))]));
    assert!(ok.is_ok());
}

#[test]
fn reduction_uses_execution_mask() {
    let f = lower_one(kernel(
        10,
        vec![let_("s", ui32(), call("reduce.Add", vec![ident("i", vi32())], ui32()))],
    ))
    .unwrap();
    assert!(rvalues(&f).iter().any(|r| matches!(
        r,
        MirRValue::Reduce { op: ReduceKind::Add, mask: Some(_), .. }
    )));
}

#[test]
fn predicate_reduction_rejects_numbers() {
    let ub = Type::uniform(ScalarType::Bool);
    let err = lower_one(kernel(
        8,
        vec![let_("b", ub.clone(), call("reduce.Any", vec![ident("i", vi32())], ub))],
    ))
    .unwrap_err();
    assert!(matches!(err, LoweringError::InvalidConstruct { .. }));
}

#[test]
fn from_constrained_splits_into_groups() {
    let cv = Type::constrained(ScalarType::U32, 6);
    let f = lower_one(func(
        "split",
        vec![param("x", Type::varying(ScalarType::U32)), param("v", cv.clone())],
        Type::Void,
        vec![let_tuple(
            vec![
                ("parts", Type::Varying(array_of(ScalarType::U32, 2))),
                ("masks", Type::Varying(array_of(ScalarType::Bool, 2))),
            ],
            call("lanes.FromConstrained", vec![ident("v", cv)], Type::Void),
        )],
    ))
    .unwrap();
    assert_eq!(
        f.local_named("parts").unwrap().ty,
        MirType::array(MirType::Vector { elem: ScalarType::U32, lanes: 4 }, 2)
    );
    assert_eq!(f.local_named("masks").unwrap().ty, MirType::array(MirType::Mask { lanes: 4 }, 2));
    let group_masks = rvalues(&f)
        .into_iter()
        .filter(|r| matches!(r, MirRValue::GroupMask { total: 6, .. }))
        .count();
    assert_eq!(group_masks, 2);
}

#[test]
fn from_constrained_checks_group_count() {
    let cv = Type::constrained(ScalarType::U32, 6);
    let err = lower_one(func(
        "split",
        vec![param("x", Type::varying(ScalarType::U32)), param("v", cv.clone())],
        Type::Void,
        vec![let_tuple(
            vec![
                ("parts", Type::Varying(array_of(ScalarType::U32, 3))),
                ("masks", Type::Varying(array_of(ScalarType::Bool, 3))),
            ],
            call("lanes.FromConstrained", vec![ident("v", cv)], Type::Void),
        )],
    ))
    .unwrap_err();
    assert!(matches!(err, LoweringError::Assignment(AssignmentError::BaseMismatch { .. })));
}
