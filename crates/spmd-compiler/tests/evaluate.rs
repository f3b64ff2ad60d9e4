// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lower small programs and run them on the reference evaluator.

use spmd_ast::build::*;
use spmd_ast::{BaseType, BinOp, Expr, FnDecl, Program, ScalarType, Type};
use spmd_compiler::{compile, Compilation};
use spmd_interp::{Interpreter, Value};
use spmd_mir::MirStmt;

fn lowered(decls: Vec<FnDecl>) -> Compilation {
    let compilation = compile(&Program { decls: decls.into_iter().map(fn_decl).collect() });
    assert!(compilation.is_ok(), "{:?}", compilation.failures);
    compilation
}

fn vi32() -> Type {
    Type::varying(ScalarType::I32)
}

fn ui32() -> Type {
    Type::uniform(ScalarType::I32)
}

fn ptr(elem: ScalarType) -> Type {
    Type::Uniform(BaseType::Ptr(Box::new(BaseType::Scalar(elem))))
}

fn x() -> Expr {
    ident("x", vi32())
}

fn ints(v: &Value) -> Vec<i64> {
    v.lanes().unwrap().into_iter().map(|s| s.as_int().unwrap()).collect()
}

fn buffer_ints(v: &Value) -> Vec<i64> {
    v.snapshot().unwrap().iter().map(|e| e.as_int().unwrap()).collect()
}

// =================================================================
// Branch masks
// =================================================================

/// `r = 0; if x > 0 { r = 1 } else { r = 2 }; return r`
fn pick() -> FnDecl {
    func(
        "pick",
        vec![param("x", vi32())],
        vi32(),
        vec![
            let_("r", vi32(), i32_lit(0)),
            if_varying(
                compare(BinOp::Gt, x(), i32_lit(0)),
                vec![assign(ident("r", vi32()), i32_lit(1))],
                vec![assign(ident("r", vi32()), i32_lit(2))],
            ),
            ret(Some(ident("r", vi32()))),
        ],
    )
}

#[test]
fn every_active_lane_takes_exactly_one_arm() {
    let compilation = lowered(vec![pick()]);
    let mut interp = Interpreter::new(&compilation.functions);
    let input = [3, -1, 7, 0];

    for bits in 0u32..16 {
        let mask: Vec<bool> = (0..4).map(|lane| bits >> lane & 1 == 1).collect();
        let out = interp
            .call("pick", vec![Value::mask(mask.clone()), Value::ints(input)])
            .unwrap();
        let expected: Vec<i64> = mask
            .iter()
            .zip(input)
            .map(|(&active, v)| match (active, v > 0) {
                (false, _) => 0,
                (true, true) => 1,
                (true, false) => 2,
            })
            .collect();
        assert_eq!(ints(&out), expected, "mask {mask:?}");
    }
}

/// Cases `1|2 => 1`, `2|3 => 2`, default `3`; every arm also bumps
/// `hits[x]`, so a lane that ran two arms shows up as a 2.
fn route() -> FnDecl {
    let hits = || ident("hits", ptr(ScalarType::I32));
    let r = || ident("r", vi32());
    let arm = |value: i64| {
        vec![
            assign(r(), i32_lit(value)),
            assign(
                index(hits(), x(), vi32()),
                binary(BinOp::Add, index(hits(), x(), vi32()), i32_lit(1), vi32()),
            ),
        ]
    };
    func(
        "route",
        vec![param("x", vi32()), param("hits", ptr(ScalarType::I32))],
        vi32(),
        vec![
            let_("r", vi32(), i32_lit(0)),
            switch(x(), vec![case(vec![1, 2], arm(1)), case(vec![2, 3], arm(2))], arm(3)),
            ret(Some(r())),
        ],
    )
}

#[test]
fn every_active_lane_takes_exactly_one_switch_arm() {
    let compilation = lowered(vec![route()]);
    let mut interp = Interpreter::new(&compilation.functions);
    let input = [1, 2, 3, 4];

    for bits in 0u32..16 {
        let mask: Vec<bool> = (0..4).map(|lane| bits >> lane & 1 == 1).collect();
        let hits = Value::buffer(vec![Value::int(0); 5]);
        let out = interp
            .call("route", vec![Value::mask(mask.clone()), Value::ints(input), hits.clone()])
            .unwrap();

        let expected: Vec<i64> = mask
            .iter()
            .zip(input)
            .map(|(&active, v)| match (active, v) {
                (false, _) => 0,
                (true, 1 | 2) => 1,
                (true, 3) => 2,
                (true, _) => 3,
            })
            .collect();
        assert_eq!(ints(&out), expected, "mask {mask:?}");

        let mut expected_hits = vec![0; 5];
        for (&active, v) in mask.iter().zip(input) {
            expected_hits[v as usize] = i64::from(active);
        }
        assert_eq!(buffer_ints(&hits), expected_hits, "mask {mask:?}");
    }
}

#[test]
fn branch_writes_merge_inside_a_loop() {
    let i = || ident("i", vi32());
    let kernel = func(
        "kernel",
        vec![param("out", ptr(ScalarType::I32))],
        Type::Void,
        vec![spmd_for(
            "i",
            i32_lit(0),
            i32_lit(8),
            vec![
                let_("v", vi32(), i()),
                if_varying(
                    compare(BinOp::Lt, i(), i32_lit(3)),
                    vec![assign(ident("v", vi32()), i32_lit(100))],
                    vec![],
                ),
                assign(index(ident("out", ptr(ScalarType::I32)), i(), vi32()), ident("v", vi32())),
            ],
        )],
    );
    let compilation = lowered(vec![kernel]);
    let mut interp = Interpreter::new(&compilation.functions);
    let out = Value::buffer(vec![Value::int(0); 8]);
    interp.call("kernel", vec![out.clone()]).unwrap();
    assert_eq!(buffer_ints(&out), [100, 100, 100, 3, 4, 5, 6, 7]);
}

/// `for i in 0..4 { if i > threshold { poke(p) } }`
fn poke_above(name: &str, threshold: i64) -> FnDecl {
    let p = || ident("p", ptr(ScalarType::I32));
    func(
        name,
        vec![param("p", ptr(ScalarType::I32))],
        Type::Void,
        vec![spmd_for(
            "i",
            i32_lit(0),
            i32_lit(4),
            vec![if_varying(
                compare(BinOp::Gt, ident("i", vi32()), i32_lit(threshold)),
                vec![expr_stmt(call("poke", vec![p()], Type::Void))],
                vec![],
            )],
        )],
    )
}

#[test]
fn ordinary_call_is_skipped_when_no_lane_is_active() {
    let p = || ident("p", ptr(ScalarType::I32));
    let poke = func(
        "poke",
        vec![param("p", ptr(ScalarType::I32))],
        Type::Void,
        vec![assign(index(p(), i32_lit(0), ui32()), i32_lit(7))],
    );
    let compilation = lowered(vec![poke, poke_above("never", 100), poke_above("sometimes", 1)]);
    let mut interp = Interpreter::new(&compilation.functions);

    let cell = Value::buffer(vec![Value::int(0)]);
    interp.call("never", vec![cell.clone()]).unwrap();
    assert_eq!(buffer_ints(&cell), [0]);

    interp.call("sometimes", vec![cell.clone()]).unwrap();
    assert_eq!(buffer_ints(&cell), [7]);
}

// =================================================================
// Reductions
// =================================================================

fn reducer(name: &str, builtin: &str, arg: Expr, ret_ty: Type) -> FnDecl {
    func(name, vec![param("x", vi32())], ret_ty.clone(), vec![ret(Some(call(builtin, vec![arg], ret_ty)))])
}

#[test]
fn reductions_over_no_lanes_give_identities() {
    let ub = Type::uniform(ScalarType::Bool);
    let positive = || compare(BinOp::Gt, x(), i32_lit(0));
    let compilation = lowered(vec![
        reducer("sum", "reduce.Add", x(), ui32()),
        reducer("largest", "reduce.Max", x(), ui32()),
        reducer("any", "reduce.Any", positive(), ub.clone()),
        reducer("all", "reduce.All", positive(), ub),
        reducer("count", "reduce.Count", positive(), ui32()),
    ]);
    let mut interp = Interpreter::new(&compilation.functions);
    let mut run = |name: &str, mask: [bool; 4]| {
        interp.call(name, vec![Value::mask(mask), Value::ints([5, 6, 7, 8])]).unwrap()
    };

    let none = [false; 4];
    assert_eq!(run("sum", none), Value::int(0));
    assert_eq!(run("largest", none), Value::int(i64::from(i32::MIN)));
    assert_eq!(run("any", none), Value::bool(false));
    assert_eq!(run("all", none), Value::bool(true));
    assert_eq!(run("count", none), Value::int(0));

    let some = [true, false, true, false];
    assert_eq!(run("sum", some), Value::int(12));
    assert_eq!(run("largest", some), Value::int(7));
    assert_eq!(run("count", some), Value::int(2));
}

#[test]
fn constrained_reduction_folds_only_while_some_lane_runs() {
    let cv = Type::constrained(ScalarType::I32, 8);
    let total = func(
        "total",
        vec![param("v", cv.clone())],
        ui32(),
        vec![ret(Some(call("reduce.Add", vec![ident("v", cv)], ui32())))],
    );
    let compilation = lowered(vec![total]);
    let mut interp = Interpreter::new(&compilation.functions);
    let mut run = |mask: [bool; 8]| interp.call("total", vec![Value::mask(mask), Value::ints(1..=8)]).unwrap();

    assert_eq!(run([false; 8]), Value::int(0));
    let mut one = [false; 8];
    one[3] = true;
    assert_eq!(run(one), Value::int(36));
}

// =================================================================
// Tail iterations
// =================================================================

#[test]
fn last_iteration_runs_remaining_lanes_only() {
    let i = || ident("i", vi32());
    let k = || ident("k", ui32());
    let kernel = func(
        "kernel",
        vec![param("out", ptr(ScalarType::I32)), param("active", ptr(ScalarType::I32))],
        Type::Void,
        vec![
            let_("k", ui32(), i32_lit(0)),
            spmd_for(
                "i",
                i32_lit(0),
                i32_lit(10),
                vec![
                    assign(
                        index(ident("active", ptr(ScalarType::I32)), k(), ui32()),
                        call("reduce.Count", vec![compare(BinOp::Lt, i(), i32_lit(100))], ui32()),
                    ),
                    assign(index(ident("out", ptr(ScalarType::I32)), i(), vi32()), i()),
                    assign(ident("k", ui32()), binary(BinOp::Add, k(), i32_lit(1), ui32())),
                ],
            ),
        ],
    );
    let compilation = lowered(vec![kernel]);
    let descriptor = &compilation.function("kernel").unwrap().loops[0];
    assert!(descriptor.needs_tail_mask);

    let mut interp = Interpreter::new(&compilation.functions);
    let out = Value::buffer(vec![Value::int(-1); 10]);
    let active = Value::buffer(vec![Value::int(0); 3]);
    interp.call("kernel", vec![out.clone(), active.clone()]).unwrap();

    assert_eq!(buffer_ints(&active), [4, 4, 2]);
    assert_eq!(buffer_ints(&out), (0..10).collect::<Vec<_>>());
}

#[test]
fn spmd_call_in_tail_iteration_stays_in_bounds() {
    let i = || ident("i", vi32());
    let twice = func(
        "twice",
        vec![param("x", vi32())],
        vi32(),
        vec![ret(Some(binary(BinOp::Add, x(), x(), vi32())))],
    );
    let kernel = func(
        "kernel",
        vec![param("out", ptr(ScalarType::I32))],
        Type::Void,
        vec![spmd_for(
            "i",
            i32_lit(0),
            i32_lit(6),
            vec![assign(
                index(ident("out", ptr(ScalarType::I32)), i(), vi32()),
                call("twice", vec![i()], vi32()),
            )],
        )],
    );
    let compilation = lowered(vec![twice, kernel]);
    let mut interp = Interpreter::new(&compilation.functions);
    let out = Value::buffer(vec![Value::int(0); 6]);
    interp.call("kernel", vec![out.clone()]).unwrap();
    assert_eq!(buffer_ints(&out), [0, 2, 4, 6, 8, 10]);
}

#[test]
fn narrow_index_loop_stops_at_the_bound() {
    let vu8 = Type::varying(ScalarType::U8);
    let uu8 = Type::uniform(ScalarType::U8);
    let i = || ident("i", vu8.clone());
    let kernel = func(
        "fill",
        vec![param("out", ptr(ScalarType::U8)), param("lo", uu8.clone()), param("hi", uu8.clone())],
        Type::Void,
        vec![spmd_for(
            "i",
            ident("lo", uu8.clone()),
            ident("hi", uu8.clone()),
            vec![assign(index(ident("out", ptr(ScalarType::U8)), i(), vu8.clone()), i())],
        )],
    );
    let compilation = lowered(vec![kernel]);
    let mut interp = Interpreter::new(&compilation.functions).with_step_limit(100_000);

    let out = Value::buffer(vec![Value::int(0); 255]);
    interp.call("fill", vec![out.clone(), Value::int(0), Value::int(250)]).unwrap();
    let expected: Vec<i64> = (0..255).map(|v| if v < 250 { v } else { 0 }).collect();
    assert_eq!(buffer_ints(&out), expected);

    // Lanes past 255 wrap to small indices and must stay inactive.
    let out = Value::buffer(vec![Value::int(0); 255]);
    interp.call("fill", vec![out.clone(), Value::int(250), Value::int(255)]).unwrap();
    let expected: Vec<i64> = (0..255).map(|v| if v >= 250 { v } else { 0 }).collect();
    assert_eq!(buffer_ints(&out), expected);
}

// =================================================================
// Decomposition
// =================================================================

#[test]
fn constrained_value_round_trips_through_lane_groups() {
    let vu32 = Type::varying(ScalarType::U32);
    let cv = Type::constrained(ScalarType::U32, 8);
    let twice = func(
        "twice_u",
        vec![param("x", vu32.clone())],
        vu32.clone(),
        vec![ret(Some(binary(BinOp::Add, ident("x", vu32.clone()), ident("x", vu32.clone()), vu32)))],
    );
    let double_all = func(
        "double_all",
        vec![param("v", cv.clone())],
        cv.clone(),
        vec![ret(Some(call("twice_u", vec![ident("v", cv.clone())], cv)))],
    );
    let compilation = lowered(vec![twice, double_all]);

    let caller = compilation.function("double_all").unwrap();
    let calls = caller
        .statements()
        .filter(|s| matches!(s, MirStmt::Call { func, .. } if func.name == "twice_u"))
        .count();
    assert_eq!(calls, 2);

    let mut interp = Interpreter::new(&compilation.functions);
    let out = interp
        .call("double_all", vec![Value::mask([true; 8]), Value::ints(1..=8)])
        .unwrap();
    assert_eq!(ints(&out), [2, 4, 6, 8, 10, 12, 14, 16]);
}
