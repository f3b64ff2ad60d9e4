// SPDX-License-Identifier: (MIT OR Apache-2.0)

use spmd_ast::ScalarType;
use spmd_mir::{
    BlockBuilder, FunctionRef, MirFunction, MirOperand, MirRValue, MirStmt, MirTerminator, MirType,
};
use spmd_types::SignatureKind;

use crate::{Interpreter, RuntimeError, Value};

fn i32x4() -> MirType {
    MirType::Vector { elem: ScalarType::I32, lanes: 4 }
}

fn i32_ptr() -> MirType {
    MirType::Ptr(Box::new(MirType::Scalar(ScalarType::I32)))
}

fn spmd(name: &str, ret: MirType) -> BlockBuilder {
    BlockBuilder::new(name.to_string(), SignatureKind::Spmd { mask_lanes: 4 }, Some(4), ret)
}

/// `out[idx] = v` under the mask.
fn scatter() -> MirFunction {
    let mut b = spmd("scatter", MirType::Void);
    let mask = b.add_param("__mask".into(), MirType::Mask { lanes: 4 });
    let out = b.add_param("out".into(), i32_ptr());
    let idx = b.add_param("idx".into(), i32x4());
    let v = b.add_param("v".into(), i32x4());
    b.push_stmt(MirStmt::MaskedStore {
        base: out,
        index: MirOperand::Local(idx),
        value: MirOperand::Local(v),
        mask: MirOperand::Local(mask),
    });
    b.terminate(MirTerminator::Return { value: None });
    b.finish()
}

/// `return buf[idx]` under the mask.
fn gather() -> MirFunction {
    let mut b = spmd("gather", i32x4());
    let mask = b.add_param("__mask".into(), MirType::Mask { lanes: 4 });
    let buf = b.add_param("buf".into(), i32_ptr());
    let idx = b.add_param("idx".into(), i32x4());
    let r = b.emit(
        i32x4(),
        MirRValue::Load {
            base: MirOperand::Local(buf),
            index: MirOperand::Local(idx),
            mask: Some(MirOperand::Local(mask)),
        },
    );
    b.terminate(MirTerminator::Return { value: Some(MirOperand::Local(r)) });
    b.finish()
}

fn zeros(n: usize) -> Value {
    Value::buffer(vec![Value::int(0); n])
}

#[test]
fn masked_store_skips_inactive_lanes() {
    let f = scatter();
    let mut interp = Interpreter::new([&f]);
    let out = zeros(4);
    interp
        .call(
            "scatter",
            vec![
                Value::mask([true, false, true, false]),
                out.clone(),
                Value::ints([0, 1, 2, 3]),
                Value::ints([10, 11, 12, 13]),
            ],
        )
        .unwrap();
    assert_eq!(
        out.snapshot().unwrap(),
        vec![Value::int(10), Value::int(0), Value::int(12), Value::int(0)]
    );
}

#[test]
fn inactive_lanes_are_not_bounds_checked() {
    let f = scatter();
    let mut interp = Interpreter::new([&f]);
    let args = |mask: [bool; 4], out: &Value| {
        vec![Value::mask(mask), out.clone(), Value::ints([0, 1, 7, 9]), Value::ints([10, 11, 12, 13])]
    };

    let out = zeros(2);
    interp.call("scatter", args([true, true, false, false], &out)).unwrap();
    assert_eq!(out.snapshot().unwrap(), vec![Value::int(10), Value::int(11)]);

    let err = interp.call("scatter", args([true, true, true, false], &out)).unwrap_err();
    assert!(matches!(err, RuntimeError::IndexOutOfBounds { index: 7, len: 2 }));
}

#[test]
fn scatter_writes_in_lane_order() {
    let f = scatter();
    let mut interp = Interpreter::new([&f]);
    let out = zeros(2);
    interp
        .call(
            "scatter",
            vec![Value::mask([true; 4]), out.clone(), Value::ints([1; 4]), Value::ints([10, 11, 12, 13])],
        )
        .unwrap();
    assert_eq!(out.snapshot().unwrap()[1], Value::int(13));
}

#[test]
fn gather_reads_zero_in_inactive_lanes() {
    let f = gather();
    let mut interp = Interpreter::new([&f]);
    let buf = Value::buffer([Value::int(5), Value::int(6)]);
    let r = interp
        .call("gather", vec![Value::mask([true, false, true, false]), buf, Value::ints([1, 99, 0, -4])])
        .unwrap();
    assert_eq!(r, Value::ints([6, 0, 5, 0]));
}

#[test]
fn step_limit_stops_runaway_loops() {
    let mut b = BlockBuilder::new("spin".into(), SignatureKind::Ordinary, None, MirType::Void);
    let head = b.create_block();
    b.terminate(MirTerminator::Goto { target: head });
    b.switch_to_block(head);
    b.terminate(MirTerminator::Goto { target: head });
    let f = b.finish();

    let mut interp = Interpreter::new([&f]).with_step_limit(100);
    assert!(matches!(interp.call("spin", vec![]), Err(RuntimeError::StepLimit(100))));
}

#[test]
fn extern_calls_reach_the_host() {
    let mut b = BlockBuilder::new("main".into(), SignatureKind::Ordinary, None, MirType::Scalar(ScalarType::I32));
    let r = b.alloc_temp(MirType::Scalar(ScalarType::I32));
    b.push_stmt(MirStmt::Call {
        dst: Some(r),
        func: FunctionRef { name: "host".into(), takes_mask: false, is_extern: true },
        args: vec![MirOperand::int(20)],
    });
    b.terminate(MirTerminator::Return { value: Some(MirOperand::Local(r)) });
    let f = b.finish();

    let mut interp = Interpreter::new([&f]);
    interp.register_extern("host", |args| Ok(Value::int(args[0].as_int().unwrap_or(0) + 22)));
    assert_eq!(interp.call("main", vec![]).unwrap(), Value::int(42));
}

#[test]
fn reading_unassigned_local_fails() {
    let mut b = BlockBuilder::new("bad".into(), SignatureKind::Ordinary, None, MirType::Scalar(ScalarType::I32));
    let r = b.alloc_temp(MirType::Scalar(ScalarType::I32));
    b.terminate(MirTerminator::Return { value: Some(MirOperand::Local(r)) });
    let f = b.finish();

    let mut interp = Interpreter::new([&f]);
    assert!(matches!(interp.call("bad", vec![]), Err(RuntimeError::UninitializedLocal { .. })));
    assert!(matches!(interp.call("missing", vec![]), Err(RuntimeError::UndefinedFunction(_))));
}

#[test]
fn integer_results_wrap_to_their_type() {
    let mut b = BlockBuilder::new("narrow".into(), SignatureKind::Ordinary, None, MirType::Scalar(ScalarType::U8));
    let r = b.emit(
        MirType::Scalar(ScalarType::U8),
        MirRValue::BinaryOp {
            op: spmd_mir::BinOp::Add,
            left: MirOperand::int(250),
            right: MirOperand::int(10),
        },
    );
    b.terminate(MirTerminator::Return { value: Some(MirOperand::Local(r)) });
    let f = b.finish();
    assert_eq!(Interpreter::new([&f]).call("narrow", vec![]).unwrap(), Value::int(4));
}
