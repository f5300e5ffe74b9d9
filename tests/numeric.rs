//! i32/i64/f32/f64 arithmetic, comparisons, conversions, and traps (§8
//! scenario 1: two-argument add; plus the numeric edge cases in §4.5.1).

mod common;

use wasm_runtime::prelude::*;

#[test]
fn add_two_i32_arguments() {
    let module = common::single_function_module(
        vec![ValueType::I32, ValueType::I32],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::LocalGet(0), Instruction::LocalGet(1), Instruction::I32Add, Instruction::End],
    );
    let result = common::run_single(&module, vec![Value::I32(2), Value::I32(3)]).unwrap();
    assert_eq!(result, vec![Value::I32(5)]);
}

#[test]
fn i32_add_wraps_on_overflow() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::I32Const(i32::MAX), Instruction::I32Const(1), Instruction::I32Add, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(i32::MIN)]);
}

#[test]
fn i32_div_s_by_zero_traps() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::I32Const(1), Instruction::I32Const(0), Instruction::I32DivS, Instruction::End],
    );
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::IntegerDivideByZero));
}

#[test]
fn i32_div_s_min_by_minus_one_overflows() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::I32Const(i32::MIN), Instruction::I32Const(-1), Instruction::I32DivS, Instruction::End],
    );
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::IntegerOverflow));
}

#[test]
fn i32_div_u_treats_operands_as_unsigned() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::I32Const(-1), Instruction::I32Const(2), Instruction::I32DivU, Instruction::End],
    );
    // -1 as u32 is u32::MAX; u32::MAX / 2 == u32::MAX / 2 truncated.
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32((u32::MAX / 2) as i32)]);
}

#[test]
fn f32_min_propagates_nan() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::F32],
        vec![],
        vec![Instruction::F32Const(1.0), Instruction::F32Const(f32::NAN), Instruction::F32Min, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert!(result[0].as_f32().unwrap().is_nan());
}

#[test]
fn f32_min_distinguishes_negative_zero() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::F32],
        vec![],
        vec![Instruction::F32Const(0.0), Instruction::F32Const(-0.0), Instruction::F32Min, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert!(result[0].as_f32().unwrap().is_sign_negative());
}

#[test]
fn i32_trunc_f32_s_of_nan_traps() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::F32Const(f32::NAN), Instruction::I32TruncF32S, Instruction::End],
    );
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::InvalidConversionToInteger));
}

#[test]
fn i32_trunc_f32_s_out_of_range_traps_as_invalid_conversion() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::F32Const(1e10), Instruction::I32TruncF32S, Instruction::End],
    );
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::InvalidConversionToInteger));
}

#[test]
fn i32_reinterpret_f32_preserves_bit_pattern() {
    let bits: i32 = 0x3f80_0000; // 1.0f32
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![Instruction::F32Const(1.0), Instruction::I32ReinterpretF32, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(bits)]);
}

#[test]
fn f32_nearest_ties_to_even_and_keeps_the_operand_sign_at_zero() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::F32],
        vec![],
        vec![Instruction::F32Const(-0.5), Instruction::F32Nearest, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    let rounded = result[0].as_f32().unwrap();
    assert_eq!(rounded, 0.0);
    assert!(rounded.is_sign_negative());
}

#[test]
fn f32_nearest_ties_to_even_for_a_positive_half() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::F32],
        vec![],
        vec![Instruction::F32Const(2.5), Instruction::F32Nearest, Instruction::End],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::F32(2.0)]);
}

#[test]
fn local_tee_leaves_the_value_on_the_stack_and_writes_the_local() {
    // local.tee writes local #1 without popping, so the value it read from
    // the argument is still on the stack to be added to the local it wrote.
    let module = common::single_function_module(
        vec![ValueType::I32],
        vec![ValueType::I32],
        vec![ValueType::I32],
        vec![Instruction::LocalGet(0), Instruction::LocalTee(1), Instruction::LocalGet(1), Instruction::I32Add, Instruction::End],
    );
    let result = common::run_single(&module, vec![Value::I32(4)]).unwrap();
    assert_eq!(result, vec![Value::I32(8)]);
}
