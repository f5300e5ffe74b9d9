//! Trapping conditions that aren't exercised elsewhere: `unreachable`, call
//! stack exhaustion, the two ways `call_indirect` can fail, and `select` on
//! mismatched operand types (§4.5.2, §4.5.6, §6).

mod common;

use wasm_runtime::prelude::*;

#[test]
fn select_with_mismatched_operand_types_traps() {
    // Built directly from `ast` types rather than through the binary
    // encoder, so nothing earlier caught this mismatch: `select` itself
    // must reject it.
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![
            Instruction::I32Const(1),
            Instruction::F32Const(2.0),
            Instruction::I32Const(1), // condition: pick the first operand
            Instruction::Select,
            Instruction::End,
        ],
    );
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::TypeMismatch));
}

#[test]
fn select_with_matching_operand_types_picks_by_condition() {
    let module = common::single_function_module(
        vec![],
        vec![ValueType::I32],
        vec![],
        vec![
            Instruction::I32Const(11),
            Instruction::I32Const(22),
            Instruction::I32Const(0), // condition: pick the second operand
            Instruction::Select,
            Instruction::End,
        ],
    );
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(22)]);
}

#[test]
fn unreachable_traps_immediately() {
    let module = common::single_function_module(vec![], vec![], vec![], vec![Instruction::Unreachable, Instruction::End]);
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::Unreachable));
}

#[test]
fn unbounded_recursion_exhausts_the_call_stack() {
    let ty = FuncType::new(vec![], vec![]);
    let module = Module {
        types: vec![ty],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody { locals: vec![], instructions: vec![Instruction::Call(0), Instruction::End] },
        }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    };

    let engine = Engine::new(EngineLimits { max_call_depth: 16, ..EngineLimits::default() });
    let mut store = Store::new(&engine);
    store.add_module("m", &module, &Imports::new()).unwrap();
    let addr = store.get_function("m", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![]), Err(Trap::CallStackExhausted));
}

#[test]
fn call_indirect_through_an_empty_table_slot_traps() {
    let ty = FuncType::new(vec![], vec![]);
    let module = Module {
        types: vec![ty],
        tables: vec![TableType { limits: Limits::new(1, None) }],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::I32Const(0), Instruction::CallIndirect(0), Instruction::End],
            },
        }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    };

    let (_engine, mut store) = common::instantiate("m", &module);
    let addr = store.get_function("m", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![]), Err(Trap::UninitializedElement));
}

#[test]
fn call_indirect_with_a_mismatched_signature_traps() {
    let caller_ty = FuncType::new(vec![], vec![]);
    let callee_ty = FuncType::new(vec![ValueType::I32], vec![ValueType::I32]);
    let module = Module {
        types: vec![caller_ty, callee_ty.clone()],
        tables: vec![TableType { limits: Limits::new(1, None) }],
        functions: vec![
            Function {
                type_index: 0,
                body: FunctionBody {
                    locals: vec![],
                    instructions: vec![Instruction::I32Const(0), Instruction::CallIndirect(0), Instruction::End],
                },
            },
            Function {
                type_index: 1,
                body: FunctionBody { locals: vec![], instructions: vec![Instruction::LocalGet(0), Instruction::End] },
            },
        ],
        elements: vec![Element { table_index: 0, offset: vec![Instruction::I32Const(0), Instruction::End], init: vec![1] }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    };

    let (_engine, mut store) = common::instantiate("m", &module);
    let addr = store.get_function("m", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![]), Err(Trap::IndirectCallTypeMismatch));
}

#[test]
fn out_of_range_table_index_traps() {
    let ty = FuncType::new(vec![], vec![]);
    let module = Module {
        types: vec![ty],
        tables: vec![TableType { limits: Limits::new(1, None) }],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::I32Const(5), Instruction::CallIndirect(0), Instruction::End],
            },
        }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    };

    let (_engine, mut store) = common::instantiate("m", &module);
    let addr = store.get_function("m", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![]), Err(Trap::OutOfBoundsTableAccess));
}
