//! Linear memory load/store, `memory.size`/`memory.grow`, and the
//! out-of-bounds trap (§8 scenario 4).

mod common;

use wasm_runtime::prelude::*;

#[test]
fn store_then_load_round_trips() {
    use Instruction as I;
    let body = vec![
        I::I32Const(0),
        I::I32Const(1234),
        I::I32Store(MemArg { align: 2, offset: 0 }),
        I::I32Const(0),
        I::I32Load(MemArg { align: 2, offset: 0 }),
        I::End,
    ];
    let module = common::module_with_memory(vec![], vec![ValueType::I32], vec![], body, 1, None);
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(1234)]);
}

#[test]
fn narrow_stores_only_touch_their_own_bytes() {
    use Instruction as I;
    let body = vec![
        I::I32Const(0),
        I::I32Const(-1), // all bytes 0xff
        I::I32Store(MemArg { align: 2, offset: 0 }),
        I::I32Const(0),
        I::I32Const(0x42),
        I::I32Store8(MemArg { align: 0, offset: 0 }),
        I::I32Const(0),
        I::I32Load(MemArg { align: 2, offset: 0 }),
        I::End,
    ];
    let module = common::module_with_memory(vec![], vec![ValueType::I32], vec![], body, 1, None);
    let result = common::run_single(&module, vec![]).unwrap();
    // low byte overwritten to 0x42, upper three bytes still 0xff.
    assert_eq!(result, vec![Value::I32(-0x100 + 0x42)]);
}

#[test]
fn out_of_bounds_load_traps() {
    use Instruction as I;
    let body = vec![
        I::I32Const(65_536 - 2), // one page, so the last valid byte is 65535
        I::I32Load(MemArg { align: 2, offset: 0 }),
        I::End,
    ];
    let module = common::module_with_memory(vec![], vec![ValueType::I32], vec![], body, 1, None);
    assert_eq!(common::run_single(&module, vec![]), Err(Trap::OutOfBoundsMemoryAccess));
}

#[test]
fn memory_size_reports_pages() {
    use Instruction as I;
    let body = vec![I::MemorySize, I::End];
    let module = common::module_with_memory(vec![], vec![ValueType::I32], vec![], body, 3, None);
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(3)]);
}

#[test]
fn memory_grow_returns_previous_size_and_extends() {
    use Instruction as I;
    let ty = FuncType::new(vec![], vec![ValueType::I32]);
    let module = Module {
        types: vec![ty.clone(), ty],
        memories: vec![MemoryType { limits: Limits::new(1, None) }],
        functions: vec![
            Function {
                type_index: 0,
                body: FunctionBody { locals: vec![], instructions: vec![I::I32Const(2), I::MemoryGrow, I::End] },
            },
            Function { type_index: 1, body: FunctionBody { locals: vec![], instructions: vec![I::MemorySize, I::End] } },
        ],
        exports: vec![
            Export { name: "grow".to_string(), desc: ExportDesc::Function(0) },
            Export { name: "size".to_string(), desc: ExportDesc::Function(1) },
        ],
        ..Module::default()
    };

    let (_engine, mut store) = common::instantiate("m", &module);
    let grow = store.get_function("m", "grow").unwrap();
    let size = store.get_function("m", "size").unwrap();
    assert_eq!(store.invoke(grow, vec![]).unwrap(), vec![Value::I32(1)]);
    assert_eq!(store.invoke(size, vec![]).unwrap(), vec![Value::I32(3)]);
}

#[test]
fn memory_grow_past_the_declared_max_fails() {
    use Instruction as I;
    let body = vec![I::I32Const(5), I::MemoryGrow, I::End];
    let module = common::module_with_memory(vec![], vec![ValueType::I32], vec![], body, 1, Some(2));
    let result = common::run_single(&module, vec![]).unwrap();
    assert_eq!(result, vec![Value::I32(-1)]);
}
