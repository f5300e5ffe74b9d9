//! Host function registration and the `Caller` handle an embedder callback
//! receives (§4.7).

use std::cell::Cell;
use std::rc::Rc;

use wasm_runtime::prelude::*;

#[test]
fn a_wasm_module_can_call_a_registered_host_function() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);

    let add_ty = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    let host_addr = store.register_host_function(
        add_ty.clone(),
        HostFn(|_caller, args: &[Value]| {
            let a = args[0].as_i32().unwrap();
            let b = args[1].as_i32().unwrap();
            Ok(vec![Value::I32(a + b)])
        }),
    );

    let mut imports = Imports::new();
    imports.define_function("env", "add", host_addr);

    let module = Module {
        types: vec![add_ty],
        imports: vec![Import { module: "env".to_string(), name: "add".to_string(), desc: ImportDesc::Function(0) }],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![
                    Instruction::LocalGet(0),
                    Instruction::LocalGet(1),
                    Instruction::Call(0),
                    Instruction::End,
                ],
            },
        }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(1) }],
        ..Module::default()
    };
    store.add_module("m", &module, &imports).unwrap();

    let addr = store.get_function("m", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![Value::I32(10), Value::I32(32)]).unwrap(), vec![Value::I32(42)]);
}

#[test]
fn a_host_function_can_read_and_write_the_caller_instance_memory() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);

    let bump_ty = FuncType::new(vec![], vec![]);
    let host_addr = store.register_host_function(
        bump_ty.clone(),
        HostFn(|mut caller: Caller<'_>, _args: &[Value]| {
            let byte = caller.read_memory(0, 1)?[0];
            caller.write_memory(0, &[byte + 1])?;
            Ok(vec![])
        }),
    );

    let mut imports = Imports::new();
    imports.define_function("env", "bump", host_addr);

    let module = Module {
        types: vec![bump_ty],
        imports: vec![Import { module: "env".to_string(), name: "bump".to_string(), desc: ImportDesc::Function(0) }],
        memories: vec![MemoryType { limits: Limits::new(1, None) }],
        data: vec![Data { memory_index: 0, offset: vec![Instruction::I32Const(0), Instruction::End], bytes: vec![41] }],
        functions: vec![Function { type_index: 0, body: FunctionBody { locals: vec![], instructions: vec![Instruction::Call(0), Instruction::End] } }],
        exports: vec![
            Export { name: "run".to_string(), desc: ExportDesc::Function(1) },
            Export { name: "mem".to_string(), desc: ExportDesc::Memory(0) },
        ],
        ..Module::default()
    };
    store.add_module("m", &module, &imports).unwrap();

    let addr = store.get_function("m", "run").unwrap();
    store.invoke(addr, vec![]).unwrap();
    assert_eq!(store.read_memory("m", "mem", 0, 1).unwrap(), &[42]);
}

#[test]
fn a_host_function_can_read_and_set_the_caller_instance_globals() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);

    let seen = Rc::new(Cell::new(0));
    let seen_in_host = Rc::clone(&seen);

    let ty = FuncType::new(vec![], vec![]);
    let host_addr = store.register_host_function(
        ty.clone(),
        HostFn(move |mut caller: Caller<'_>, _args: &[Value]| {
            let current = caller.get_global(0)?.as_i32().unwrap();
            seen_in_host.set(current);
            caller.set_global(0, Value::I32(current * 2))?;
            Ok(vec![])
        }),
    );

    let mut imports = Imports::new();
    imports.define_function("env", "observe", host_addr);

    let module = Module {
        types: vec![ty],
        imports: vec![Import { module: "env".to_string(), name: "observe".to_string(), desc: ImportDesc::Function(0) }],
        globals: vec![Global { ty: GlobalType { value_type: ValueType::I32, mutable: true }, init: vec![Instruction::I32Const(21), Instruction::End] }],
        functions: vec![Function { type_index: 0, body: FunctionBody { locals: vec![], instructions: vec![Instruction::Call(0), Instruction::End] } }],
        exports: vec![
            Export { name: "run".to_string(), desc: ExportDesc::Function(1) },
            Export { name: "g".to_string(), desc: ExportDesc::Global(0) },
        ],
        ..Module::default()
    };
    store.add_module("m", &module, &imports).unwrap();

    let addr = store.get_function("m", "run").unwrap();
    store.invoke(addr, vec![]).unwrap();
    assert_eq!(seen.get(), 21);
    assert_eq!(store.get_global("m", "g").unwrap(), Value::I32(42));
}
