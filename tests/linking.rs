//! Import resolution, instance allocation, element/data segments, and the
//! start function (§4.6).

use wasm_runtime::prelude::*;

#[test]
fn importing_a_global_from_another_instance() {
    let engine = Engine::default();
    let mut store = Store::new(&engine);

    let producer = Module {
        globals: vec![Global {
            ty: GlobalType { value_type: ValueType::I32, mutable: true },
            init: vec![Instruction::I32Const(10), Instruction::End],
        }],
        exports: vec![Export { name: "g".to_string(), desc: ExportDesc::Global(0) }],
        ..Module::default()
    };
    store.add_module("producer", &producer, &Imports::new()).unwrap();

    let mut imports = Imports::new();
    imports.define_instance("producer", store.module_instance("producer").unwrap());

    let consumer = Module {
        types: vec![FuncType::new(vec![], vec![ValueType::I32])],
        imports: vec![Import {
            module: "producer".to_string(),
            name: "g".to_string(),
            desc: ImportDesc::Global(GlobalType { value_type: ValueType::I32, mutable: true }),
        }],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::GlobalGet(0), Instruction::I32Const(5), Instruction::I32Add, Instruction::End],
            },
        }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    };
    store.add_module("consumer", &consumer, &imports).unwrap();

    let addr = store.get_function("consumer", "run").unwrap();
    assert_eq!(store.invoke(addr, vec![]).unwrap(), vec![Value::I32(15)]);
}

#[test]
fn start_function_runs_during_instantiation() {
    let module = Module {
        types: vec![FuncType::new(vec![], vec![])],
        globals: vec![Global {
            ty: GlobalType { value_type: ValueType::I32, mutable: true },
            init: vec![Instruction::I32Const(0), Instruction::End],
        }],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::I32Const(99), Instruction::GlobalSet(0), Instruction::End],
            },
        }],
        start: Some(0),
        exports: vec![Export { name: "g".to_string(), desc: ExportDesc::Global(0) }],
        ..Module::default()
    };

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.add_module("m", &module, &Imports::new()).unwrap();
    assert_eq!(store.get_global("m", "g").unwrap(), Value::I32(99));
}

#[test]
fn element_segment_populates_the_table_for_call_indirect() {
    let ty = FuncType::new(vec![ValueType::I32], vec![ValueType::I32]);
    let module = Module {
        types: vec![ty],
        tables: vec![TableType { limits: Limits::new(1, None) }],
        functions: vec![
            Function {
                type_index: 0,
                body: FunctionBody {
                    locals: vec![],
                    instructions: vec![Instruction::LocalGet(0), Instruction::I32Const(2), Instruction::I32Mul, Instruction::End],
                },
            },
            Function {
                type_index: 0,
                body: FunctionBody {
                    locals: vec![],
                    instructions: vec![
                        Instruction::LocalGet(0),
                        Instruction::I32Const(0),
                        Instruction::CallIndirect(0),
                        Instruction::End,
                    ],
                },
            },
        ],
        elements: vec![Element { table_index: 0, offset: vec![Instruction::I32Const(0), Instruction::End], init: vec![0] }],
        exports: vec![Export { name: "call_double".to_string(), desc: ExportDesc::Function(1) }],
        ..Module::default()
    };

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.add_module("m", &module, &Imports::new()).unwrap();
    let addr = store.get_function("m", "call_double").unwrap();
    assert_eq!(store.invoke(addr, vec![Value::I32(21)]).unwrap(), vec![Value::I32(42)]);
}

#[test]
fn data_segment_initializes_memory() {
    let module = Module {
        memories: vec![MemoryType { limits: Limits::new(1, None) }],
        data: vec![Data { memory_index: 0, offset: vec![Instruction::I32Const(0), Instruction::End], bytes: vec![1, 2, 3, 4] }],
        exports: vec![Export { name: "mem".to_string(), desc: ExportDesc::Memory(0) }],
        ..Module::default()
    };

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.add_module("m", &module, &Imports::new()).unwrap();
    assert_eq!(store.read_memory("m", "mem", 0, 4).unwrap(), &[1, 2, 3, 4]);
}

#[test]
fn missing_import_is_reported_before_anything_is_allocated() {
    let module = Module {
        types: vec![FuncType::new(vec![], vec![])],
        imports: vec![Import { module: "x".to_string(), name: "y".to_string(), desc: ImportDesc::Function(0) }],
        ..Module::default()
    };

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let err = store.add_module("bad", &module, &Imports::new()).unwrap_err();
    assert!(matches!(err, EngineError::Link(LinkError::MissingImport { .. })));
}

#[test]
fn element_segment_overflow_is_rejected() {
    let module = Module {
        tables: vec![TableType { limits: Limits::new(1, None) }],
        types: vec![FuncType::new(vec![], vec![])],
        functions: vec![Function { type_index: 0, body: FunctionBody { locals: vec![], instructions: vec![Instruction::End] } }],
        elements: vec![Element { table_index: 0, offset: vec![Instruction::I32Const(0), Instruction::End], init: vec![0, 0] }],
        ..Module::default()
    };

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let err = store.add_module("m", &module, &Imports::new()).unwrap_err();
    assert!(matches!(err, EngineError::Link(LinkError::ElementSegmentOverflow { .. })));
}
