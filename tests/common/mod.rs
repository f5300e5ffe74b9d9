//! Shared scaffolding for assembling a [`Module`] directly from the `ast`
//! types and running it, bypassing the out-of-scope text/validation front
//! end the way every black-box scenario in §8 does.

use wasm_runtime::prelude::*;

/// A module with a single locally-defined function, no imports, no memory.
pub fn single_function_module(
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    locals: Vec<ValueType>,
    instructions: Vec<Instruction>,
) -> Module {
    let ty = FuncType::new(params, results);
    Module {
        types: vec![ty],
        functions: vec![Function { type_index: 0, body: FunctionBody { locals, instructions } }],
        exports: vec![Export { name: "run".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    }
}

/// A module exporting a single page of linear memory under the name `mem`,
/// in addition to whatever function is given.
pub fn module_with_memory(
    params: Vec<ValueType>,
    results: Vec<ValueType>,
    locals: Vec<ValueType>,
    instructions: Vec<Instruction>,
    min_pages: u32,
    max_pages: Option<u32>,
) -> Module {
    let mut module = single_function_module(params, results, locals, instructions);
    module.memories.push(MemoryType { limits: Limits::new(min_pages, max_pages) });
    module.exports.push(Export { name: "mem".to_string(), desc: ExportDesc::Memory(0) });
    module
}

/// Instantiate `module` under `name` with no imports and return the `Store`
/// plus `Engine` it was built against.
pub fn instantiate(name: &str, module: &Module) -> (Engine, Store) {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.add_module(name, module, &Imports::new()).expect("instantiation should not fail");
    (engine, store)
}

/// Instantiate a single-function module under `"m"` and invoke its `run`
/// export with `args`.
pub fn run_single(module: &Module, args: Vec<Value>) -> Result<Vec<Value>, Trap> {
    let (_engine, mut store) = instantiate("m", module);
    let addr = store.get_function("m", "run").expect("run export must exist");
    store.invoke(addr, args)
}
