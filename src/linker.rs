//! Import resolution and module instance allocation (component C6, §4.6).
//!
//! The six-step protocol — resolve imports, pre-allocate function
//! addresses, allocate tables/memories/globals, evaluate global
//! initializers, process element and data segments, run the start
//! function — follows §4.6 directly. Failure at any step aborts the whole
//! instantiation without a partially-visible instance, matching the
//! teacher's instantiate-or-fail pattern (`interpreter/initialization.rs`).
//! `tracing` spans mirror the teacher's `log.rs` usage: instrumentation
//! only, never part of the control flow.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{ExportDesc, ImportDesc, Instruction, Module};
use crate::store::{ExportValue, FuncAddr, GlobalAddr, MemAddr, ModuleInstance, Store, TableAddr};
use crate::trap::LinkError;
use crate::value::Value;

/// The embedder's registry of names a module's imports may resolve
/// against: either addresses from a previously instantiated module's
/// exports, or host functions/globals/memories/tables allocated directly
/// into the `Store`.
#[derive(Default)]
pub struct Imports {
    functions: HashMap<(String, String), FuncAddr>,
    tables: HashMap<(String, String), TableAddr>,
    memories: HashMap<(String, String), MemAddr>,
    globals: HashMap<(String, String), GlobalAddr>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_function(&mut self, module: &str, name: &str, addr: FuncAddr) {
        self.functions.insert((module.to_string(), name.to_string()), addr);
    }

    pub fn define_table(&mut self, module: &str, name: &str, addr: TableAddr) {
        self.tables.insert((module.to_string(), name.to_string()), addr);
    }

    pub fn define_memory(&mut self, module: &str, name: &str, addr: MemAddr) {
        self.memories.insert((module.to_string(), name.to_string()), addr);
    }

    pub fn define_global(&mut self, module: &str, name: &str, addr: GlobalAddr) {
        self.globals.insert((module.to_string(), name.to_string()), addr);
    }

    /// Import every export of an already-instantiated module under its own
    /// name, the common case for linking one module's exports into
    /// another's imports.
    pub fn define_instance(&mut self, module_name: &str, instance: &ModuleInstance) {
        for (name, value) in &instance.exports {
            match value {
                ExportValue::Function(addr) => self.define_function(module_name, name, *addr),
                ExportValue::Table(addr) => self.define_table(module_name, name, *addr),
                ExportValue::Memory(addr) => self.define_memory(module_name, name, *addr),
                ExportValue::Global(addr) => self.define_global(module_name, name, *addr),
            }
        }
    }

    fn key(module: &str, name: &str) -> (String, String) {
        (module.to_string(), name.to_string())
    }
}

fn validate_limits(min: u32, max: Option<u32>) -> Result<(), (u32, u32)> {
    if let Some(max) = max {
        if min > max {
            return Err((min, max));
        }
    }
    Ok(())
}

/// Instantiate `module`, resolving its imports against `imports` and
/// allocating everything it defines into `store`. Runs the start function
/// (if any) as the final step; any trap during instantiation — including
/// inside the start function — aborts with no visible side effect beyond
/// what was already committed to `store` (matching the teacher: a failed
/// instantiation never returns a usable instance).
pub fn instantiate(
    store: &mut Store,
    module: &Module,
    imports: &Imports,
    max_call_depth: u32,
) -> Result<Rc<ModuleInstance>, LinkError> {
    tracing::info!(num_imports = module.imports.len(), "resolving imports");

    let mut func_addrs = Vec::new();
    let mut table_addrs = Vec::new();
    let mut mem_addrs = Vec::new();
    let mut global_addrs = Vec::new();

    for import in &module.imports {
        match &import.desc {
            ImportDesc::Function(type_idx) => {
                let addr = *imports
                    .functions
                    .get(&Imports::key(&import.module, &import.name))
                    .ok_or_else(|| missing(import))?;
                let expected = &module.types[*type_idx as usize];
                if store.function(addr).ty() != expected {
                    return Err(mismatch(import));
                }
                func_addrs.push(addr);
            }
            ImportDesc::Table(ty) => {
                let addr =
                    *imports.tables.get(&Imports::key(&import.module, &import.name)).ok_or_else(|| missing(import))?;
                let actual = store.table(addr);
                if (actual.elements.len() as u32) < ty.limits.min {
                    return Err(mismatch(import));
                }
                table_addrs.push(addr);
            }
            ImportDesc::Memory(ty) => {
                let addr = *imports
                    .memories
                    .get(&Imports::key(&import.module, &import.name))
                    .ok_or_else(|| missing(import))?;
                let actual = store.memory(addr);
                if actual.size_pages() < ty.limits.min {
                    return Err(mismatch(import));
                }
                mem_addrs.push(addr);
            }
            ImportDesc::Global(ty) => {
                let addr = *imports
                    .globals
                    .get(&Imports::key(&import.module, &import.name))
                    .ok_or_else(|| missing(import))?;
                let actual = store.global(addr);
                if actual.ty.value_type != ty.value_type || actual.ty.mutable != ty.mutable {
                    return Err(mismatch(import));
                }
                global_addrs.push(addr);
            }
        }
    }

    // Pre-allocate addresses for module-defined functions before the
    // module instance exists: each `FunctionInstance::Local` needs an
    // `Rc<ModuleInstance>` to execute against, and the `ModuleInstance`
    // needs these same addresses in `func_addrs` — the cycle is broken by
    // computing the addresses first (the `Store`'s function vector only
    // ever grows, so the index a function will land at is known before
    // it's pushed) and allocating the bodies afterwards.
    let base = store.functions.len();
    for i in 0..module.functions.len() {
        func_addrs.push(FuncAddr(base + i));
    }

    for t in &module.tables {
        validate_limits(t.limits.min, t.limits.max)
            .map_err(|(min, max)| LinkError::InvalidTableLimits { min, max })?;
        table_addrs.push(store.allocate_table(*t));
    }
    for m in &module.memories {
        validate_limits(m.limits.min, m.limits.max)
            .map_err(|(min, max)| LinkError::InvalidMemoryLimits { min, max })?;
        mem_addrs.push(store.allocate_memory(*m));
    }

    let imported_global_count = global_addrs.len();
    for g in &module.globals {
        let value = eval_const_expr(&g.init, store, &global_addrs[..imported_global_count])?;
        global_addrs.push(store.allocate_global(g.ty, value));
    }

    let exports = module
        .exports
        .iter()
        .map(|e| {
            let value = match e.desc {
                ExportDesc::Function(i) => ExportValue::Function(func_addrs[i as usize]),
                ExportDesc::Table(i) => ExportValue::Table(table_addrs[i as usize]),
                ExportDesc::Memory(i) => ExportValue::Memory(mem_addrs[i as usize]),
                ExportDesc::Global(i) => ExportValue::Global(global_addrs[i as usize]),
            };
            (e.name.clone(), value)
        })
        .collect();

    let instance = Rc::new(ModuleInstance {
        types: module.types.clone(),
        func_addrs,
        table_addrs,
        mem_addrs,
        global_addrs,
        exports,
    });

    for f in &module.functions {
        let ty = module.types[f.type_index as usize].clone();
        store.allocate_function_local(ty, Rc::clone(&instance), Rc::new(f.body.clone()));
    }
    debug_assert_eq!(store.functions.len(), base + module.functions.len());

    for elem in &module.elements {
        let table_addr = instance.table_addrs[elem.table_index as usize];
        let offset = eval_const_expr(&elem.offset, store, &instance.global_addrs)?
            .as_i32()
            .ok_or(LinkError::IndexOutOfRange { kind: "element-offset", index: 0 })? as u32;
        let resolved: Vec<FuncAddr> = elem.init.iter().map(|idx| instance.func_addrs[*idx as usize]).collect();
        let table = store.table_mut(table_addr);
        let end = offset as usize + resolved.len();
        if end > table.elements.len() {
            return Err(LinkError::ElementSegmentOverflow {
                table_index: elem.table_index,
                offset,
                len: table.elements.len() as u32,
            });
        }
        for (i, addr) in resolved.into_iter().enumerate() {
            table.elements[offset as usize + i] = Some(addr);
        }
    }

    for data in &module.data {
        let mem_addr = instance.mem_addrs[data.memory_index as usize];
        let offset = eval_const_expr(&data.offset, store, &instance.global_addrs)?
            .as_i32()
            .ok_or(LinkError::IndexOutOfRange { kind: "data-offset", index: 0 })? as u32;
        let mem = store.memory_mut(mem_addr);
        let end = offset as usize + data.bytes.len();
        if end > mem.data.len() {
            return Err(LinkError::DataSegmentOverflow {
                memory_index: data.memory_index,
                offset,
                len: mem.data.len() as u32,
            });
        }
        mem.data[offset as usize..end].copy_from_slice(&data.bytes);
    }

    if let Some(start_idx) = module.start {
        tracing::debug!(start_idx, "running start function");
        let addr = instance.func_addrs[start_idx as usize];
        let executor = crate::interp::Executor::new(store, max_call_depth);
        executor.invoke(addr, Vec::new()).map_err(|trap| {
            tracing::error!(%trap, "start function trapped");
            LinkError::StartFunctionTrapped(trap)
        })?;
    }

    tracing::info!("module instantiated");
    Ok(instance)
}

/// Evaluate a constant expression (global/element/data initializer):
/// `*.const` or `global.get` of an already-resolved (necessarily imported,
/// necessarily preceding) global, per §4.5.6's restricted grammar.
fn eval_const_expr(expr: &[Instruction], store: &Store, available_globals: &[GlobalAddr]) -> Result<Value, LinkError> {
    let mut stack = Vec::new();
    for instr in expr {
        match instr {
            Instruction::I32Const(v) => stack.push(Value::I32(*v)),
            Instruction::I64Const(v) => stack.push(Value::I64(*v)),
            Instruction::F32Const(v) => stack.push(Value::F32(*v)),
            Instruction::F64Const(v) => stack.push(Value::F64(*v)),
            Instruction::GlobalGet(idx) => {
                let addr = available_globals
                    .get(*idx as usize)
                    .ok_or(LinkError::IndexOutOfRange { kind: "const-expr-global", index: *idx })?;
                stack.push(store.global(*addr).value);
            }
            Instruction::End => break,
            _ => return Err(LinkError::IndexOutOfRange { kind: "const-expr-opcode", index: 0 }),
        }
    }
    stack.pop().ok_or(LinkError::IndexOutOfRange { kind: "const-expr-empty", index: 0 })
}

fn missing(import: &crate::ast::Import) -> LinkError {
    LinkError::MissingImport { module: import.module.clone(), name: import.name.clone() }
}

fn mismatch(import: &crate::ast::Import) -> LinkError {
    LinkError::ImportTypeMismatch { module: import.module.clone(), name: import.name.clone() }
}
