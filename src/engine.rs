//! Engine configuration and the embedder-facing `Store` API (§4.9, §6).
//!
//! The teacher constructs one `Interpreter<S>` directly against its
//! storage backend (`interpreter/constructors.rs`); this crate splits that
//! into an [`Engine`] (immutable, shareable resource limits) and a
//! [`Store`] (mutable allocation arena + named module table) so one
//! `Engine` can back many independent `Store`s, the way a real embedding
//! host runs many sandboxed instances under one set of limits.

use std::rc::Rc;

use crate::ast::{FuncType, Module};
use crate::host::HostFunction;
use crate::linker::{self, Imports};
use crate::store::{ExportValue, FuncAddr, ModuleInstance, Store};
use crate::trap::{EngineError, Trap};
use crate::value::Value;

/// Resource ceilings every `Store` created from an [`Engine`] enforces,
/// regardless of what an individual module declares. Prevents a malicious
/// or buggy module from exhausting the embedder's process — e.g. an
/// unbounded `loop` of `call`s (`max_call_depth`) or a `memory.grow` that
/// would allocate gigabytes (`max_memory_pages`).
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Maximum live activation frames; exceeding it traps with
    /// [`Trap::CallStackExhausted`] rather than overflowing the native
    /// stack.
    pub max_call_depth: u32,
    /// Maximum memory size in 64 KiB pages, independent of any module's
    /// declared `max`.
    pub max_memory_pages: u32,
    /// Maximum table length the linker will allocate.
    pub max_table_elements: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self { max_call_depth: 10_000, max_memory_pages: 1 << 16, max_table_elements: 10_000_000 }
    }
}

/// Shared, immutable configuration for one or more [`Store`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    pub limits: EngineLimits,
}

impl Engine {
    pub fn new(limits: EngineLimits) -> Self {
        Self { limits }
    }
}

impl Store {
    /// Register a host function, returning the address the embedder hands
    /// to an [`Imports`] builder so a module's import can resolve to it.
    pub fn register_host_function(&mut self, ty: FuncType, func: impl HostFunction + 'static) -> FuncAddr {
        self.allocate_function_host(ty, Rc::new(func))
    }

    /// Instantiate `module` under `name`, resolving its imports against
    /// `imports`. The instance's exports become reachable via
    /// `get_function`/`get_global`/`read_memory`/`write_memory` using
    /// `name` as the module component of the lookup.
    pub fn add_module(&mut self, name: impl Into<String>, module: &Module, imports: &Imports) -> Result<(), EngineError> {
        let max_call_depth = self.limits.max_call_depth;
        let instance = linker::instantiate(self, module, imports, max_call_depth)?;
        self.modules.insert(name.into(), instance);
        Ok(())
    }

    /// The export directory of a previously added module, for building an
    /// [`Imports`] set that links one module's exports into another's
    /// instantiation.
    pub fn module_instance(&self, name: &str) -> Option<&Rc<ModuleInstance>> {
        self.modules.get(name)
    }

    pub fn get_function(&self, module: &str, export_name: &str) -> Result<FuncAddr, EngineError> {
        match self.resolve_export(module, export_name)? {
            ExportValue::Function(addr) => Ok(addr),
            _ => Err(EngineError::ExportNotAFunction(export_name.to_string())),
        }
    }

    /// Call an exported function by address, type-checking arguments
    /// against its declared signature before running.
    pub fn invoke(&mut self, addr: FuncAddr, args: Vec<Value>) -> Result<Vec<Value>, Trap> {
        let params = &self.function(addr).ty().params;
        if params.len() != args.len() || params.iter().zip(&args).any(|(ty, v)| *ty != v.ty()) {
            return Err(Trap::TypeMismatch);
        }
        let max_call_depth = self.limits.max_call_depth;
        crate::interp::Executor::new(self, max_call_depth).invoke(addr, args)
    }

    pub fn get_global(&self, module: &str, export_name: &str) -> Result<Value, EngineError> {
        match self.resolve_export(module, export_name)? {
            ExportValue::Global(addr) => Ok(self.global(addr).value),
            _ => Err(EngineError::NoSuchExport(export_name.to_string())),
        }
    }

    pub fn set_global(&mut self, module: &str, export_name: &str, value: Value) -> Result<(), EngineError> {
        match self.resolve_export(module, export_name)? {
            ExportValue::Global(addr) => self.global_set(addr, value).map_err(EngineError::from),
            _ => Err(EngineError::NoSuchExport(export_name.to_string())),
        }
    }

    pub fn read_memory(&self, module: &str, export_name: &str, offset: u32, len: u32) -> Result<&[u8], EngineError> {
        match self.resolve_export(module, export_name)? {
            ExportValue::Memory(addr) => {
                let mem = self.memory(addr);
                let start = offset as usize;
                let end = start.checked_add(len as usize).ok_or(EngineError::Trap(Trap::OutOfBoundsMemoryAccess))?;
                mem.data.get(start..end).ok_or(EngineError::Trap(Trap::OutOfBoundsMemoryAccess))
            }
            _ => Err(EngineError::NoSuchExport(export_name.to_string())),
        }
    }

    pub fn write_memory(&mut self, module: &str, export_name: &str, offset: u32, bytes: &[u8]) -> Result<(), EngineError> {
        match self.resolve_export(module, export_name)? {
            ExportValue::Memory(addr) => {
                let mem = self.memory_mut(addr);
                let start = offset as usize;
                let end =
                    start.checked_add(bytes.len()).ok_or(EngineError::Trap(Trap::OutOfBoundsMemoryAccess))?;
                let slice = mem.data.get_mut(start..end).ok_or(EngineError::Trap(Trap::OutOfBoundsMemoryAccess))?;
                slice.copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(EngineError::NoSuchExport(export_name.to_string())),
        }
    }

    fn resolve_export(&self, module: &str, export_name: &str) -> Result<ExportValue, EngineError> {
        let instance =
            self.modules.get(module).ok_or_else(|| EngineError::NoSuchExport(export_name.to_string()))?;
        instance.find_export(export_name).ok_or_else(|| EngineError::NoSuchExport(export_name.to_string()))
    }
}
