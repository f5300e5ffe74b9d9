//! The [`Store`]: parallel address spaces for functions, tables, memories,
//! and globals (component C3, §3/§4.3).
//!
//! Grounded on the teacher's `Interpreter<S>` (`src/interpreter.rs`), which
//! owns its registers/memory/frames directly rather than through an
//! external storage object — but *this* crate needs many independent module
//! instances sharing one runtime, so the teacher's single-VM ownership is
//! generalized into explicit opaque addresses indexing `Store`-owned
//! `Vec`s. A [`FunctionInstance`] never owns its [`ModuleInstance`]
//! directly by value: it holds an `Rc`, and the `ModuleInstance` only holds
//! back *addresses*, not instances, which is what breaks the ownership
//! cycle described in §9.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{FuncType, GlobalType, TableType};
use crate::engine::EngineLimits;
use crate::host::HostFunction;
use crate::trap::Trap;
use crate::value::Value;

macro_rules! addr_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

addr_newtype!(FuncAddr);
addr_newtype!(TableAddr);
addr_newtype!(MemAddr);
addr_newtype!(GlobalAddr);

/// One page is 64 KiB, per §3 (`MemoryType`/`Limits` are expressed in
/// pages).
pub const PAGE_SIZE: usize = 64 * 1024;

/// A resolved, allocated module: index tables into the `Store`'s address
/// spaces plus its export directory. Holds no `Rc` back to any
/// `FunctionInstance` — only addresses — so `FunctionInstance -> Rc<ModuleInstance>`
/// never cycles back.
#[derive(Debug)]
pub struct ModuleInstance {
    pub types: Vec<FuncType>,
    pub func_addrs: Vec<FuncAddr>,
    pub table_addrs: Vec<TableAddr>,
    pub mem_addrs: Vec<MemAddr>,
    pub global_addrs: Vec<GlobalAddr>,
    pub exports: Vec<(String, ExportValue)>,
}

impl ModuleInstance {
    pub fn find_export(&self, name: &str) -> Option<ExportValue> {
        self.exports.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportValue {
    Function(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

/// A function instance: either code defined by a Wasm module (closing over
/// its defining module instance for type/global/memory lookups during
/// execution) or a host function registered by the embedder.
pub enum FunctionInstance {
    Local { ty: FuncType, module: Rc<ModuleInstance>, code: Rc<crate::ast::FunctionBody> },
    Host { ty: FuncType, func: Rc<dyn HostFunction> },
}

impl FunctionInstance {
    pub fn ty(&self) -> &FuncType {
        match self {
            Self::Local { ty, .. } => ty,
            Self::Host { ty, .. } => ty,
        }
    }
}

pub struct TableInstance {
    pub elements: Vec<Option<FuncAddr>>,
    pub max: Option<u32>,
}

impl TableInstance {
    pub fn new(ty: TableType) -> Self {
        Self { elements: vec![None; ty.limits.min as usize], max: ty.limits.max }
    }
}

pub struct MemoryInstance {
    pub data: Vec<u8>,
    pub max_pages: Option<u32>,
}

impl MemoryInstance {
    pub fn new(min_pages: u32, max_pages: Option<u32>) -> Self {
        Self { data: vec![0u8; min_pages as usize * PAGE_SIZE], max_pages }
    }

    pub fn size_pages(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    /// Grow by `delta` pages; returns the previous size in pages, or `None`
    /// if growth would exceed `max_pages` or the engine-wide page ceiling.
    pub fn grow(&mut self, delta: u32, engine_max_pages: u32) -> Option<u32> {
        let prev = self.size_pages();
        let new_size = prev.checked_add(delta)?;
        if new_size > engine_max_pages {
            return None;
        }
        if let Some(max) = self.max_pages {
            if new_size > max {
                return None;
            }
        }
        self.data.resize(new_size as usize * PAGE_SIZE, 0);
        Some(prev)
    }
}

pub struct GlobalInstance {
    pub ty: GlobalType,
    pub value: Value,
}

/// Owns every allocated function, table, memory, and global across every
/// module instantiated against it. Addresses are stable for the lifetime of
/// the `Store`; nothing is ever removed.
pub struct Store {
    pub(crate) functions: Vec<FunctionInstance>,
    pub(crate) tables: Vec<TableInstance>,
    pub(crate) memories: Vec<MemoryInstance>,
    pub(crate) globals: Vec<GlobalInstance>,
    pub(crate) limits: EngineLimits,
    pub(crate) modules: HashMap<String, Rc<ModuleInstance>>,
}

impl Store {
    /// Create a `Store` bound to an [`crate::engine::Engine`]'s resource
    /// limits. One `Engine` may back many independent `Store`s.
    pub fn new(engine: &crate::engine::Engine) -> Self {
        Self {
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            limits: engine.limits,
            modules: HashMap::new(),
        }
    }

    pub fn allocate_function_local(&mut self, ty: FuncType, module: Rc<ModuleInstance>, code: Rc<crate::ast::FunctionBody>) -> FuncAddr {
        self.functions.push(FunctionInstance::Local { ty, module, code });
        FuncAddr(self.functions.len() - 1)
    }

    pub fn allocate_function_host(&mut self, ty: FuncType, func: Rc<dyn HostFunction>) -> FuncAddr {
        self.functions.push(FunctionInstance::Host { ty, func });
        FuncAddr(self.functions.len() - 1)
    }

    pub fn allocate_table(&mut self, ty: TableType) -> TableAddr {
        self.tables.push(TableInstance::new(ty));
        TableAddr(self.tables.len() - 1)
    }

    pub fn allocate_memory(&mut self, ty: crate::ast::MemoryType) -> MemAddr {
        self.memories.push(MemoryInstance::new(ty.limits.min, ty.limits.max));
        MemAddr(self.memories.len() - 1)
    }

    pub fn allocate_global(&mut self, ty: GlobalType, value: Value) -> GlobalAddr {
        self.globals.push(GlobalInstance { ty, value });
        GlobalAddr(self.globals.len() - 1)
    }

    pub fn function(&self, addr: FuncAddr) -> &FunctionInstance {
        &self.functions[addr.0]
    }

    pub fn table(&self, addr: TableAddr) -> &TableInstance {
        &self.tables[addr.0]
    }

    pub fn table_mut(&mut self, addr: TableAddr) -> &mut TableInstance {
        &mut self.tables[addr.0]
    }

    pub fn memory(&self, addr: MemAddr) -> &MemoryInstance {
        &self.memories[addr.0]
    }

    pub fn memory_mut(&mut self, addr: MemAddr) -> &mut MemoryInstance {
        &mut self.memories[addr.0]
    }

    pub fn global(&self, addr: GlobalAddr) -> &GlobalInstance {
        &self.globals[addr.0]
    }

    pub fn global_set(&mut self, addr: GlobalAddr, value: Value) -> Result<(), Trap> {
        let slot = &mut self.globals[addr.0];
        if !slot.ty.mutable {
            return Err(Trap::TypeMismatch);
        }
        slot.value = value;
        Ok(())
    }
}
