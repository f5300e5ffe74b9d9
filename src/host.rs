//! The embedding boundary: host functions registered by the embedder and
//! the handle they receive when called (component C7, §4.7).
//!
//! Grounded on the teacher's `InterpreterStorage` trait (`src/data.rs`): a
//! trait object is the seam between the interpreter core and
//! embedder-supplied logic, generalized here from "storage backend" to
//! "arbitrary host callback with memory/global access".

use std::rc::Rc;

use crate::store::{GlobalAddr, ModuleInstance, Store};
use crate::trap::Trap;
use crate::value::Value;

/// A callback the embedder registers as an import target. Receives a
/// [`Caller`] giving it read/write access to the calling instance's
/// memory and globals, plus the argument values already type-checked
/// against the imported function's declared signature.
pub trait HostFunction {
    fn call(&self, caller: Caller<'_>, args: &[Value]) -> Result<Vec<Value>, Trap>;
}

/// Adapts a plain closure to [`HostFunction`], the common case for small
/// embedder callbacks.
pub struct HostFn<F>(pub F)
where
    F: Fn(Caller<'_>, &[Value]) -> Result<Vec<Value>, Trap>;

impl<F> HostFunction for HostFn<F>
where
    F: Fn(Caller<'_>, &[Value]) -> Result<Vec<Value>, Trap>,
{
    fn call(&self, caller: Caller<'_>, args: &[Value]) -> Result<Vec<Value>, Trap> {
        (self.0)(caller, args)
    }
}

/// The execution handle passed to a host function while it runs: access to
/// the calling module instance's first memory/globals, scoped so a host
/// function can never reach into a different instance's address space.
pub struct Caller<'a> {
    store: &'a mut Store,
    instance: Rc<ModuleInstance>,
}

impl<'a> Caller<'a> {
    pub fn new(store: &'a mut Store, instance: Rc<ModuleInstance>) -> Self {
        Self { store, instance }
    }

    /// Read `len` bytes from the instance's first memory at `offset`.
    /// Returns `OutOfBoundsMemoryAccess` if the instance has no memory or
    /// the range doesn't fit.
    pub fn read_memory(&self, offset: u32, len: u32) -> Result<&[u8], Trap> {
        let addr = *self.instance.mem_addrs.first().ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let mem = self.store.memory(addr);
        let start = offset as usize;
        let end = start.checked_add(len as usize).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        mem.data.get(start..end).ok_or(Trap::OutOfBoundsMemoryAccess)
    }

    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
        let addr = *self.instance.mem_addrs.first().ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let mem = self.store.memory_mut(addr);
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let slice = mem.data.get_mut(start..end).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        slice.copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_global(&self, index: u32) -> Result<Value, Trap> {
        let addr = self.global_addr(index)?;
        Ok(self.store.global(addr).value)
    }

    pub fn set_global(&mut self, index: u32, value: Value) -> Result<(), Trap> {
        let addr = self.global_addr(index)?;
        self.store.global_set(addr, value)
    }

    fn global_addr(&self, index: u32) -> Result<GlobalAddr, Trap> {
        self.instance.global_addrs.get(index as usize).copied().ok_or(Trap::TypeMismatch)
    }
}
