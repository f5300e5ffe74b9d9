//! Linear memory load/store, `memory.size`, `memory.grow` (§4.5.4).
//!
//! Grounded on the teacher's ownership-range bounds checking
//! (`src/interpreter/memory.rs`: `has_ownership_range`, `load_word`,
//! `store_word`) generalized to Wasm's single flat, page-based linear
//! memory (no stack/heap split — MVP memory has none). Every access is
//! bounds-checked against the *current* memory size before touching any
//! byte; a partially out-of-range access traps without performing any
//! reads/writes.

use crate::ast::{Instruction, MemArg};
use crate::trap::Trap;

use super::Executor;

impl Executor<'_> {
    pub(super) fn exec_memory(&mut self, instr: &Instruction) -> Result<(), Trap> {
        use Instruction as I;
        match instr {
            I::I32Load(m) => self.load_i32(m, 4, |b| i32::from_le_bytes(b.try_into().unwrap())),
            I::I64Load(m) => self.load_i64(m, 8, |b| i64::from_le_bytes(b.try_into().unwrap())),
            I::F32Load(m) => {
                let v = self.load_bytes(m, 4)?;
                self.stacks.push_value(f32::from_le_bytes(v.try_into().unwrap()).into());
                Ok(())
            }
            I::F64Load(m) => {
                let v = self.load_bytes(m, 8)?;
                self.stacks.push_value(f64::from_le_bytes(v.try_into().unwrap()).into());
                Ok(())
            }
            I::I32Load8S(m) => self.load_i32(m, 1, |b| b[0] as i8 as i32),
            I::I32Load8U(m) => self.load_i32(m, 1, |b| b[0] as i32),
            I::I32Load16S(m) => self.load_i32(m, 2, |b| i16::from_le_bytes(b.try_into().unwrap()) as i32),
            I::I32Load16U(m) => self.load_i32(m, 2, |b| u16::from_le_bytes(b.try_into().unwrap()) as i32),
            I::I64Load8S(m) => self.load_i64(m, 1, |b| b[0] as i8 as i64),
            I::I64Load8U(m) => self.load_i64(m, 1, |b| b[0] as i64),
            I::I64Load16S(m) => self.load_i64(m, 2, |b| i16::from_le_bytes(b.try_into().unwrap()) as i64),
            I::I64Load16U(m) => self.load_i64(m, 2, |b| u16::from_le_bytes(b.try_into().unwrap()) as i64),
            I::I64Load32S(m) => self.load_i64(m, 4, |b| i32::from_le_bytes(b.try_into().unwrap()) as i64),
            I::I64Load32U(m) => self.load_i64(m, 4, |b| u32::from_le_bytes(b.try_into().unwrap()) as i64),

            I::I32Store(m) => self.store_bytes(m, 4, |v| v.as_i32().map(|x| x.to_le_bytes().to_vec())),
            I::I64Store(m) => self.store_bytes(m, 8, |v| v.as_i64().map(|x| x.to_le_bytes().to_vec())),
            I::F32Store(m) => self.store_bytes(m, 4, |v| v.as_f32().map(|x| x.to_le_bytes().to_vec())),
            I::F64Store(m) => self.store_bytes(m, 8, |v| v.as_f64().map(|x| x.to_le_bytes().to_vec())),
            I::I32Store8(m) => self.store_bytes(m, 1, |v| v.as_i32().map(|x| vec![x as u8])),
            I::I32Store16(m) => self.store_bytes(m, 2, |v| v.as_i32().map(|x| (x as u16).to_le_bytes().to_vec())),
            I::I64Store8(m) => self.store_bytes(m, 1, |v| v.as_i64().map(|x| vec![x as u8])),
            I::I64Store16(m) => self.store_bytes(m, 2, |v| v.as_i64().map(|x| (x as u16).to_le_bytes().to_vec())),
            I::I64Store32(m) => self.store_bytes(m, 4, |v| v.as_i64().map(|x| (x as u32).to_le_bytes().to_vec())),

            I::MemorySize => {
                let addr = self.mem_addr()?;
                self.stacks.push_value((self.store.memory(addr).size_pages() as i32).into());
                Ok(())
            }
            I::MemoryGrow => {
                let addr = self.mem_addr()?;
                let delta = self.stacks.pop_value().and_then(|v| v.as_i32()).ok_or(Trap::TypeMismatch)? as u32;
                let engine_max = self.store.limits.max_memory_pages;
                let result = self.store.memory_mut(addr).grow(delta, engine_max);
                self.stacks.push_value((result.map(|p| p as i32).unwrap_or(-1)).into());
                Ok(())
            }

            other => unreachable!("{other:?} is dispatched elsewhere"),
        }
    }

    fn mem_addr(&self) -> Result<crate::store::MemAddr, Trap> {
        self.current_module().mem_addrs.first().copied().ok_or(Trap::OutOfBoundsMemoryAccess)
    }

    fn effective_addr(&mut self, m: &MemArg) -> Result<usize, Trap> {
        let base = self.stacks.pop_value().and_then(|v| v.as_i32()).ok_or(Trap::TypeMismatch)? as u32;
        base.checked_add(m.offset).map(|a| a as usize).ok_or(Trap::OutOfBoundsMemoryAccess)
    }

    fn load_bytes(&mut self, m: &MemArg, len: usize) -> Result<Vec<u8>, Trap> {
        let addr = self.mem_addr()?;
        let start = self.effective_addr(m)?;
        let end = start.checked_add(len).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let mem = self.store.memory(addr);
        mem.data.get(start..end).map(<[u8]>::to_vec).ok_or(Trap::OutOfBoundsMemoryAccess)
    }

    fn load_i32(&mut self, m: &MemArg, len: usize, decode: impl Fn(&[u8]) -> i32) -> Result<(), Trap> {
        let bytes = self.load_bytes(m, len)?;
        self.stacks.push_value(decode(&bytes).into());
        Ok(())
    }

    fn load_i64(&mut self, m: &MemArg, len: usize, decode: impl Fn(&[u8]) -> i64) -> Result<(), Trap> {
        let bytes = self.load_bytes(m, len)?;
        self.stacks.push_value(decode(&bytes).into());
        Ok(())
    }

    fn store_bytes(
        &mut self,
        m: &MemArg,
        len: usize,
        encode: impl Fn(&crate::value::Value) -> Option<Vec<u8>>,
    ) -> Result<(), Trap> {
        let value = self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
        let bytes = encode(&value).ok_or(Trap::TypeMismatch)?;
        debug_assert_eq!(bytes.len(), len);
        let addr = self.mem_addr()?;
        let start = self.effective_addr(m)?;
        let end = start.checked_add(len).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let mem = self.store.memory_mut(addr);
        let slice = mem.data.get_mut(start..end).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        slice.copy_from_slice(&bytes);
        Ok(())
    }
}
