//! `local.{get,set,tee}` and `global.{get,set}` (§4.5.3).
//!
//! Generalizes the teacher's direct register read/write accessors
//! (`interpreter/internal.rs`'s indexed register access) to an indexed
//! `locals: Vec<Value>` per [`crate::stack::Frame`] plus the current
//! instance's resolved [`crate::store::GlobalAddr`] table.

use crate::ast::Instruction;
use crate::trap::Trap;

use super::Executor;

impl Executor<'_> {
    pub(super) fn exec_variable(&mut self, instr: &Instruction) -> Result<(), Trap> {
        match instr {
            Instruction::LocalGet(idx) => {
                let v = *self.stacks.current_frame().locals.get(*idx as usize).ok_or(Trap::TypeMismatch)?;
                self.stacks.push_value(v);
            }
            Instruction::LocalSet(idx) => {
                let v = self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
                let slot =
                    self.stacks.current_frame_mut().locals.get_mut(*idx as usize).ok_or(Trap::TypeMismatch)?;
                *slot = v;
            }
            Instruction::LocalTee(idx) => {
                let v = *self.stacks.values.last().ok_or(Trap::TypeMismatch)?;
                let slot =
                    self.stacks.current_frame_mut().locals.get_mut(*idx as usize).ok_or(Trap::TypeMismatch)?;
                *slot = v;
            }
            Instruction::GlobalGet(idx) => {
                let addr = self.global_addr(*idx)?;
                self.stacks.push_value(self.store.global(addr).value);
            }
            Instruction::GlobalSet(idx) => {
                let addr = self.global_addr(*idx)?;
                let v = self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
                self.store.global_set(addr, v)?;
            }
            other => unreachable!("{other:?} is dispatched elsewhere"),
        }
        Ok(())
    }

    fn global_addr(&self, idx: u32) -> Result<crate::store::GlobalAddr, Trap> {
        let module = self.current_module();
        module.global_addrs.get(idx as usize).copied().ok_or(Trap::TypeMismatch)
    }
}
