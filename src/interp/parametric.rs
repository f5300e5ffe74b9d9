//! `drop`/`select` (§4.5.2). Polymorphic across all four value types; the
//! executor doesn't care which type is on the stack, only that one is
//! there.

use crate::ast::Instruction;
use crate::trap::Trap;

use super::Executor;

impl Executor<'_> {
    pub(super) fn exec_parametric(&mut self, instr: &Instruction) -> Result<(), Trap> {
        match instr {
            Instruction::Drop => {
                self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
            }
            Instruction::Select => {
                let cond = self.stacks.pop_value().and_then(|v| v.is_truthy()).ok_or(Trap::TypeMismatch)?;
                let b = self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
                let a = self.stacks.pop_value().ok_or(Trap::TypeMismatch)?;
                if a.ty() != b.ty() {
                    return Err(Trap::TypeMismatch);
                }
                self.stacks.push_value(if cond { a } else { b });
            }
            other => unreachable!("{other:?} is dispatched elsewhere"),
        }
        Ok(())
    }
}
