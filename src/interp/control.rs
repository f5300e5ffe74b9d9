//! Structured control flow: `block`/`loop`/`if`/`else`/`end`, `br*`,
//! `return`, `call`/`call_indirect` (§4.5.5, §4.5.6, §9).
//!
//! Function bodies stay a flat `Vec<Instruction>` (no nested `Vec`s); block
//! boundaries are located by forward-scanning for the matching `else`/`end`
//! rather than by a tree walk, so the whole executor — including `loop` —
//! runs on one explicit program counter and never recurses the native
//! stack for control flow. The teacher reaches the same "no native
//! recursion for jumps" property through a flat instruction array with
//! `$pc`-relative jumps (`interpreter/flow.rs`); the label-stack mechanics
//! above it are this crate's own, grounded on the pack's `other_examples`
//! Wasm engines (see `DESIGN.md`). Native recursion is reserved for
//! `call`/`call_indirect`, bounded by `max_call_depth`.

use std::rc::Rc;

use crate::ast::{FunctionBody, Instruction};
use crate::stack::Label;
use crate::trap::Trap;

use super::Executor;

/// Scan forward from the opening `block`/`loop`/`if` at `open_idx`,
/// returning `(else_idx, end_idx)` of its matching `else` (only ever
/// `Some` for `if`) and `end`.
pub(crate) fn find_matching(instructions: &[Instruction], open_idx: usize) -> (Option<usize>, usize) {
    let mut depth = 0i32;
    let mut else_idx = None;
    let mut i = open_idx + 1;
    loop {
        match &instructions[i] {
            Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) => depth += 1,
            Instruction::Else if depth == 0 => else_idx = Some(i),
            Instruction::End => {
                if depth == 0 {
                    return (else_idx, i);
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
}

impl Executor<'_> {
    pub(super) fn exec_control(&mut self, instr: &Instruction, code: &Rc<FunctionBody>) -> Result<(), Trap> {
        use Instruction as I;
        match instr {
            I::Unreachable => Err(Trap::Unreachable),
            I::Nop => {
                self.advance_pc();
                Ok(())
            }

            I::Block(bt) => {
                let pc = self.stacks.current_frame().pc;
                let (_, end_idx) = find_matching(&code.instructions, pc);
                let label = Label {
                    branch_arity: bt.arity(),
                    end_arity: bt.arity(),
                    branch_target: end_idx + 1,
                    end_target: end_idx + 1,
                    stack_height: self.stacks.values.len(),
                };
                self.stacks.current_frame_mut().labels.push(label);
                self.advance_pc();
                Ok(())
            }

            I::Loop(bt) => {
                let pc = self.stacks.current_frame().pc;
                let (_, end_idx) = find_matching(&code.instructions, pc);
                let label = Label {
                    branch_arity: 0,
                    end_arity: bt.arity(),
                    branch_target: pc,
                    end_target: end_idx + 1,
                    stack_height: self.stacks.values.len(),
                };
                self.stacks.current_frame_mut().labels.push(label);
                self.advance_pc();
                Ok(())
            }

            I::If(bt) => {
                let pc = self.stacks.current_frame().pc;
                let (else_idx, end_idx) = find_matching(&code.instructions, pc);
                let cond = self.stacks.pop_value().and_then(|v| v.is_truthy()).ok_or(Trap::TypeMismatch)?;
                let label = Label {
                    branch_arity: bt.arity(),
                    end_arity: bt.arity(),
                    branch_target: end_idx + 1,
                    end_target: end_idx + 1,
                    stack_height: self.stacks.values.len(),
                };
                self.stacks.current_frame_mut().labels.push(label);
                if cond {
                    self.stacks.current_frame_mut().pc = pc + 1;
                } else if let Some(else_idx) = else_idx {
                    self.stacks.current_frame_mut().pc = else_idx + 1;
                } else {
                    self.exit_label()?;
                }
                Ok(())
            }

            I::Else => self.exit_label(),

            I::End => {
                if self.stacks.current_frame().labels.is_empty() {
                    self.do_return()
                } else {
                    self.exit_label()
                }
            }

            I::Br(l) => self.branch(*l),
            I::BrIf(l) => {
                let cond = self.stacks.pop_value().and_then(|v| v.is_truthy()).ok_or(Trap::TypeMismatch)?;
                if cond {
                    self.branch(*l)
                } else {
                    self.advance_pc();
                    Ok(())
                }
            }
            I::BrTable(targets, default) => {
                let i = self.stacks.pop_value().and_then(|v| v.as_i32()).ok_or(Trap::TypeMismatch)? as usize;
                let label = targets.get(i).copied().unwrap_or(*default);
                self.branch(label)
            }

            I::Return => self.do_return(),

            I::Call(func_idx) => {
                let target = self.current_module().func_addrs[*func_idx as usize];
                self.advance_pc();
                self.do_call(target)
            }

            I::CallIndirect(type_idx) => {
                let table_idx = self.stacks.pop_value().and_then(|v| v.as_i32()).ok_or(Trap::TypeMismatch)? as u32;
                let module = self.current_module();
                let table_addr = *module.table_addrs.first().ok_or(Trap::OutOfBoundsTableAccess)?;
                let table = self.store.table(table_addr);
                let slot = table.elements.get(table_idx as usize).ok_or(Trap::OutOfBoundsTableAccess)?;
                let target = slot.ok_or(Trap::UninitializedElement)?;
                let expected = &module.types[*type_idx as usize];
                if self.store.function(target).ty() != expected {
                    return Err(Trap::IndirectCallTypeMismatch);
                }
                self.advance_pc();
                self.do_call(target)
            }

            other => unreachable!("{other:?} is dispatched elsewhere"),
        }
    }

    /// Pop the innermost label, discarding any operand values above its
    /// arity and restoring the stack to its height at label entry, then
    /// resume just past the label's `end` — for a `loop` this exits the
    /// loop rather than re-entering it, since normal fall-through runs the
    /// body exactly once.
    fn exit_label(&mut self) -> Result<(), Trap> {
        let frame = self.stacks.current_frame_mut();
        let label = frame.labels.pop().expect("exit_label only called with a label present");
        let end_target = label.end_target;
        self.truncate_keeping_arity(label.stack_height, label.end_arity)?;
        self.stacks.current_frame_mut().pc = end_target;
        Ok(())
    }

    /// Branch `levels` labels out (0 = innermost): preserve that label's
    /// arity worth of values, discard everything above and including the
    /// intervening labels, and jump to its branch target — the loop header
    /// for a `loop` label, or past `end` for `block`/`if`.
    fn branch(&mut self, levels: u32) -> Result<(), Trap> {
        let frame = self.stacks.current_frame_mut();
        let target_idx =
            frame.labels.len().checked_sub(levels as usize + 1).ok_or(Trap::TypeMismatch)?;
        let label = frame.labels[target_idx];
        frame.labels.truncate(target_idx);
        self.truncate_keeping_arity(label.stack_height, label.branch_arity)?;
        self.stacks.current_frame_mut().pc = label.branch_target;
        Ok(())
    }

    fn truncate_keeping_arity(&mut self, stack_height: usize, arity: u32) -> Result<(), Trap> {
        let total = self.stacks.values.len();
        let keep_from = total.checked_sub(arity as usize).ok_or(Trap::TypeMismatch)?;
        if keep_from < stack_height {
            return Err(Trap::TypeMismatch);
        }
        self.stacks.values.drain(stack_height..keep_from);
        Ok(())
    }

    /// Implicit or explicit function return: take the function's result
    /// arity off the top of the operand stack, drop everything back to the
    /// frame's entry height, pop the frame.
    fn do_return(&mut self) -> Result<(), Trap> {
        let arity = self.current_function_result_arity();
        let frame = self.stacks.frames.pop().expect("do_return always runs inside an activation");
        self.truncate_keeping_arity(frame.stack_base, arity)
    }

    fn current_function_result_arity(&self) -> u32 {
        let addr = self.stacks.current_frame().func_addr;
        self.store.function(addr).ty().results.len() as u32
    }

    fn do_call(&mut self, target: crate::store::FuncAddr) -> Result<(), Trap> {
        let n_args = self.store.function(target).ty().params.len();
        let split_at = self.stacks.values.len().checked_sub(n_args).ok_or(Trap::TypeMismatch)?;
        let args = self.stacks.values.split_off(split_at);
        self.push_call(target, args)
    }
}
