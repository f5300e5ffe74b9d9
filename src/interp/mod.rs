//! The instruction executor (component C5, §4.5).
//!
//! Dispatch is one flat `match` over [`Instruction`], mirroring the
//! teacher's `_instruction` match over `OpcodeRepr`
//! (`src/interpreter/executors/instruction.rs`). Per §9's design note,
//! nothing here recurses the native call stack: `loop`/`br` are an explicit
//! program counter plus a label stack, and `call`/`call_indirect` push onto
//! an explicit [`Frame`] stack driven by one flat loop in [`Executor::invoke`],
//! bounded by [`crate::engine::EngineLimits::max_call_depth`].

mod control;
mod memory;
mod numeric;
mod parametric;
mod variable;

use std::rc::Rc;

use crate::ast::{FunctionBody, Instruction};
use crate::stack::{Frame, Stacks};
use crate::store::{FuncAddr, ModuleInstance, Store};
use crate::trap::Trap;
use crate::value::Value;

pub(crate) use control::find_matching;

/// Drives one call chain to completion against a [`Store`]. A fresh
/// `Executor` (and operand/activation stack) is created per top-level
/// invocation from `Store`/`Engine`; nothing here outlives one call from the
/// embedder.
pub struct Executor<'s> {
    pub(crate) store: &'s mut Store,
    pub(crate) stacks: Stacks,
    pub(crate) max_call_depth: u32,
}

impl<'s> Executor<'s> {
    pub fn new(store: &'s mut Store, max_call_depth: u32) -> Self {
        Self { store, stacks: Stacks::new(), max_call_depth }
    }

    /// Invoke a function address with `args` already type-checked by the
    /// caller, running until the call chain it starts returns or traps.
    pub fn invoke(mut self, addr: FuncAddr, args: Vec<Value>) -> Result<Vec<Value>, Trap> {
        self.push_call(addr, args)?;
        loop {
            if self.stacks.frames.is_empty() {
                return Ok(std::mem::take(&mut self.stacks.values));
            }
            self.step()?;
        }
    }

    /// Push a new activation for `addr`, consuming `args` as its locals.
    /// Used both by `invoke` (top-level) and by `call`/`call_indirect`.
    pub(crate) fn push_call(&mut self, addr: FuncAddr, args: Vec<Value>) -> Result<(), Trap> {
        if self.stacks.depth() as u32 >= self.max_call_depth {
            return Err(Trap::CallStackExhausted);
        }
        match self.store.function(addr) {
            crate::store::FunctionInstance::Local { code, .. } => {
                let mut locals = args;
                locals.extend(code.locals.iter().map(|ty| Value::default_for(*ty)));
                let stack_base = self.stacks.values.len();
                self.stacks.frames.push(Frame::new(addr, locals, stack_base));
                Ok(())
            }
            crate::store::FunctionInstance::Host { func, .. } => {
                // A host function called directly as the top-level target
                // (no caller frame yet) gets an instance-less `Caller`: it
                // has no module to read memory/globals from.
                let module = if self.stacks.frames.is_empty() {
                    Rc::new(ModuleInstance {
                        types: Vec::new(),
                        func_addrs: Vec::new(),
                        table_addrs: Vec::new(),
                        mem_addrs: Vec::new(),
                        global_addrs: Vec::new(),
                        exports: Vec::new(),
                    })
                } else {
                    self.current_module()
                };
                let func = Rc::clone(func);
                let results = func.call(crate::host::Caller::new(self.store, module), &args)?;
                self.stacks.values.extend(results);
                Ok(())
            }
        }
    }

    fn current_module(&self) -> Rc<ModuleInstance> {
        let addr = self.stacks.current_frame().func_addr;
        match self.store.function(addr) {
            crate::store::FunctionInstance::Local { module, .. } => Rc::clone(module),
            crate::store::FunctionInstance::Host { .. } => {
                unreachable!("a host function never has its own activation frame")
            }
        }
    }

    fn current_code(&self) -> Rc<FunctionBody> {
        let addr = self.stacks.current_frame().func_addr;
        match self.store.function(addr) {
            crate::store::FunctionInstance::Local { code, .. } => Rc::clone(code),
            crate::store::FunctionInstance::Host { .. } => {
                unreachable!("a host function never has its own activation frame")
            }
        }
    }

    fn advance_pc(&mut self) {
        self.stacks.current_frame_mut().pc += 1;
    }

    /// Execute exactly one instruction of the current frame.
    fn step(&mut self) -> Result<(), Trap> {
        let code = self.current_code();
        let pc = self.stacks.current_frame().pc;
        let instr = code.instructions[pc].clone();

        use Instruction as I;
        match &instr {
            I::Unreachable
            | I::Nop
            | I::Block(_)
            | I::Loop(_)
            | I::If(_)
            | I::Else
            | I::End
            | I::Br(_)
            | I::BrIf(_)
            | I::BrTable(..)
            | I::Return
            | I::Call(_)
            | I::CallIndirect(_) => self.exec_control(&instr, &code)?,

            I::Drop | I::Select => {
                self.exec_parametric(&instr)?;
                self.advance_pc();
            }

            I::LocalGet(_) | I::LocalSet(_) | I::LocalTee(_) | I::GlobalGet(_) | I::GlobalSet(_) => {
                self.exec_variable(&instr)?;
                self.advance_pc();
            }

            I::I32Load(_)
            | I::I64Load(_)
            | I::F32Load(_)
            | I::F64Load(_)
            | I::I32Load8S(_)
            | I::I32Load8U(_)
            | I::I32Load16S(_)
            | I::I32Load16U(_)
            | I::I64Load8S(_)
            | I::I64Load8U(_)
            | I::I64Load16S(_)
            | I::I64Load16U(_)
            | I::I64Load32S(_)
            | I::I64Load32U(_)
            | I::I32Store(_)
            | I::I64Store(_)
            | I::F32Store(_)
            | I::F64Store(_)
            | I::I32Store8(_)
            | I::I32Store16(_)
            | I::I64Store8(_)
            | I::I64Store16(_)
            | I::I64Store32(_)
            | I::MemorySize
            | I::MemoryGrow => {
                self.exec_memory(&instr)?;
                self.advance_pc();
            }

            _ => {
                self.exec_numeric(&instr)?;
                self.advance_pc();
            }
        }
        Ok(())
    }
}
