//! Runtime stacks: operands, labels, and activations (component C4, §4.4).
//!
//! The teacher keeps locals in fixed registers and calls in a
//! `frames: Vec<CallFrame>` (`src/interpreter.rs`); Wasm's stack-machine
//! model needs an additional label stack for structured control flow that
//! the teacher has no analog for, so that part follows the pack's
//! `other_examples` Wasm engines instead (see `DESIGN.md`). The operand
//! stack is a single `Vec<Value>` shared across the whole active
//! invocation (values flow continuously between caller and callee,
//! exactly as in the reference semantics); the label stack is scoped to
//! one [`Frame`] because branches never cross a function boundary.

use crate::store::FuncAddr;
use crate::value::Value;

/// A structured control-flow label pushed by `block`/`loop`/`if`.
///
/// `branch_target` and `end_target` are only different for `loop`: a `br`
/// out of a `loop` jumps back to the `loop` instruction itself (re-pushing a
/// fresh label, so every iteration gets its own label), while falling off
/// the end of the loop body exits past the matching `end` like any other
/// label. For `block`/`if` both fields are the same position, right after
/// the matching `end`.
///
/// `branch_arity` and `end_arity` split the same way: a `loop`'s backward
/// branch carries its parameter arity (always 0 in the MVP grammar, since a
/// `loop`'s `BlockType` only names a result type), while reaching `end`
/// normally carries the loop's declared result arity, same as `block`/`if`.
#[derive(Debug, Clone, Copy)]
pub struct Label {
    pub branch_arity: u32,
    pub end_arity: u32,
    pub branch_target: usize,
    pub end_target: usize,
    pub stack_height: usize,
}

/// One activation record: the function being executed, its locals
/// (parameters followed by declared locals), program counter into its flat
/// instruction list, and the label stack scoped to this call.
pub struct Frame {
    pub func_addr: FuncAddr,
    pub locals: Vec<Value>,
    pub pc: usize,
    pub labels: Vec<Label>,
    /// Operand stack height at call entry; a `return` or implicit
    /// fall-off-the-end truncates the operand stack back to this height
    /// plus the callee's result arity.
    pub stack_base: usize,
}

impl Frame {
    pub fn new(func_addr: FuncAddr, locals: Vec<Value>, stack_base: usize) -> Self {
        Self { func_addr, locals, pc: 0, labels: Vec::new(), stack_base }
    }
}

/// The single operand stack shared by the whole call chain, plus the
/// activation stack (one [`Frame`] per live call).
#[derive(Default)]
pub struct Stacks {
    pub values: Vec<Value>,
    pub frames: Vec<Frame>,
}

impl Stacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_value(&mut self, v: Value) {
        self.values.push(v);
    }

    pub fn pop_value(&mut self) -> Option<Value> {
        self.values.pop()
    }

    pub fn current_frame(&self) -> &Frame {
        self.frames.last().expect("execution always runs inside an activation")
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("execution always runs inside an activation")
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
