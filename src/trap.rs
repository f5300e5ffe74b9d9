//! Error types (component C8, §7).
//!
//! Three layers, matching the teacher's `InterpreterError`/`RuntimeError`
//! split (`src/error.rs`): decode errors (`crate::binary::DecodeError`,
//! already defined there), link errors (module instantiation), and traps
//! (runtime faults raised by the executor). Traps are the interpreter's
//! "recoverable" layer — they unwind execution of the current call and
//! report a typed reason, they never panic the host process.

use thiserror::Error;

/// A runtime fault raised while executing instructions. Every kind named in
/// §7 is represented; no `Other(String)` catch-all, so callers can match
/// exhaustively.
#[derive(Debug, Error, Clone, PartialEq, Eq, strum::EnumIter)]
pub enum Trap {
    #[error("unreachable instruction executed")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    #[error("out of bounds table access")]
    OutOfBoundsTableAccess,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("host function trapped: {0}")]
    HostTrap(String),
}

/// Failures while resolving imports and allocating a module instance
/// (§4.6). Distinct from [`Trap`]: a link failure means the module was
/// never instantiated at all, so there is no partially-built instance to
/// unwind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("missing import {module}.{name}")]
    MissingImport { module: String, name: String },
    #[error("import {module}.{name} has the wrong type")]
    ImportTypeMismatch { module: String, name: String },
    #[error("table type invalid: min {min} exceeds max {max}")]
    InvalidTableLimits { min: u32, max: u32 },
    #[error("memory type invalid: min {min} exceeds max {max}")]
    InvalidMemoryLimits { min: u32, max: u32 },
    #[error("element segment at table index {table_index} offset {offset} overflows table of length {len}")]
    ElementSegmentOverflow { table_index: u32, offset: u32, len: u32 },
    #[error("data segment at memory index {memory_index} offset {offset} overflows memory of length {len}")]
    DataSegmentOverflow { memory_index: u32, offset: u32, len: u32 },
    #[error("start function trapped during instantiation")]
    StartFunctionTrapped(#[source] Trap),
    #[error("module references out-of-range index {index} (kind: {kind})")]
    IndexOutOfRange { kind: &'static str, index: u32 },
}

/// Top-level error returned by `Store` operations that may fail at more
/// than one layer (link or trap), mirroring the teacher's
/// `InterpreterError` umbrella over `VmValidationError`/`RuntimeError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("no function named {0:?} is exported")]
    NoSuchExport(String),
    #[error("export {0:?} is not a function")]
    ExportNotAFunction(String),
    #[error("call argument count or types did not match the function signature")]
    ArgumentMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_trap_kind_has_a_display_message() {
        for trap in Trap::iter() {
            assert!(!trap.to_string().is_empty());
        }
    }
}
