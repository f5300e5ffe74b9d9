//! A WebAssembly (MVP) interpreter: binary codec, module linking, and an
//! embedding host API.
//!
//! See `DESIGN.md` for the grounding ledger and the shape of the pieces
//! below; `SPEC_FULL.md` for the full component-by-component design.

pub mod ast;
pub mod binary;
pub mod engine;
pub mod host;
pub mod interp;
pub mod leb128;
pub mod linker;
pub mod stack;
pub mod store;
pub mod trap;
pub mod value;

/// The common set of imports an embedder needs to link and run a module.
pub mod prelude {
    pub use crate::ast::{
        BlockType, Data, Element, Export, ExportDesc, FuncType, Function, FunctionBody, Global, GlobalType,
        Import, ImportDesc, Instruction, Limits, MemArg, MemoryType, Module, TableType, ValueType,
    };
    pub use crate::binary::{decode_module, encode_module, DecodeError};
    pub use crate::engine::{Engine, EngineLimits};
    pub use crate::host::{Caller, HostFn, HostFunction};
    pub use crate::linker::Imports;
    pub use crate::store::{FuncAddr, GlobalAddr, MemAddr, Store, TableAddr};
    pub use crate::trap::{EngineError, LinkError, Trap};
    pub use crate::value::Value;
}
