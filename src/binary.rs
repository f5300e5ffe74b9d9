//! Full binary module decoder/encoder (component C1, §6).
//!
//! Magic `\0asm`, version `1`, then an ordered sequence of
//! `(id: u8, size: u32, payload)` sections. Grounded on the pack's
//! `wasmparser`-style section-id table and per-section reader methods (see
//! `DESIGN.md`).

use crate::ast::*;
use crate::leb128::{self, Cursor, LebError};
use itertools::Itertools;
use thiserror::Error;

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

const SEC_CUSTOM: u8 = 0;
const SEC_TYPE: u8 = 1;
const SEC_IMPORT: u8 = 2;
const SEC_FUNCTION: u8 = 3;
const SEC_TABLE: u8 = 4;
const SEC_MEMORY: u8 = 5;
const SEC_GLOBAL: u8 = 6;
const SEC_EXPORT: u8 = 7;
const SEC_START: u8 = 8;
const SEC_ELEMENT: u8 = 9;
const SEC_CODE: u8 = 10;
const SEC_DATA: u8 = 11;

const FUNC_TYPE_TAG: u8 = 0x60;
const FUNCREF_TAG: u8 = 0x70;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("at byte {pos}: bad magic number")]
    BadMagic { pos: usize },
    #[error("at byte {pos}: unsupported version")]
    BadVersion { pos: usize },
    #[error("at byte {pos}: {0}", pos = .0.position())]
    Leb(LebError),
    #[error("at byte {pos}: unknown section id {id}")]
    UnknownSection { pos: usize, id: u8 },
    #[error("at byte {pos}: duplicate section id {id}")]
    DuplicateSection { pos: usize, id: u8 },
    #[error("at byte {pos}: section out of order (id {id})")]
    SectionOutOfOrder { pos: usize, id: u8 },
    #[error("at byte {pos}: invalid value type byte 0x{byte:02x}")]
    InvalidValueType { pos: usize, byte: u8 },
    #[error("at byte {pos}: invalid function type tag 0x{byte:02x}")]
    InvalidFuncTypeTag { pos: usize, byte: u8 },
    #[error("at byte {pos}: invalid limits flag 0x{byte:02x}")]
    InvalidLimitsFlag { pos: usize, byte: u8 },
    #[error("at byte {pos}: invalid element kind 0x{byte:02x}")]
    InvalidElemKind { pos: usize, byte: u8 },
    #[error("at byte {pos}: invalid import/export descriptor tag 0x{byte:02x}")]
    InvalidDescTag { pos: usize, byte: u8 },
    #[error("at byte {pos}: invalid utf-8 in name")]
    InvalidUtf8 { pos: usize },
    #[error("at byte {pos}: unknown opcode 0x{byte:02x}")]
    UnknownOpcode { pos: usize, byte: u8 },
    #[error("at byte {pos}: section size does not match its contents")]
    SectionSizeMismatch { pos: usize },
    #[error("trailing bytes after the last section")]
    TrailingBytes,
}

impl DecodeError {
    fn leb(e: LebError) -> Self {
        Self::Leb(e)
    }
}

impl LebError {
    const fn position(&self) -> usize {
        match self {
            LebError::UnexpectedEnd { pos } | LebError::TooLong { pos } | LebError::TooLarge { pos } => *pos,
        }
    }
}

type Res<T> = Result<T, DecodeError>;

/// Decode a complete binary module.
pub fn decode_module(bytes: &[u8]) -> Res<Module> {
    let mut c = Cursor::new(bytes);

    if c.read_bytes(4).map_err(DecodeError::leb)? != MAGIC {
        return Err(DecodeError::BadMagic { pos: 0 });
    }
    if c.read_bytes(4).map_err(DecodeError::leb)? != VERSION {
        return Err(DecodeError::BadVersion { pos: 4 });
    }

    let mut module = Module::default();
    let mut last_id = 0u8;
    let mut seen = [false; 12];
    let mut func_type_indices: Vec<u32> = Vec::new();
    let mut code_bodies: Vec<FunctionBody> = Vec::new();

    while !c.is_empty() {
        let section_pos = c.position();
        let id = c.read_u8().map_err(DecodeError::leb)?;

        if id == SEC_CUSTOM {
            let size = c.read_vec_len().map_err(DecodeError::leb)?;
            c.read_bytes(size as usize).map_err(DecodeError::leb)?;
            continue;
        }

        if id > SEC_DATA {
            return Err(DecodeError::UnknownSection { pos: section_pos, id });
        }
        if seen[id as usize] {
            return Err(DecodeError::DuplicateSection { pos: section_pos, id });
        }
        if id <= last_id {
            return Err(DecodeError::SectionOutOfOrder { pos: section_pos, id });
        }
        seen[id as usize] = true;
        last_id = id;

        let size = c.read_vec_len().map_err(DecodeError::leb)?;
        let body_start = c.position();
        let body = c.read_bytes(size as usize).map_err(DecodeError::leb)?;
        let mut bc = Cursor::new(body);

        match id {
            SEC_TYPE => module.types = decode_vec(&mut bc, decode_func_type)?,
            SEC_IMPORT => module.imports = decode_vec(&mut bc, decode_import)?,
            SEC_FUNCTION => func_type_indices = decode_vec(&mut bc, |c| c.read_u32().map_err(DecodeError::leb))?,
            SEC_TABLE => module.tables = decode_vec(&mut bc, decode_table_type)?,
            SEC_MEMORY => module.memories = decode_vec(&mut bc, decode_memory_type)?,
            SEC_GLOBAL => module.globals = decode_vec(&mut bc, decode_global)?,
            SEC_EXPORT => module.exports = decode_vec(&mut bc, decode_export)?,
            SEC_START => module.start = Some(bc.read_u32().map_err(DecodeError::leb)?),
            SEC_ELEMENT => module.elements = decode_vec(&mut bc, decode_element)?,
            SEC_CODE => code_bodies = decode_vec(&mut bc, decode_code)?,
            SEC_DATA => module.data = decode_vec(&mut bc, decode_data)?,
            _ => unreachable!("id already bounds-checked"),
        }

        if !bc.is_empty() {
            return Err(DecodeError::SectionSizeMismatch { pos: body_start });
        }
    }

    if !c.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }

    if func_type_indices.len() != code_bodies.len() {
        return Err(DecodeError::SectionSizeMismatch { pos: 0 });
    }
    module.functions = func_type_indices
        .into_iter()
        .zip_eq(code_bodies)
        .map(|(type_index, body)| Function { type_index, body })
        .collect_vec();

    Ok(module)
}

fn decode_vec<T>(c: &mut Cursor<'_>, mut item: impl FnMut(&mut Cursor<'_>) -> Res<T>) -> Res<Vec<T>> {
    let len = c.read_vec_len().map_err(DecodeError::leb)?;
    (0..len).map(|_| item(c)).collect()
}

fn decode_value_type(c: &mut Cursor<'_>) -> Res<ValueType> {
    let pos = c.position();
    let byte = c.read_u8().map_err(DecodeError::leb)?;
    ValueType::from_byte(byte).ok_or(DecodeError::InvalidValueType { pos, byte })
}

fn decode_func_type(c: &mut Cursor<'_>) -> Res<FuncType> {
    let pos = c.position();
    let tag = c.read_u8().map_err(DecodeError::leb)?;
    if tag != FUNC_TYPE_TAG {
        return Err(DecodeError::InvalidFuncTypeTag { pos, byte: tag });
    }
    let params = decode_vec(c, decode_value_type)?;
    let results = decode_vec(c, decode_value_type)?;
    Ok(FuncType::new(params, results))
}

fn decode_limits(c: &mut Cursor<'_>) -> Res<Limits> {
    let pos = c.position();
    let flag = c.read_u8().map_err(DecodeError::leb)?;
    match flag {
        0x00 => Ok(Limits::new(c.read_u32().map_err(DecodeError::leb)?, None)),
        0x01 => {
            let min = c.read_u32().map_err(DecodeError::leb)?;
            let max = c.read_u32().map_err(DecodeError::leb)?;
            Ok(Limits::new(min, Some(max)))
        }
        byte => Err(DecodeError::InvalidLimitsFlag { pos, byte }),
    }
}

fn decode_table_type(c: &mut Cursor<'_>) -> Res<TableType> {
    let pos = c.position();
    let elem = c.read_u8().map_err(DecodeError::leb)?;
    if elem != FUNCREF_TAG {
        return Err(DecodeError::InvalidElemKind { pos, byte: elem });
    }
    Ok(TableType { limits: decode_limits(c)? })
}

fn decode_memory_type(c: &mut Cursor<'_>) -> Res<MemoryType> {
    Ok(MemoryType { limits: decode_limits(c)? })
}

fn decode_global_type(c: &mut Cursor<'_>) -> Res<GlobalType> {
    let value_type = decode_value_type(c)?;
    let pos = c.position();
    let mutable = match c.read_u8().map_err(DecodeError::leb)? {
        0x00 => false,
        0x01 => true,
        byte => return Err(DecodeError::InvalidLimitsFlag { pos, byte }),
    };
    Ok(GlobalType { value_type, mutable })
}

fn decode_name(c: &mut Cursor<'_>) -> Res<String> {
    let pos = c.position();
    let len = c.read_vec_len().map_err(DecodeError::leb)?;
    let bytes = c.read_bytes(len as usize).map_err(DecodeError::leb)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { pos })
}

fn decode_import(c: &mut Cursor<'_>) -> Res<Import> {
    let module = decode_name(c)?;
    let name = decode_name(c)?;
    let pos = c.position();
    let desc = match c.read_u8().map_err(DecodeError::leb)? {
        0x00 => ImportDesc::Function(c.read_u32().map_err(DecodeError::leb)?),
        0x01 => ImportDesc::Table(decode_table_type(c)?),
        0x02 => ImportDesc::Memory(decode_memory_type(c)?),
        0x03 => ImportDesc::Global(decode_global_type(c)?),
        byte => return Err(DecodeError::InvalidDescTag { pos, byte }),
    };
    Ok(Import { module, name, desc })
}

fn decode_export(c: &mut Cursor<'_>) -> Res<Export> {
    let name = decode_name(c)?;
    let pos = c.position();
    let desc = match c.read_u8().map_err(DecodeError::leb)? {
        0x00 => ExportDesc::Function(c.read_u32().map_err(DecodeError::leb)?),
        0x01 => ExportDesc::Table(c.read_u32().map_err(DecodeError::leb)?),
        0x02 => ExportDesc::Memory(c.read_u32().map_err(DecodeError::leb)?),
        0x03 => ExportDesc::Global(c.read_u32().map_err(DecodeError::leb)?),
        byte => return Err(DecodeError::InvalidDescTag { pos, byte }),
    };
    Ok(Export { name, desc })
}

fn decode_global(c: &mut Cursor<'_>) -> Res<Global> {
    let ty = decode_global_type(c)?;
    let init = decode_const_expr(c)?;
    Ok(Global { ty, init })
}

fn decode_element(c: &mut Cursor<'_>) -> Res<Element> {
    let table_index = c.read_u32().map_err(DecodeError::leb)?;
    let offset = decode_const_expr(c)?;
    let init = decode_vec(c, |c| c.read_u32().map_err(DecodeError::leb))?;
    Ok(Element { table_index, offset, init })
}

fn decode_data(c: &mut Cursor<'_>) -> Res<Data> {
    let memory_index = c.read_u32().map_err(DecodeError::leb)?;
    let offset = decode_const_expr(c)?;
    let len = c.read_vec_len().map_err(DecodeError::leb)?;
    let bytes = c.read_bytes(len as usize).map_err(DecodeError::leb)?.to_vec();
    Ok(Data { memory_index, offset, bytes })
}

fn decode_code(c: &mut Cursor<'_>) -> Res<FunctionBody> {
    let body_size = c.read_vec_len().map_err(DecodeError::leb)?;
    let body_bytes = c.read_bytes(body_size as usize).map_err(DecodeError::leb)?;
    let mut bc = Cursor::new(body_bytes);

    let local_groups = decode_vec(&mut bc, |c| {
        let run = c.read_u32().map_err(DecodeError::leb)?;
        let ty = decode_value_type(c)?;
        Ok((run, ty))
    })?;
    let mut locals = Vec::new();
    for (run, ty) in local_groups {
        locals.extend(std::iter::repeat(ty).take(run as usize));
    }

    let instructions = decode_instructions(&mut bc)?;
    Ok(FunctionBody { locals, instructions })
}

fn decode_const_expr(c: &mut Cursor<'_>) -> Res<ConstExpr> {
    decode_instructions(c)
}

/// Decode instructions up to (and including) the matching top-level `End`.
fn decode_instructions(c: &mut Cursor<'_>) -> Res<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut depth: i32 = 0;
    loop {
        let pos = c.position();
        let insn = decode_instruction(c)?;
        match &insn {
            Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) => depth += 1,
            Instruction::End => {
                if depth == 0 {
                    out.push(insn);
                    return Ok(out);
                }
                depth -= 1;
            }
            _ => {}
        }
        let _ = pos;
        out.push(insn);
    }
}

fn decode_block_type(c: &mut Cursor<'_>) -> Res<BlockType> {
    let pos = c.position();
    let byte = c.read_u8().map_err(DecodeError::leb)?;
    if byte == 0x40 {
        return Ok(BlockType::Empty);
    }
    match ValueType::from_byte(byte) {
        Some(v) => Ok(BlockType::Value(v)),
        None => Err(DecodeError::InvalidValueType { pos, byte }),
    }
}

fn decode_memarg(c: &mut Cursor<'_>) -> Res<MemArg> {
    let align = c.read_u32().map_err(DecodeError::leb)?;
    let offset = c.read_u32().map_err(DecodeError::leb)?;
    Ok(MemArg { align, offset })
}

fn decode_instruction(c: &mut Cursor<'_>) -> Res<Instruction> {
    let pos = c.position();
    let op = c.read_u8().map_err(DecodeError::leb)?;
    use Instruction as I;

    Ok(match op {
        0x00 => I::Unreachable,
        0x01 => I::Nop,
        0x02 => I::Block(decode_block_type(c)?),
        0x03 => I::Loop(decode_block_type(c)?),
        0x04 => I::If(decode_block_type(c)?),
        0x05 => I::Else,
        0x0b => I::End,
        0x0c => I::Br(c.read_u32().map_err(DecodeError::leb)?),
        0x0d => I::BrIf(c.read_u32().map_err(DecodeError::leb)?),
        0x0e => {
            let targets = decode_vec(c, |c| c.read_u32().map_err(DecodeError::leb))?;
            let default = c.read_u32().map_err(DecodeError::leb)?;
            I::BrTable(targets, default)
        }
        0x0f => I::Return,
        0x10 => I::Call(c.read_u32().map_err(DecodeError::leb)?),
        0x11 => {
            let type_index = c.read_u32().map_err(DecodeError::leb)?;
            let table_reserved = c.read_u8().map_err(DecodeError::leb)?;
            let _ = table_reserved;
            I::CallIndirect(type_index)
        }

        0x1a => I::Drop,
        0x1b => I::Select,

        0x20 => I::LocalGet(c.read_u32().map_err(DecodeError::leb)?),
        0x21 => I::LocalSet(c.read_u32().map_err(DecodeError::leb)?),
        0x22 => I::LocalTee(c.read_u32().map_err(DecodeError::leb)?),
        0x23 => I::GlobalGet(c.read_u32().map_err(DecodeError::leb)?),
        0x24 => I::GlobalSet(c.read_u32().map_err(DecodeError::leb)?),

        0x28 => I::I32Load(decode_memarg(c)?),
        0x29 => I::I64Load(decode_memarg(c)?),
        0x2a => I::F32Load(decode_memarg(c)?),
        0x2b => I::F64Load(decode_memarg(c)?),
        0x2c => I::I32Load8S(decode_memarg(c)?),
        0x2d => I::I32Load8U(decode_memarg(c)?),
        0x2e => I::I32Load16S(decode_memarg(c)?),
        0x2f => I::I32Load16U(decode_memarg(c)?),
        0x30 => I::I64Load8S(decode_memarg(c)?),
        0x31 => I::I64Load8U(decode_memarg(c)?),
        0x32 => I::I64Load16S(decode_memarg(c)?),
        0x33 => I::I64Load16U(decode_memarg(c)?),
        0x34 => I::I64Load32S(decode_memarg(c)?),
        0x35 => I::I64Load32U(decode_memarg(c)?),
        0x36 => I::I32Store(decode_memarg(c)?),
        0x37 => I::I64Store(decode_memarg(c)?),
        0x38 => I::F32Store(decode_memarg(c)?),
        0x39 => I::F64Store(decode_memarg(c)?),
        0x3a => I::I32Store8(decode_memarg(c)?),
        0x3b => I::I32Store16(decode_memarg(c)?),
        0x3c => I::I64Store8(decode_memarg(c)?),
        0x3d => I::I64Store16(decode_memarg(c)?),
        0x3e => I::I64Store32(decode_memarg(c)?),
        0x3f => {
            let _reserved = c.read_u8().map_err(DecodeError::leb)?;
            I::MemorySize
        }
        0x40 => {
            let _reserved = c.read_u8().map_err(DecodeError::leb)?;
            I::MemoryGrow
        }

        0x41 => I::I32Const(c.read_s32().map_err(DecodeError::leb)?),
        0x42 => I::I64Const(c.read_s64().map_err(DecodeError::leb)?),
        0x43 => I::F32Const(f32::from_bits(u32::from_le_bytes(
            c.read_bytes(4).map_err(DecodeError::leb)?.try_into().unwrap(),
        ))),
        0x44 => I::F64Const(f64::from_bits(u64::from_le_bytes(
            c.read_bytes(8).map_err(DecodeError::leb)?.try_into().unwrap(),
        ))),

        0x45 => I::I32Eqz,
        0x46 => I::I32Eq,
        0x47 => I::I32Ne,
        0x48 => I::I32LtS,
        0x49 => I::I32LtU,
        0x4a => I::I32GtS,
        0x4b => I::I32GtU,
        0x4c => I::I32LeS,
        0x4d => I::I32LeU,
        0x4e => I::I32GeS,
        0x4f => I::I32GeU,

        0x50 => I::I64Eqz,
        0x51 => I::I64Eq,
        0x52 => I::I64Ne,
        0x53 => I::I64LtS,
        0x54 => I::I64LtU,
        0x55 => I::I64GtS,
        0x56 => I::I64GtU,
        0x57 => I::I64LeS,
        0x58 => I::I64LeU,
        0x59 => I::I64GeS,
        0x5a => I::I64GeU,

        0x5b => I::F32Eq,
        0x5c => I::F32Ne,
        0x5d => I::F32Lt,
        0x5e => I::F32Gt,
        0x5f => I::F32Le,
        0x60 => I::F32Ge,

        0x61 => I::F64Eq,
        0x62 => I::F64Ne,
        0x63 => I::F64Lt,
        0x64 => I::F64Gt,
        0x65 => I::F64Le,
        0x66 => I::F64Ge,

        0x67 => I::I32Clz,
        0x68 => I::I32Ctz,
        0x69 => I::I32Popcnt,
        0x6a => I::I32Add,
        0x6b => I::I32Sub,
        0x6c => I::I32Mul,
        0x6d => I::I32DivS,
        0x6e => I::I32DivU,
        0x6f => I::I32RemS,
        0x70 => I::I32RemU,
        0x71 => I::I32And,
        0x72 => I::I32Or,
        0x73 => I::I32Xor,
        0x74 => I::I32Shl,
        0x75 => I::I32ShrS,
        0x76 => I::I32ShrU,
        0x77 => I::I32Rotl,
        0x78 => I::I32Rotr,

        0x79 => I::I64Clz,
        0x7a => I::I64Ctz,
        0x7b => I::I64Popcnt,
        0x7c => I::I64Add,
        0x7d => I::I64Sub,
        0x7e => I::I64Mul,
        0x7f => I::I64DivS,
        0x80 => I::I64DivU,
        0x81 => I::I64RemS,
        0x82 => I::I64RemU,
        0x83 => I::I64And,
        0x84 => I::I64Or,
        0x85 => I::I64Xor,
        0x86 => I::I64Shl,
        0x87 => I::I64ShrS,
        0x88 => I::I64ShrU,
        0x89 => I::I64Rotl,
        0x8a => I::I64Rotr,

        0x8b => I::F32Abs,
        0x8c => I::F32Neg,
        0x8d => I::F32Ceil,
        0x8e => I::F32Floor,
        0x8f => I::F32Trunc,
        0x90 => I::F32Nearest,
        0x91 => I::F32Sqrt,
        0x92 => I::F32Add,
        0x93 => I::F32Sub,
        0x94 => I::F32Mul,
        0x95 => I::F32Div,
        0x96 => I::F32Min,
        0x97 => I::F32Max,
        0x98 => I::F32Copysign,

        0x99 => I::F64Abs,
        0x9a => I::F64Neg,
        0x9b => I::F64Ceil,
        0x9c => I::F64Floor,
        0x9d => I::F64Trunc,
        0x9e => I::F64Nearest,
        0x9f => I::F64Sqrt,
        0xa0 => I::F64Add,
        0xa1 => I::F64Sub,
        0xa2 => I::F64Mul,
        0xa3 => I::F64Div,
        0xa4 => I::F64Min,
        0xa5 => I::F64Max,
        0xa6 => I::F64Copysign,

        0xa7 => I::I32WrapI64,
        0xa8 => I::I32TruncF32S,
        0xa9 => I::I32TruncF32U,
        0xaa => I::I32TruncF64S,
        0xab => I::I32TruncF64U,
        0xac => I::I64ExtendI32S,
        0xad => I::I64ExtendI32U,
        0xae => I::I64TruncF32S,
        0xaf => I::I64TruncF32U,
        0xb0 => I::I64TruncF64S,
        0xb1 => I::I64TruncF64U,
        0xb2 => I::F32ConvertI32S,
        0xb3 => I::F32ConvertI32U,
        0xb4 => I::F32ConvertI64S,
        0xb5 => I::F32ConvertI64U,
        0xb6 => I::F32DemoteF64,
        0xb7 => I::F64ConvertI32S,
        0xb8 => I::F64ConvertI32U,
        0xb9 => I::F64ConvertI64S,
        0xba => I::F64ConvertI64U,
        0xbb => I::F64PromoteF32,
        0xbc => I::I32ReinterpretF32,
        0xbd => I::I64ReinterpretF64,
        0xbe => I::F32ReinterpretI32,
        0xbf => I::F64ReinterpretI64,

        byte => return Err(DecodeError::UnknownOpcode { pos, byte }),
    })
}

/// Encode a module back to its binary form. Used by the round-trip law
/// (`decode(encode(m)) == m`) in the test suite, not by the interpreter
/// itself.
pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION);

    if !module.types.is_empty() {
        encode_section(&mut out, SEC_TYPE, |buf| {
            encode_vec(buf, &module.types, |buf, t| {
                buf.push(FUNC_TYPE_TAG);
                encode_vec(buf, &t.params, |buf, v| buf.push(v.encode_byte()));
                encode_vec(buf, &t.results, |buf, v| buf.push(v.encode_byte()));
            });
        });
    }
    if !module.imports.is_empty() {
        encode_section(&mut out, SEC_IMPORT, |buf| {
            encode_vec(buf, &module.imports, encode_import);
        });
    }
    if !module.functions.is_empty() {
        encode_section(&mut out, SEC_FUNCTION, |buf| {
            encode_vec(buf, &module.functions, |buf, f| buf.extend(leb128::encode_u32(f.type_index)));
        });
    }
    if !module.tables.is_empty() {
        encode_section(&mut out, SEC_TABLE, |buf| {
            encode_vec(buf, &module.tables, |buf, t| {
                buf.push(FUNCREF_TAG);
                encode_limits(buf, &t.limits);
            });
        });
    }
    if !module.memories.is_empty() {
        encode_section(&mut out, SEC_MEMORY, |buf| {
            encode_vec(buf, &module.memories, |buf, m| encode_limits(buf, &m.limits));
        });
    }
    if !module.globals.is_empty() {
        encode_section(&mut out, SEC_GLOBAL, |buf| {
            encode_vec(buf, &module.globals, |buf, g| {
                encode_global_type(buf, &g.ty);
                encode_instructions(buf, &g.init);
            });
        });
    }
    if !module.exports.is_empty() {
        encode_section(&mut out, SEC_EXPORT, |buf| {
            encode_vec(buf, &module.exports, encode_export);
        });
    }
    if let Some(start) = module.start {
        encode_section(&mut out, SEC_START, |buf| buf.extend(leb128::encode_u32(start)));
    }
    if !module.elements.is_empty() {
        encode_section(&mut out, SEC_ELEMENT, |buf| {
            encode_vec(buf, &module.elements, |buf, e| {
                buf.extend(leb128::encode_u32(e.table_index));
                encode_instructions(buf, &e.offset);
                encode_vec(buf, &e.init, |buf, idx| buf.extend(leb128::encode_u32(*idx)));
            });
        });
    }
    if !module.functions.is_empty() {
        encode_section(&mut out, SEC_CODE, |buf| {
            encode_vec(buf, &module.functions, |buf, f| {
                let mut body = Vec::new();
                encode_locals(&mut body, &f.body.locals);
                encode_instructions(&mut body, &f.body.instructions);
                buf.extend(leb128::encode_u32(body.len() as u32));
                buf.extend(body);
            });
        });
    }
    if !module.data.is_empty() {
        encode_section(&mut out, SEC_DATA, |buf| {
            encode_vec(buf, &module.data, |buf, d| {
                buf.extend(leb128::encode_u32(d.memory_index));
                encode_instructions(buf, &d.offset);
                buf.extend(leb128::encode_u32(d.bytes.len() as u32));
                buf.extend_from_slice(&d.bytes);
            });
        });
    }

    out
}

fn encode_section(out: &mut Vec<u8>, id: u8, body: impl FnOnce(&mut Vec<u8>)) {
    let mut buf = Vec::new();
    body(&mut buf);
    out.push(id);
    out.extend(leb128::encode_u32(buf.len() as u32));
    out.extend(buf);
}

fn encode_vec<T>(buf: &mut Vec<u8>, items: &[T], mut item: impl FnMut(&mut Vec<u8>, &T)) {
    buf.extend(leb128::encode_u32(items.len() as u32));
    for it in items {
        item(buf, it);
    }
}

fn encode_limits(buf: &mut Vec<u8>, limits: &Limits) {
    match limits.max {
        None => {
            buf.push(0x00);
            buf.extend(leb128::encode_u32(limits.min));
        }
        Some(max) => {
            buf.push(0x01);
            buf.extend(leb128::encode_u32(limits.min));
            buf.extend(leb128::encode_u32(max));
        }
    }
}

fn encode_global_type(buf: &mut Vec<u8>, ty: &GlobalType) {
    buf.push(ty.value_type.encode_byte());
    buf.push(if ty.mutable { 0x01 } else { 0x00 });
}

fn encode_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend(leb128::encode_u32(name.len() as u32));
    buf.extend_from_slice(name.as_bytes());
}

fn encode_import(buf: &mut Vec<u8>, import: &Import) {
    encode_name(buf, &import.module);
    encode_name(buf, &import.name);
    match &import.desc {
        ImportDesc::Function(idx) => {
            buf.push(0x00);
            buf.extend(leb128::encode_u32(*idx));
        }
        ImportDesc::Table(t) => {
            buf.push(0x01);
            buf.push(FUNCREF_TAG);
            encode_limits(buf, &t.limits);
        }
        ImportDesc::Memory(m) => {
            buf.push(0x02);
            encode_limits(buf, &m.limits);
        }
        ImportDesc::Global(g) => {
            buf.push(0x03);
            encode_global_type(buf, g);
        }
    }
}

fn encode_export(buf: &mut Vec<u8>, export: &Export) {
    encode_name(buf, &export.name);
    let (tag, idx) = match export.desc {
        ExportDesc::Function(i) => (0x00, i),
        ExportDesc::Table(i) => (0x01, i),
        ExportDesc::Memory(i) => (0x02, i),
        ExportDesc::Global(i) => (0x03, i),
    };
    buf.push(tag);
    buf.extend(leb128::encode_u32(idx));
}

fn encode_locals(buf: &mut Vec<u8>, locals: &[ValueType]) {
    // Re-run-length-encode: MVP doesn't require minimal grouping, one run
    // per local is valid and simplest to keep symmetric with decoding.
    encode_vec(buf, locals, |buf, ty| {
        buf.extend(leb128::encode_u32(1));
        buf.push(ty.encode_byte());
    });
}

fn encode_block_type(buf: &mut Vec<u8>, bt: BlockType) {
    match bt {
        BlockType::Empty => buf.push(0x40),
        BlockType::Value(v) => buf.push(v.encode_byte()),
    }
}

fn encode_memarg(buf: &mut Vec<u8>, m: &MemArg) {
    buf.extend(leb128::encode_u32(m.align));
    buf.extend(leb128::encode_u32(m.offset));
}

fn encode_instructions(buf: &mut Vec<u8>, instructions: &[Instruction]) {
    use Instruction as I;
    for insn in instructions {
        match insn {
            I::Unreachable => buf.push(0x00),
            I::Nop => buf.push(0x01),
            I::Block(bt) => {
                buf.push(0x02);
                encode_block_type(buf, *bt);
            }
            I::Loop(bt) => {
                buf.push(0x03);
                encode_block_type(buf, *bt);
            }
            I::If(bt) => {
                buf.push(0x04);
                encode_block_type(buf, *bt);
            }
            I::Else => buf.push(0x05),
            I::End => buf.push(0x0b),
            I::Br(l) => {
                buf.push(0x0c);
                buf.extend(leb128::encode_u32(*l));
            }
            I::BrIf(l) => {
                buf.push(0x0d);
                buf.extend(leb128::encode_u32(*l));
            }
            I::BrTable(ls, default) => {
                buf.push(0x0e);
                encode_vec(buf, ls, |buf, l| buf.extend(leb128::encode_u32(*l)));
                buf.extend(leb128::encode_u32(*default));
            }
            I::Return => buf.push(0x0f),
            I::Call(f) => {
                buf.push(0x10);
                buf.extend(leb128::encode_u32(*f));
            }
            I::CallIndirect(t) => {
                buf.push(0x11);
                buf.extend(leb128::encode_u32(*t));
                buf.push(0x00);
            }
            I::Drop => buf.push(0x1a),
            I::Select => buf.push(0x1b),
            I::LocalGet(i) => {
                buf.push(0x20);
                buf.extend(leb128::encode_u32(*i));
            }
            I::LocalSet(i) => {
                buf.push(0x21);
                buf.extend(leb128::encode_u32(*i));
            }
            I::LocalTee(i) => {
                buf.push(0x22);
                buf.extend(leb128::encode_u32(*i));
            }
            I::GlobalGet(i) => {
                buf.push(0x23);
                buf.extend(leb128::encode_u32(*i));
            }
            I::GlobalSet(i) => {
                buf.push(0x24);
                buf.extend(leb128::encode_u32(*i));
            }

            I::I32Load(m) => {
                buf.push(0x28);
                encode_memarg(buf, m);
            }
            I::I64Load(m) => {
                buf.push(0x29);
                encode_memarg(buf, m);
            }
            I::F32Load(m) => {
                buf.push(0x2a);
                encode_memarg(buf, m);
            }
            I::F64Load(m) => {
                buf.push(0x2b);
                encode_memarg(buf, m);
            }
            I::I32Load8S(m) => {
                buf.push(0x2c);
                encode_memarg(buf, m);
            }
            I::I32Load8U(m) => {
                buf.push(0x2d);
                encode_memarg(buf, m);
            }
            I::I32Load16S(m) => {
                buf.push(0x2e);
                encode_memarg(buf, m);
            }
            I::I32Load16U(m) => {
                buf.push(0x2f);
                encode_memarg(buf, m);
            }
            I::I64Load8S(m) => {
                buf.push(0x30);
                encode_memarg(buf, m);
            }
            I::I64Load8U(m) => {
                buf.push(0x31);
                encode_memarg(buf, m);
            }
            I::I64Load16S(m) => {
                buf.push(0x32);
                encode_memarg(buf, m);
            }
            I::I64Load16U(m) => {
                buf.push(0x33);
                encode_memarg(buf, m);
            }
            I::I64Load32S(m) => {
                buf.push(0x34);
                encode_memarg(buf, m);
            }
            I::I64Load32U(m) => {
                buf.push(0x35);
                encode_memarg(buf, m);
            }
            I::I32Store(m) => {
                buf.push(0x36);
                encode_memarg(buf, m);
            }
            I::I64Store(m) => {
                buf.push(0x37);
                encode_memarg(buf, m);
            }
            I::F32Store(m) => {
                buf.push(0x38);
                encode_memarg(buf, m);
            }
            I::F64Store(m) => {
                buf.push(0x39);
                encode_memarg(buf, m);
            }
            I::I32Store8(m) => {
                buf.push(0x3a);
                encode_memarg(buf, m);
            }
            I::I32Store16(m) => {
                buf.push(0x3b);
                encode_memarg(buf, m);
            }
            I::I64Store8(m) => {
                buf.push(0x3c);
                encode_memarg(buf, m);
            }
            I::I64Store16(m) => {
                buf.push(0x3d);
                encode_memarg(buf, m);
            }
            I::I64Store32(m) => {
                buf.push(0x3e);
                encode_memarg(buf, m);
            }
            I::MemorySize => {
                buf.push(0x3f);
                buf.push(0x00);
            }
            I::MemoryGrow => {
                buf.push(0x40);
                buf.push(0x00);
            }

            I::I32Const(v) => {
                buf.push(0x41);
                buf.extend(leb128::encode_s32(*v));
            }
            I::I64Const(v) => {
                buf.push(0x42);
                buf.extend(leb128::encode_s64(*v));
            }
            I::F32Const(v) => {
                buf.push(0x43);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            I::F64Const(v) => {
                buf.push(0x44);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }

            other => buf.push(opcode_byte_for_simple(other)),
        }
    }
}

/// Opcodes with no immediates: a direct table from variant to byte.
fn opcode_byte_for_simple(insn: &Instruction) -> u8 {
    use Instruction as I;
    match insn {
        I::I32Eqz => 0x45,
        I::I32Eq => 0x46,
        I::I32Ne => 0x47,
        I::I32LtS => 0x48,
        I::I32LtU => 0x49,
        I::I32GtS => 0x4a,
        I::I32GtU => 0x4b,
        I::I32LeS => 0x4c,
        I::I32LeU => 0x4d,
        I::I32GeS => 0x4e,
        I::I32GeU => 0x4f,
        I::I64Eqz => 0x50,
        I::I64Eq => 0x51,
        I::I64Ne => 0x52,
        I::I64LtS => 0x53,
        I::I64LtU => 0x54,
        I::I64GtS => 0x55,
        I::I64GtU => 0x56,
        I::I64LeS => 0x57,
        I::I64LeU => 0x58,
        I::I64GeS => 0x59,
        I::I64GeU => 0x5a,
        I::F32Eq => 0x5b,
        I::F32Ne => 0x5c,
        I::F32Lt => 0x5d,
        I::F32Gt => 0x5e,
        I::F32Le => 0x5f,
        I::F32Ge => 0x60,
        I::F64Eq => 0x61,
        I::F64Ne => 0x62,
        I::F64Lt => 0x63,
        I::F64Gt => 0x64,
        I::F64Le => 0x65,
        I::F64Ge => 0x66,
        I::I32Clz => 0x67,
        I::I32Ctz => 0x68,
        I::I32Popcnt => 0x69,
        I::I32Add => 0x6a,
        I::I32Sub => 0x6b,
        I::I32Mul => 0x6c,
        I::I32DivS => 0x6d,
        I::I32DivU => 0x6e,
        I::I32RemS => 0x6f,
        I::I32RemU => 0x70,
        I::I32And => 0x71,
        I::I32Or => 0x72,
        I::I32Xor => 0x73,
        I::I32Shl => 0x74,
        I::I32ShrS => 0x75,
        I::I32ShrU => 0x76,
        I::I32Rotl => 0x77,
        I::I32Rotr => 0x78,
        I::I64Clz => 0x79,
        I::I64Ctz => 0x7a,
        I::I64Popcnt => 0x7b,
        I::I64Add => 0x7c,
        I::I64Sub => 0x7d,
        I::I64Mul => 0x7e,
        I::I64DivS => 0x7f,
        I::I64DivU => 0x80,
        I::I64RemS => 0x81,
        I::I64RemU => 0x82,
        I::I64And => 0x83,
        I::I64Or => 0x84,
        I::I64Xor => 0x85,
        I::I64Shl => 0x86,
        I::I64ShrS => 0x87,
        I::I64ShrU => 0x88,
        I::I64Rotl => 0x89,
        I::I64Rotr => 0x8a,
        I::F32Abs => 0x8b,
        I::F32Neg => 0x8c,
        I::F32Ceil => 0x8d,
        I::F32Floor => 0x8e,
        I::F32Trunc => 0x8f,
        I::F32Nearest => 0x90,
        I::F32Sqrt => 0x91,
        I::F32Add => 0x92,
        I::F32Sub => 0x93,
        I::F32Mul => 0x94,
        I::F32Div => 0x95,
        I::F32Min => 0x96,
        I::F32Max => 0x97,
        I::F32Copysign => 0x98,
        I::F64Abs => 0x99,
        I::F64Neg => 0x9a,
        I::F64Ceil => 0x9b,
        I::F64Floor => 0x9c,
        I::F64Trunc => 0x9d,
        I::F64Nearest => 0x9e,
        I::F64Sqrt => 0x9f,
        I::F64Add => 0xa0,
        I::F64Sub => 0xa1,
        I::F64Mul => 0xa2,
        I::F64Div => 0xa3,
        I::F64Min => 0xa4,
        I::F64Max => 0xa5,
        I::F64Copysign => 0xa6,
        I::I32WrapI64 => 0xa7,
        I::I32TruncF32S => 0xa8,
        I::I32TruncF32U => 0xa9,
        I::I32TruncF64S => 0xaa,
        I::I32TruncF64U => 0xab,
        I::I64ExtendI32S => 0xac,
        I::I64ExtendI32U => 0xad,
        I::I64TruncF32S => 0xae,
        I::I64TruncF32U => 0xaf,
        I::I64TruncF64S => 0xb0,
        I::I64TruncF64U => 0xb1,
        I::F32ConvertI32S => 0xb2,
        I::F32ConvertI32U => 0xb3,
        I::F32ConvertI64S => 0xb4,
        I::F32ConvertI64U => 0xb5,
        I::F32DemoteF64 => 0xb6,
        I::F64ConvertI32S => 0xb7,
        I::F64ConvertI32U => 0xb8,
        I::F64ConvertI64S => 0xb9,
        I::F64ConvertI64U => 0xba,
        I::F64PromoteF32 => 0xbb,
        I::I32ReinterpretF32 => 0xbc,
        I::I64ReinterpretF64 => 0xbd,
        I::F32ReinterpretI32 => 0xbe,
        I::F64ReinterpretI64 => 0xbf,
        other => unreachable!("{other:?} has immediates and is encoded above"),
    }
}
