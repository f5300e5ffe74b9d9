//! i32/i64/f32/f64 arithmetic, comparisons, and conversions (§4.5.1).
//!
//! Grounded on the teacher's ALU helper shape (`src/interpreter/alu.rs`:
//! `alu_set`/`alu_overflow`) generalized from register operands to operand
//! stack operands. Integers stay raw bit patterns (`crate::value`);
//! signedness lives only in which method is called here, never in the
//! type. Floats never use `==`/`<` Rust operators where Wasm's NaN/±0
//! rules differ from IEEE defaults without care — Rust's `f32`/`f64`
//! comparisons already follow IEEE-754 total-order-free semantics, which is
//! what Wasm numeric comparisons want.

use static_assertions::const_assert;

use crate::ast::Instruction;
use crate::trap::Trap;
use crate::value::Value;

use super::Executor;

// A `Value` must stay small: it rides on the operand stack for every
// instruction. Catches an accidental regression to a boxed/heap variant.
const_assert!(std::mem::size_of::<Value>() <= 16);

impl Executor<'_> {
    fn pop_i32(&mut self) -> Result<i32, Trap> {
        self.stacks.pop_value().and_then(|v| v.as_i32()).ok_or(Trap::TypeMismatch)
    }

    fn pop_i64(&mut self) -> Result<i64, Trap> {
        self.stacks.pop_value().and_then(|v| v.as_i64()).ok_or(Trap::TypeMismatch)
    }

    fn pop_f32(&mut self) -> Result<f32, Trap> {
        self.stacks.pop_value().and_then(|v| v.as_f32()).ok_or(Trap::TypeMismatch)
    }

    fn pop_f64(&mut self) -> Result<f64, Trap> {
        self.stacks.pop_value().and_then(|v| v.as_f64()).ok_or(Trap::TypeMismatch)
    }

    fn push(&mut self, v: impl Into<Value>) {
        self.stacks.push_value(v.into());
    }

    pub(super) fn exec_numeric(&mut self, instr: &Instruction) -> Result<(), Trap> {
        use Instruction as I;
        match instr {
            I::I32Const(v) => self.push(*v),
            I::I64Const(v) => self.push(*v),
            I::F32Const(v) => self.push(*v),
            I::F64Const(v) => self.push(*v),

            I::I32Eqz => {
                let a = self.pop_i32()?;
                self.push((a == 0) as i32);
            }
            I::I32Eq => self.i32_cmp(|a, b| a == b)?,
            I::I32Ne => self.i32_cmp(|a, b| a != b)?,
            I::I32LtS => self.i32_cmp(|a, b| a < b)?,
            I::I32LtU => self.i32_cmp_u(|a, b| a < b)?,
            I::I32GtS => self.i32_cmp(|a, b| a > b)?,
            I::I32GtU => self.i32_cmp_u(|a, b| a > b)?,
            I::I32LeS => self.i32_cmp(|a, b| a <= b)?,
            I::I32LeU => self.i32_cmp_u(|a, b| a <= b)?,
            I::I32GeS => self.i32_cmp(|a, b| a >= b)?,
            I::I32GeU => self.i32_cmp_u(|a, b| a >= b)?,

            I::I64Eqz => {
                let a = self.pop_i64()?;
                self.push((a == 0) as i32);
            }
            I::I64Eq => self.i64_cmp(|a, b| a == b)?,
            I::I64Ne => self.i64_cmp(|a, b| a != b)?,
            I::I64LtS => self.i64_cmp(|a, b| a < b)?,
            I::I64LtU => self.i64_cmp_u(|a, b| a < b)?,
            I::I64GtS => self.i64_cmp(|a, b| a > b)?,
            I::I64GtU => self.i64_cmp_u(|a, b| a > b)?,
            I::I64LeS => self.i64_cmp(|a, b| a <= b)?,
            I::I64LeU => self.i64_cmp_u(|a, b| a <= b)?,
            I::I64GeS => self.i64_cmp(|a, b| a >= b)?,
            I::I64GeU => self.i64_cmp_u(|a, b| a >= b)?,

            I::F32Eq => self.f32_cmp(|a, b| a == b)?,
            I::F32Ne => self.f32_cmp(|a, b| a != b)?,
            I::F32Lt => self.f32_cmp(|a, b| a < b)?,
            I::F32Gt => self.f32_cmp(|a, b| a > b)?,
            I::F32Le => self.f32_cmp(|a, b| a <= b)?,
            I::F32Ge => self.f32_cmp(|a, b| a >= b)?,

            I::F64Eq => self.f64_cmp(|a, b| a == b)?,
            I::F64Ne => self.f64_cmp(|a, b| a != b)?,
            I::F64Lt => self.f64_cmp(|a, b| a < b)?,
            I::F64Gt => self.f64_cmp(|a, b| a > b)?,
            I::F64Le => self.f64_cmp(|a, b| a <= b)?,
            I::F64Ge => self.f64_cmp(|a, b| a >= b)?,

            I::I32Clz => {
                let a = self.pop_i32()?;
                self.push(a.leading_zeros() as i32);
            }
            I::I32Ctz => {
                let a = self.pop_i32()?;
                self.push(a.trailing_zeros() as i32);
            }
            I::I32Popcnt => {
                let a = self.pop_i32()?;
                self.push(a.count_ones() as i32);
            }
            I::I32Add => self.i32_binop(i32::wrapping_add)?,
            I::I32Sub => self.i32_binop(i32::wrapping_sub)?,
            I::I32Mul => self.i32_binop(i32::wrapping_mul)?,
            I::I32DivS => {
                let b = self.pop_i32()?;
                let a = self.pop_i32()?;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                if a == i32::MIN && b == -1 {
                    return Err(Trap::IntegerOverflow);
                }
                self.push(a / b);
            }
            I::I32DivU => {
                let b = self.pop_i32()? as u32;
                let a = self.pop_i32()? as u32;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push((a / b) as i32);
            }
            I::I32RemS => {
                let b = self.pop_i32()?;
                let a = self.pop_i32()?;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push(a.wrapping_rem(b));
            }
            I::I32RemU => {
                let b = self.pop_i32()? as u32;
                let a = self.pop_i32()? as u32;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push((a % b) as i32);
            }
            I::I32And => self.i32_binop(|a, b| a & b)?,
            I::I32Or => self.i32_binop(|a, b| a | b)?,
            I::I32Xor => self.i32_binop(|a, b| a ^ b)?,
            I::I32Shl => self.i32_shift(|a, k| a.wrapping_shl(k))?,
            I::I32ShrS => self.i32_shift(|a, k| a.wrapping_shr(k))?,
            I::I32ShrU => {
                let b = (self.pop_i32()? as u32) & 31;
                let a = self.pop_i32()? as u32;
                self.push((a.wrapping_shr(b)) as i32);
            }
            I::I32Rotl => {
                let b = (self.pop_i32()? as u32) & 31;
                let a = self.pop_i32()? as u32;
                self.push(a.rotate_left(b) as i32);
            }
            I::I32Rotr => {
                let b = (self.pop_i32()? as u32) & 31;
                let a = self.pop_i32()? as u32;
                self.push(a.rotate_right(b) as i32);
            }

            I::I64Clz => {
                let a = self.pop_i64()?;
                self.push(a.leading_zeros() as i64);
            }
            I::I64Ctz => {
                let a = self.pop_i64()?;
                self.push(a.trailing_zeros() as i64);
            }
            I::I64Popcnt => {
                let a = self.pop_i64()?;
                self.push(a.count_ones() as i64);
            }
            I::I64Add => self.i64_binop(i64::wrapping_add)?,
            I::I64Sub => self.i64_binop(i64::wrapping_sub)?,
            I::I64Mul => self.i64_binop(i64::wrapping_mul)?,
            I::I64DivS => {
                let b = self.pop_i64()?;
                let a = self.pop_i64()?;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                if a == i64::MIN && b == -1 {
                    return Err(Trap::IntegerOverflow);
                }
                self.push(a / b);
            }
            I::I64DivU => {
                let b = self.pop_i64()? as u64;
                let a = self.pop_i64()? as u64;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push((a / b) as i64);
            }
            I::I64RemS => {
                let b = self.pop_i64()?;
                let a = self.pop_i64()?;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push(a.wrapping_rem(b));
            }
            I::I64RemU => {
                let b = self.pop_i64()? as u64;
                let a = self.pop_i64()? as u64;
                if b == 0 {
                    return Err(Trap::IntegerDivideByZero);
                }
                self.push((a % b) as i64);
            }
            I::I64And => self.i64_binop(|a, b| a & b)?,
            I::I64Or => self.i64_binop(|a, b| a | b)?,
            I::I64Xor => self.i64_binop(|a, b| a ^ b)?,
            I::I64Shl => {
                let b = (self.pop_i64()? as u32) & 63;
                let a = self.pop_i64()?;
                self.push(a.wrapping_shl(b));
            }
            I::I64ShrS => {
                let b = (self.pop_i64()? as u32) & 63;
                let a = self.pop_i64()?;
                self.push(a.wrapping_shr(b));
            }
            I::I64ShrU => {
                let b = (self.pop_i64()? as u32) & 63;
                let a = self.pop_i64()? as u64;
                self.push(a.wrapping_shr(b) as i64);
            }
            I::I64Rotl => {
                let b = (self.pop_i64()? as u32) & 63;
                let a = self.pop_i64()? as u64;
                self.push(a.rotate_left(b) as i64);
            }
            I::I64Rotr => {
                let b = (self.pop_i64()? as u32) & 63;
                let a = self.pop_i64()? as u64;
                self.push(a.rotate_right(b) as i64);
            }

            I::F32Abs => {
                let a = self.pop_f32()?;
                self.push(a.abs());
            }
            I::F32Neg => {
                let a = self.pop_f32()?;
                self.push(-a);
            }
            I::F32Ceil => {
                let a = self.pop_f32()?;
                self.push(a.ceil());
            }
            I::F32Floor => {
                let a = self.pop_f32()?;
                self.push(a.floor());
            }
            I::F32Trunc => {
                let a = self.pop_f32()?;
                self.push(a.trunc());
            }
            I::F32Nearest => {
                let a = self.pop_f32()?;
                self.push(round_ties_even_f32(a));
            }
            I::F32Sqrt => {
                let a = self.pop_f32()?;
                self.push(a.sqrt());
            }
            I::F32Add => self.f32_binop(|a, b| a + b)?,
            I::F32Sub => self.f32_binop(|a, b| a - b)?,
            I::F32Mul => self.f32_binop(|a, b| a * b)?,
            I::F32Div => self.f32_binop(|a, b| a / b)?,
            I::F32Min => self.f32_binop(wasm_fmin)?,
            I::F32Max => self.f32_binop(wasm_fmax)?,
            I::F32Copysign => self.f32_binop(f32::copysign)?,

            I::F64Abs => {
                let a = self.pop_f64()?;
                self.push(a.abs());
            }
            I::F64Neg => {
                let a = self.pop_f64()?;
                self.push(-a);
            }
            I::F64Ceil => {
                let a = self.pop_f64()?;
                self.push(a.ceil());
            }
            I::F64Floor => {
                let a = self.pop_f64()?;
                self.push(a.floor());
            }
            I::F64Trunc => {
                let a = self.pop_f64()?;
                self.push(a.trunc());
            }
            I::F64Nearest => {
                let a = self.pop_f64()?;
                self.push(round_ties_even_f64(a));
            }
            I::F64Sqrt => {
                let a = self.pop_f64()?;
                self.push(a.sqrt());
            }
            I::F64Add => self.f64_binop(|a, b| a + b)?,
            I::F64Sub => self.f64_binop(|a, b| a - b)?,
            I::F64Mul => self.f64_binop(|a, b| a * b)?,
            I::F64Div => self.f64_binop(|a, b| a / b)?,
            I::F64Min => self.f64_binop(wasm_fmin_f64)?,
            I::F64Max => self.f64_binop(wasm_fmax_f64)?,
            I::F64Copysign => self.f64_binop(f64::copysign)?,

            I::I32WrapI64 => {
                let a = self.pop_i64()?;
                self.push(a as i32);
            }
            I::I32TruncF32S => {
                let a = self.pop_f32()?;
                self.push(trunc_f32_to_i32(a)?);
            }
            I::I32TruncF32U => {
                let a = self.pop_f32()?;
                self.push(trunc_f32_to_u32(a)? as i32);
            }
            I::I32TruncF64S => {
                let a = self.pop_f64()?;
                self.push(trunc_f64_to_i32(a)?);
            }
            I::I32TruncF64U => {
                let a = self.pop_f64()?;
                self.push(trunc_f64_to_u32(a)? as i32);
            }
            I::I64ExtendI32S => {
                let a = self.pop_i32()?;
                self.push(a as i64);
            }
            I::I64ExtendI32U => {
                let a = self.pop_i32()? as u32;
                self.push(a as i64);
            }
            I::I64TruncF32S => {
                let a = self.pop_f32()?;
                self.push(trunc_f32_to_i64(a)?);
            }
            I::I64TruncF32U => {
                let a = self.pop_f32()?;
                self.push(trunc_f32_to_u64(a)? as i64);
            }
            I::I64TruncF64S => {
                let a = self.pop_f64()?;
                self.push(trunc_f64_to_i64(a)?);
            }
            I::I64TruncF64U => {
                let a = self.pop_f64()?;
                self.push(trunc_f64_to_u64(a)? as i64);
            }
            I::F32ConvertI32S => {
                let a = self.pop_i32()?;
                self.push(a as f32);
            }
            I::F32ConvertI32U => {
                let a = self.pop_i32()? as u32;
                self.push(a as f32);
            }
            I::F32ConvertI64S => {
                let a = self.pop_i64()?;
                self.push(a as f32);
            }
            I::F32ConvertI64U => {
                let a = self.pop_i64()? as u64;
                self.push(a as f32);
            }
            I::F32DemoteF64 => {
                let a = self.pop_f64()?;
                self.push(a as f32);
            }
            I::F64ConvertI32S => {
                let a = self.pop_i32()?;
                self.push(a as f64);
            }
            I::F64ConvertI32U => {
                let a = self.pop_i32()? as u32;
                self.push(a as f64);
            }
            I::F64ConvertI64S => {
                let a = self.pop_i64()?;
                self.push(a as f64);
            }
            I::F64ConvertI64U => {
                let a = self.pop_i64()? as u64;
                self.push(a as f64);
            }
            I::F64PromoteF32 => {
                let a = self.pop_f32()?;
                self.push(a as f64);
            }
            I::I32ReinterpretF32 => {
                let a = self.pop_f32()?;
                self.push(a.to_bits() as i32);
            }
            I::I64ReinterpretF64 => {
                let a = self.pop_f64()?;
                self.push(a.to_bits() as i64);
            }
            I::F32ReinterpretI32 => {
                let a = self.pop_i32()?;
                self.push(f32::from_bits(a as u32));
            }
            I::F64ReinterpretI64 => {
                let a = self.pop_i64()?;
                self.push(f64::from_bits(a as u64));
            }

            other => unreachable!("{other:?} is dispatched elsewhere"),
        }
        Ok(())
    }

    fn i32_binop(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.push(f(a, b));
        Ok(())
    }

    fn i32_shift(&mut self, f: impl Fn(i32, u32) -> i32) -> Result<(), Trap> {
        let b = (self.pop_i32()? as u32) & 31;
        let a = self.pop_i32()?;
        self.push(f(a, b));
        Ok(())
    }

    fn i64_binop(&mut self, f: impl Fn(i64, i64) -> i64) -> Result<(), Trap> {
        let b = self.pop_i64()?;
        let a = self.pop_i64()?;
        self.push(f(a, b));
        Ok(())
    }

    fn i32_cmp(&mut self, f: impl Fn(i32, i32) -> bool) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.push(f(a, b) as i32);
        Ok(())
    }

    fn i32_cmp_u(&mut self, f: impl Fn(u32, u32) -> bool) -> Result<(), Trap> {
        let b = self.pop_i32()? as u32;
        let a = self.pop_i32()? as u32;
        self.push(f(a, b) as i32);
        Ok(())
    }

    fn i64_cmp(&mut self, f: impl Fn(i64, i64) -> bool) -> Result<(), Trap> {
        let b = self.pop_i64()?;
        let a = self.pop_i64()?;
        self.push(f(a, b) as i32);
        Ok(())
    }

    fn i64_cmp_u(&mut self, f: impl Fn(u64, u64) -> bool) -> Result<(), Trap> {
        let b = self.pop_i64()? as u64;
        let a = self.pop_i64()? as u64;
        self.push(f(a, b) as i32);
        Ok(())
    }

    fn f32_binop(&mut self, f: impl Fn(f32, f32) -> f32) -> Result<(), Trap> {
        let b = self.pop_f32()?;
        let a = self.pop_f32()?;
        self.push(f(a, b));
        Ok(())
    }

    fn f64_binop(&mut self, f: impl Fn(f64, f64) -> f64) -> Result<(), Trap> {
        let b = self.pop_f64()?;
        let a = self.pop_f64()?;
        self.push(f(a, b));
        Ok(())
    }

    fn f32_cmp(&mut self, f: impl Fn(f32, f32) -> bool) -> Result<(), Trap> {
        let b = self.pop_f32()?;
        let a = self.pop_f32()?;
        self.push(f(a, b) as i32);
        Ok(())
    }

    fn f64_cmp(&mut self, f: impl Fn(f64, f64) -> bool) -> Result<(), Trap> {
        let b = self.pop_f64()?;
        let a = self.pop_f64()?;
        self.push(f(a, b) as i32);
        Ok(())
    }
}

/// Wasm's `min`/`max` differ from Rust's `f32::min`/`max` on NaN and ±0:
/// any NaN operand propagates a (possibly re-signed) NaN, and `-0.0` is
/// strictly less than `0.0`.
fn wasm_fmin(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_negative() || b.is_sign_negative() { -0.0 } else { 0.0 };
    }
    a.min(b)
}

fn wasm_fmax(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_positive() || b.is_sign_positive() { 0.0 } else { -0.0 };
    }
    a.max(b)
}

fn wasm_fmin_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_negative() || b.is_sign_negative() { -0.0 } else { 0.0 };
    }
    a.min(b)
}

fn wasm_fmax_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == 0.0 && b == 0.0 {
        return if a.is_sign_positive() || b.is_sign_positive() { 0.0 } else { -0.0 };
    }
    a.max(b)
}

fn round_ties_even_f32(a: f32) -> f32 {
    let rounded = a.round();
    let result = if (a - a.trunc()).abs() == 0.5 && (rounded as i64) % 2 != 0 { rounded - a.signum() } else { rounded };
    if result == 0.0 {
        if a.is_sign_negative() { -0.0 } else { 0.0 }
    } else {
        result
    }
}

fn round_ties_even_f64(a: f64) -> f64 {
    let rounded = a.round();
    let result = if (a - a.trunc()).abs() == 0.5 && (rounded as i64) % 2 != 0 { rounded - a.signum() } else { rounded };
    if result == 0.0 {
        if a.is_sign_negative() { -0.0 } else { 0.0 }
    } else {
        result
    }
}

fn trunc_f32_to_i32(a: f32) -> Result<i32, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < i32::MIN as f32 || t >= -(i32::MIN as f32) {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i32)
}

fn trunc_f32_to_u32(a: f32) -> Result<u32, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < 0.0 || t >= 4294967296.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u32)
}

fn trunc_f64_to_i32(a: f64) -> Result<i32, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < i32::MIN as f64 || t > i32::MAX as f64 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i32)
}

fn trunc_f64_to_u32(a: f64) -> Result<u32, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < 0.0 || t > u32::MAX as f64 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u32)
}

fn trunc_f32_to_i64(a: f32) -> Result<i64, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < i64::MIN as f32 || t >= -(i64::MIN as f32) {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i64)
}

fn trunc_f32_to_u64(a: f32) -> Result<u64, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < 0.0 || t >= 18446744073709551616.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u64)
}

fn trunc_f64_to_i64(a: f64) -> Result<i64, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < i64::MIN as f64 || t >= -(i64::MIN as f64) {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as i64)
}

fn trunc_f64_to_u64(a: f64) -> Result<u64, Trap> {
    if a.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let t = a.trunc();
    if t < 0.0 || t >= 18446744073709551616.0 {
        return Err(Trap::InvalidConversionToInteger);
    }
    Ok(t as u64)
}
