//! Runtime [`Value`] representation.
//!
//! Integers are kept as raw bit patterns; signedness lives in the operation,
//! never in the type (see `DESIGN.md`). Floats preserve their bit pattern
//! across moves so that NaN payloads survive `local.get`/`local.set`,
//! `global.get`/`global.set`, and memory round-trips.

use crate::ast::ValueType;

/// A Wasm runtime value: one of the four MVP value types.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub const fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
        }
    }

    pub const fn default_for(ty: ValueType) -> Self {
        match ty {
            ValueType::I32 => Self::I32(0),
            ValueType::I64 => Self::I64(0),
            ValueType::F32 => Self::F32(0.0),
            ValueType::F64 => Self::F64(0.0),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// `true` if non-zero (i32 interpretation), used by `select`/`br_if`/`if`.
    pub fn is_truthy(&self) -> Option<bool> {
        self.as_i32().map(|v| v != 0)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_bits_preserved_on_roundtrip() {
        let nan = f32::from_bits(0x7fc0_1234);
        let v = Value::F32(nan);
        assert_eq!(v.as_f32().unwrap().to_bits(), nan.to_bits());
    }

    #[test]
    fn default_values_are_zero() {
        assert_eq!(Value::default_for(ValueType::I32), Value::I32(0));
        assert_eq!(Value::default_for(ValueType::F64), Value::F64(0.0));
    }
}
