//! LEB128 signed/unsigned varint codec over a position-tracked byte cursor
//! (component C1).
//!
//! Grounded on the pack's `wasmparser`-style `BinaryReader` (see
//! `DESIGN.md`): a thin cursor over a byte slice exposing `read_u8` plus one
//! decode method per integer width. Errors always carry the byte offset at
//! which the failure was detected (§9 closing note).

use thiserror::Error;

/// Decode/encode failures, always pinned to the byte offset that triggered
/// them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LebError {
    #[error("at byte {pos}: unexpected end of input")]
    UnexpectedEnd { pos: usize },
    #[error("at byte {pos}: integer representation too long")]
    TooLong { pos: usize },
    #[error("at byte {pos}: integer too large")]
    TooLarge { pos: usize },
}

/// A cursor over an immutable byte slice, tracking its read position for
/// diagnostics.
#[derive(Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, LebError> {
        let byte = *self.bytes.get(self.pos).ok_or(LebError::UnexpectedEnd { pos: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], LebError> {
        if self.pos + len > self.bytes.len() {
            return Err(LebError::UnexpectedEnd { pos: self.pos });
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Read a `u32` length-prefixed vector's length, rejecting lengths that
    /// cannot possibly fit in the remaining input or that exceed the MVP
    /// ceiling of `2^31`.
    pub fn read_vec_len(&mut self) -> Result<u32, LebError> {
        let start = self.pos;
        let len = self.read_u32()?;
        if len >= 1 << 31 {
            return Err(LebError::TooLarge { pos: start });
        }
        if (len as usize) > self.bytes.len() - self.pos {
            return Err(LebError::UnexpectedEnd { pos: start });
        }
        Ok(len)
    }

    pub fn read_u32(&mut self) -> Result<u32, LebError> {
        self.read_unsigned(32).map(|v| v as u32)
    }

    pub fn read_u64(&mut self) -> Result<u64, LebError> {
        self.read_unsigned(64)
    }

    pub fn read_s32(&mut self) -> Result<i32, LebError> {
        self.read_signed(32).map(|v| v as i32)
    }

    pub fn read_s64(&mut self) -> Result<i64, LebError> {
        self.read_signed(64)
    }

    fn read_unsigned(&mut self, width: u32) -> Result<u64, LebError> {
        let start = self.pos;
        let max_bytes = (width as usize).div_ceil(7);

        let mut result: u64 = 0;
        let mut shift = 0u32;
        let mut count = 0usize;

        loop {
            let byte = self.read_u8()?;
            count += 1;
            if count > max_bytes {
                return Err(LebError::TooLong { pos: start });
            }

            let low = (byte & 0x7f) as u64;
            if shift >= width {
                // Only padding continuation bytes are allowed past width;
                // they must contribute no value bits.
                if low != 0 {
                    return Err(LebError::TooLarge { pos: start });
                }
            } else if shift + 7 > width {
                // Final meaningful byte may carry fewer than 7 significant
                // bits; anything above the width must be zero.
                let valid_bits = width - shift;
                if low >> valid_bits != 0 {
                    return Err(LebError::TooLarge { pos: start });
                }
                result |= low << shift;
            } else {
                result |= low << shift;
            }

            shift += 7;

            if byte & 0x80 == 0 {
                break;
            }
        }

        Ok(result)
    }

    fn read_signed(&mut self, width: u32) -> Result<i64, LebError> {
        let start = self.pos;
        let max_bytes = (width as usize).div_ceil(7);

        let mut result: i64 = 0;
        let mut shift = 0u32;
        let mut count = 0usize;
        let mut byte;

        loop {
            byte = self.read_u8()?;
            count += 1;
            if count > max_bytes {
                return Err(LebError::TooLong { pos: start });
            }

            let low = (byte & 0x7f) as i64;
            if shift < width {
                result |= low << shift;
            } else if low != (if byte & 0x40 != 0 { 0x7f } else { 0 }) {
                // Padding bytes beyond width must uniformly sign-extend.
                return Err(LebError::TooLarge { pos: start });
            }

            shift += 7;

            if byte & 0x80 == 0 {
                break;
            }
        }

        // Sign-extend if the sign bit of the final byte is set and we
        // haven't already filled the full width.
        if shift < width && byte & 0x40 != 0 {
            result |= -1i64 << shift;
        }

        // Mask down to the declared width so callers can safely narrow.
        let result = if width == 64 {
            result
        } else {
            let bits = 64 - width;
            (result << bits) >> bits
        };

        Ok(result)
    }
}

/// Encode an unsigned integer (of up to 64 significant bits) as LEB128,
/// shortest form, no trailing zero continuation bytes.
pub fn encode_u64(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

pub fn encode_u32(value: u32) -> Vec<u8> {
    encode_u64(value as u64)
}

/// Encode a signed integer as LEB128, shortest form: stops as soon as the
/// remaining bits are a uniform sign-extension of the last emitted byte.
pub fn encode_s64(mut value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;

        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

pub fn encode_s32(value: i32) -> Vec<u8> {
    encode_s64(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_unsigned() {
        let mut c = Cursor::new(&[0xe5, 0x8e, 0x26]);
        assert_eq!(c.read_u32().unwrap(), 624485);
    }

    #[test]
    fn decodes_simple_signed_negative() {
        let mut c = Cursor::new(&[0x9b, 0xf1, 0x59]);
        assert_eq!(c.read_s32().unwrap(), -624485);
    }

    #[test]
    fn signed_minus_two_all_equivalent_encodings() {
        for bytes in [&[0x7e][..], &[0xFE, 0x7F][..], &[0xFE, 0xFF, 0x7F][..]] {
            let mut c = Cursor::new(bytes);
            assert_eq!(c.read_s32().unwrap(), -2, "{bytes:?}");
        }
    }

    #[test]
    fn u8_overlong_value_rejected() {
        // 0x83 0x10 decodes past 8 bits with nonzero high bits: too large.
        let mut c = Cursor::new(&[0x83, 0x10]);
        let err = c.read_unsigned(8).unwrap_err();
        assert_eq!(err, LebError::TooLarge { pos: 0 });
    }

    #[test]
    fn too_many_continuation_bytes_rejected() {
        let mut c = Cursor::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        let err = c.read_u32().unwrap_err();
        assert_eq!(err, LebError::TooLong { pos: 0 });
    }

    #[test]
    fn unexpected_end_reports_position() {
        let mut c = Cursor::new(&[0x80]);
        let err = c.read_u32().unwrap_err();
        assert_eq!(err, LebError::UnexpectedEnd { pos: 1 });
    }

    #[quickcheck_macros::quickcheck]
    fn roundtrip_u32(n: u32) -> bool {
        let bytes = encode_u32(n);
        let mut c = Cursor::new(&bytes);
        c.read_u32().unwrap() == n
    }

    #[quickcheck_macros::quickcheck]
    fn roundtrip_s32(n: i32) -> bool {
        let bytes = encode_s32(n);
        let mut c = Cursor::new(&bytes);
        c.read_s32().unwrap() == n
    }

    #[quickcheck_macros::quickcheck]
    fn roundtrip_u64(n: u64) -> bool {
        let bytes = encode_u64(n);
        let mut c = Cursor::new(&bytes);
        c.read_u64().unwrap() == n
    }

    #[quickcheck_macros::quickcheck]
    fn roundtrip_s64(n: i64) -> bool {
        let bytes = encode_s64(n);
        let mut c = Cursor::new(&bytes);
        c.read_s64().unwrap() == n
    }
}
