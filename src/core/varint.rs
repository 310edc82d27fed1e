//! # VarInt Codec
//!
//! Variable-length signed integers as used by every TDF scalar.
//!
//! ## Wire Format
//! ```text
//! first byte:  [cont(1)] [sign(1)] [value bits 0..6 (6)]
//! next bytes:  [cont(1)] [value bits (7)]
//! ```
//! The magnitude is stored little-end first; the sign lives only in the
//! first byte. A 64-bit magnitude needs at most 10 bytes.

use bytes::{Buf, BufMut};

use crate::core::tdf::TdfError;

/// Longest encoding of a 64-bit value (6 + 9 * 7 bits).
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUE: u8 = 0x80;
const SIGN: u8 = 0x40;
const FIRST_MASK: u8 = 0x3F;
const NEXT_MASK: u8 = 0x7F;

/// Append `value` to `buf`.
pub fn write_varint<B: BufMut>(buf: &mut B, value: i64) {
    let mut magnitude = value.unsigned_abs();

    let mut first = (magnitude & u64::from(FIRST_MASK)) as u8;
    if value < 0 {
        first |= SIGN;
    }
    magnitude >>= 6;

    if magnitude == 0 {
        buf.put_u8(first);
        return;
    }
    buf.put_u8(first | CONTINUE);

    while magnitude > u64::from(NEXT_MASK) {
        buf.put_u8((magnitude & u64::from(NEXT_MASK)) as u8 | CONTINUE);
        magnitude >>= 7;
    }
    buf.put_u8(magnitude as u8);
}

/// Read one varint from `buf`, stopping at the first byte without the
/// continuation bit. Never reads past the end of `buf`.
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<i64, TdfError> {
    if !buf.has_remaining() {
        return Err(TdfError::UnexpectedEof);
    }

    let mut byte = buf.get_u8();
    let negative = byte & SIGN != 0;
    let mut magnitude = u64::from(byte & FIRST_MASK);
    let mut shift = 6u32;

    while byte & CONTINUE != 0 {
        if !buf.has_remaining() {
            return Err(TdfError::UnexpectedEof);
        }
        byte = buf.get_u8();

        let bits = u64::from(byte & NEXT_MASK);
        if shift >= u64::BITS || (shift > u64::BITS - 7 && bits >> (u64::BITS - shift) != 0) {
            return Err(TdfError::VarIntOverflow);
        }
        magnitude |= bits << shift;
        shift += 7;
    }

    if negative {
        // i64::MIN has a magnitude of exactly 2^63
        if magnitude > 1 << 63 {
            return Err(TdfError::VarIntOverflow);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| TdfError::VarIntOverflow)
    }
}

/// Number of bytes `write_varint` produces for `value`.
pub fn varint_len(value: i64) -> usize {
    let magnitude = value.unsigned_abs() >> 6;
    if magnitude == 0 {
        return 1;
    }
    let bits = u64::BITS - magnitude.leading_zeros();
    1 + bits.div_ceil(7) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, value);
        buf
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(63), vec![0x3F]);
        assert_eq!(encode(64), vec![0x80, 0x01]);
        assert_eq!(encode(-1), vec![0x41]);
        assert_eq!(encode(-64), vec![0xC0, 0x01]);
        assert_eq!(encode(8256), vec![0x80, 0x81, 0x01]);
    }

    #[test]
    fn extremes_roundtrip() {
        for value in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX, u32::MAX as i64] {
            let bytes = encode(value);
            assert!(bytes.len() <= MAX_VARINT_LEN);
            assert_eq!(bytes.len(), varint_len(value), "length of {value}");
            let mut slice = &bytes[..];
            assert_eq!(read_varint(&mut slice).unwrap(), value);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn stops_at_terminal_byte() {
        let bytes = [0x80, 0x01, 0xFF, 0xFF];
        let mut slice = &bytes[..];
        assert_eq!(read_varint(&mut slice).unwrap(), 64);
        assert_eq!(slice.len(), 2);
    }

    #[test]
    fn truncated_input_is_eof() {
        let mut empty: &[u8] = &[];
        assert_eq!(read_varint(&mut empty), Err(TdfError::UnexpectedEof));

        let mut cut: &[u8] = &[0x80, 0x81];
        assert_eq!(read_varint(&mut cut), Err(TdfError::UnexpectedEof));
    }

    #[test]
    fn overlong_input_overflows() {
        let mut bytes = vec![0xBF];
        bytes.extend(std::iter::repeat(0xFF).take(9));
        bytes.push(0x01);
        let mut slice = &bytes[..];
        assert_eq!(read_varint(&mut slice), Err(TdfError::VarIntOverflow));
    }
}
