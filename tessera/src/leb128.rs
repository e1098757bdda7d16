//! Variable-length integer encoding.
//!
//! Unsigned values use plain LEB128: 7-bit groups, little-endian, with the
//! high bit of each byte marking continuation. Signed values use the
//! DWARF-style sign-extending variant (not ZigZag): the terminating group
//! carries the sign in its highest used bit, so small negative numbers are
//! just as compact as small positive ones.

use crate::error::{Error, Result};

/// Worst-case encoded length of a 32-bit value.
pub const MAX_U32_LEB128_BYTES: usize = 5;
/// Worst-case encoded length of a 64-bit value.
pub const MAX_U64_LEB128_BYTES: usize = 10;

/// Writes `value` as unsigned LEB128 into `out`, returning the number of
/// bytes written. `out` must have room for at least [`MAX_U64_LEB128_BYTES`].
pub fn write_u64(out: &mut [u8], mut value: u64) -> usize {
    let mut i = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out[i] = byte;
        i += 1;
        if value == 0 {
            break;
        }
    }
    i
}

/// Writes `value` as signed LEB128 into `out`, returning the number of bytes
/// written. `out` must have room for at least [`MAX_U64_LEB128_BYTES`].
pub fn write_i64(out: &mut [u8], mut value: i64) -> usize {
    let mut i = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        let sign_bit_set = byte & 0x40 != 0;
        let done = (value == 0 && !sign_bit_set) || (value == -1 && sign_bit_set);
        if !done {
            byte |= 0x80;
        }
        out[i] = byte;
        i += 1;
        if done {
            break;
        }
    }
    i
}

/// Reads an unsigned LEB128 value from `read`, one byte at a time.
pub fn read_u64(mut read: impl FnMut() -> Result<u8>) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = read()?;
        if shift >= 64 || (shift == 63 && byte > 1) {
            return Err(Error::CorruptStream {
                reason: "LEB128 value overflows u64",
            });
        }
        result |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(result)
}

/// Reads a signed LEB128 value from `read`, one byte at a time.
pub fn read_i64(mut read: impl FnMut() -> Result<u8>) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    let mut byte;
    loop {
        byte = read()?;
        if shift >= 64 {
            return Err(Error::CorruptStream {
                reason: "LEB128 value overflows i64",
            });
        }
        result |= i64::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    if shift < 64 && byte & 0x40 != 0 {
        result |= -1i64 << shift;
    }
    Ok(result)
}

/// Reads an unsigned LEB128 value and narrows it to `u32`, rejecting values
/// that do not fit.
pub fn read_u32(read: impl FnMut() -> Result<u8>) -> Result<u32> {
    let value = read_u64(read)?;
    u32::try_from(value).map_err(|_| Error::CorruptStream {
        reason: "LEB128 value overflows u32",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip_u64(value: u64) {
        let mut buf = [0u8; MAX_U64_LEB128_BYTES];
        let n = write_u64(&mut buf, value);
        let mut pos = 0;
        let got = read_u64(|| {
            let b = buf[pos];
            pos += 1;
            Ok(b)
        })
        .unwrap();
        assert_eq!(got, value);
        assert_eq!(pos, n);
    }

    fn roundtrip_i64(value: i64) {
        let mut buf = [0u8; MAX_U64_LEB128_BYTES];
        let n = write_i64(&mut buf, value);
        let mut pos = 0;
        let got = read_i64(|| {
            let b = buf[pos];
            pos += 1;
            Ok(b)
        })
        .unwrap();
        assert_eq!(got, value);
        assert_eq!(pos, n);
    }

    #[test]
    fn single_byte_values() {
        roundtrip_u64(0);
        roundtrip_u64(1);
        roundtrip_u64(0x7f);
        roundtrip_i64(0);
        roundtrip_i64(-1);
        roundtrip_i64(63);
        roundtrip_i64(-64);
    }

    #[test]
    fn multi_byte_boundaries() {
        roundtrip_u64(0x80);
        roundtrip_u64(u64::MAX);
        roundtrip_i64(64);
        roundtrip_i64(-65);
        roundtrip_i64(i64::MIN);
        roundtrip_i64(i64::MAX);
    }

    #[test]
    fn worst_case_sizes() {
        let mut buf = [0u8; MAX_U64_LEB128_BYTES];
        assert_eq!(write_u64(&mut buf, u64::MAX), MAX_U64_LEB128_BYTES);
        assert_eq!(write_i64(&mut buf, i64::MIN), MAX_U64_LEB128_BYTES);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_u64(value: u64) {
            roundtrip_u64(value);
        }

        #[test]
        fn prop_roundtrip_i64(value: i64) {
            roundtrip_i64(value);
        }
    }
}
