//! Tag-prefixed encoders/decoders for every primitive value type.
//!
//! Each function here writes (or reads) exactly one tag byte followed by the
//! value's payload. None of them intern anything — string/object identity is
//! a cross-cutting concern handled by [`crate::intern::objects`] one layer
//! up. Keeping this module free of interning logic is what lets the array
//! codecs reuse these exact encodings for elements that are
//! never interned individually.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::endian::{ByteSwap, Endian};
use crate::error::{Error, Result};
use crate::leb128;
use crate::reader::ByteReader;
use crate::tag::Tag;
use crate::writer::BufferedWriter;

/// Selects between compact (LEB128/packed) and fixed-width native encodings
/// for the value types that support both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimization {
    /// Prefer the smallest encoding for each value.
    Size,
    /// Always use the fixed-width native encoding.
    Speed,
}

// Thresholds below which LEB128 is strictly smaller than the native
// fixed-width layout. The three-byte windows are chosen so
// that the LEB128 form always beats the type's native width; see DESIGN.md
// for the exact values picked for the two "7-byte window" cases.
const UNSIGNED_16_LEB128_MAX: u32 = 0x7F;
const UNSIGNED_32_LEB128_MAX: u32 = 0x1F_FFFF;
const SIGNED_3BYTE_WINDOW: i64 = 0xF_FFFF;
const SEVEN_BYTE_UNSIGNED_MAX: u64 = (1 << 49) - 1;
const SEVEN_BYTE_SIGNED_WINDOW: i64 = (1 << 48) - 1;

fn leb_u64(w: &mut dyn crate::writer::Sink, value: u64) -> Result<()> {
    let mut buf = [0u8; leb128::MAX_U64_LEB128_BYTES];
    let n = leb128::write_u64(&mut buf, value);
    w.write_bytes(&buf[..n])
}

fn leb_i64(w: &mut dyn crate::writer::Sink, value: i64) -> Result<()> {
    let mut buf = [0u8; leb128::MAX_U64_LEB128_BYTES];
    let n = leb128::write_i64(&mut buf, value);
    w.write_bytes(&buf[..n])
}

fn read_leb_u64(r: &mut dyn crate::reader::Source) -> Result<u64> {
    leb128::read_u64(|| r.read_u8())
}

fn read_leb_i64(r: &mut dyn crate::reader::Source) -> Result<i64> {
    leb128::read_i64(|| r.read_u8())
}

fn write_tag(w: &mut dyn crate::writer::Sink, tag: Tag) -> Result<()> {
    w.write_bytes(&[tag as u8])
}

fn expect_tag(r: &mut dyn crate::reader::Source, expected: Tag) -> Result<()> {
    let byte = r.read_u8()?;
    let got = Tag::from_byte(byte)?;
    if got != expected {
        return Err(Error::corrupt("unexpected payload tag"));
    }
    Ok(())
}

// ---------------------------------------------------------------- booleans

/// Writes a boolean using one of the two dedicated boolean tags.
pub fn write_bool(w: &mut dyn crate::writer::Sink, value: bool) -> Result<()> {
    write_tag(w, if value { Tag::BoolTrue } else { Tag::BoolFalse })
}

/// Reads a boolean, consuming its tag.
pub fn read_bool(r: &mut dyn crate::reader::Source) -> Result<bool> {
    match Tag::from_byte(r.read_u8()?)? {
        Tag::BoolTrue => Ok(true),
        Tag::BoolFalse => Ok(false),
        _ => Err(Error::corrupt("expected a boolean tag")),
    }
}

// --------------------------------------------------------- byte-ish scalars

macro_rules! fixed_scalar {
    ($write:ident, $read:ident, $ty:ty, $tag:ident, $n:literal) => {
        #[doc = concat!("Writes a `", stringify!($ty), "` as tag + raw bytes.")]
        pub fn $write(w: &mut dyn crate::writer::Sink, value: $ty) -> Result<()> {
            write_tag(w, Tag::$tag)?;
            w.write_bytes(&value.to_ne_bytes())
        }

        #[doc = concat!("Reads a `", stringify!($ty), "`, consuming its tag.")]
        pub fn $read(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<$ty> {
            expect_tag(r, Tag::$tag)?;
            let bytes: [u8; $n] = crate::reader::read_array(r)?;
            let native = <$ty>::from_ne_bytes(bytes);
            Ok(native.from_wire(endian))
        }
    };
}

/// Writes a `u8` as tag + one raw byte (endianness is irrelevant at one
/// byte, but the tag still marks the position).
pub fn write_u8(w: &mut dyn crate::writer::Sink, value: u8) -> Result<()> {
    write_tag(w, Tag::Byte)?;
    w.write_bytes(&[value])
}

/// Reads a `u8`, consuming its tag.
pub fn read_u8(r: &mut dyn crate::reader::Source) -> Result<u8> {
    expect_tag(r, Tag::Byte)?;
    r.read_u8()
}

/// Writes an `i8` as tag + one raw byte.
pub fn write_i8(w: &mut dyn crate::writer::Sink, value: i8) -> Result<()> {
    write_tag(w, Tag::SByte)?;
    w.write_bytes(&[value as u8])
}

/// Reads an `i8`, consuming its tag.
pub fn read_i8(r: &mut dyn crate::reader::Source) -> Result<i8> {
    expect_tag(r, Tag::SByte)?;
    Ok(r.read_u8()? as i8)
}

fixed_scalar!(write_f32, read_f32, f32, Single, 4);
fixed_scalar!(write_f64, read_f64, f64, Double, 8);

// ------------------------------------------------------------- size-vs-speed

macro_rules! leb_or_native_unsigned {
    ($write:ident, $read:ident, $ty:ty, $native_tag:ident, $leb_tag:ident, $n:literal, $threshold:expr) => {
        #[doc = concat!("Writes a `", stringify!($ty), "`, choosing native or LEB128 per `opt`.")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            value: $ty,
            opt: Optimization,
        ) -> Result<()> {
            let use_leb = matches!(opt, Optimization::Size) && u64::from(value) <= u64::from($threshold);
            if use_leb {
                write_tag(w, Tag::$leb_tag)?;
                leb_u64(w, value as u64)
            } else {
                write_tag(w, Tag::$native_tag)?;
                w.write_bytes(&value.to_ne_bytes())
            }
        }

        #[doc = concat!("Reads a `", stringify!($ty), "`, consuming its tag.")]
        pub fn $read(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<$ty> {
            match Tag::from_byte(r.read_u8()?)? {
                Tag::$native_tag => {
                    let bytes: [u8; $n] = crate::reader::read_array(r)?;
                    Ok(<$ty>::from_ne_bytes(bytes).from_wire(endian))
                }
                Tag::$leb_tag => {
                    let value = read_leb_u64(r)?;
                    <$ty>::try_from(value)
                        .map_err(|_| Error::corrupt("LEB128 value overflows target width"))
                }
                _ => Err(Error::corrupt("expected a numeric tag")),
            }
        }
    };
}

leb_or_native_unsigned!(
    write_u16,
    read_u16,
    u16,
    UInt16Native,
    UInt16Leb128,
    2,
    UNSIGNED_16_LEB128_MAX
);
leb_or_native_unsigned!(
    write_u32,
    read_u32,
    u32,
    UInt32Native,
    UInt32Leb128,
    4,
    UNSIGNED_32_LEB128_MAX
);

/// Writes a `u64`, choosing native or LEB128 per `opt`.
pub fn write_u64(
    w: &mut dyn crate::writer::Sink,
    value: u64,
    opt: Optimization,
) -> Result<()> {
    let use_leb = matches!(opt, Optimization::Size) && value <= SEVEN_BYTE_UNSIGNED_MAX;
    if use_leb {
        write_tag(w, Tag::UInt64Leb128)?;
        leb_u64(w, value)
    } else {
        write_tag(w, Tag::UInt64Native)?;
        w.write_bytes(&value.to_ne_bytes())
    }
}

/// Reads a `u64`, consuming its tag.
pub fn read_u64(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<u64> {
    match Tag::from_byte(r.read_u8()?)? {
        Tag::UInt64Native => {
            let bytes: [u8; 8] = crate::reader::read_array(r)?;
            Ok(u64::from_ne_bytes(bytes).from_wire(endian))
        }
        Tag::UInt64Leb128 => read_leb_u64(r),
        _ => Err(Error::corrupt("expected a u64 tag")),
    }
}

macro_rules! leb_or_native_signed {
    ($write:ident, $read:ident, $ty:ty, $native_tag:ident, $leb_tag:ident, $n:literal, $window:expr) => {
        #[doc = concat!("Writes an `", stringify!($ty), "`, choosing native or LEB128 per `opt`.")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            value: $ty,
            opt: Optimization,
        ) -> Result<()> {
            let v = value as i64;
            let use_leb = matches!(opt, Optimization::Size) && v >= -$window - 1 && v <= $window;
            if use_leb {
                write_tag(w, Tag::$leb_tag)?;
                leb_i64(w, v)
            } else {
                write_tag(w, Tag::$native_tag)?;
                w.write_bytes(&value.to_ne_bytes())
            }
        }

        #[doc = concat!("Reads an `", stringify!($ty), "`, consuming its tag.")]
        pub fn $read(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<$ty> {
            match Tag::from_byte(r.read_u8()?)? {
                Tag::$native_tag => {
                    let bytes: [u8; $n] = crate::reader::read_array(r)?;
                    Ok(<$ty>::from_ne_bytes(bytes).from_wire(endian))
                }
                Tag::$leb_tag => {
                    let value = read_leb_i64(r)?;
                    <$ty>::try_from(value)
                        .map_err(|_| Error::corrupt("LEB128 value overflows target width"))
                }
                _ => Err(Error::corrupt("expected a numeric tag")),
            }
        }
    };
}

leb_or_native_signed!(
    write_i16,
    read_i16,
    i16,
    Int16Native,
    Int16Leb128,
    2,
    SIGNED_3BYTE_WINDOW
);
leb_or_native_signed!(
    write_i32,
    read_i32,
    i32,
    Int32Native,
    Int32Leb128,
    4,
    SIGNED_3BYTE_WINDOW
);

/// Writes an `i64`, choosing native or LEB128 per `opt`.
pub fn write_i64(
    w: &mut dyn crate::writer::Sink,
    value: i64,
    opt: Optimization,
) -> Result<()> {
    let use_leb = matches!(opt, Optimization::Size)
        && value >= -SEVEN_BYTE_SIGNED_WINDOW - 1
        && value <= SEVEN_BYTE_SIGNED_WINDOW;
    if use_leb {
        write_tag(w, Tag::Int64Leb128)?;
        leb_i64(w, value)
    } else {
        write_tag(w, Tag::Int64Native)?;
        w.write_bytes(&value.to_ne_bytes())
    }
}

/// Reads an `i64`, consuming its tag.
pub fn read_i64(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<i64> {
    match Tag::from_byte(r.read_u8()?)? {
        Tag::Int64Native => {
            let bytes: [u8; 8] = crate::reader::read_array(r)?;
            Ok(i64::from_ne_bytes(bytes).from_wire(endian))
        }
        Tag::Int64Leb128 => read_leb_i64(r),
        _ => Err(Error::corrupt("expected an i64 tag")),
    }
}

/// Writes a `char` as its `u32` code point, choosing native or LEB128 per
/// `opt` using the same threshold as `u32` (a `char`'s code point is a
/// 4-byte native value, so it compares against the `u32` breakeven point,
/// not `u16`'s).
pub fn write_char(
    w: &mut dyn crate::writer::Sink,
    value: char,
    opt: Optimization,
) -> Result<()> {
    let code = value as u32;
    let use_leb = matches!(opt, Optimization::Size) && code <= UNSIGNED_32_LEB128_MAX;
    if use_leb {
        write_tag(w, Tag::CharLeb128)?;
        leb_u64(w, code as u64)
    } else {
        write_tag(w, Tag::CharNative)?;
        w.write_bytes(&code.to_ne_bytes())
    }
}

/// Reads a `char`, consuming its tag.
pub fn read_char(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<char> {
    let code = match Tag::from_byte(r.read_u8()?)? {
        Tag::CharNative => {
            let bytes: [u8; 4] = crate::reader::read_array(r)?;
            u32::from_ne_bytes(bytes).from_wire(endian)
        }
        Tag::CharLeb128 => crate::leb128::read_u32(|| r.read_u8())?,
        _ => return Err(Error::corrupt("expected a char tag")),
    };
    char::from_u32(code).ok_or_else(|| Error::corrupt("char code point out of range"))
}

// ------------------------------------------------------------------ strings

/// Writes a UTF-8 string: tag, LEB128 byte count, raw bytes.
pub fn write_str_utf8(w: &mut dyn crate::writer::Sink, value: &str) -> Result<()> {
    write_tag(w, Tag::StringUtf8)?;
    leb_u64(w, value.len() as u64)?;
    w.write_bytes(value.as_bytes())
}

/// Reads a UTF-8 string, consuming its tag.
pub fn read_str_utf8(r: &mut dyn crate::reader::Source) -> Result<String> {
    expect_tag(r, Tag::StringUtf8)?;
    let len = read_leb_u64(r)? as usize;
    let bytes = crate::reader::read_vec(r, len)?;
    String::from_utf8(bytes).map_err(|_| Error::corrupt("string payload is not valid UTF-8"))
}

/// Reads a UTF-8 string whose tag byte has already been consumed by the
/// caller, e.g. by code that must peek the tag first to check for
/// `AlreadySerialized` before committing to a fresh string read.
pub fn read_str_utf8_tagged(r: &mut dyn crate::reader::Source, tag: u8) -> Result<String> {
    if Tag::from_byte(tag)? != Tag::StringUtf8 {
        return Err(Error::corrupt("expected a UTF-8 string tag"));
    }
    let len = read_leb_u64(r)? as usize;
    let bytes = crate::reader::read_vec(r, len)?;
    String::from_utf8(bytes).map_err(|_| Error::corrupt("string payload is not valid UTF-8"))
}

/// Writes a string as UTF-16: tag, LEB128 code-unit count, raw code units in
/// the stream's endianness.
pub fn write_str_utf16(w: &mut dyn crate::writer::Sink, value: &str) -> Result<()> {
    write_tag(w, Tag::StringUtf16)?;
    let units: Vec<u16> = value.encode_utf16().collect();
    leb_u64(w, units.len() as u64)?;
    for unit in units {
        w.write_bytes(&unit.to_ne_bytes())?;
    }
    Ok(())
}

/// Reads a UTF-16 string, consuming its tag, swapping endianness if needed.
pub fn read_str_utf16(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<String> {
    expect_tag(r, Tag::StringUtf16)?;
    let count = read_leb_u64(r)? as usize;
    let mut units = Vec::with_capacity(count);
    for _ in 0..count {
        let bytes: [u8; 2] = crate::reader::read_array(r)?;
        units.push(u16::from_ne_bytes(bytes).from_wire(endian));
    }
    String::from_utf16(&units).map_err(|_| Error::corrupt("string payload is not valid UTF-16"))
}

// ------------------------------------------------------------------ decimal

/// A 128-bit decimal value: a 96-bit integer, a scale, and a sign, packed
/// into four 32-bit limbs the way `System.Decimal` lays them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decimal {
    /// Low 32 bits of the 96-bit integer.
    pub lo: u32,
    /// Middle 32 bits of the 96-bit integer.
    pub mid: u32,
    /// High 32 bits of the 96-bit integer.
    pub hi: u32,
    /// Sign (bit 31) and scale (bits 16-23).
    pub flags: u32,
}

impl crate::endian::ByteSwap for Decimal {
    /// Swaps each of the four limbs independently rather than reversing the
    /// whole 16-byte blob, matching the per-limb swap already used by
    /// [`read_decimal`].
    fn swapped(self) -> Self {
        Decimal {
            lo: self.lo.swap_bytes(),
            mid: self.mid.swap_bytes(),
            hi: self.hi.swap_bytes(),
            flags: self.flags.swap_bytes(),
        }
    }
}

/// Writes a [`Decimal`] as 16 raw bytes (four native-endian `u32` limbs).
pub fn write_decimal(w: &mut dyn crate::writer::Sink, value: Decimal) -> Result<()> {
    write_tag(w, Tag::Decimal)?;
    for limb in [value.lo, value.mid, value.hi, value.flags] {
        w.write_bytes(&limb.to_ne_bytes())?;
    }
    Ok(())
}

/// Reads a [`Decimal`], consuming its tag, swapping each limb if needed.
pub fn read_decimal(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<Decimal> {
    expect_tag(r, Tag::Decimal)?;
    let mut limbs = [0u32; 4];
    for limb in limbs.iter_mut() {
        let bytes: [u8; 4] = crate::reader::read_array(r)?;
        *limb = u32::from_ne_bytes(bytes).from_wire(endian);
    }
    Ok(Decimal {
        lo: limbs[0],
        mid: limbs[1],
        hi: limbs[2],
        flags: limbs[3],
    })
}

// --------------------------------------------------------------------- guid

/// Writes a [`Uuid`] as 16 raw bytes.
pub fn write_guid(w: &mut dyn crate::writer::Sink, value: Uuid) -> Result<()> {
    write_tag(w, Tag::Guid)?;
    w.write_bytes(value.as_bytes())
}

/// Reads a [`Uuid`], consuming its tag, reversing the byte order if the
/// stream's endianness disagrees with the host's.
pub fn read_guid(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<Uuid> {
    expect_tag(r, Tag::Guid)?;
    let mut bytes: [u8; 16] = crate::reader::read_array(r)?;
    if endian.needs_swap() {
        bytes.reverse();
    }
    Ok(Uuid::from_bytes(bytes))
}

// ---------------------------------------------------------------- date/time

/// Ticks (100ns units) between `0001-01-01T00:00:00` and the Unix epoch,
/// matching the well-known `DateTime.UnixEpoch.Ticks` constant. No
/// cross-runtime wire compatibility is promised, but it costs nothing to
/// pick a well-known epoch rather than inventing one.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

fn datetime_to_ticks(dt: NaiveDateTime) -> i64 {
    let nanos = dt.and_utc().timestamp_nanos_opt().unwrap_or(0);
    UNIX_EPOCH_TICKS + nanos / 100
}

fn ticks_to_datetime(ticks: i64) -> NaiveDateTime {
    let nanos = (ticks - UNIX_EPOCH_TICKS).saturating_mul(100);
    DateTime::from_timestamp(nanos.div_euclid(1_000_000_000), nanos.rem_euclid(1_000_000_000) as u32)
        .map(|dt| dt.naive_utc())
        .unwrap_or(DateTime::<chrono::Utc>::UNIX_EPOCH.naive_utc())
}

/// Writes a [`NaiveDateTime`] as tag + one native-endian `i64` tick count.
pub fn write_datetime(
    w: &mut dyn crate::writer::Sink,
    value: NaiveDateTime,
) -> Result<()> {
    write_tag(w, Tag::DateTime)?;
    w.write_bytes(&datetime_to_ticks(value).to_ne_bytes())
}

/// Reads a [`NaiveDateTime`], consuming its tag.
pub fn read_datetime(
    r: &mut dyn crate::reader::Source,
    endian: Endian,
) -> Result<NaiveDateTime> {
    expect_tag(r, Tag::DateTime)?;
    let bytes: [u8; 8] = crate::reader::read_array(r)?;
    Ok(ticks_to_datetime(i64::from_ne_bytes(bytes).from_wire(endian)))
}

/// Writes a [`DateTime<chrono::FixedOffset>`] as tag + two native-endian
/// `i64`s: ticks, then offset ticks.
pub fn write_datetime_offset(
    w: &mut dyn crate::writer::Sink,
    value: DateTime<chrono::FixedOffset>,
) -> Result<()> {
    write_tag(w, Tag::DateTimeOffset)?;
    let ticks = datetime_to_ticks(value.naive_utc());
    let offset_ticks = i64::from(value.offset().local_minus_utc()) * 10_000_000;
    w.write_bytes(&ticks.to_ne_bytes())?;
    w.write_bytes(&offset_ticks.to_ne_bytes())
}

/// Reads a [`DateTime<chrono::FixedOffset>`], consuming its tag.
pub fn read_datetime_offset(
    r: &mut dyn crate::reader::Source,
    endian: Endian,
) -> Result<DateTime<chrono::FixedOffset>> {
    expect_tag(r, Tag::DateTimeOffset)?;
    let ticks_bytes: [u8; 8] = crate::reader::read_array(r)?;
    let offset_bytes: [u8; 8] = crate::reader::read_array(r)?;
    let ticks = i64::from_ne_bytes(ticks_bytes).from_wire(endian);
    let offset_ticks = i64::from_ne_bytes(offset_bytes).from_wire(endian);
    let naive = ticks_to_datetime(ticks);
    let offset_seconds = (offset_ticks / 10_000_000) as i32;
    let offset = chrono::FixedOffset::east_opt(offset_seconds)
        .ok_or_else(|| Error::corrupt("date-time offset out of range"))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, offset))
}

/// Writes a [`NaiveDate`] under the dedicated `DateOnly` tag, as a LEB128
/// day-number counted from `0001-01-01`. Unlike the general integer types,
/// this construct gets a single tag rather than a native/LEB128 pair, so
/// there is no second representation for `opt` to choose between; the
/// parameter is accepted for call-site symmetry with the other scalar
/// writers and otherwise ignored.
pub fn write_date(
    w: &mut dyn crate::writer::Sink,
    value: NaiveDate,
    _opt: Optimization,
) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1).expect("valid calendar date");
    let days = (value - epoch).num_days();
    write_tag(w, Tag::DateOnly)?;
    leb_i64(w, days)
}

/// Reads a [`NaiveDate`], consuming its `DateOnly` tag.
pub fn read_date(r: &mut dyn crate::reader::Source, _endian: Endian) -> Result<NaiveDate> {
    expect_tag(r, Tag::DateOnly)?;
    let days = crate::leb128::read_i64(|| r.read_u8())?;
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1).expect("valid calendar date");
    epoch
        .checked_add_signed(chrono::Duration::days(days))
        .ok_or_else(|| Error::corrupt("date out of range"))
}

/// Writes a [`NaiveTime`] under the dedicated `TimeOnly` tag, as LEB128
/// ticks (100ns units) since midnight. See [`write_date`] for why there is
/// no native counterpart to choose via `opt`.
pub fn write_time(
    w: &mut dyn crate::writer::Sink,
    value: NaiveTime,
    _opt: Optimization,
) -> Result<()> {
    let nanos_since_midnight = i64::from(value.num_seconds_from_midnight()) * 1_000_000_000
        + i64::from(value.nanosecond());
    let ticks = nanos_since_midnight / 100;
    write_tag(w, Tag::TimeOnly)?;
    leb_i64(w, ticks)
}

/// Reads a [`NaiveTime`], consuming its `TimeOnly` tag.
pub fn read_time(r: &mut dyn crate::reader::Source, _endian: Endian) -> Result<NaiveTime> {
    expect_tag(r, Tag::TimeOnly)?;
    let ticks = crate::leb128::read_i64(|| r.read_u8())?;
    let nanos = ticks.saturating_mul(100);
    NaiveTime::from_num_seconds_from_midnight_opt(
        (nanos / 1_000_000_000) as u32,
        (nanos % 1_000_000_000) as u32,
    )
    .ok_or_else(|| Error::corrupt("time-of-day out of range"))
}

/// Writes the `NullReference` tag.
pub fn write_null(w: &mut dyn crate::writer::Sink) -> Result<()> {
    write_tag(w, Tag::NullReference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip_bytes<T>(
        encode: impl FnOnce(&mut BufferedWriter<Vec<u8>>) -> Result<()>,
        decode: impl FnOnce(&mut ByteReader<&[u8]>) -> Result<T>,
    ) -> T {
        let mut w = BufferedWriter::new(Vec::new());
        encode(&mut w).unwrap();
        let bytes = w.into_inner().unwrap();
        let mut r = ByteReader::new(&bytes[..]);
        decode(&mut r).unwrap()
    }

    #[test]
    fn bool_tags_are_distinct() {
        let mut w = BufferedWriter::new(Vec::new());
        write_bool(&mut w, true).unwrap();
        write_bool(&mut w, false).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes, vec![Tag::BoolTrue as u8, Tag::BoolFalse as u8]);
    }

    #[test]
    fn u32_size_mode_uses_leb128_under_threshold() {
        let got = roundtrip_bytes(
            |w| write_u32(w, 127, Optimization::Size),
            |r| read_u32(r, Endian::host()),
        );
        assert_eq!(got, 127);

        let mut w = BufferedWriter::new(Vec::new());
        write_u32(&mut w, 127, Optimization::Size).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes, vec![Tag::UInt32Leb128 as u8, 0x7F]);
    }

    #[test]
    fn u32_speed_mode_always_native() {
        let mut w = BufferedWriter::new(Vec::new());
        write_u32(&mut w, 127, Optimization::Speed).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes[0], Tag::UInt32Native as u8);
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn negative_i32_roundtrips_in_size_mode() {
        let got = roundtrip_bytes(
            |w| write_i32(w, -5, Optimization::Size),
            |r| read_i32(r, Endian::host()),
        );
        assert_eq!(got, -5);
    }

    #[test]
    fn strings_roundtrip_utf8_and_utf16() {
        let s = "hello, \u{1F980}";
        let got8 = roundtrip_bytes(
            |w| write_str_utf8(w, s),
            |r| read_str_utf8(r),
        );
        assert_eq!(got8, s);

        let got16 = roundtrip_bytes(
            |w| write_str_utf16(w, s),
            |r| read_str_utf16(r, Endian::host()),
        );
        assert_eq!(got16, s);
    }

    #[test]
    fn decimal_roundtrips() {
        let d = Decimal { lo: 1, mid: 2, hi: 3, flags: 0x0002_0000 };
        let got = roundtrip_bytes(
            |w| write_decimal(w, d),
            |r| read_decimal(r, Endian::host()),
        );
        assert_eq!(got, d);
    }

    #[test]
    fn guid_roundtrips() {
        let id = Uuid::from_u128(0x1234_5678_90ab_cdef_1122_334455667788);
        let got = roundtrip_bytes(
            |w| write_guid(w, id),
            |r| read_guid(r, Endian::host()),
        );
        assert_eq!(got, id);
    }

    #[test]
    fn datetime_roundtrips_to_the_second() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(1, 59, 26)
            .unwrap();
        let got = roundtrip_bytes(
            |w| write_datetime(w, dt),
            |r| read_datetime(r, Endian::host()),
        );
        assert_eq!(got, dt);
    }

    #[test]
    fn date_only_and_time_only_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let got = roundtrip_bytes(
            |w| write_date(w, date, Optimization::Size),
            |r| read_date(r, Endian::host()),
        );
        assert_eq!(got, date);

        let time = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
        let got = roundtrip_bytes(
            |w| write_time(w, time, Optimization::Size),
            |r| read_time(r, Endian::host()),
        );
        assert_eq!(got, time);
    }

    proptest! {
        #[test]
        fn prop_u32_roundtrips_both_modes(value: u32) {
            for opt in [Optimization::Size, Optimization::Speed] {
                let got = roundtrip_bytes(
                    |w| write_u32(w, value, opt),
                    |r| read_u32(r, Endian::host()),
                );
                prop_assert_eq!(got, value);
            }
        }

        #[test]
        fn prop_i64_roundtrips_both_modes(value: i64) {
            for opt in [Optimization::Size, Optimization::Speed] {
                let got = roundtrip_bytes(
                    |w| write_i64(w, value, opt),
                    |r| read_i64(r, Endian::host()),
                );
                prop_assert_eq!(got, value);
            }
        }
    }
}
