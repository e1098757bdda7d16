//! One-dimensional and multidimensional array codecs.
//!
//! This is the most mechanical part of the engine: each primitive element
//! type gets a 1-D and a multidimensional encoding, built from the same
//! three framing pieces (length/rank/bounds headers) and the same two
//! element policies (always-native, or size-vs-speed with a packed bitmap).
//! Arrays-of-objects are framed here too, but their element encoding
//! delegates to the generic dispatcher in [`crate::session`], since that is
//! the only layer that knows about the type/object intern tables.

use crate::endian::{ByteSwap, Endian};
use crate::error::{Error, Result};
use crate::leb128;
use crate::primitive::Optimization;
use crate::reader::ByteReader;
use crate::tag::Tag;
use crate::writer::BufferedWriter;

/// Elements per chunk when streaming always-native fixed-width arrays.
const ARRAY_CHUNK_ELEMENTS: usize = 4096;

/// The shape of a multidimensional array: one `(lower_bound, count)` pair
/// per dimension, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape(pub Vec<(i64, u64)>);

impl Shape {
    /// Total element count across all dimensions.
    pub fn element_count(&self) -> u64 {
        self.0.iter().map(|(_, count)| *count).product()
    }

    /// Rank (number of dimensions).
    pub fn rank(&self) -> usize {
        self.0.len()
    }
}

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
    if Tag::from_byte(byte)? != expected {
        return Err(Error::corrupt("unexpected array tag"));
    }
    Ok(())
}

/// Writes a 1-D array header: tag + LEB128 length.
pub fn write_header_1d(
    w: &mut dyn crate::writer::Sink,
    tag: Tag,
    len: usize,
) -> Result<()> {
    write_tag(w, tag)?;
    leb_u64(w, len as u64)
}

/// Reads a 1-D array header (after confirming `expected`), returning the
/// element count.
pub fn read_header_1d(r: &mut dyn crate::reader::Source, expected: Tag) -> Result<usize> {
    expect_tag(r, expected)?;
    Ok(read_leb_u64(r)? as usize)
}

/// Writes a multidimensional array header: tag, LEB128 rank, then LEB128
/// `(lower_bound, count)` per dimension.
pub fn write_header_md(
    w: &mut dyn crate::writer::Sink,
    tag: Tag,
    shape: &Shape,
) -> Result<()> {
    write_tag(w, tag)?;
    leb_u64(w, shape.rank() as u64)?;
    for (lower, count) in &shape.0 {
        leb_i64(w, *lower)?;
        leb_u64(w, *count)?;
    }
    Ok(())
}

/// Reads a multidimensional array header (after confirming `expected`).
pub fn read_header_md(r: &mut dyn crate::reader::Source, expected: Tag) -> Result<Shape> {
    expect_tag(r, expected)?;
    let rank = read_leb_u64(r)? as usize;
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        let lower = read_leb_i64(r)?;
        let count = read_leb_u64(r)?;
        dims.push((lower, count));
    }
    Ok(Shape(dims))
}

/// Advances a row-major multidimensional index in place (rightmost index
/// fastest), returning `false` once the index has wrapped past the last
/// element.
pub fn advance_row_major(index: &mut [u64], shape: &Shape) -> bool {
    for i in (0..index.len()).rev() {
        index[i] += 1;
        if index[i] < shape.0[i].1 {
            return true;
        }
        index[i] = 0;
    }
    false
}

// ------------------------------------------------------------ bool arrays

/// Writes a 1-D `bool` array: speed mode is one raw byte per element, size
/// mode is packed one bit per element, tail-padded.
pub fn write_bool_array_1d(
    w: &mut dyn crate::writer::Sink,
    values: &[bool],
    opt: Optimization,
) -> Result<()> {
    match opt {
        Optimization::Speed => {
            write_header_1d(w, Tag::ArrayBoolSpeed, values.len())?;
            for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
                let bytes: Vec<u8> = chunk.iter().map(|&b| b as u8).collect();
                w.write_bytes(&bytes)?;
            }
        }
        Optimization::Size => {
            write_header_1d(w, Tag::ArrayBoolPacked, values.len())?;
            w.write_bytes(&pack_bits(values))?;
        }
    }
    Ok(())
}

/// Reads a 1-D `bool` array written by [`write_bool_array_1d`].
pub fn read_bool_array_1d(r: &mut dyn crate::reader::Source) -> Result<Vec<bool>> {
    let byte = r.read_u8()?;
    match Tag::from_byte(byte)? {
        Tag::ArrayBoolSpeed => {
            let len = read_leb_u64(r)? as usize;
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(r.read_u8()? != 0);
            }
            Ok(out)
        }
        Tag::ArrayBoolPacked => {
            let len = read_leb_u64(r)? as usize;
            let byte_len = len.div_ceil(8);
            let bytes = crate::reader::read_vec(r, byte_len)?;
            Ok(unpack_bits(&bytes, len))
        }
        _ => Err(Error::corrupt("expected a bool array tag")),
    }
}

fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; values.len().div_ceil(8)];
    for (i, &v) in values.iter().enumerate() {
        if v {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn unpack_bits(bytes: &[u8], len: usize) -> Vec<bool> {
    (0..len)
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

// ---------------------------------------------------- always-native arrays

macro_rules! native_array {
    ($write:ident, $read:ident, $ty:ty, $tag1:ident, $tagmd:ident, $n:literal) => {
        #[doc = concat!("Writes a 1-D `", stringify!($ty), "` array (always native).")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            values: &[$ty],
        ) -> Result<()> {
            write_header_1d(w, Tag::$tag1, values.len())?;
            write_native_payload(w, values)
        }

        #[doc = concat!("Reads a 1-D `", stringify!($ty), "` array written by the matching writer.")]
        pub fn $read(
            r: &mut dyn crate::reader::Source,
            endian: Endian,
        ) -> Result<Vec<$ty>> {
            let len = read_header_1d(r, Tag::$tag1)?;
            read_native_payload::<$ty, $n>(r, len, endian)
        }
    };
}

fn write_native_payload<T: ByteSwap + NativeBytes>(
    w: &mut dyn crate::writer::Sink,
    values: &[T],
) -> Result<()> {
    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
        for value in chunk {
            w.write_bytes(&value.to_ne())?;
        }
    }
    Ok(())
}

fn read_native_payload<T: ByteSwap + NativeBytes, const N: usize>(
    r: &mut dyn crate::reader::Source,
    len: usize,
    endian: Endian,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let bytes: [u8; N] = crate::reader::read_array(r)?;
        out.push(T::from_ne(&bytes).from_wire(endian));
    }
    Ok(out)
}

/// Bridges a fixed-width numeric type to its native byte representation so
/// the always-native array codecs can stay generic over element type.
trait NativeBytes: Copy {
    fn to_ne(&self) -> Vec<u8>;
    fn from_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_native_bytes {
    ($ty:ty, $n:literal) => {
        impl NativeBytes for $ty {
            fn to_ne(&self) -> Vec<u8> {
                self.to_ne_bytes().to_vec()
            }
            fn from_ne(bytes: &[u8]) -> Self {
                let mut arr = [0u8; $n];
                arr.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(arr)
            }
        }
    };
}

impl_native_bytes!(f32, 4);
impl_native_bytes!(f64, 8);

impl NativeBytes for crate::primitive::Decimal {
    fn to_ne(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        for limb in [self.lo, self.mid, self.hi, self.flags] {
            out.extend_from_slice(&limb.to_ne_bytes());
        }
        out
    }

    fn from_ne(bytes: &[u8]) -> Self {
        let limb = |range: std::ops::Range<usize>| {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(&bytes[range]);
            u32::from_ne_bytes(arr)
        };
        crate::primitive::Decimal {
            lo: limb(0..4),
            mid: limb(4..8),
            hi: limb(8..12),
            flags: limb(12..16),
        }
    }
}

native_array!(write_f32_array_1d, read_f32_array_1d, f32, ArraySingle, MDArraySingle, 4);
native_array!(write_f64_array_1d, read_f64_array_1d, f64, ArrayDouble, MDArrayDouble, 8);
native_array!(
    write_decimal_array_1d, read_decimal_array_1d, crate::primitive::Decimal,
    ArrayDecimal, MDArrayDecimal, 16
);

/// Writes a 1-D `u8` array (always native: raw bytes).
pub fn write_u8_array_1d(w: &mut dyn crate::writer::Sink, values: &[u8]) -> Result<()> {
    write_header_1d(w, Tag::ArrayByte, values.len())?;
    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
        w.write_bytes(chunk)?;
    }
    Ok(())
}

/// Reads a 1-D `u8` array written by [`write_u8_array_1d`].
pub fn read_u8_array_1d(r: &mut dyn crate::reader::Source) -> Result<Vec<u8>> {
    let len = read_header_1d(r, Tag::ArrayByte)?;
    crate::reader::read_vec(r, len)
}

/// Writes a 1-D `i8` array (always native: raw bytes).
pub fn write_i8_array_1d(w: &mut dyn crate::writer::Sink, values: &[i8]) -> Result<()> {
    write_header_1d(w, Tag::ArraySByte, values.len())?;
    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
        let bytes: Vec<u8> = chunk.iter().map(|&b| b as u8).collect();
        w.write_bytes(&bytes)?;
    }
    Ok(())
}

/// Reads a 1-D `i8` array written by [`write_i8_array_1d`].
pub fn read_i8_array_1d(r: &mut dyn crate::reader::Source) -> Result<Vec<i8>> {
    let len = read_header_1d(r, Tag::ArraySByte)?;
    Ok(crate::reader::read_vec(r, len)?.into_iter().map(|b| b as i8).collect())
}

// ------------------------------------------------- size-vs-speed arrays

macro_rules! leb_or_native_array {
    (
        $write:ident, $read:ident, $ty:ty, $utag:ident,
        $tag_native:ident, $tag_compact:ident, $n:literal,
        $is_leb:expr, $write_leb:expr, $read_leb:expr
    ) => {
        #[doc = concat!("Writes a 1-D `", stringify!($ty), "` array, size or speed mode.")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            values: &[$ty],
            opt: Optimization,
        ) -> Result<()> {
            match opt {
                Optimization::Speed => {
                    write_header_1d(w, Tag::$tag_native, values.len())?;
                    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
                        for &value in chunk {
                            w.write_bytes(&value.to_ne_bytes())?;
                        }
                    }
                }
                Optimization::Size => {
                    write_header_1d(w, Tag::$tag_compact, values.len())?;
                    let bits: Vec<bool> = values.iter().map(|&v| $is_leb(v)).collect();
                    w.write_bytes(&pack_bits(&bits))?;
                    for (&value, leb) in values.iter().zip(bits.iter()) {
                        if *leb {
                            $write_leb(w, value)?;
                        } else {
                            w.write_bytes(&value.to_ne_bytes())?;
                        }
                    }
                }
            }
            Ok(())
        }

        #[doc = concat!("Reads a 1-D `", stringify!($ty), "` array written by the matching writer.")]
        pub fn $read(
            r: &mut dyn crate::reader::Source,
            endian: Endian,
        ) -> Result<Vec<$ty>> {
            let byte = r.read_u8()?;
            match Tag::from_byte(byte)? {
                Tag::$tag_native => {
                    let len = read_leb_u64(r)? as usize;
                    let mut out = Vec::with_capacity(len);
                    for _ in 0..len {
                        let bytes: [u8; $n] = crate::reader::read_array(r)?;
                        out.push(<$ty>::from_ne_bytes(bytes).from_wire(endian));
                    }
                    Ok(out)
                }
                Tag::$tag_compact => {
                    let len = read_leb_u64(r)? as usize;
                    let bitmap = crate::reader::read_vec(r, len.div_ceil(8))?;
                    let bits = unpack_bits(&bitmap, len);
                    let mut out = Vec::with_capacity(len);
                    for leb in bits {
                        if leb {
                            out.push($read_leb(r)?);
                        } else {
                            let bytes: [u8; $n] = crate::reader::read_array(r)?;
                            out.push(<$ty>::from_ne_bytes(bytes).from_wire(endian));
                        }
                    }
                    Ok(out)
                }
                _ => Err(Error::corrupt("expected a numeric array tag")),
            }
        }
    };
}

leb_or_native_array!(
    write_u16_array_1d, read_u16_array_1d, u16, u16,
    ArrayUInt16Native, ArrayUInt16Compact, 2,
    |v: u16| v <= 0x7F, |w: &mut dyn crate::writer::Sink, v: u16| leb_u64(w, v as u64),
    |r: &mut dyn crate::reader::Source| -> Result<u16> { Ok(read_leb_u64(r)? as u16) }
);
leb_or_native_array!(
    write_u32_array_1d, read_u32_array_1d, u32, u32,
    ArrayUInt32Native, ArrayUInt32Compact, 4,
    |v: u32| v <= 0x1F_FFFF, |w: &mut dyn crate::writer::Sink, v: u32| leb_u64(w, v as u64),
    |r: &mut dyn crate::reader::Source| -> Result<u32> { Ok(read_leb_u64(r)? as u32) }
);
leb_or_native_array!(
    write_u64_array_1d, read_u64_array_1d, u64, u64,
    ArrayUInt64Native, ArrayUInt64Compact, 8,
    |v: u64| v <= (1u64 << 49) - 1, |w: &mut dyn crate::writer::Sink, v: u64| leb_u64(w, v),
    |r: &mut dyn crate::reader::Source| -> Result<u64> { read_leb_u64(r) }
);
leb_or_native_array!(
    write_i16_array_1d, read_i16_array_1d, i16, i16,
    ArrayInt16Native, ArrayInt16Compact, 2,
    |v: i16| (v as i64) >= -0xF_FFFF - 1 && (v as i64) <= 0xF_FFFF,
    |w: &mut dyn crate::writer::Sink, v: i16| leb_i64(w, v as i64),
    |r: &mut dyn crate::reader::Source| -> Result<i16> { Ok(read_leb_i64(r)? as i16) }
);
leb_or_native_array!(
    write_i32_array_1d, read_i32_array_1d, i32, i32,
    ArrayInt32Native, ArrayInt32Compact, 4,
    |v: i32| (v as i64) >= -0xF_FFFF - 1 && (v as i64) <= 0xF_FFFF,
    |w: &mut dyn crate::writer::Sink, v: i32| leb_i64(w, v as i64),
    |r: &mut dyn crate::reader::Source| -> Result<i32> { Ok(read_leb_i64(r)? as i32) }
);
leb_or_native_array!(
    write_i64_array_1d, read_i64_array_1d, i64, i64,
    ArrayInt64Native, ArrayInt64Compact, 8,
    |v: i64| v >= -((1i64 << 48) - 1) - 1 && v <= (1i64 << 48) - 1,
    |w: &mut dyn crate::writer::Sink, v: i64| leb_i64(w, v),
    |r: &mut dyn crate::reader::Source| -> Result<i64> { read_leb_i64(r) }
);

/// Writes a 1-D `char` array, size or speed mode (same thresholds as a
/// single `char`, see [`crate::primitive::write_char`]).
pub fn write_char_array_1d(
    w: &mut dyn crate::writer::Sink,
    values: &[char],
    opt: Optimization,
) -> Result<()> {
    let codes: Vec<u32> = values.iter().map(|&c| c as u32).collect();
    match opt {
        Optimization::Speed => {
            write_header_1d(w, Tag::ArrayCharNative, codes.len())?;
            for &code in &codes {
                w.write_bytes(&code.to_ne_bytes())?;
            }
        }
        Optimization::Size => {
            write_header_1d(w, Tag::ArrayCharCompact, codes.len())?;
            let bits: Vec<bool> = codes.iter().map(|&c| c <= 0x1F_FFFF).collect();
            w.write_bytes(&pack_bits(&bits))?;
            for (&code, leb) in codes.iter().zip(bits.iter()) {
                if *leb {
                    leb_u64(w, code as u64)?;
                } else {
                    w.write_bytes(&code.to_ne_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// Reads a 1-D `char` array written by [`write_char_array_1d`].
pub fn read_char_array_1d(
    r: &mut dyn crate::reader::Source,
    endian: Endian,
) -> Result<Vec<char>> {
    let byte = r.read_u8()?;
    let codes: Vec<u32> = match Tag::from_byte(byte)? {
        Tag::ArrayCharNative => {
            let len = read_leb_u64(r)? as usize;
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                let bytes: [u8; 4] = crate::reader::read_array(r)?;
                out.push(u32::from_ne_bytes(bytes).from_wire(endian));
            }
            out
        }
        Tag::ArrayCharCompact => {
            let len = read_leb_u64(r)? as usize;
            let bitmap = crate::reader::read_vec(r, len.div_ceil(8))?;
            let bits = unpack_bits(&bitmap, len);
            let mut out = Vec::with_capacity(len);
            for leb in bits {
                if leb {
                    out.push(crate::leb128::read_u32(|| r.read_u8())?);
                } else {
                    let bytes: [u8; 4] = crate::reader::read_array(r)?;
                    out.push(u32::from_ne_bytes(bytes).from_wire(endian));
                }
            }
            out
        }
        _ => return Err(Error::corrupt("expected a char array tag")),
    };
    codes
        .into_iter()
        .map(|c| char::from_u32(c).ok_or_else(|| Error::corrupt("char code point out of range")))
        .collect()
}

// --------------------------------------------------- multidimensional arrays
//
// Elements are stored (and iterated) in row-major order; callers pass/
// receive a flat `Vec<T>` in that order alongside the `Shape`.

macro_rules! native_md_array {
    ($write:ident, $read:ident, $ty:ty, $tag:ident, $n:literal) => {
        #[doc = concat!("Writes a multidimensional `", stringify!($ty), "` array (always native).")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            shape: &Shape,
            values: &[$ty],
        ) -> Result<()> {
            write_header_md(w, Tag::$tag, shape)?;
            for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
                for value in chunk {
                    w.write_bytes(&value.to_ne_bytes())?;
                }
            }
            Ok(())
        }

        #[doc = concat!("Reads a multidimensional `", stringify!($ty), "` array written by the matching writer.")]
        pub fn $read(
            r: &mut dyn crate::reader::Source,
            endian: Endian,
        ) -> Result<(Shape, Vec<$ty>)> {
            let shape = read_header_md(r, Tag::$tag)?;
            let count = shape.element_count() as usize;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                let bytes: [u8; $n] = crate::reader::read_array(r)?;
                out.push(<$ty>::from_ne_bytes(bytes).from_wire(endian));
            }
            Ok((shape, out))
        }
    };
}

native_md_array!(write_f32_array_md, read_f32_array_md, f32, MDArraySingle, 4);
native_md_array!(write_f64_array_md, read_f64_array_md, f64, MDArrayDouble, 8);
native_md_array!(
    write_decimal_array_md, read_decimal_array_md, crate::primitive::Decimal,
    MDArrayDecimal, 16
);

/// Writes a multidimensional `u8` array (always native).
pub fn write_u8_array_md(
    w: &mut dyn crate::writer::Sink,
    shape: &Shape,
    values: &[u8],
) -> Result<()> {
    write_header_md(w, Tag::MDArrayByte, shape)?;
    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
        w.write_bytes(chunk)?;
    }
    Ok(())
}

/// Reads a multidimensional `u8` array written by [`write_u8_array_md`].
pub fn read_u8_array_md(r: &mut dyn crate::reader::Source) -> Result<(Shape, Vec<u8>)> {
    let shape = read_header_md(r, Tag::MDArrayByte)?;
    let values = crate::reader::read_vec(r, shape.element_count() as usize)?;
    Ok((shape, values))
}

/// Writes a multidimensional `i8` array (always native: raw bytes).
pub fn write_i8_array_md(w: &mut dyn crate::writer::Sink, shape: &Shape, values: &[i8]) -> Result<()> {
    write_header_md(w, Tag::MDArraySByte, shape)?;
    for chunk in values.chunks(ARRAY_CHUNK_ELEMENTS) {
        let bytes: Vec<u8> = chunk.iter().map(|&b| b as u8).collect();
        w.write_bytes(&bytes)?;
    }
    Ok(())
}

/// Reads a multidimensional `i8` array written by [`write_i8_array_md`].
pub fn read_i8_array_md(r: &mut dyn crate::reader::Source) -> Result<(Shape, Vec<i8>)> {
    let shape = read_header_md(r, Tag::MDArraySByte)?;
    let values = crate::reader::read_vec(r, shape.element_count() as usize)?
        .into_iter()
        .map(|b| b as i8)
        .collect();
    Ok((shape, values))
}

macro_rules! leb_or_native_md_array {
    (
        $write:ident, $read:ident, $ty:ty,
        $tag_native:ident, $tag_compact:ident, $n:literal,
        $is_leb:expr, $write_leb:expr, $read_leb:expr
    ) => {
        #[doc = concat!("Writes a multidimensional `", stringify!($ty), "` array, size or speed mode.")]
        pub fn $write(
            w: &mut dyn crate::writer::Sink,
            shape: &Shape,
            values: &[$ty],
            opt: Optimization,
        ) -> Result<()> {
            match opt {
                Optimization::Speed => {
                    write_header_md(w, Tag::$tag_native, shape)?;
                    for &value in values {
                        w.write_bytes(&value.to_ne_bytes())?;
                    }
                }
                Optimization::Size => {
                    write_header_md(w, Tag::$tag_compact, shape)?;
                    let bits: Vec<bool> = values.iter().map(|&v| $is_leb(v)).collect();
                    w.write_bytes(&pack_bits(&bits))?;
                    for (&value, leb) in values.iter().zip(bits.iter()) {
                        if *leb {
                            $write_leb(w, value)?;
                        } else {
                            w.write_bytes(&value.to_ne_bytes())?;
                        }
                    }
                }
            }
            Ok(())
        }

        #[doc = concat!("Reads a multidimensional `", stringify!($ty), "` array written by the matching writer.")]
        pub fn $read(
            r: &mut dyn crate::reader::Source,
            endian: Endian,
        ) -> Result<(Shape, Vec<$ty>)> {
            let byte = r.read_u8()?;
            match Tag::from_byte(byte)? {
                Tag::$tag_native => {
                    let rank = read_leb_u64(r)? as usize;
                    let mut dims = Vec::with_capacity(rank);
                    for _ in 0..rank {
                        dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
                    }
                    let shape = Shape(dims);
                    let count = shape.element_count() as usize;
                    let mut out = Vec::with_capacity(count);
                    for _ in 0..count {
                        let bytes: [u8; $n] = crate::reader::read_array(r)?;
                        out.push(<$ty>::from_ne_bytes(bytes).from_wire(endian));
                    }
                    Ok((shape, out))
                }
                Tag::$tag_compact => {
                    let rank = read_leb_u64(r)? as usize;
                    let mut dims = Vec::with_capacity(rank);
                    for _ in 0..rank {
                        dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
                    }
                    let shape = Shape(dims);
                    let count = shape.element_count() as usize;
                    let bitmap = crate::reader::read_vec(r, count.div_ceil(8))?;
                    let bits = unpack_bits(&bitmap, count);
                    let mut out = Vec::with_capacity(count);
                    for leb in bits {
                        if leb {
                            out.push($read_leb(r)?);
                        } else {
                            let bytes: [u8; $n] = crate::reader::read_array(r)?;
                            out.push(<$ty>::from_ne_bytes(bytes).from_wire(endian));
                        }
                    }
                    Ok((shape, out))
                }
                _ => Err(Error::corrupt("expected a numeric array tag")),
            }
        }
    };
}

leb_or_native_md_array!(
    write_u16_array_md, read_u16_array_md, u16,
    MDArrayUInt16Native, MDArrayUInt16Compact, 2,
    |v: u16| v <= 0x7F, |w: &mut dyn crate::writer::Sink, v: u16| leb_u64(w, v as u64),
    |r: &mut dyn crate::reader::Source| -> Result<u16> { Ok(read_leb_u64(r)? as u16) }
);
leb_or_native_md_array!(
    write_u32_array_md, read_u32_array_md, u32,
    MDArrayUInt32Native, MDArrayUInt32Compact, 4,
    |v: u32| v <= 0x1F_FFFF, |w: &mut dyn crate::writer::Sink, v: u32| leb_u64(w, v as u64),
    |r: &mut dyn crate::reader::Source| -> Result<u32> { Ok(read_leb_u64(r)? as u32) }
);
leb_or_native_md_array!(
    write_u64_array_md, read_u64_array_md, u64,
    MDArrayUInt64Native, MDArrayUInt64Compact, 8,
    |v: u64| v <= (1u64 << 49) - 1, |w: &mut dyn crate::writer::Sink, v: u64| leb_u64(w, v),
    |r: &mut dyn crate::reader::Source| -> Result<u64> { read_leb_u64(r) }
);
leb_or_native_md_array!(
    write_i16_array_md, read_i16_array_md, i16,
    MDArrayInt16Native, MDArrayInt16Compact, 2,
    |v: i16| (v as i64) >= -0xF_FFFF - 1 && (v as i64) <= 0xF_FFFF,
    |w: &mut dyn crate::writer::Sink, v: i16| leb_i64(w, v as i64),
    |r: &mut dyn crate::reader::Source| -> Result<i16> { Ok(read_leb_i64(r)? as i16) }
);
leb_or_native_md_array!(
    write_i32_array_md, read_i32_array_md, i32,
    MDArrayInt32Native, MDArrayInt32Compact, 4,
    |v: i32| (v as i64) >= -0xF_FFFF - 1 && (v as i64) <= 0xF_FFFF,
    |w: &mut dyn crate::writer::Sink, v: i32| leb_i64(w, v as i64),
    |r: &mut dyn crate::reader::Source| -> Result<i32> { Ok(read_leb_i64(r)? as i32) }
);
leb_or_native_md_array!(
    write_i64_array_md, read_i64_array_md, i64,
    MDArrayInt64Native, MDArrayInt64Compact, 8,
    |v: i64| v >= -((1i64 << 48) - 1) - 1 && v <= (1i64 << 48) - 1,
    |w: &mut dyn crate::writer::Sink, v: i64| leb_i64(w, v),
    |r: &mut dyn crate::reader::Source| -> Result<i64> { read_leb_i64(r) }
);

/// Writes a multidimensional `char` array, size or speed mode (same
/// thresholds as a single `char`, see [`crate::primitive::write_char`]).
pub fn write_char_array_md(
    w: &mut dyn crate::writer::Sink,
    shape: &Shape,
    values: &[char],
    opt: Optimization,
) -> Result<()> {
    let codes: Vec<u32> = values.iter().map(|&c| c as u32).collect();
    match opt {
        Optimization::Speed => {
            write_header_md(w, Tag::MDArrayCharNative, shape)?;
            for &code in &codes {
                w.write_bytes(&code.to_ne_bytes())?;
            }
        }
        Optimization::Size => {
            write_header_md(w, Tag::MDArrayCharCompact, shape)?;
            let bits: Vec<bool> = codes.iter().map(|&c| c <= 0x1F_FFFF).collect();
            w.write_bytes(&pack_bits(&bits))?;
            for (&code, leb) in codes.iter().zip(bits.iter()) {
                if *leb {
                    leb_u64(w, code as u64)?;
                } else {
                    w.write_bytes(&code.to_ne_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// Reads a multidimensional `char` array written by [`write_char_array_md`].
pub fn read_char_array_md(r: &mut dyn crate::reader::Source, endian: Endian) -> Result<(Shape, Vec<char>)> {
    let byte = r.read_u8()?;
    let (shape, codes): (Shape, Vec<u32>) = match Tag::from_byte(byte)? {
        Tag::MDArrayCharNative => {
            let rank = read_leb_u64(r)? as usize;
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
            }
            let shape = Shape(dims);
            let count = shape.element_count() as usize;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                let bytes: [u8; 4] = crate::reader::read_array(r)?;
                out.push(u32::from_ne_bytes(bytes).from_wire(endian));
            }
            (shape, out)
        }
        Tag::MDArrayCharCompact => {
            let rank = read_leb_u64(r)? as usize;
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
            }
            let shape = Shape(dims);
            let count = shape.element_count() as usize;
            let bitmap = crate::reader::read_vec(r, count.div_ceil(8))?;
            let bits = unpack_bits(&bitmap, count);
            let mut out = Vec::with_capacity(count);
            for leb in bits {
                if leb {
                    out.push(crate::leb128::read_u32(|| r.read_u8())?);
                } else {
                    let bytes: [u8; 4] = crate::reader::read_array(r)?;
                    out.push(u32::from_ne_bytes(bytes).from_wire(endian));
                }
            }
            (shape, out)
        }
        _ => return Err(Error::corrupt("expected a multidimensional char array tag")),
    };
    let values = codes
        .into_iter()
        .map(|c| char::from_u32(c).ok_or_else(|| Error::corrupt("char code point out of range")))
        .collect::<Result<Vec<char>>>()?;
    Ok((shape, values))
}

/// Writes a multidimensional `bool` array, speed or size (packed) mode.
pub fn write_bool_array_md(
    w: &mut dyn crate::writer::Sink,
    shape: &Shape,
    values: &[bool],
    opt: Optimization,
) -> Result<()> {
    match opt {
        Optimization::Speed => {
            write_header_md(w, Tag::MDArrayBoolSpeed, shape)?;
            let bytes: Vec<u8> = values.iter().map(|&b| b as u8).collect();
            w.write_bytes(&bytes)?;
        }
        Optimization::Size => {
            write_header_md(w, Tag::MDArrayBoolPacked, shape)?;
            w.write_bytes(&pack_bits(values))?;
        }
    }
    Ok(())
}

/// Reads a multidimensional `bool` array written by [`write_bool_array_md`].
pub fn read_bool_array_md(r: &mut dyn crate::reader::Source) -> Result<(Shape, Vec<bool>)> {
    let byte = r.read_u8()?;
    match Tag::from_byte(byte)? {
        Tag::MDArrayBoolSpeed => {
            let rank = read_leb_u64(r)? as usize;
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
            }
            let shape = Shape(dims);
            let count = shape.element_count() as usize;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(r.read_u8()? != 0);
            }
            Ok((shape, out))
        }
        Tag::MDArrayBoolPacked => {
            let rank = read_leb_u64(r)? as usize;
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push((read_leb_i64(r)?, read_leb_u64(r)?));
            }
            let shape = Shape(dims);
            let count = shape.element_count() as usize;
            let bytes = crate::reader::read_vec(r, count.div_ceil(8))?;
            Ok((shape, unpack_bits(&bytes, count)))
        }
        _ => Err(Error::corrupt("expected a multidimensional bool array tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Clone + PartialEq + std::fmt::Debug>(
        encode: impl FnOnce(&mut BufferedWriter<Vec<u8>>) -> Result<()>,
        decode: impl FnOnce(&mut ByteReader<&[u8]>) -> Result<Vec<T>>,
        expected: &[T],
    ) {
        let mut w = BufferedWriter::new(Vec::new());
        encode(&mut w).unwrap();
        let bytes = w.into_inner().unwrap();
        let mut r = ByteReader::new(&bytes[..]);
        let got = decode(&mut r).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn bool_array_packed_matches_spec_scenario() {
        let values = [
            true, false, true, true, false, false, false, true, true,
        ];
        let mut w = BufferedWriter::new(Vec::new());
        write_bool_array_1d(&mut w, &values, Optimization::Size).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(bytes[0], Tag::ArrayBoolPacked as u8);
        // length = 9
        assert_eq!(bytes[1], 9);
        assert_eq!(bytes[2], 0b1000_1101);
        assert_eq!(bytes[3], 0b0000_0001);

        roundtrip::<bool>(
            |w| write_bool_array_1d(w, &values, Optimization::Size),
            |r| read_bool_array_1d(r),
            &values,
        );
        roundtrip::<bool>(
            |w| write_bool_array_1d(w, &values, Optimization::Speed),
            |r| read_bool_array_1d(r),
            &values,
        );
    }

    #[test]
    fn f64_array_roundtrips() {
        let values = [1.5f64, -2.25, 0.0, f64::MAX];
        roundtrip::<f64>(
            |w| write_f64_array_1d(w, &values),
            |r| read_f64_array_1d(r, Endian::host()),
            &values,
        );
    }

    #[test]
    fn u32_array_roundtrips_size_and_speed() {
        let values = [0u32, 1, 127, 128, 0x1F_FFFF, 0x20_0000, u32::MAX];
        roundtrip::<u32>(
            |w| write_u32_array_1d(w, &values, Optimization::Size),
            |r| read_u32_array_1d(r, Endian::host()),
            &values,
        );
        roundtrip::<u32>(
            |w| write_u32_array_1d(w, &values, Optimization::Speed),
            |r| read_u32_array_1d(r, Endian::host()),
            &values,
        );
    }

    #[test]
    fn md_header_matches_spec_scenario() {
        let shape = Shape(vec![(1, 2), (1, 2)]);
        let mut w = BufferedWriter::new(Vec::new());
        write_header_md(&mut w, Tag::MDArrayInt32Compact, &shape).unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(
            bytes,
            vec![Tag::MDArrayInt32Compact as u8, 2, 1, 2, 1, 2]
        );

        let mut r = ByteReader::new(&bytes[..]);
        let read_shape = read_header_md(&mut r, Tag::MDArrayInt32Compact).unwrap();
        assert_eq!(read_shape, shape);
    }

    #[test]
    fn i8_array_md_roundtrips() {
        let shape = Shape(vec![(0, 2), (0, 2)]);
        let values = [-128i8, -1, 0, 127];
        let mut w = BufferedWriter::new(Vec::new());
        write_i8_array_md(&mut w, &shape, &values).unwrap();
        let bytes = w.into_inner().unwrap();
        let mut r = ByteReader::new(&bytes[..]);
        let (read_shape, read_values) = read_i8_array_md(&mut r).unwrap();
        assert_eq!(read_shape, shape);
        assert_eq!(read_values, values);
    }

    #[test]
    fn char_array_md_roundtrips_size_and_speed() {
        let shape = Shape(vec![(0, 2), (0, 2)]);
        let values = ['a', '\u{7F}', '\u{80}', '\u{1F600}'];

        let mut w = BufferedWriter::new(Vec::new());
        write_char_array_md(&mut w, &shape, &values, Optimization::Size).unwrap();
        let bytes = w.into_inner().unwrap();
        let mut r = ByteReader::new(&bytes[..]);
        let (read_shape, read_values) = read_char_array_md(&mut r, Endian::host()).unwrap();
        assert_eq!(read_shape, shape);
        assert_eq!(read_values, values);

        let mut w = BufferedWriter::new(Vec::new());
        write_char_array_md(&mut w, &shape, &values, Optimization::Speed).unwrap();
        let bytes = w.into_inner().unwrap();
        let mut r = ByteReader::new(&bytes[..]);
        let (read_shape, read_values) = read_char_array_md(&mut r, Endian::host()).unwrap();
        assert_eq!(read_shape, shape);
        assert_eq!(read_values, values);
    }

    #[test]
    fn row_major_iteration_order() {
        let shape = Shape(vec![(0, 2), (0, 3)]);
        let mut index = vec![0u64, 0];
        let mut seen = vec![index.clone()];
        while advance_row_major(&mut index, &shape) {
            seen.push(index.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }
}
