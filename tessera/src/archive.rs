//! Scoped archive facades passed to custom encoders/decoders.
//!
//! An [`ArchiveWriter`]/[`ArchiveReader`] borrows the session's buffered
//! sink/source and its intern tables for the lifetime of one `Encode`/
//! `Decode` call. Its convenience methods are thin wrappers over
//! [`crate::primitive`] and [`crate::array`]; the object-graph-aware methods
//! (`encode_object`, `decode_object`, `encode_object_array`, `base_archive`)
//! are where type metadata, interning, and archive framing actually happen.

use std::rc::Rc;

use crate::array::{self, Shape};
use crate::codec::{Decode, Encode};
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::intern::objects::ObjectOutcome;
use crate::leb128::{read_i64 as read_leb_i64, read_u64 as read_leb_u64, write_i64 as write_leb_i64, write_u64 as write_leb_u64};
use crate::primitive::{self, Decimal, Optimization};
use crate::reader::Source;
use crate::session::{AnyObject, ReadState, WriteState};
use crate::tag::Tag;
use crate::type_key::TypeKey;
use crate::writer::Sink;

fn write_tag(w: &mut dyn Sink, tag: Tag) -> Result<()> {
    w.write_bytes(&[tag as u8])
}

fn leb_u64(w: &mut dyn Sink, value: u64) -> Result<()> {
    let mut buf = [0u8; crate::leb128::MAX_U64_LEB128_BYTES];
    let n = write_leb_u64(&mut buf, value);
    w.write_bytes(&buf[..n])
}

fn leb_i64(w: &mut dyn Sink, value: i64) -> Result<()> {
    let mut buf = [0u8; crate::leb128::MAX_U64_LEB128_BYTES];
    let n = write_leb_i64(&mut buf, value);
    w.write_bytes(&buf[..n])
}

/// A scoped handle passed to a custom encoder.
pub struct ArchiveWriter<'a> {
    sink: &'a mut dyn Sink,
    state: &'a mut WriteState,
    version: u32,
}

impl<'a> ArchiveWriter<'a> {
    pub(crate) fn new(sink: &'a mut dyn Sink, state: &'a mut WriteState, version: u32) -> Self {
        Self { sink, state, version }
    }

    /// The version chosen for the archive currently being written.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The session's size-vs-speed mode, for custom encoders that need to
    /// pick between encodings themselves.
    pub fn optimization(&self) -> Optimization {
        self.state.config.optimization
    }

    pub fn write_null(&mut self) -> Result<()> {
        primitive::write_null(self.sink)
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        primitive::write_bool(self.sink, v)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        primitive::write_u8(self.sink, v)
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        primitive::write_i8(self.sink, v)
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        primitive::write_u16(self.sink, v, self.state.config.optimization)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        primitive::write_i16(self.sink, v, self.state.config.optimization)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        primitive::write_u32(self.sink, v, self.state.config.optimization)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        primitive::write_i32(self.sink, v, self.state.config.optimization)
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        primitive::write_u64(self.sink, v, self.state.config.optimization)
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        primitive::write_i64(self.sink, v, self.state.config.optimization)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        primitive::write_f32(self.sink, v)
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        primitive::write_f64(self.sink, v)
    }

    pub fn write_char(&mut self, v: char) -> Result<()> {
        primitive::write_char(self.sink, v, self.state.config.optimization)
    }

    pub fn write_decimal(&mut self, v: Decimal) -> Result<()> {
        primitive::write_decimal(self.sink, v)
    }

    pub fn write_guid(&mut self, v: uuid::Uuid) -> Result<()> {
        primitive::write_guid(self.sink, v)
    }

    pub fn write_datetime(&mut self, v: chrono::NaiveDateTime) -> Result<()> {
        primitive::write_datetime(self.sink, v)
    }

    pub fn write_datetime_offset(&mut self, v: chrono::DateTime<chrono::FixedOffset>) -> Result<()> {
        primitive::write_datetime_offset(self.sink, v)
    }

    pub fn write_date(&mut self, v: chrono::NaiveDate) -> Result<()> {
        primitive::write_date(self.sink, v, self.state.config.optimization)
    }

    pub fn write_time(&mut self, v: chrono::NaiveTime) -> Result<()> {
        primitive::write_time(self.sink, v, self.state.config.optimization)
    }

    /// Writes `v` using `opt` regardless of the session's configured
    /// optimization, for the [`crate::with`] field-wrapper mechanism.
    pub fn write_u16_as(&mut self, v: u16, opt: Optimization) -> Result<()> { primitive::write_u16(self.sink, v, opt) }
    pub fn write_i16_as(&mut self, v: i16, opt: Optimization) -> Result<()> { primitive::write_i16(self.sink, v, opt) }
    pub fn write_u32_as(&mut self, v: u32, opt: Optimization) -> Result<()> { primitive::write_u32(self.sink, v, opt) }
    pub fn write_i32_as(&mut self, v: i32, opt: Optimization) -> Result<()> { primitive::write_i32(self.sink, v, opt) }
    pub fn write_u64_as(&mut self, v: u64, opt: Optimization) -> Result<()> { primitive::write_u64(self.sink, v, opt) }
    pub fn write_i64_as(&mut self, v: i64, opt: Optimization) -> Result<()> { primitive::write_i64(self.sink, v, opt) }

    /// Writes a 1-D `bool` array through the dedicated packed-bit (size) or
    /// raw-byte (speed) wire form, per the session's configured optimization.
    pub fn write_bool_array(&mut self, values: &[bool]) -> Result<()> {
        array::write_bool_array_1d(self.sink, values, self.state.config.optimization)
    }

    /// Writes a 1-D `u8` array: always native, raw bytes.
    pub fn write_u8_array(&mut self, values: &[u8]) -> Result<()> {
        array::write_u8_array_1d(self.sink, values)
    }

    /// Writes a 1-D `i8` array: always native, raw bytes.
    pub fn write_i8_array(&mut self, values: &[i8]) -> Result<()> {
        array::write_i8_array_1d(self.sink, values)
    }

    /// Writes a 1-D `f32` array: always native.
    pub fn write_f32_array(&mut self, values: &[f32]) -> Result<()> {
        array::write_f32_array_1d(self.sink, values)
    }

    /// Writes a 1-D `f64` array: always native.
    pub fn write_f64_array(&mut self, values: &[f64]) -> Result<()> {
        array::write_f64_array_1d(self.sink, values)
    }

    /// Writes a 1-D [`Decimal`] array: always native.
    pub fn write_decimal_array(&mut self, values: &[Decimal]) -> Result<()> {
        array::write_decimal_array_1d(self.sink, values)
    }

    /// Writes a 1-D `char` array, size or speed mode per the session's
    /// configured optimization.
    pub fn write_char_array(&mut self, values: &[char]) -> Result<()> {
        array::write_char_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_u16_array(&mut self, values: &[u16]) -> Result<()> {
        array::write_u16_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_i16_array(&mut self, values: &[i16]) -> Result<()> {
        array::write_i16_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_u32_array(&mut self, values: &[u32]) -> Result<()> {
        array::write_u32_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_i32_array(&mut self, values: &[i32]) -> Result<()> {
        array::write_i32_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_u64_array(&mut self, values: &[u64]) -> Result<()> {
        array::write_u64_array_1d(self.sink, values, self.state.config.optimization)
    }

    pub fn write_i64_array(&mut self, values: &[i64]) -> Result<()> {
        array::write_i64_array_1d(self.sink, values, self.state.config.optimization)
    }

    /// Writes a multidimensional `bool` array, size or speed mode.
    pub fn write_bool_array_md(&mut self, shape: &Shape, values: &[bool]) -> Result<()> {
        array::write_bool_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    /// Writes a multidimensional `u8` array: always native.
    pub fn write_u8_array_md(&mut self, shape: &Shape, values: &[u8]) -> Result<()> {
        array::write_u8_array_md(self.sink, shape, values)
    }

    /// Writes a multidimensional `i8` array: always native.
    pub fn write_i8_array_md(&mut self, shape: &Shape, values: &[i8]) -> Result<()> {
        array::write_i8_array_md(self.sink, shape, values)
    }

    /// Writes a multidimensional `f32` array: always native.
    pub fn write_f32_array_md(&mut self, shape: &Shape, values: &[f32]) -> Result<()> {
        array::write_f32_array_md(self.sink, shape, values)
    }

    /// Writes a multidimensional `f64` array: always native.
    pub fn write_f64_array_md(&mut self, shape: &Shape, values: &[f64]) -> Result<()> {
        array::write_f64_array_md(self.sink, shape, values)
    }

    /// Writes a multidimensional [`Decimal`] array: always native.
    pub fn write_decimal_array_md(&mut self, shape: &Shape, values: &[Decimal]) -> Result<()> {
        array::write_decimal_array_md(self.sink, shape, values)
    }

    /// Writes a multidimensional `char` array, size or speed mode.
    pub fn write_char_array_md(&mut self, shape: &Shape, values: &[char]) -> Result<()> {
        array::write_char_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_u16_array_md(&mut self, shape: &Shape, values: &[u16]) -> Result<()> {
        array::write_u16_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_i16_array_md(&mut self, shape: &Shape, values: &[i16]) -> Result<()> {
        array::write_i16_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_u32_array_md(&mut self, shape: &Shape, values: &[u32]) -> Result<()> {
        array::write_u32_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_i32_array_md(&mut self, shape: &Shape, values: &[i32]) -> Result<()> {
        array::write_i32_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_u64_array_md(&mut self, shape: &Shape, values: &[u64]) -> Result<()> {
        array::write_u64_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    pub fn write_i64_array_md(&mut self, shape: &Shape, values: &[i64]) -> Result<()> {
        array::write_i64_array_md(self.sink, shape, values, self.state.config.optimization)
    }

    /// Writes a string, content-interning it: strings are
    /// reference-interned like any other shared value, just keyed by content
    /// instead of pointer.
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        match self.state.strings.classify(v) {
            ObjectOutcome::BackReference(id) => {
                write_tag(self.sink, Tag::AlreadySerialized)?;
                leb_u64(self.sink, id as u64)
            }
            ObjectOutcome::Fresh => {
                primitive::write_str_utf8(self.sink, v)?;
                self.state.strings.record(v.to_string());
                Ok(())
            }
        }
    }

    pub fn write_string_utf16(&mut self, v: &str) -> Result<()> {
        primitive::write_str_utf16(self.sink, v)
    }

    /// Encodes a buffer: total length prefix then raw bytes, as a single
    /// length-prefixed blob (see `DESIGN.md` for why the asymmetric
    /// chunked form some streams offer is not supported here).
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        write_tag(self.sink, Tag::Buffer)?;
        leb_u64(self.sink, bytes.len() as u64)?;
        self.sink.write_bytes(bytes)
    }

    /// Encodes a fieldless enum's discriminant.
    pub fn write_enum_discriminant<T: TypeKey>(&mut self, discriminant: i64) -> Result<()> {
        self.state.write_type_metadata(self.sink, &T::type_descriptor())?;
        write_tag(self.sink, Tag::Enum)?;
        leb_i64(self.sink, discriminant)
    }

    /// Encodes a reference-typed custom object, handling back-references,
    /// type metadata, and archive framing.
    pub fn encode_object<T>(&mut self, value: &Rc<T>) -> Result<()>
    where
        T: Encode + TypeKey,
    {
        self.state.encode_object(self.sink, value)
    }

    /// Encodes a dynamically-typed object (`AnyObject`) through
    /// [`crate::registry`]'s internal/external dispatcher, for fields whose
    /// concrete type is only known at encode time. See
    /// [`crate::session::WriteState::encode_any_object`].
    pub fn encode_any_object(&mut self, value: &AnyObject) -> Result<()> {
        self.state.encode_any_object(self.sink, value)
    }

    /// Encodes a 1-D array of reference-typed custom objects. The array
    /// itself is not currently interned as its own reference identity;
    /// callers that need a shared
    /// array should wrap it in `Rc<Vec<Rc<T>>>` and rely on the generic
    /// `Rc` interning instead.
    pub fn encode_object_array<T>(&mut self, values: &[Rc<T>]) -> Result<()>
    where
        T: Encode + TypeKey,
    {
        self.state.write_type_metadata(self.sink, &T::type_descriptor())?;
        write_tag(self.sink, Tag::ArrayOfObjects)?;
        leb_u64(self.sink, values.len() as u64)?;
        for value in values {
            self.encode_object(value)?;
        }
        Ok(())
    }

    /// Encodes a multidimensional array of reference-typed custom objects,
    /// iterating in row-major order.
    pub fn encode_object_array_md<T>(&mut self, shape: &Shape, values: &[Rc<T>]) -> Result<()>
    where
        T: Encode + TypeKey,
    {
        self.state.write_type_metadata(self.sink, &T::type_descriptor())?;
        write_tag(self.sink, Tag::MDArrayOfObjects)?;
        leb_u64(self.sink, shape.rank() as u64)?;
        for &(lower, count) in &shape.0 {
            leb_i64(self.sink, lower)?;
            leb_u64(self.sink, count)?;
        }
        for value in values {
            self.encode_object(value)?;
        }
        Ok(())
    }

    /// Writes the header for a statically-typed sequence of values (the
    /// generic fallback the `Vec`/`HashMap`/etc. blanket impls use): element
    /// type metadata, then an `ArrayOfObjects` tag,
    /// then the element count. Unlike [`ArchiveWriter::encode_object_array`]
    /// the elements themselves are written directly by the caller rather
    /// than through `encode_object`/interning — a bare `Vec<T>` field has no
    /// reference identity of its own in this engine; callers that need one
    /// wrap it in `Rc`.
    pub fn write_seq_header(&mut self, element_type: &crate::type_key::TypeDescriptor, len: usize) -> Result<()> {
        self.state.write_type_metadata(self.sink, element_type)?;
        write_tag(self.sink, Tag::ArrayOfObjects)?;
        leb_u64(self.sink, len as u64)
    }

    /// Opens a base-class archive: writes
    /// `BaseArchiveStart` + version, then invokes `base`'s own encoder with a
    /// fresh sub-archive. There is no matching end tag; the caller's archive
    /// resumes immediately after this returns.
    pub fn base_archive<B: Encode>(&mut self, base: &B) -> Result<()> {
        let version = B::MAX_VERSION;
        write_tag(self.sink, Tag::BaseArchiveStart)?;
        leb_u64(self.sink, version as u64)?;
        let mut sub = ArchiveWriter {
            sink: &mut *self.sink,
            state: &mut *self.state,
            version,
        };
        base.encode(&mut sub)
    }
}

/// A scoped handle passed to a custom decoder.
pub struct ArchiveReader<'a> {
    source: &'a mut dyn Source,
    state: &'a mut ReadState,
    version: u32,
}

impl<'a> ArchiveReader<'a> {
    pub(crate) fn new(source: &'a mut dyn Source, state: &'a mut ReadState, version: u32) -> Self {
        Self { source, state, version }
    }

    /// The version read from the stream for the archive currently being
    /// decoded.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The endianness the producer recorded for this stream.
    pub fn source_endian(&self) -> Endian {
        self.state.source_endian
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        primitive::read_bool(self.source)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        primitive::read_u8(self.source)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        primitive::read_i8(self.source)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        primitive::read_u16(self.source, self.state.source_endian)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        primitive::read_i16(self.source, self.state.source_endian)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        primitive::read_u32(self.source, self.state.source_endian)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        primitive::read_i32(self.source, self.state.source_endian)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        primitive::read_u64(self.source, self.state.source_endian)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        primitive::read_i64(self.source, self.state.source_endian)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        primitive::read_f32(self.source, self.state.source_endian)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        primitive::read_f64(self.source, self.state.source_endian)
    }

    pub fn read_char(&mut self) -> Result<char> {
        primitive::read_char(self.source, self.state.source_endian)
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        primitive::read_decimal(self.source, self.state.source_endian)
    }

    pub fn read_guid(&mut self) -> Result<uuid::Uuid> {
        primitive::read_guid(self.source, self.state.source_endian)
    }

    pub fn read_datetime(&mut self) -> Result<chrono::NaiveDateTime> {
        primitive::read_datetime(self.source, self.state.source_endian)
    }

    pub fn read_datetime_offset(&mut self) -> Result<chrono::DateTime<chrono::FixedOffset>> {
        primitive::read_datetime_offset(self.source, self.state.source_endian)
    }

    pub fn read_date(&mut self) -> Result<chrono::NaiveDate> {
        primitive::read_date(self.source, self.state.source_endian)
    }

    pub fn read_time(&mut self) -> Result<chrono::NaiveTime> {
        primitive::read_time(self.source, self.state.source_endian)
    }

    /// Reads a 1-D `bool` array written by [`ArchiveWriter::write_bool_array`].
    pub fn read_bool_array(&mut self) -> Result<Vec<bool>> {
        array::read_bool_array_1d(self.source)
    }

    /// Reads a 1-D `u8` array written by [`ArchiveWriter::write_u8_array`].
    pub fn read_u8_array(&mut self) -> Result<Vec<u8>> {
        array::read_u8_array_1d(self.source)
    }

    /// Reads a 1-D `i8` array written by [`ArchiveWriter::write_i8_array`].
    pub fn read_i8_array(&mut self) -> Result<Vec<i8>> {
        array::read_i8_array_1d(self.source)
    }

    /// Reads a 1-D `f32` array written by [`ArchiveWriter::write_f32_array`].
    pub fn read_f32_array(&mut self) -> Result<Vec<f32>> {
        array::read_f32_array_1d(self.source, self.state.source_endian)
    }

    /// Reads a 1-D `f64` array written by [`ArchiveWriter::write_f64_array`].
    pub fn read_f64_array(&mut self) -> Result<Vec<f64>> {
        array::read_f64_array_1d(self.source, self.state.source_endian)
    }

    /// Reads a 1-D [`Decimal`] array written by
    /// [`ArchiveWriter::write_decimal_array`].
    pub fn read_decimal_array(&mut self) -> Result<Vec<Decimal>> {
        array::read_decimal_array_1d(self.source, self.state.source_endian)
    }

    /// Reads a 1-D `char` array written by [`ArchiveWriter::write_char_array`].
    pub fn read_char_array(&mut self) -> Result<Vec<char>> {
        array::read_char_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_u16_array(&mut self) -> Result<Vec<u16>> {
        array::read_u16_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_i16_array(&mut self) -> Result<Vec<i16>> {
        array::read_i16_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_u32_array(&mut self) -> Result<Vec<u32>> {
        array::read_u32_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        array::read_i32_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_u64_array(&mut self) -> Result<Vec<u64>> {
        array::read_u64_array_1d(self.source, self.state.source_endian)
    }

    pub fn read_i64_array(&mut self) -> Result<Vec<i64>> {
        array::read_i64_array_1d(self.source, self.state.source_endian)
    }

    /// Reads a multidimensional `bool` array written by
    /// [`ArchiveWriter::write_bool_array_md`].
    pub fn read_bool_array_md(&mut self) -> Result<(Shape, Vec<bool>)> {
        array::read_bool_array_md(self.source)
    }

    /// Reads a multidimensional `u8` array written by
    /// [`ArchiveWriter::write_u8_array_md`].
    pub fn read_u8_array_md(&mut self) -> Result<(Shape, Vec<u8>)> {
        array::read_u8_array_md(self.source)
    }

    /// Reads a multidimensional `i8` array written by
    /// [`ArchiveWriter::write_i8_array_md`].
    pub fn read_i8_array_md(&mut self) -> Result<(Shape, Vec<i8>)> {
        array::read_i8_array_md(self.source)
    }

    /// Reads a multidimensional `f32` array written by
    /// [`ArchiveWriter::write_f32_array_md`].
    pub fn read_f32_array_md(&mut self) -> Result<(Shape, Vec<f32>)> {
        array::read_f32_array_md(self.source, self.state.source_endian)
    }

    /// Reads a multidimensional `f64` array written by
    /// [`ArchiveWriter::write_f64_array_md`].
    pub fn read_f64_array_md(&mut self) -> Result<(Shape, Vec<f64>)> {
        array::read_f64_array_md(self.source, self.state.source_endian)
    }

    /// Reads a multidimensional [`Decimal`] array written by
    /// [`ArchiveWriter::write_decimal_array_md`].
    pub fn read_decimal_array_md(&mut self) -> Result<(Shape, Vec<Decimal>)> {
        array::read_decimal_array_md(self.source, self.state.source_endian)
    }

    /// Reads a multidimensional `char` array written by
    /// [`ArchiveWriter::write_char_array_md`].
    pub fn read_char_array_md(&mut self) -> Result<(Shape, Vec<char>)> {
        array::read_char_array_md(self.source, self.state.source_endian)
    }

    pub fn read_u16_array_md(&mut self) -> Result<(Shape, Vec<u16>)> {
        array::read_u16_array_md(self.source, self.state.source_endian)
    }

    pub fn read_i16_array_md(&mut self) -> Result<(Shape, Vec<i16>)> {
        array::read_i16_array_md(self.source, self.state.source_endian)
    }

    pub fn read_u32_array_md(&mut self) -> Result<(Shape, Vec<u32>)> {
        array::read_u32_array_md(self.source, self.state.source_endian)
    }

    pub fn read_i32_array_md(&mut self) -> Result<(Shape, Vec<i32>)> {
        array::read_i32_array_md(self.source, self.state.source_endian)
    }

    pub fn read_u64_array_md(&mut self) -> Result<(Shape, Vec<u64>)> {
        array::read_u64_array_md(self.source, self.state.source_endian)
    }

    pub fn read_i64_array_md(&mut self) -> Result<(Shape, Vec<i64>)> {
        array::read_i64_array_md(self.source, self.state.source_endian)
    }

    /// Reads a string, resolving content back-references the way
    /// [`ArchiveWriter::write_string`] wrote them.
    pub fn read_string(&mut self) -> Result<Rc<str>> {
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? == Tag::AlreadySerialized {
            let id = read_leb_u64(|| self.source.read_u8())? as u32;
            return self.state.strings.resolve(id);
        }
        let value = primitive::read_str_utf8_tagged(self.source, byte)?;
        let rc: Rc<str> = Rc::from(value);
        self.state.strings.record(rc.clone());
        Ok(rc)
    }

    pub fn read_string_utf16(&mut self) -> Result<String> {
        primitive::read_str_utf16(self.source, self.state.source_endian)
    }

    pub fn read_buffer(&mut self) -> Result<Vec<u8>> {
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::Buffer {
            return Err(Error::corrupt("expected a buffer tag"));
        }
        let len = read_leb_u64(|| self.source.read_u8())? as usize;
        crate::reader::read_vec(self.source, len)
    }

    /// Reads a fieldless enum's discriminant.
    pub fn read_enum_discriminant<T: TypeKey>(&mut self) -> Result<i64> {
        self.state.read_type_metadata(self.source)?;
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::Enum {
            return Err(Error::corrupt("expected an enum tag"));
        }
        read_leb_i64(|| self.source.read_u8())
    }

    /// Decodes a reference-typed custom object of statically known type `T`.
    pub fn decode_object<T>(&mut self) -> Result<Rc<T>>
    where
        T: Decode + TypeKey + 'static,
    {
        self.state.decode_object(self.source)
    }

    /// Decodes a dynamically-typed object written by
    /// [`ArchiveWriter::encode_any_object`]. See
    /// [`crate::session::ReadState::decode_any_object`].
    pub fn decode_any_object(&mut self) -> Result<AnyObject> {
        self.state.decode_any_object(self.source)
    }

    /// Decodes a 1-D array of reference-typed custom objects written by
    /// [`ArchiveWriter::encode_object_array`].
    pub fn decode_object_array<T>(&mut self) -> Result<Vec<Rc<T>>>
    where
        T: Decode + TypeKey + 'static,
    {
        self.state.read_type_metadata(self.source)?;
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::ArrayOfObjects {
            return Err(Error::corrupt("expected an array-of-objects tag"));
        }
        let len = read_leb_u64(|| self.source.read_u8())? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.decode_object::<T>()?);
        }
        Ok(out)
    }

    /// Decodes a multidimensional array of reference-typed custom objects
    /// written by [`ArchiveWriter::encode_object_array_md`].
    pub fn decode_object_array_md<T>(&mut self) -> Result<(Shape, Vec<Rc<T>>)>
    where
        T: Decode + TypeKey + 'static,
    {
        self.state.read_type_metadata(self.source)?;
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::MDArrayOfObjects {
            return Err(Error::corrupt("expected a multidimensional array-of-objects tag"));
        }
        let rank = read_leb_u64(|| self.source.read_u8())? as usize;
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push((read_leb_i64(|| self.source.read_u8())?, read_leb_u64(|| self.source.read_u8())?));
        }
        let shape = array::Shape(dims);
        let count = shape.element_count() as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.decode_object::<T>()?);
        }
        Ok((shape, out))
    }

    /// Returns the next tag byte without consuming it, so a caller can
    /// decide whether to read a value or a `NullReference` before
    /// committing (used by `Option<T>`'s `Decode` impl).
    pub fn peek_tag(&mut self) -> Result<u8> {
        self.source.peek_u8()
    }

    /// Consumes one byte already inspected via [`ArchiveReader::peek_tag`].
    pub fn skip_byte(&mut self) -> Result<()> {
        self.source.read_u8()?;
        Ok(())
    }

    /// Reads the header written by [`ArchiveWriter::write_seq_header`],
    /// returning the element count.
    pub fn read_seq_header(&mut self) -> Result<usize> {
        self.state.read_type_metadata(self.source)?;
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::ArrayOfObjects {
            return Err(Error::corrupt("expected a sequence tag"));
        }
        Ok(read_leb_u64(|| self.source.read_u8())? as usize)
    }

    /// Opens the base-class archive a cooperating encoder wrote via
    /// [`ArchiveWriter::base_archive`]: reads `BaseArchiveStart` + version,
    /// validates it, and decodes `B` from a fresh sub-archive scoped to it.
    pub fn prepare_base_archive<B: Decode>(&mut self) -> Result<B> {
        let byte = self.source.read_u8()?;
        if Tag::from_byte(byte)? != Tag::BaseArchiveStart {
            return Err(Error::corrupt("expected BaseArchiveStart"));
        }
        let version = read_leb_u64(|| self.source.read_u8())? as u32;
        if version > B::MAX_VERSION {
            return Err(Error::VersionNotSupported {
                type_name: std::any::type_name::<B>().to_string(),
                got: version,
                max: B::MAX_VERSION,
            });
        }
        let mut sub = ArchiveReader {
            source: &mut *self.source,
            state: &mut *self.state,
            version,
        };
        B::decode(&mut sub)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::session::{ReadSession, WriteSession};

    use super::*;

    struct Grid2x2 {
        shape: Shape,
        values: Vec<i32>,
    }

    impl Encode for Grid2x2 {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32_array_md(&self.shape, &self.values)
        }
    }

    impl Decode for Grid2x2 {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            let (shape, values) = archive.read_i32_array_md()?;
            Ok(Grid2x2 { shape, values })
        }
    }

    #[test]
    fn multidimensional_int32_array_round_trips() {
        let grid = Grid2x2 {
            shape: Shape(vec![(1, 2), (1, 2)]),
            values: vec![10, 20, 30, 40],
        };
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&grid).unwrap();
        let decoded: Grid2x2 = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.shape, grid.shape);
        assert_eq!(decoded.values, grid.values);
    }

    struct DecimalList(Vec<Decimal>);

    impl Encode for DecimalList {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_decimal_array(&self.0)
        }
    }

    impl Decode for DecimalList {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(DecimalList(archive.read_decimal_array()?))
        }
    }

    #[test]
    fn decimal_array_round_trips() {
        let values = vec![
            Decimal { lo: 1, mid: 0, hi: 0, flags: 0 },
            Decimal { lo: 2, mid: 0, hi: 0, flags: 0x0002_0000 },
        ];
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&DecimalList(values.clone())).unwrap();
        let decoded: DecimalList = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.0, values);
    }

    #[derive(Debug, PartialEq)]
    struct Node {
        value: i32,
    }

    impl TypeKey for Node {
        fn type_descriptor() -> crate::type_key::TypeDescriptor {
            crate::type_key::TypeDescriptor::leaf("archive_tests::Node")
        }
    }

    impl Encode for Node {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32(self.value)
        }
    }

    impl Decode for Node {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(Node { value: archive.read_i32()? })
        }
    }

    struct NodePair {
        a: Rc<Node>,
        b: Rc<Node>,
    }

    impl Encode for NodePair {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.encode_object(&self.a)?;
            archive.encode_object(&self.b)
        }
    }

    impl Decode for NodePair {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(NodePair {
                a: archive.decode_object()?,
                b: archive.decode_object()?,
            })
        }
    }

    /// Two distinct (not back-referenced) `Rc<Node>`s of the same type in a
    /// row: the second's type metadata is written via `SameAsCurrent` (no
    /// `Type`/`TypeId` byte at all), which used to desync the decode side's
    /// byte-consumption and corrupt the read of the second object.
    #[test]
    fn consecutive_distinct_objects_of_the_same_type_round_trip() {
        let pair = NodePair {
            a: Rc::new(Node { value: 1 }),
            b: Rc::new(Node { value: 2 }),
        };
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&pair).unwrap();
        let decoded: NodePair = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(*decoded.a, Node { value: 1 });
        assert_eq!(*decoded.b, Node { value: 2 });
    }

    #[derive(Debug, PartialEq)]
    struct Leaf {
        value: i32,
    }

    impl TypeKey for Leaf {
        fn type_descriptor() -> crate::type_key::TypeDescriptor {
            crate::type_key::TypeDescriptor::leaf("archive_tests::Leaf")
        }
    }

    impl Encode for Leaf {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32(self.value)
        }
    }

    impl Decode for Leaf {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(Leaf { value: archive.read_i32()? })
        }
    }

    struct Interleaved {
        n1: Rc<Node>,
        leaf1: Rc<Leaf>,
        n2: Rc<Node>,
        leaf2: Rc<Leaf>,
    }

    impl Encode for Interleaved {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.encode_object(&self.n1)?;
            archive.encode_object(&self.leaf1)?;
            archive.encode_object(&self.n2)?;
            archive.encode_object(&self.leaf2)
        }
    }

    impl Decode for Interleaved {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(Interleaved {
                n1: archive.decode_object()?,
                leaf1: archive.decode_object()?,
                n2: archive.decode_object()?,
                leaf2: archive.decode_object()?,
            })
        }
    }

    /// `n2` revisits a type (`Node`) that was interned but is no longer
    /// `current` (`Leaf` was written in between), so it takes the
    /// `BackReference` path. That path must also update `current_type` on
    /// the write side, or `leaf2` — a distinct instance of the type that
    /// *was* current before `n2` — gets wrongly classified `SameAsCurrent`
    /// relative to a write-side `current_type` that's gone stale, while the
    /// read side's `current_type` (kept in sync by the `TypeId` arm) has
    /// already moved on to `Node`. The two sides then disagree on what type
    /// `leaf2`'s metadata-free bytes describe.
    #[test]
    fn object_after_a_type_back_reference_round_trips() {
        let value = Interleaved {
            n1: Rc::new(Node { value: 1 }),
            leaf1: Rc::new(Leaf { value: 2 }),
            n2: Rc::new(Node { value: 3 }),
            leaf2: Rc::new(Leaf { value: 4 }),
        };
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&value).unwrap();
        let decoded: Interleaved = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(*decoded.n1, Node { value: 1 });
        assert_eq!(*decoded.leaf1, Leaf { value: 2 });
        assert_eq!(*decoded.n2, Node { value: 3 });
        assert_eq!(*decoded.leaf2, Leaf { value: 4 });
    }

    #[derive(Debug, PartialEq)]
    struct OldNode {
        value: i32,
    }

    impl TypeKey for OldNode {
        fn type_descriptor() -> crate::type_key::TypeDescriptor {
            crate::type_key::TypeDescriptor::leaf("legacy::Node@1.0.0")
        }
    }

    impl Encode for OldNode {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32(self.value)
        }
    }

    impl Decode for OldNode {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(OldNode { value: archive.read_i32()? })
        }
    }

    #[derive(Debug, PartialEq)]
    struct RenamedNode {
        value: i32,
    }

    impl TypeKey for RenamedNode {
        fn type_descriptor() -> crate::type_key::TypeDescriptor {
            crate::type_key::TypeDescriptor::leaf("archive_tests::Node@2.0.0")
        }
    }

    impl Encode for RenamedNode {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32(self.value)
        }
    }

    impl Decode for RenamedNode {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(RenamedNode { value: archive.read_i32()? })
        }
    }

    /// A stream written by a type later renamed (same bare name, different
    /// module path and version) decodes against the new type only when
    /// `tolerant_deserialization` is set — exercising that `decode_object`
    /// actually consults [`crate::resolver::resolve_descriptor`] rather than
    /// trusting the wire descriptor unconditionally.
    #[test]
    fn decode_object_honors_tolerant_deserialization() {
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&Rc::new(OldNode { value: 5 })).unwrap();

        let err = ReadSession::new(bytes.as_slice(), Config::default())
            .decode::<Rc<RenamedNode>>()
            .unwrap_err();
        assert!(matches!(err, Error::TypeResolutionFailed { .. }));

        let tolerant = Config {
            tolerant_deserialization: true,
            ..Config::default()
        };
        let decoded: Rc<RenamedNode> = ReadSession::new(bytes.as_slice(), tolerant)
            .decode()
            .unwrap();
        assert_eq!(*decoded, RenamedNode { value: 5 });
    }
}
