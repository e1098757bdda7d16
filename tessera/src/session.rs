//! Top-level driver and per-session mutable state.
//!
//! [`WriteSession`]/[`ReadSession`] own the buffered writer/reader and are
//! the entry points `crate::encode`/`crate::decode` construct; [`WriteState`]/
//! [`ReadState`] hold everything an [`crate::archive::ArchiveWriter`]/
//! [`crate::archive::ArchiveReader`] needs to intern types and objects, and
//! are threaded through by mutable reference rather than embedded in the
//! archive facade, so a base archive can reborrow the same tables without
//! reconstructing a whole session.

use std::any::Any;
use std::io::{Read as IoRead, Write as IoWrite};
use std::rc::Rc;

use tracing::instrument;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::codec::{Decode, Encode};
use crate::config::Config;
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::intern::objects::{ObjectOutcome, ReadObjectTable, ReadStringTable, WriteObjectTable, WriteStringTable};
use crate::intern::types::{ReadTypeTable, WriteOutcome, WriteTypeTable};
use crate::leb128::{read_u64 as read_leb_u64, write_u64 as write_leb_u64};
use crate::reader::{ByteReader, Source};
use crate::tag::Tag;
use crate::type_key::{TypeDescriptor, TypeKey};
use crate::writer::{BufferedWriter, Sink};

fn write_tag(w: &mut dyn Sink, tag: Tag) -> Result<()> {
    w.write_bytes(&[tag as u8])
}

fn leb_u64(w: &mut dyn Sink, value: u64) -> Result<()> {
    let mut buf = [0u8; crate::leb128::MAX_U64_LEB128_BYTES];
    let n = write_leb_u64(&mut buf, value);
    w.write_bytes(&buf[..n])
}

/// Mutable state shared by the top-level encode driver and every
/// [`ArchiveWriter`] spawned while it runs.
pub struct WriteState {
    pub(crate) types: WriteTypeTable,
    pub(crate) objects: WriteObjectTable,
    pub(crate) strings: WriteStringTable,
    pub(crate) config: Config,
}

/// Mutable state shared by the top-level decode driver and every
/// [`ArchiveReader`] spawned while it runs.
pub struct ReadState {
    pub(crate) types: ReadTypeTable,
    pub(crate) objects: ReadObjectTable,
    pub(crate) strings: ReadStringTable,
    pub(crate) config: Config,
    pub(crate) source_endian: Endian,
}

impl WriteState {
    fn new(config: Config) -> Self {
        Self {
            types: WriteTypeTable::default(),
            objects: WriteObjectTable::default(),
            strings: WriteStringTable::default(),
            config,
        }
    }

    /// Writes the type metadata for `descriptor`, honoring
    /// the back-reference and same-as-current optimizations.
    pub(crate) fn write_type_metadata(&mut self, w: &mut dyn Sink, descriptor: &TypeDescriptor) -> Result<()> {
        match self.types.classify(descriptor) {
            WriteOutcome::SameAsCurrent => Ok(()),
            WriteOutcome::BackReference(id) => {
                write_tag(w, Tag::TypeId)?;
                self.types.touch(descriptor.clone());
                leb_u64(w, id as u64)
            }
            WriteOutcome::Fresh => {
                write_tag(w, Tag::Type)?;
                let name = descriptor.to_string();
                let bytes = name.as_bytes();
                leb_u64(w, bytes.len() as u64)?;
                w.write_bytes(bytes)?;
                if descriptor.generic_args.is_empty() {
                    leb_u64(w, 0)?;
                }
                self.types.record(descriptor.clone());
                Ok(())
            }
        }
    }

    /// Encodes a reference-typed, custom-serializable object behind `Rc`:
    /// back-reference if already interned, else type metadata + archive
    /// framing + fields + intern.
    pub(crate) fn encode_object<T>(&mut self, w: &mut dyn Sink, value: &Rc<T>) -> Result<()>
    where
        T: Encode + TypeKey,
    {
        let ptr = Rc::as_ptr(value) as *const () as usize;
        if let ObjectOutcome::BackReference(id) = self.objects.classify(ptr) {
            write_tag(w, Tag::AlreadySerialized)?;
            return leb_u64(w, id as u64);
        }
        let descriptor = T::type_descriptor();
        self.write_type_metadata(w, &descriptor)?;
        self.objects.enter(ptr, &descriptor.name)?;
        let version = self
            .config
            .version_override(&descriptor.name)
            .unwrap_or(T::MAX_VERSION);
        write_tag(w, Tag::ArchiveStart)?;
        leb_u64(w, version as u64)?;
        {
            let mut archive = ArchiveWriter::new(w, self, version);
            value.encode(&mut archive)?;
        }
        self.objects.record(ptr);
        write_tag(w, Tag::ArchiveEnd)
    }

    /// Encodes a dynamically-typed object (`session::AnyObject`) whose
    /// concrete type is resolved by [`crate::registry`] rather than known
    /// statically: `Tag::Object` marks the dispatch as dynamic, then the
    /// same type-metadata + archive-framing sequence as [`Self::encode_object`]
    /// follows, driven by the registry's boxed encode closure instead of a
    /// static `Encode` impl.
    pub(crate) fn encode_any_object(&mut self, w: &mut dyn Sink, value: &crate::session::AnyObject) -> Result<()> {
        let ptr = Rc::as_ptr(value) as *const () as usize;
        if let ObjectOutcome::BackReference(id) = self.objects.classify(ptr) {
            write_tag(w, Tag::AlreadySerialized)?;
            return leb_u64(w, id as u64);
        }
        let registration = crate::registry::lookup_by_value(value)?;
        write_tag(w, Tag::Object)?;
        let descriptor = TypeDescriptor::leaf(registration.type_name());
        self.write_type_metadata(w, &descriptor)?;
        self.objects.enter(ptr, registration.type_name())?;
        let version = self
            .config
            .version_override(registration.type_name())
            .unwrap_or_else(|| registration.max_version());
        write_tag(w, Tag::ArchiveStart)?;
        leb_u64(w, version as u64)?;
        {
            let mut archive = ArchiveWriter::new(w, self, version);
            crate::registry::encode_dyn(&registration, value, &mut archive)?;
        }
        self.objects.record(ptr);
        write_tag(w, Tag::ArchiveEnd)
    }
}

impl ReadState {
    fn new(config: Config, source_endian: Endian) -> Self {
        Self {
            types: ReadTypeTable::default(),
            objects: ReadObjectTable::default(),
            strings: ReadStringTable::default(),
            config,
            source_endian,
        }
    }

    /// Reads the type metadata expected at the current position, returning
    /// the resolved descriptor.
    ///
    /// Peeks the next byte rather than unconditionally consuming it: the
    /// `SameAsCurrent` write-side optimization ([`WriteState::write_type_metadata`])
    /// emits no byte at all when the type matches the last one written, so
    /// the byte actually sitting here may belong to whatever tag follows
    /// (`ArchiveStart`, `Enum`, `ArrayOfObjects`, ...). Only a genuine
    /// `Type`/`TypeId` tag is consumed; anything else is left for the caller.
    pub(crate) fn read_type_metadata(&mut self, r: &mut dyn Source) -> Result<TypeDescriptor> {
        let byte = r.peek_u8()?;
        match Tag::from_byte(byte)? {
            Tag::Type | Tag::TypeId => {
                let byte = r.read_u8()?;
                self.read_type_metadata_from_byte(r, byte)
            }
            _ => match self.types.current() {
                Some(descriptor) => Ok(descriptor.clone()),
                None => Err(Error::corrupt("expected type metadata, found neither Type nor TypeId")),
            },
        }
    }

    /// Decodes a custom-serializable object of statically known type `T`.
    pub(crate) fn decode_object<T>(&mut self, r: &mut dyn Source) -> Result<Rc<T>>
    where
        T: Decode + TypeKey + 'static,
    {
        let byte = r.peek_u8()?;
        if Tag::from_byte(byte)? == Tag::AlreadySerialized {
            r.read_u8()?;
            let id = read_leb_u64(|| r.read_u8())? as u32;
            return self.objects.resolve::<T>(id);
        }
        let descriptor = self.read_type_metadata(r)?;
        crate::resolver::resolve_descriptor(&descriptor, &T::type_descriptor(), &self.config)?;
        let tag = r.read_u8()?;
        if Tag::from_byte(tag)? != Tag::ArchiveStart {
            return Err(Error::corrupt("expected ArchiveStart"));
        }
        let version = read_leb_u64(|| r.read_u8())? as u32;
        if version > T::MAX_VERSION {
            return Err(Error::VersionNotSupported {
                type_name: descriptor.name.clone(),
                got: version,
                max: T::MAX_VERSION,
            });
        }
        let value = {
            let mut archive = ArchiveReader::new(r, self, version);
            T::decode(&mut archive)?
        };
        let rc = Rc::new(value);
        self.objects.record(rc.clone());
        let end = r.read_u8()?;
        if Tag::from_byte(end)? != Tag::ArchiveEnd {
            return Err(Error::corrupt("expected ArchiveEnd"));
        }
        Ok(rc)
    }

    /// Decodes a dynamically-typed object written by
    /// [`WriteState::encode_any_object`]. Unlike [`Self::decode_object`] the
    /// concrete type isn't known at the call site, so dispatch goes through
    /// [`crate::registry`] by the wire type name rather than a static
    /// `T::decode`.
    pub(crate) fn decode_any_object(&mut self, r: &mut dyn Source) -> Result<crate::session::AnyObject> {
        let byte = r.read_u8()?;
        match Tag::from_byte(byte)? {
            Tag::AlreadySerialized => {
                let id = read_leb_u64(|| r.read_u8())? as u32;
                self.objects.resolve_any(id)
            }
            Tag::Object => {
                let descriptor = self.read_type_metadata(r)?;
                let names = crate::registry::registered_names();
                let candidates: Vec<&str> = names.iter().map(String::as_str).collect();
                let resolved = crate::resolver::resolve(&descriptor.name, &candidates, self.config.tolerant_deserialization)?;
                let registration = crate::registry::lookup_by_name(resolved)?;
                let tag = r.read_u8()?;
                if Tag::from_byte(tag)? != Tag::ArchiveStart {
                    return Err(Error::corrupt("expected ArchiveStart"));
                }
                let version = read_leb_u64(|| r.read_u8())? as u32;
                if version > registration.max_version() {
                    return Err(Error::VersionNotSupported {
                        type_name: descriptor.name.clone(),
                        got: version,
                        max: registration.max_version(),
                    });
                }
                let value = {
                    let mut archive = ArchiveReader::new(r, self, version);
                    crate::registry::decode_dyn(&registration, &mut archive)?
                };
                self.objects.record(value.clone());
                let end = r.read_u8()?;
                if Tag::from_byte(end)? != Tag::ArchiveEnd {
                    return Err(Error::corrupt("expected ArchiveEnd"));
                }
                Ok(value)
            }
            _ => Err(Error::corrupt("expected an Object or AlreadySerialized tag")),
        }
    }

    /// Parses a `Type`/`TypeId` tag already consumed by the caller.
    /// [`Self::read_type_metadata`] is the only caller and only passes one of
    /// those two tags; anything else is an internal contract violation.
    fn read_type_metadata_from_byte(&mut self, r: &mut dyn Source, byte: u8) -> Result<TypeDescriptor> {
        match Tag::from_byte(byte)? {
            Tag::Type => {
                let len = read_leb_u64(|| r.read_u8())? as usize;
                let bytes = crate::reader::read_vec(r, len)?;
                let name = String::from_utf8(bytes).map_err(|_| Error::corrupt("type name is not valid UTF-8"))?;
                let generic_count = read_leb_u64(|| r.read_u8())?;
                let mut generic_args = Vec::with_capacity(generic_count as usize);
                for _ in 0..generic_count {
                    generic_args.push(self.read_type_metadata(r)?);
                }
                let descriptor = TypeDescriptor { name, generic_args };
                self.types.record(descriptor.clone());
                Ok(descriptor)
            }
            Tag::TypeId => {
                let id = read_leb_u64(|| r.read_u8())? as u32;
                let descriptor = self.types.resolve(id)?.clone();
                self.types.touch(descriptor.clone());
                Ok(descriptor)
            }
            _ => Err(Error::corrupt("expected type metadata, found neither Type nor TypeId")),
        }
    }
}

/// Encode-side session: owns the buffered writer and the intern tables for
/// one top-level `encode` call.
pub struct WriteSession<W> {
    writer: BufferedWriter<W>,
    state: WriteState,
}

impl<W: IoWrite> WriteSession<W> {
    pub fn new(sink: W, config: Config) -> Self {
        Self {
            writer: BufferedWriter::new(sink),
            state: WriteState::new(config),
        }
    }

    /// Runs the top-level encode driver: writes the
    /// endianness byte, then dispatches `root` through its `Encode` impl.
    #[instrument(skip_all)]
    pub fn encode<T: Encode>(mut self, root: &T) -> Result<W> {
        let marker = Endian::host().marker();
        self.writer.write_bytes(&[marker])?;
        {
            let mut archive = ArchiveWriter::new(&mut self.writer, &mut self.state, 0);
            root.encode(&mut archive)?;
        }
        self.writer.into_inner()
    }
}

/// Decode-side session: owns the buffered reader and the intern tables for
/// one top-level `decode` call.
pub struct ReadSession<R> {
    reader: ByteReader<R>,
    config: Config,
}

impl<R: IoRead> ReadSession<R> {
    pub fn new(source: R, config: Config) -> Self {
        Self {
            reader: ByteReader::new(source),
            config,
        }
    }

    /// Runs the top-level decode driver: reads the
    /// endianness byte, then dispatches through `T::decode`.
    #[instrument(skip_all)]
    pub fn decode<T: Decode>(mut self) -> Result<T> {
        let marker = self.reader.read_u8()?;
        let source_endian = Endian::from_marker(marker);
        let mut state = ReadState::new(self.config.clone(), source_endian);
        let mut archive = ArchiveReader::new(&mut self.reader, &mut state, 0);
        T::decode(&mut archive)
    }
}

/// Erases a decoded object behind `Rc<dyn Any>`, for fields declared as an
/// open-ended shared reference whose concrete type is resolved at decode
/// time via [`crate::registry`] rather than known statically.
pub type AnyObject = Rc<dyn Any>;
