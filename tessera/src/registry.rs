//! Process-wide registry for dynamically-typed objects.
//!
//! Rust's generic dispatch already covers the common case: a field declared
//! as a concrete `Rc<T>` resolves `T: Encode`/`T: Decode` at compile time and
//! never touches this module (see [`crate::session::WriteState::encode_object`]).
//! This registry exists for the one shape static dispatch cannot express: a
//! field declared as [`crate::session::AnyObject`] (`Rc<dyn Any>`), whose
//! concrete type is only known at encode time and must be looked up by name
//! on decode. Dispatch is built on safe `Any` downcasts behind a COW map
//! instead of link-time-collected vtable pointers, since neither `inventory`
//! nor `lazy_static` are part of this workspace's dependency stack (see
//! DESIGN.md).
//!
//! Two registries are kept because the two sides look things up by different
//! keys: encode knows the concrete Rust type (`TypeId`) but not yet its wire
//! name, while decode has only read the wire name off the stream and must
//! recover a dispatching closure from it.

use std::any::{Any, TypeId};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::codec::{Decode, Encode};
use crate::error::{Error, Result};
use crate::session::AnyObject;
use crate::type_key::TypeKey;

type EncodeFn = dyn Fn(&dyn Any, &mut ArchiveWriter<'_>) -> Result<()> + Send + Sync;
type DecodeFn = dyn Fn(&mut ArchiveReader<'_>) -> Result<AnyObject> + Send + Sync;

/// A registered internal or external encoder for a dynamically-dispatched
/// type. Internal and external registrations collapse into one shape since
/// both carry the same (name, max version, encode, decode) tuple and differ
/// only in who supplies the closures.
pub struct Registration {
    type_name: String,
    max_version: u32,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
}

impl Registration {
    /// The wire name this registration answers to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The highest version this registration's encoder can produce / decoder
    /// accepts.
    pub fn max_version(&self) -> u32 {
        self.max_version
    }
}

static BY_TYPE_ID: Lazy<Mutex<Arc<HashMap<TypeId, Arc<Registration>>>>> =
    Lazy::new(|| Mutex::new(Arc::new(HashMap::new())));
static BY_NAME: Lazy<Mutex<Arc<HashMap<String, Arc<Registration>>>>> =
    Lazy::new(|| Mutex::new(Arc::new(HashMap::new())));

fn insert(type_id: TypeId, registration: Registration) {
    let registration = Arc::new(registration);

    let mut by_id = BY_TYPE_ID.lock().expect("registry mutex poisoned");
    let mut next: HashMap<TypeId, Arc<Registration>> = (**by_id).clone();
    next.insert(type_id, registration.clone());
    *by_id = Arc::new(next);
    drop(by_id);

    let mut by_name = BY_NAME.lock().expect("registry mutex poisoned");
    let mut next: HashMap<String, Arc<Registration>> = (**by_name).clone();
    next.insert(registration.type_name.clone(), registration);
    *by_name = Arc::new(next);
}

/// Registers `T` as an internal encoder: `T` itself implements [`Encode`] and
/// [`Decode`], so the dispatching closures just forward to those impls.
///
/// Idempotent: registering the same type twice replaces its entry rather
/// than erroring, matching "process-wide, discovered once" in practice for
/// code that may run its registration call more than once (e.g. in tests).
pub fn register_internal<T>()
where
    T: Encode + Decode + TypeKey + 'static,
{
    let type_name = T::type_descriptor().to_string();
    let max_version = <T as Encode>::MAX_VERSION;
    let registration = Registration {
        type_name,
        max_version,
        encode: Box::new(|value: &dyn Any, archive: &mut ArchiveWriter<'_>| {
            let value = value
                .downcast_ref::<T>()
                .expect("registry dispatched to the wrong encoder");
            value.encode(archive)
        }),
        decode: Box::new(|archive: &mut ArchiveReader<'_>| {
            let value = T::decode(archive)?;
            Ok(Rc::new(value) as AnyObject)
        }),
    };
    insert(TypeId::of::<T>(), registration);
}

/// A standalone encoder/decoder for a type that does not implement
/// [`Encode`]/[`Decode`] itself — typically a foreign type this crate does
/// not own.
pub trait ExternalCodec<T> {
    /// The highest version this codec can write/read.
    const MAX_VERSION: u32;

    fn encode(value: &T, archive: &mut ArchiveWriter<'_>) -> Result<()>;
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<T>;
}

/// Registers `C` as the external codec for `T`, matched to a target type by
/// its `TypeId`.
pub fn register_external<T, C>()
where
    T: TypeKey + 'static,
    C: ExternalCodec<T>,
{
    let type_name = T::type_descriptor().to_string();
    let registration = Registration {
        type_name,
        max_version: C::MAX_VERSION,
        encode: Box::new(|value: &dyn Any, archive: &mut ArchiveWriter<'_>| {
            let value = value
                .downcast_ref::<T>()
                .expect("registry dispatched to the wrong encoder");
            C::encode(value, archive)
        }),
        decode: Box::new(|archive: &mut ArchiveReader<'_>| {
            let value = C::decode(archive)?;
            Ok(Rc::new(value) as AnyObject)
        }),
    };
    insert(TypeId::of::<T>(), registration);
}

/// Looks up the registration for the concrete type currently held by an
/// [`AnyObject`], for the encode side. The dispatching closure is built once
/// at registration time rather than lazily on first encode, since safe `Any`
/// dispatch has no per-type machine code to generate.
pub(crate) fn lookup_by_value(value: &AnyObject) -> Result<Arc<Registration>> {
    let type_id = (**value).type_id();
    let by_id = BY_TYPE_ID.lock().expect("registry mutex poisoned").clone();
    by_id
        .get(&type_id)
        .cloned()
        .ok_or_else(|| Error::NotSerializable {
            type_name: "<unregistered dynamic type>".to_string(),
        })
}

/// Looks up the registration for a wire type name, for the decode side.
pub(crate) fn lookup_by_name(type_name: &str) -> Result<Arc<Registration>> {
    let by_name = BY_NAME.lock().expect("registry mutex poisoned").clone();
    by_name
        .get(type_name)
        .cloned()
        .ok_or_else(|| Error::NotSerializable {
            type_name: type_name.to_string(),
        })
}

/// Snapshots every currently-registered wire type name, for the tolerant
/// resolver's candidate set ([`crate::resolver::resolve`]).
pub(crate) fn registered_names() -> Vec<String> {
    BY_NAME.lock().expect("registry mutex poisoned").keys().cloned().collect()
}

pub(crate) fn encode_dyn(registration: &Registration, value: &AnyObject, archive: &mut ArchiveWriter<'_>) -> Result<()> {
    (registration.encode)(&**value, archive)
}

pub(crate) fn decode_dyn(registration: &Registration, archive: &mut ArchiveReader<'_>) -> Result<AnyObject> {
    (registration.decode)(archive)
}

/// A field declared as `AnyObject` goes through [`ArchiveWriter::encode_any_object`]/
/// [`ArchiveReader::decode_any_object`], which look the concrete type up in
/// this registry rather than dispatching through a statically known
/// `Encode`/`Decode` impl.
impl Encode for AnyObject {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.encode_any_object(self)
    }
}

impl Decode for AnyObject {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        archive.decode_any_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{ReadSession, WriteSession};

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl TypeKey for Point {
        fn type_descriptor() -> crate::type_key::TypeDescriptor {
            crate::type_key::TypeDescriptor::leaf("registry_tests::Point")
        }
    }

    impl Encode for Point {
        const MAX_VERSION: u32 = 0;

        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.write_i32(self.x)?;
            archive.write_i32(self.y)
        }
    }

    impl Decode for Point {
        const MAX_VERSION: u32 = 0;

        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(Point {
                x: archive.read_i32()?,
                y: archive.read_i32()?,
            })
        }
    }

    #[test]
    fn internal_registration_round_trips_through_the_registry() {
        register_internal::<Point>();
        let registration = lookup_by_value(&(Rc::new(Point { x: 1, y: 2 }) as AnyObject)).unwrap();
        assert_eq!(registration.type_name(), "registry_tests::Point");
        assert_eq!(registration.max_version(), 0);

        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session
            .encode(&Rc::new(Point { x: 1, y: 2 }))
            .unwrap();
        let decoded: Rc<Point> = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(*decoded, Point { x: 1, y: 2 });
    }

    /// A field of two dynamically-typed objects, exercising
    /// `encode_any_object`/`decode_any_object` directly rather than through a
    /// statically known `Rc<T>` field.
    struct Pair {
        a: AnyObject,
        b: AnyObject,
    }

    impl Encode for Pair {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            archive.encode_any_object(&self.a)?;
            archive.encode_any_object(&self.b)
        }
    }

    impl Decode for Pair {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            Ok(Pair {
                a: archive.decode_any_object()?,
                b: archive.decode_any_object()?,
            })
        }
    }

    #[test]
    fn any_object_round_trips_through_tag_object_and_preserves_identity() {
        register_internal::<Point>();
        let shared: AnyObject = Rc::new(Point { x: 7, y: 9 });
        let pair = Pair {
            a: shared.clone(),
            b: shared,
        };

        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&pair).unwrap();
        let decoded: Pair = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();

        let a = decoded.a.downcast::<Point>().unwrap();
        let b = decoded.b.downcast::<Point>().unwrap();
        assert_eq!(*a, Point { x: 7, y: 9 });
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn any_object_rejects_a_stream_version_above_the_registered_max() {
        register_internal::<Point>();
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session
            .encode(&(Rc::new(Point { x: 1, y: 2 }) as AnyObject))
            .unwrap();
        // Patch the single-byte ArchiveStart version (0) up to 1, past
        // Point's registered max.
        let archive_start = bytes
            .iter()
            .position(|&b| b == crate::tag::Tag::ArchiveStart as u8)
            .unwrap();
        let mut corrupted = bytes;
        corrupted[archive_start + 1] = 1;
        let err = ReadSession::new(corrupted.as_slice(), Config::default())
            .decode::<AnyObject>()
            .unwrap_err();
        assert!(matches!(err, Error::VersionNotSupported { .. }));
    }
}
