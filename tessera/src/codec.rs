//! The two core cooperating traits a type implements to become serializable
//! through the generic dispatcher ("internal encoder" registration).
//!
//! Because Rust resolves `T: Encode` at compile time, a type that knows its
//! own shape statically never needs the runtime registry in [`crate::registry`]
//! at all — the generic dispatcher in [`crate::session`] just calls
//! `value.encode(archive)` directly. The registry exists for the one case
//! Rust's static dispatch can't cover: a field declared as an open-ended
//! shared reference ([`crate::session::AnyObject`]) whose concrete type is
//! only known at encode time.

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::error::Result;
use crate::type_key::TypeKey;

/// A type that can serialize itself into an [`ArchiveWriter`].
///
/// `MAX_VERSION` is the highest archive version this implementation can
/// produce; [`crate::session::WriteSession`] picks it unless a
/// [`crate::config::VersionOverrides`] entry names this type explicitly.
pub trait Encode {
    /// The highest version this type's encoder can write.
    const MAX_VERSION: u32 = 0;

    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()>;
}

/// A type that can reconstruct itself from an [`ArchiveReader`].
///
/// Pairs with [`Encode`] to form an "internal encoder" registration: both
/// capabilities must be present on the same type for
/// [`crate::registry::register_internal`] to accept it.
pub trait Decode: Sized {
    /// The highest version this type's decoder accepts. Mirrors
    /// [`Encode::MAX_VERSION`]; the two must agree for a type registered as
    /// an internal encoder.
    const MAX_VERSION: u32 = 0;

    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self>;
}

/// Marks an element type that a `Vec`/`HashSet`/`BTreeSet` of it should
/// serialize through the generic object-sequence path (element type
/// metadata once, then each element's own `Encode`/`Decode`).
///
/// The thirteen primitive types with a dedicated fixed-width/compact array
/// wire form (`bool`, `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `u64`, `i64`,
/// `f32`, `f64`, `char`, [`crate::primitive::Decimal`]) deliberately do
/// *not* implement this trait: a `Vec` of one of them instead gets a
/// concrete `Encode`/`Decode` impl that routes through
/// [`crate::array`]'s dedicated codecs. Every other element type —
/// `String`, `Uuid`, the `chrono` scalars, `Option<T>`, `Rc<T>`, and every
/// `#[derive(Encode, Decode)]` type — implements it, so the blanket
/// container impls stay generic over them.
pub trait SeqElement: Encode + TypeKey {}
