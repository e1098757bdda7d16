//! tessera is a tagged, versioned binary object-graph serializer.
//!
//! It converts an in-memory object graph — primitives, strings, arrays,
//! enumerations, user-defined aggregates, and cyclic or shared references
//! between them — into a self-describing byte stream, and reconstructs an
//! equivalent graph on the receiving side. The wire format preserves
//! reference identity of shared objects, records type identity in a compact
//! tokenized form, lets user types plug in bespoke encoders/decoders with
//! independent version numbers, and tolerates a reader running on different
//! hardware (endianness) or a partly different type universe.
//!
//! ## Design
//!
//! Every value on the wire is prefixed by a one-byte [`tag::Tag`] drawn from
//! a closed set; an unrecognized tag is always a [`error::Error::CorruptStream`],
//! never silently skipped. Shared or cyclic-capable values are held behind
//! [`std::rc::Rc`] and interned by pointer identity in [`intern::objects`], so
//! a second encounter of the same instance costs one `AlreadySerialized` tag
//! and a LEB128 id rather than a second full copy. User types implement
//! [`codec::Encode`]/[`codec::Decode`] — by hand, or via `#[derive(Encode,
//! Decode, TypeKey)]` from the companion `tessera_derive` crate — and are
//! dispatched through an [`archive::ArchiveWriter`]/[`archive::ArchiveReader`]
//! that also handles archive framing, version selection, and base-class
//! chaining.
//!
//! ## Example
//!
//! ```
//! use tessera::{Config, ReadSession, WriteSession};
//!
//! let session = WriteSession::new(Vec::new(), Config::default());
//! let bytes = session.encode(&42i32).unwrap();
//! let value: i32 = ReadSession::new(bytes.as_slice(), Config::default())
//!     .decode()
//!     .unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! ## Features
//!
//! - `derive` (default): re-exports the `tessera_derive` proc-macro crate's
//!   `#[derive(Encode, Decode, TypeKey)]` macros.
//! - `std` (default): no `no_std` mode is currently offered; reserved for
//!   forward compatibility.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod array;
pub mod codec;
pub mod config;
pub mod endian;
pub mod enum_codec;
pub mod error;
pub mod intern;
pub mod leb128;
mod primitive_impls;
pub mod primitive;
pub mod reader;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod tag;
pub mod type_key;
pub mod with;
pub mod writer;

pub use archive::{ArchiveReader, ArchiveWriter};
pub use codec::{Decode, Encode, SeqElement};
pub use config::Config;
pub use endian::Endian;
pub use error::{Error, Result};
pub use session::{AnyObject, ReadSession, WriteSession};
pub use type_key::{TypeDescriptor, TypeKey};

#[cfg(feature = "derive")]
pub use tessera_derive::{Decode, Encode, TypeKey};

/// Encodes `root` into a freshly allocated byte vector using
/// [`Config::default`]. A convenience wrapper over [`WriteSession`] for
/// callers that don't need a custom configuration or a non-`Vec` sink.
pub fn to_bytes<T: Encode>(root: &T) -> Result<Vec<u8>> {
    WriteSession::new(Vec::new(), Config::default()).encode(root)
}

/// Decodes a `T` from `bytes` using [`Config::default`]. A convenience
/// wrapper over [`ReadSession`] for callers that don't need a custom
/// configuration or a non-slice source.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T> {
    ReadSession::new(bytes, Config::default()).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_bytes_from_bytes_roundtrip_a_primitive() {
        let bytes = to_bytes(&42i32).unwrap();
        let value: i32 = from_bytes(&bytes).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn to_bytes_from_bytes_roundtrip_a_string() {
        let bytes = to_bytes(&"hello".to_string()).unwrap();
        let value: String = from_bytes(&bytes).unwrap();
        assert_eq!(value, "hello");
    }
}
