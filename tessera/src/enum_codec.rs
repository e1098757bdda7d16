//! Fieldless-enum codec glue.
//!
//! Decoding an enum's discriminant back into its declared type needs a
//! per-type coercion step. Rust enums don't need a runtime lookup table for
//! that: [`EnumValue::from_discriminant`] is a plain `match` generated once,
//! at compile time, by [`tessera_derive`]'s `#[derive(Decode)]` expansion
//! for fieldless enums — the compiler's exhaustiveness check is the
//! coercion table.

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::error::{Error, Result};
use crate::type_key::TypeKey;

/// A fieldless enum convertible to and from the signed 64-bit discriminant
/// the wire format carries.
pub trait EnumValue: Sized {
    /// This variant's wire discriminant.
    fn to_discriminant(&self) -> i64;

    /// Reconstructs the variant named by `discriminant`, or `None` if this
    /// process's copy of the type has no matching variant.
    fn from_discriminant(discriminant: i64) -> Option<Self>;
}

/// Encodes `value` as type metadata (see
/// [`ArchiveWriter::write_enum_discriminant`]) followed by the discriminant.
///
/// Called by the `#[derive(Encode)]` expansion for fieldless enums; exposed
/// here too so a type can opt in by hand without the derive macro.
pub fn encode_enum<T: EnumValue + TypeKey>(value: &T, archive: &mut ArchiveWriter<'_>) -> Result<()> {
    archive.write_enum_discriminant::<T>(value.to_discriminant())
}

/// Decodes an enum written by [`encode_enum`].
///
/// Fails with `CorruptStream` if the discriminant names no variant this
/// process's copy of `T` declares — a genuinely different type universe on
/// the two ends is treated as structural corruption rather than a resolvable
/// type mismatch (unlike object type names, a bare integer discriminant
/// carries no fallback to resolve tolerantly).
pub fn decode_enum<T: EnumValue + TypeKey>(archive: &mut ArchiveReader<'_>) -> Result<T> {
    let discriminant = archive.read_enum_discriminant::<T>()?;
    T::from_discriminant(discriminant)
        .ok_or_else(|| Error::corrupt("enum discriminant does not match any known variant"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decode, Encode};
    use crate::config::Config;
    use crate::session::{ReadSession, WriteSession};
    use crate::type_key::TypeDescriptor;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Suit {
        Clubs,
        Diamonds,
        Hearts,
        Spades,
    }

    impl EnumValue for Suit {
        fn to_discriminant(&self) -> i64 {
            *self as i64
        }

        fn from_discriminant(discriminant: i64) -> Option<Self> {
            match discriminant {
                0 => Some(Suit::Clubs),
                1 => Some(Suit::Diamonds),
                2 => Some(Suit::Hearts),
                3 => Some(Suit::Spades),
                _ => None,
            }
        }
    }

    impl TypeKey for Suit {
        fn type_descriptor() -> TypeDescriptor {
            TypeDescriptor::leaf("enum_codec_tests::Suit")
        }
    }

    impl Encode for Suit {
        fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
            encode_enum(self, archive)
        }
    }

    impl Decode for Suit {
        fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
            decode_enum(archive)
        }
    }

    #[test]
    fn enum_round_trips_through_a_session() {
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&Suit::Hearts).unwrap();
        let decoded: Suit = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(decoded, Suit::Hearts);
    }

    #[test]
    fn unknown_discriminant_is_corrupt_stream() {
        assert!(Suit::from_discriminant(99).is_none());
    }
}
