//! Field-level wire-encoding overrides.
//!
//! A field can be declared with a wrapper marker type to request a
//! non-default encoding without writing a whole custom [`crate::codec::Encode`]/
//! [`crate::codec::Decode`] impl for its own type. This format has no fixed
//! memory layout to override, so a wrapper here just picks which
//! tag-prefixed encoder runs for one field, independent of the field's own
//! type and the session's `Config::optimization`.

use std::marker::PhantomData;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::codec::{Decode, Encode};
use crate::error::Result;
use crate::primitive::Optimization;

/// A transparent wrapper binding a field's value (`F`) to the wrapper type
/// (`W`) that picks its encoding. `#[tessera(with = W)]` on a derived field
/// expands to wrapping and unwrapping the field in a `With<F, W>` around the
/// generated `encode`/`decode` calls.
#[repr(transparent)]
pub struct With<F, W> {
    field: F,
    _marker: PhantomData<W>,
}

impl<F, W> With<F, W> {
    /// Casts a `&F` to a `&With<F, W>`. Safe because `With` is `#[repr(transparent)]`.
    pub fn cast(field: &F) -> &With<F, W> {
        unsafe { &*(field as *const F).cast() }
    }

    /// Unwraps a `With` into its underlying field.
    pub fn into_inner(self) -> F {
        self.field
    }
}

/// Encodes `F` the way wrapper `Self` prescribes.
pub trait EncodeWith<F: ?Sized> {
    fn encode_with(field: &F, archive: &mut ArchiveWriter<'_>) -> Result<()>;
}

/// Decodes an `F` the way wrapper `Self` prescribes.
pub trait DecodeWith<F> {
    fn decode_with(archive: &mut ArchiveReader<'_>) -> Result<F>;
}

impl<F, W: EncodeWith<F>> Encode for With<F, W> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        W::encode_with(&self.field, archive)
    }
}

impl<F, W: DecodeWith<F>> Decode for With<F, W> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        Ok(With {
            field: W::decode_with(archive)?,
            _marker: PhantomData,
        })
    }
}

/// Forces a `String` field to be written as UTF-16 instead of whatever the
/// session default would otherwise pick.
pub struct AsUtf16;

impl EncodeWith<String> for AsUtf16 {
    fn encode_with(field: &String, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_string_utf16(field)
    }
}

impl DecodeWith<String> for AsUtf16 {
    fn decode_with(archive: &mut ArchiveReader<'_>) -> Result<String> {
        archive.read_string_utf16()
    }
}

macro_rules! forced_optimization_with {
    ($wrapper:ident, $opt:expr, { $($ty:ident => $write:ident, $read:ident);* $(;)? }) => {
        $(
            impl EncodeWith<$ty> for $wrapper {
                fn encode_with(field: &$ty, archive: &mut ArchiveWriter<'_>) -> Result<()> {
                    archive.$write(*field, $opt)
                }
            }

            impl DecodeWith<$ty> for $wrapper {
                fn decode_with(archive: &mut ArchiveReader<'_>) -> Result<$ty> {
                    archive.$read()
                }
            }
        )*
    };
}

/// Forces an integer field to use the fixed-width native encoding
/// regardless of the session's `Config::optimization`.
pub struct AsNative;

forced_optimization_with!(AsNative, Optimization::Speed, {
    u16 => write_u16_as, read_u16;
    i16 => write_i16_as, read_i16;
    u32 => write_u32_as, read_u32;
    i32 => write_i32_as, read_i32;
    u64 => write_u64_as, read_u64;
    i64 => write_i64_as, read_i64;
});

/// Forces an integer field to use the compact LEB128 encoding regardless of
/// the session's `Config::optimization`.
pub struct AsSize;

forced_optimization_with!(AsSize, Optimization::Size, {
    u16 => write_u16_as, read_u16;
    i16 => write_i16_as, read_i16;
    u32 => write_u32_as, read_u32;
    i32 => write_i32_as, read_i32;
    u64 => write_u64_as, read_u64;
    i64 => write_i64_as, read_i64;
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{ReadSession, WriteSession};

    #[test]
    fn as_utf16_round_trips_through_a_session() {
        let value: With<String, AsUtf16> = With {
            field: "hello".to_string(),
            _marker: PhantomData,
        };
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&value).unwrap();
        let decoded: With<String, AsUtf16> = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.into_inner(), "hello");
    }

    #[test]
    fn as_native_ignores_session_size_optimization() {
        let value: With<u32, AsNative> = With {
            field: 42,
            _marker: PhantomData,
        };
        let session = WriteSession::new(Vec::new(), Config::with_optimization(Optimization::Size));
        let bytes = session.encode(&value).unwrap();
        let decoded: With<u32, AsNative> = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.into_inner(), 42);
    }
}
