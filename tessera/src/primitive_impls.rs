//! Blanket [`Encode`]/[`Decode`] for primitives, `chrono`/`uuid` scalars, and
//! the standard containers.
//!
//! The per-wire-shape work already lives in [`crate::primitive`] and
//! [`crate::archive`]; this module is just the glue that lets generic code
//! (`#[derive(Encode)]` field expansions, [`crate::with`], the container
//! impls below) call `value.encode(archive)` on a leaf type without matching
//! on it by hand.
//!
//! Containers here use [`ArchiveWriter::write_seq_header`]/
//! [`ArchiveReader::read_seq_header`] rather than the `Rc`-based
//! `encode_object_array`: a bare `Vec<T>` (or `HashMap`, `HashSet`, ...)
//! embedded in a field has no reference identity of its own in this engine,
//! only its elements might. A caller that needs the container itself to be
//! shareable wraps it in `Rc`, which interns by pointer address like any
//! other object (see [`Rc`]'s impl at the bottom of this file).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::codec::{Decode, Encode, SeqElement};
use crate::error::Result;
use crate::primitive::Decimal;
use crate::type_key::{TypeDescriptor, TypeKey};

macro_rules! scalar_codec {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Encode for $ty {
            fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
                archive.$write(*self)
            }
        }

        impl Decode for $ty {
            fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
                archive.$read()
            }
        }
    };
}

scalar_codec!(bool, write_bool, read_bool);
scalar_codec!(u8, write_u8, read_u8);
scalar_codec!(i8, write_i8, read_i8);
scalar_codec!(u16, write_u16, read_u16);
scalar_codec!(i16, write_i16, read_i16);
scalar_codec!(u32, write_u32, read_u32);
scalar_codec!(i32, write_i32, read_i32);
scalar_codec!(u64, write_u64, read_u64);
scalar_codec!(i64, write_i64, read_i64);
scalar_codec!(f32, write_f32, read_f32);
scalar_codec!(f64, write_f64, read_f64);
scalar_codec!(char, write_char, read_char);
scalar_codec!(Decimal, write_decimal, read_decimal);
scalar_codec!(uuid::Uuid, write_guid, read_guid);
scalar_codec!(chrono::NaiveDateTime, write_datetime, read_datetime);
scalar_codec!(chrono::DateTime<chrono::FixedOffset>, write_datetime_offset, read_datetime_offset);
scalar_codec!(chrono::NaiveDate, write_date, read_date);
scalar_codec!(chrono::NaiveTime, write_time, read_time);

impl Encode for String {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_string(self)
    }
}

impl Decode for String {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        Ok(archive.read_string()?.to_string())
    }
}

impl SeqElement for String {}
impl SeqElement for uuid::Uuid {}
impl SeqElement for chrono::NaiveDateTime {}
impl SeqElement for chrono::DateTime<chrono::FixedOffset> {}
impl SeqElement for chrono::NaiveDate {}
impl SeqElement for chrono::NaiveTime {}

/// A 1-D array of one of the thirteen element types with a dedicated wire
/// form routes straight through [`crate::array`] instead of the generic
/// object-sequence path: no element type metadata, no per-element tag
/// beyond what the array header itself carries.
macro_rules! array_codec {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Encode for Vec<$ty> {
            fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
                archive.$write(self)
            }
        }

        impl Decode for Vec<$ty> {
            fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
                archive.$read()
            }
        }
    };
}

array_codec!(bool, write_bool_array, read_bool_array);
array_codec!(u8, write_u8_array, read_u8_array);
array_codec!(i8, write_i8_array, read_i8_array);
array_codec!(u16, write_u16_array, read_u16_array);
array_codec!(i16, write_i16_array, read_i16_array);
array_codec!(u32, write_u32_array, read_u32_array);
array_codec!(i32, write_i32_array, read_i32_array);
array_codec!(u64, write_u64_array, read_u64_array);
array_codec!(i64, write_i64_array, read_i64_array);
array_codec!(f32, write_f32_array, read_f32_array);
array_codec!(f64, write_f64_array, read_f64_array);
array_codec!(char, write_char_array, read_char_array);
array_codec!(Decimal, write_decimal_array, read_decimal_array);

/// `None` is the `NullReference` tag; `Some(v)` is just `v`'s own encoding,
/// with no wrapper tag of its own. Decode peeks the tag to tell the two
/// apart before dispatching.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        match self {
            None => archive.write_null(),
            Some(value) => value.encode(archive),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        if archive.peek_tag()? == crate::tag::Tag::NullReference as u8 {
            archive.skip_byte()?;
            Ok(None)
        } else {
            Ok(Some(T::decode(archive)?))
        }
    }
}

impl<T> SeqElement for Option<T> where Option<T>: Encode + TypeKey {}

/// The generic fallback for a `Vec` whose element type has no dedicated
/// array wire form: element type metadata once, then each element's own
/// `Encode`. Primitive element types never reach this impl — they have a
/// concrete `Vec<$prim>` impl above instead, since `$prim` does not
/// implement [`SeqElement`].
impl<T: SeqElement> Encode for Vec<T> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_seq_header(&T::type_descriptor(), self.len())?;
        for item in self {
            item.encode(archive)?;
        }
        Ok(())
    }
}

impl<T: SeqElement + Decode> Decode for Vec<T> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        let len = archive.read_seq_header()?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::decode(archive)?);
        }
        Ok(out)
    }
}

impl<T> SeqElement for Vec<T> where Vec<T>: Encode + TypeKey {}

fn pair_descriptor<K: TypeKey, V: TypeKey>() -> TypeDescriptor {
    TypeDescriptor::generic("core::tuple::Pair", vec![K::type_descriptor(), V::type_descriptor()])
}

impl<K: Encode + TypeKey, V: Encode + TypeKey> Encode for HashMap<K, V> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_seq_header(&pair_descriptor::<K, V>(), self.len())?;
        for (key, value) in self {
            key.encode(archive)?;
            value.encode(archive)?;
        }
        Ok(())
    }
}

impl<K: Decode + TypeKey + Eq + Hash, V: Decode + TypeKey> Decode for HashMap<K, V> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        let len = archive.read_seq_header()?;
        let mut out = HashMap::with_capacity(len);
        for _ in 0..len {
            let key = K::decode(archive)?;
            let value = V::decode(archive)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<K, V> SeqElement for HashMap<K, V> where HashMap<K, V>: Encode + TypeKey {}

impl<K: Encode + TypeKey, V: Encode + TypeKey> Encode for BTreeMap<K, V> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_seq_header(&pair_descriptor::<K, V>(), self.len())?;
        for (key, value) in self {
            key.encode(archive)?;
            value.encode(archive)?;
        }
        Ok(())
    }
}

impl<K: Decode + TypeKey + Ord, V: Decode + TypeKey> Decode for BTreeMap<K, V> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        let len = archive.read_seq_header()?;
        let mut out = BTreeMap::new();
        for _ in 0..len {
            let key = K::decode(archive)?;
            let value = V::decode(archive)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

impl<K, V> SeqElement for BTreeMap<K, V> where BTreeMap<K, V>: Encode + TypeKey {}

impl<T: SeqElement> Encode for HashSet<T> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_seq_header(&T::type_descriptor(), self.len())?;
        for item in self {
            item.encode(archive)?;
        }
        Ok(())
    }
}

impl<T: SeqElement + Decode + Eq + Hash> Decode for HashSet<T> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        let len = archive.read_seq_header()?;
        let mut out = HashSet::with_capacity(len);
        for _ in 0..len {
            out.insert(T::decode(archive)?);
        }
        Ok(out)
    }
}

impl<T> SeqElement for HashSet<T> where HashSet<T>: Encode + TypeKey {}

impl<T: SeqElement> Encode for BTreeSet<T> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.write_seq_header(&T::type_descriptor(), self.len())?;
        for item in self {
            item.encode(archive)?;
        }
        Ok(())
    }
}

impl<T: SeqElement + Decode + Ord> Decode for BTreeSet<T> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        let len = archive.read_seq_header()?;
        let mut out = BTreeSet::new();
        for _ in 0..len {
            out.insert(T::decode(archive)?);
        }
        Ok(out)
    }
}

impl<T> SeqElement for BTreeSet<T> where BTreeSet<T>: Encode + TypeKey {}

/// Shared, possibly cyclic values are always held behind `Rc` in this
/// engine; this is the one impl that actually routes through
/// [`ArchiveWriter::encode_object`]/[`ArchiveReader::decode_object`] and
/// therefore the only one that gets back-reference interning, type
/// metadata, and archive framing for free.
impl<T: Encode + TypeKey> Encode for Rc<T> {
    fn encode(&self, archive: &mut ArchiveWriter<'_>) -> Result<()> {
        archive.encode_object(self)
    }
}

impl<T: Decode + TypeKey + 'static> Decode for Rc<T> {
    fn decode(archive: &mut ArchiveReader<'_>) -> Result<Self> {
        archive.decode_object()
    }
}

impl<T> SeqElement for Rc<T> where Rc<T>: Encode + TypeKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{ReadSession, WriteSession};

    fn roundtrip<T>(value: &T) -> T
    where
        T: Encode,
        T: Decode,
    {
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(value).unwrap();
        ReadSession::new(bytes.as_slice(), Config::default()).decode().unwrap()
    }

    #[test]
    fn primitives_roundtrip() {
        assert_eq!(roundtrip(&true), true);
        assert_eq!(roundtrip(&42u32), 42u32);
        assert_eq!(roundtrip(&(-7i64)), -7i64);
        assert_eq!(roundtrip(&3.5f64), 3.5f64);
        assert_eq!(roundtrip(&'x'), 'x');
    }

    #[test]
    fn string_roundtrips() {
        assert_eq!(roundtrip(&"hello world".to_string()), "hello world".to_string());
    }

    #[test]
    fn option_distinguishes_none_from_some() {
        let none: Option<i32> = roundtrip(&None);
        assert_eq!(none, None);
        let some: Option<i32> = roundtrip(&Some(9));
        assert_eq!(some, Some(9));
    }

    #[test]
    fn vec_of_primitives_roundtrips() {
        let v = vec![1i32, 2, 3, 4];
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn nested_vec_roundtrips() {
        let v = vec![vec![1u8, 2], vec![3, 4, 5]];
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn bool_vec_uses_the_dedicated_packed_array_tag() {
        let values = vec![true, false, true, true, false, false, false, true, true];
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&values).unwrap();
        assert_eq!(bytes[0], crate::tag::Tag::ArrayBoolPacked as u8);
        assert_eq!(roundtrip(&values), values);
    }

    #[test]
    fn decimal_vec_roundtrips() {
        let values = vec![
            Decimal { lo: 1, mid: 0, hi: 0, flags: 0 },
            Decimal { lo: u32::MAX, mid: 2, hi: 3, flags: 0x0008_0000 },
        ];
        assert_eq!(roundtrip(&values), values);
    }

    #[test]
    fn vec_of_strings_roundtrips_through_the_generic_sequence_path() {
        let values = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(roundtrip(&values), values);
    }

    #[test]
    fn vec_of_option_roundtrips() {
        let values: Vec<Option<i32>> = vec![Some(1), None, Some(3)];
        assert_eq!(roundtrip(&values), values);
    }

    #[test]
    fn hash_map_roundtrips() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), 1i32);
        m.insert("b".to_string(), 2i32);
        assert_eq!(roundtrip(&m), m);
    }

    #[test]
    fn btree_set_roundtrips_in_sorted_order() {
        let mut s = BTreeSet::new();
        s.insert(3i32);
        s.insert(1i32);
        s.insert(2i32);
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn rc_wrapped_primitive_roundtrips_through_object_interning() {
        let value = Rc::new(99u32);
        let session = WriteSession::new(Vec::new(), Config::default());
        let bytes = session.encode(&value).unwrap();
        let decoded: Rc<u32> = ReadSession::new(bytes.as_slice(), Config::default())
            .decode()
            .unwrap();
        assert_eq!(*decoded, 99);
    }
}
