//! Type intern table.
//!
//! On encode, a fresh [`TypeDescriptor`] is written out in full and recorded
//! against the next id; a descriptor already seen this session is written as
//! a back-reference instead. An additional optimization (`current_type`)
//! suppresses re-emitting type metadata when the immediately preceding
//! object already declared the same type.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::type_key::TypeDescriptor;

/// Encode-side type intern table: `TypeDescriptor -> id`.
#[derive(Debug, Default)]
pub struct WriteTypeTable {
    ids: HashMap<TypeDescriptor, u32>,
    next_id: u32,
    /// The type declared by the immediately preceding custom-typed object,
    /// used to suppress a redundant repeat emission.
    current_type: Option<TypeDescriptor>,
}

/// The outcome of looking up a type on the encode side: whether it must be
/// written in full, or can be replaced with a back-reference / suppressed
/// entirely because it matches `current_type`.
pub enum WriteOutcome {
    /// First time this descriptor is seen this session; caller must write it
    /// in full (`Tag::Type` path) and then call [`WriteTypeTable::record`].
    Fresh,
    /// Already interned; caller must write `Tag::TypeId` + this id.
    BackReference(u32),
    /// Identical to the type the immediately preceding object declared;
    /// caller may skip emitting type metadata altogether.
    SameAsCurrent,
}

impl WriteTypeTable {
    /// Looks up `descriptor`, without mutating the table.
    pub fn classify(&self, descriptor: &TypeDescriptor) -> WriteOutcome {
        if self.current_type.as_ref() == Some(descriptor) {
            return WriteOutcome::SameAsCurrent;
        }
        match self.ids.get(descriptor) {
            Some(&id) => WriteOutcome::BackReference(id),
            None => WriteOutcome::Fresh,
        }
    }

    /// Interns a freshly written descriptor, returning its new id.
    pub fn record(&mut self, descriptor: TypeDescriptor) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.current_type = Some(descriptor.clone());
        self.ids.insert(descriptor, id);
        id
    }

    /// Marks `descriptor` as the type most recently declared, without
    /// interning a new id (used after a `SameAsCurrent`/`BackReference`
    /// classification, where no new id is minted but the "current type"
    /// tracking must still follow).
    pub fn touch(&mut self, descriptor: TypeDescriptor) {
        self.current_type = Some(descriptor);
    }
}

/// Decode-side type intern table: `id -> TypeDescriptor`.
#[derive(Debug, Default)]
pub struct ReadTypeTable {
    descriptors: Vec<TypeDescriptor>,
    current_type: Option<TypeDescriptor>,
}

impl ReadTypeTable {
    /// Interns a freshly read descriptor, assigning it the next id.
    pub fn record(&mut self, descriptor: TypeDescriptor) -> u32 {
        let id = self.descriptors.len() as u32;
        self.descriptors.push(descriptor.clone());
        self.current_type = Some(descriptor);
        id
    }

    /// Resolves a `Tag::TypeId` back-reference.
    pub fn resolve(&self, id: u32) -> Result<&TypeDescriptor> {
        self.descriptors
            .get(id as usize)
            .ok_or_else(|| Error::corrupt("type id refers to an unknown type"))
    }

    /// The type most recently declared, consulted when the wire omits type
    /// metadata on the `SameAsCurrent` optimization.
    pub fn current(&self) -> Option<&TypeDescriptor> {
        self.current_type.as_ref()
    }

    /// Marks `descriptor` as the type most recently declared without minting
    /// a new id (mirrors [`WriteTypeTable::touch`]).
    pub fn touch(&mut self, descriptor: TypeDescriptor) {
        self.current_type = Some(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_then_back_reference() {
        let mut t = WriteTypeTable::default();
        let d = TypeDescriptor::leaf("demo::Foo");
        assert!(matches!(t.classify(&d), WriteOutcome::Fresh));
        let id = t.record(d.clone());
        assert_eq!(id, 0);
        assert!(matches!(t.classify(&d), WriteOutcome::SameAsCurrent));

        let other = TypeDescriptor::leaf("demo::Bar");
        t.touch(other.clone());
        assert!(matches!(t.classify(&d), WriteOutcome::BackReference(0)));
    }

    #[test]
    fn read_table_resolves_by_id() {
        let mut t = ReadTypeTable::default();
        let d = TypeDescriptor::leaf("demo::Foo");
        let id = t.record(d.clone());
        assert_eq!(t.resolve(id).unwrap(), &d);
        assert!(t.resolve(id + 1).is_err());
    }
}
