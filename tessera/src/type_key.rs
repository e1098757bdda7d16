//! Type identity: an assembly-qualified-name analogue for the wire.
//!
//! Every type is stamped with its full name *and* the identity of the crate
//! that defines it, so a reader can tell a renamed-but-compatible type from
//! an unrelated one with the same short name. Rust has no runtime assembly
//! metadata, so this module synthesizes a three-tier name space out of
//! information that *is* available statically: the type's module path, its
//! bare name, and the defining crate's version (stamped in by the
//! [`tessera_derive`] macros via `env!("CARGO_PKG_VERSION")`). See
//! DESIGN.md for why this shape was picked.

use std::fmt;

/// The identity of a runtime type on the wire.
///
/// Non-generic types and generic *definitions* carry an empty `generic_args`;
/// closed constructed generics (e.g. `Vec<i32>`) carry one descriptor per
/// type argument, recursively. On the wire, the generic definition's own
/// descriptor is written first (by name or back-reference), then the
/// argument count, then each argument descriptor, recursively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Fully-qualified name of the generic definition (or the whole type,
    /// for non-generic types): `module::path::TypeName@crate-version`.
    pub name: String,
    /// Type arguments, in declaration order. Empty for non-generic types and
    /// for generic definitions that have not yet been closed over concrete
    /// arguments.
    pub generic_args: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    /// A descriptor for a non-generic (or generic-definition) type.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_args: Vec::new(),
        }
    }

    /// A descriptor for a closed constructed generic type.
    pub fn generic(name: impl Into<String>, generic_args: Vec<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            generic_args,
        }
    }

    /// Whether this descriptor names a generic definition or closed generic
    /// (as opposed to a plain type).
    pub fn is_generic(&self) -> bool {
        !self.generic_args.is_empty()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.generic_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// A type that can describe its own wire identity.
///
/// Implemented for every primitive, collection, and `#[derive(Encode)]`/
/// `#[derive(Decode)]` type. The derive macros generate an implementation
/// that stamps a stable `module::path::TypeName@crate-version` name; the
/// blanket implementations for built-in containers generate the
/// `generic_args` list from their own type parameters' descriptors.
pub trait TypeKey {
    /// This type's wire identity.
    fn type_descriptor() -> TypeDescriptor;
}

macro_rules! leaf_type_key {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl TypeKey for $ty {
                fn type_descriptor() -> TypeDescriptor {
                    TypeDescriptor::leaf($name)
                }
            }
        )*
    };
}

leaf_type_key! {
    bool => "core::bool",
    u8 => "core::u8",
    i8 => "core::i8",
    u16 => "core::u16",
    i16 => "core::i16",
    u32 => "core::u32",
    i32 => "core::i32",
    u64 => "core::u64",
    i64 => "core::i64",
    f32 => "core::f32",
    f64 => "core::f64",
    char => "core::char",
    String => "alloc::string::String",
    crate::primitive::Decimal => "tessera::Decimal",
    uuid::Uuid => "uuid::Uuid",
    chrono::NaiveDateTime => "chrono::NaiveDateTime",
    chrono::DateTime<chrono::FixedOffset> => "chrono::DateTime",
    chrono::NaiveDate => "chrono::NaiveDate",
    chrono::NaiveTime => "chrono::NaiveTime",
}

impl<T: TypeKey> TypeKey for Vec<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("alloc::vec::Vec", vec![T::type_descriptor()])
    }
}

impl<T: TypeKey> TypeKey for Option<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("core::option::Option", vec![T::type_descriptor()])
    }
}

impl<K: TypeKey, V: TypeKey> TypeKey for std::collections::HashMap<K, V> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic(
            "std::collections::HashMap",
            vec![K::type_descriptor(), V::type_descriptor()],
        )
    }
}

impl<K: TypeKey, V: TypeKey> TypeKey for std::collections::BTreeMap<K, V> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic(
            "alloc::collections::BTreeMap",
            vec![K::type_descriptor(), V::type_descriptor()],
        )
    }
}

impl<T: TypeKey> TypeKey for std::collections::HashSet<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("std::collections::HashSet", vec![T::type_descriptor()])
    }
}

impl<T: TypeKey> TypeKey for std::collections::BTreeSet<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("alloc::collections::BTreeSet", vec![T::type_descriptor()])
    }
}

impl<T: TypeKey> TypeKey for std::rc::Rc<T> {
    fn type_descriptor() -> TypeDescriptor {
        T::type_descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_descriptor_has_no_generic_args() {
        let d = i32::type_descriptor();
        assert_eq!(d.name, "core::i32");
        assert!(!d.is_generic());
    }

    #[test]
    fn nested_generic_descriptor_recurses() {
        let d = Vec::<Vec<i32>>::type_descriptor();
        assert!(d.is_generic());
        assert_eq!(d.generic_args.len(), 1);
        assert!(d.generic_args[0].is_generic());
        assert_eq!(d.to_string(), "alloc::vec::Vec<alloc::vec::Vec<core::i32>>");
    }
}
