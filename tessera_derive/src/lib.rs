//! Derive macros for `tessera`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

mod attributes;
mod decode;
mod encode;
mod type_key;
mod util;

extern crate proc_macro;

use syn::{parse_macro_input, DeriveInput};

/// Derives [`tessera::TypeKey`] for a struct or enum.
///
/// Generates a stable `module::path::TypeName@crate-version` name stamped
/// from `module_path!()` and `env!("CARGO_PKG_VERSION")` at the derive's
/// expansion site, and recurses into each generic type parameter's own
/// `TypeKey::type_descriptor()` for `generic_args`.
#[proc_macro_derive(TypeKey, attributes(tessera))]
pub fn derive_type_key(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match type_key::derive(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives [`tessera::Encode`] for a struct or fieldless enum.
///
/// # Attributes
///
/// - `#[tessera(version = N)]` on the type: sets `Encode::MAX_VERSION` to `N`
///   instead of the default `0`.
/// - `#[tessera(with = Wrapper)]` on a field: routes the field through
///   `Wrapper` (a type implementing [`tessera::with::EncodeWith`]) instead of
///   the field's own `Encode` impl.
/// - `#[tessera(base)]` on a field: writes the field as a base-class archive
///   via `ArchiveWriter::base_archive` instead of an ordinary field write.
///   At most one field may carry this attribute.
///
/// Enums are only supported when every variant is fieldless; such an enum
/// additionally gets an `EnumValue` impl and dispatches through
/// `tessera::enum_codec`, matching the hand-written shape in that module's
/// own tests.
#[proc_macro_derive(Encode, attributes(tessera))]
pub fn derive_encode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match encode::derive(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives [`tessera::Decode`] for a struct or fieldless enum.
///
/// See [`macro@Encode`] for the recognized `#[tessera(...)]` attributes; the
/// same ones apply symmetrically to `Decode`.
#[proc_macro_derive(Decode, attributes(tessera))]
pub fn derive_decode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match decode::derive(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
