//! Shared helpers for walking a [`syn::DeriveInput`]'s fields and generics.

use syn::{Data, Fields, GenericParam, Generics};

/// Yields the fields of a struct in declaration order; fails for unions and
/// for enums (handled separately by [`crate::encode`]/[`crate::decode`]'s
/// fieldless-enum path).
pub fn struct_fields(data: &Data) -> syn::Result<&Fields> {
    match data {
        Data::Struct(data) => Ok(&data.fields),
        Data::Enum(_) => Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "enums are only supported when every variant is fieldless; see the `EnumValue` path",
        )),
        Data::Union(data) => Err(syn::Error::new(
            data.union_token.span,
            "tessera derive macros do not support unions",
        )),
    }
}

/// Whether every variant of an enum carries no fields.
pub fn is_fieldless_enum(data: &syn::DataEnum) -> bool {
    data.variants.iter().all(|variant| matches!(variant.fields, Fields::Unit))
}

/// The bound `T::type_descriptor()` / `T: TypeKey` needs for each type
/// parameter declared on the input, so a generated impl's `where` clause
/// doesn't require the caller to have written the bound by hand.
pub fn type_params<'a>(generics: &'a Generics) -> impl Iterator<Item = &'a syn::Ident> {
    generics.params.iter().filter_map(|param| match param {
        GenericParam::Type(ty) => Some(&ty.ident),
        _ => None,
    })
}
