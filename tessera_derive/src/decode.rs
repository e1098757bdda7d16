//! `#[derive(Decode)]` expansion.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, Data, DeriveInput, Fields};

use crate::attributes::{ContainerAttributes, FieldAttributes};
use crate::util::{is_fieldless_enum, type_params};

pub fn derive(input: DeriveInput) -> syn::Result<TokenStream> {
    match &input.data {
        Data::Enum(data) if is_fieldless_enum(data) => derive_fieldless_enum(&input, data),
        Data::Enum(_) => Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[derive(Decode)] only supports enums whose variants are all fieldless",
        )),
        _ => derive_struct(&input),
    }
}

fn derive_struct(input: &DeriveInput) -> syn::Result<TokenStream> {
    let container = ContainerAttributes::parse(&input.attrs)?;
    let max_version = container.version.unwrap_or(0);

    let fields = crate::util::struct_fields(&input.data)?;
    let mut base_stmt: Option<TokenStream> = None;
    let mut field_stmts = Vec::new();
    let mut has_base = false;

    for (index, field) in fields.iter().enumerate() {
        let field_attrs = FieldAttributes::parse(&field.attrs)?;
        let field_ty = &field.ty;
        let binder = match &field.ident {
            Some(ident) => quote!(#ident),
            None => {
                let ident = syn::Ident::new(&format!("__tessera_field_{index}"), proc_macro2::Span::call_site());
                quote!(#ident)
            }
        };

        if field_attrs.base {
            if has_base {
                return Err(syn::Error::new_spanned(
                    field,
                    "at most one field may carry #[tessera(base)]",
                ));
            }
            has_base = true;
            base_stmt = Some(quote! { let #binder: #field_ty = archive.prepare_base_archive()?; });
            continue;
        }

        if let Some(wrapper) = &field_attrs.with {
            field_stmts.push(quote! {
                let #binder: #field_ty =
                    <::tessera::with::With<#field_ty, #wrapper> as ::tessera::Decode>::decode(archive)?.into_inner();
            });
        } else {
            field_stmts.push(quote! {
                let #binder: #field_ty = ::tessera::Decode::decode(archive)?;
            });
        }
    }

    let construct = match fields {
        Fields::Named(named) => {
            let idents = named.named.iter().map(|f| f.ident.clone().unwrap());
            quote! { Self { #( #idents ),* } }
        }
        Fields::Unnamed(unnamed) => {
            let binders = (0..unnamed.unnamed.len()).map(|idx| {
                syn::Ident::new(&format!("__tessera_field_{idx}"), proc_macro2::Span::call_site())
            });
            quote! { Self( #( #binders ),* ) }
        }
        Fields::Unit => quote! { Self },
    };

    let mut generics = input.generics.clone();
    let params: Vec<_> = type_params(&generics).cloned().collect();
    for param in &params {
        generics.make_where_clause().predicates.push(parse_quote!(
            #param: ::tessera::Decode + ::tessera::TypeKey + 'static
        ));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let ident = &input.ident;

    Ok(quote! {
        impl #impl_generics ::tessera::Decode for #ident #ty_generics #where_clause {
            const MAX_VERSION: u32 = #max_version;

            fn decode(archive: &mut ::tessera::ArchiveReader<'_>) -> ::tessera::Result<Self> {
                #base_stmt
                #( #field_stmts )*
                Ok(#construct)
            }
        }
    })
}

/// Relies on the `EnumValue` impl generated by `#[derive(Encode)]` on the
/// same type (see `encode::derive_fieldless_enum`) rather than generating
/// its own, since a type can only implement `EnumValue` once; a fieldless
/// enum deriving only `Decode` without also deriving `Encode` will fail to
/// compile with a missing-trait error, which is the expected failure mode.
fn derive_fieldless_enum(input: &DeriveInput, _data: &syn::DataEnum) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tessera::Decode for #ident #ty_generics #where_clause {
            fn decode(archive: &mut ::tessera::ArchiveReader<'_>) -> ::tessera::Result<Self> {
                ::tessera::enum_codec::decode_enum(archive)
            }
        }
    })
}
