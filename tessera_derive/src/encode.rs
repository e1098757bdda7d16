//! `#[derive(Encode)]` expansion.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, Data, DeriveInput, Index};

use crate::attributes::{ContainerAttributes, FieldAttributes};
use crate::util::{is_fieldless_enum, type_params};

pub fn derive(input: DeriveInput) -> syn::Result<TokenStream> {
    match &input.data {
        Data::Enum(data) if is_fieldless_enum(data) => derive_fieldless_enum(&input, data),
        Data::Enum(_) => Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[derive(Encode)] only supports enums whose variants are all fieldless",
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

    for (index, field) in fields.iter().enumerate() {
        let field_attrs = FieldAttributes::parse(&field.attrs)?;
        let accessor = match &field.ident {
            Some(ident) => quote!(#ident),
            None => {
                let i = Index::from(index);
                quote!(#i)
            }
        };

        if field_attrs.base {
            if base_stmt.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "at most one field may carry #[tessera(base)]",
                ));
            }
            base_stmt = Some(quote! {
                archive.base_archive(&self.#accessor)?;
            });
            continue;
        }

        if let Some(wrapper) = &field_attrs.with {
            let field_ty = &field.ty;
            field_stmts.push(quote! {
                <::tessera::with::With<#field_ty, #wrapper> as ::tessera::Encode>::encode(
                    ::tessera::with::With::<#field_ty, #wrapper>::cast(&self.#accessor),
                    archive,
                )?;
            });
        } else {
            let field_ty = &field.ty;
            field_stmts.push(quote! {
                <#field_ty as ::tessera::Encode>::encode(&self.#accessor, archive)?;
            });
        }
    }

    let mut generics = input.generics.clone();
    let params: Vec<_> = type_params(&generics).cloned().collect();
    for param in &params {
        generics
            .make_where_clause()
            .predicates
            .push(parse_quote!(#param: ::tessera::Encode + ::tessera::TypeKey));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let ident = &input.ident;

    Ok(quote! {
        impl #impl_generics ::tessera::Encode for #ident #ty_generics #where_clause {
            const MAX_VERSION: u32 = #max_version;

            fn encode(&self, archive: &mut ::tessera::ArchiveWriter<'_>) -> ::tessera::Result<()> {
                #base_stmt
                #( #field_stmts )*
                Ok(())
            }
        }

        impl #impl_generics ::tessera::SeqElement for #ident #ty_generics #where_clause {}
    })
}

/// Fieldless enums get both their [`tessera::enum_codec::EnumValue`] impl and
/// their `Encode` impl from this one derive invocation, since
/// `encode_enum`/`decode_enum` both need `EnumValue` and a fieldless type can
/// only sensibly implement it once. `#[derive(Decode)]` on the same type
/// reuses this impl rather than generating its own (see `decode::derive`).
fn derive_fieldless_enum(input: &DeriveInput, data: &syn::DataEnum) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let to_arms = data.variants.iter().enumerate().map(|(index, variant)| {
        let variant_ident = &variant.ident;
        let discriminant = index as i64;
        quote! { #ident::#variant_ident => #discriminant }
    });

    let from_arms = data.variants.iter().enumerate().map(|(index, variant)| {
        let variant_ident = &variant.ident;
        let discriminant = index as i64;
        quote! { #discriminant => ::std::option::Option::Some(#ident::#variant_ident) }
    });

    Ok(quote! {
        impl #impl_generics ::tessera::enum_codec::EnumValue for #ident #ty_generics #where_clause {
            fn to_discriminant(&self) -> i64 {
                match self {
                    #( #to_arms ),*
                }
            }

            fn from_discriminant(discriminant: i64) -> ::std::option::Option<Self> {
                match discriminant {
                    #( #from_arms, )*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl #impl_generics ::tessera::Encode for #ident #ty_generics #where_clause {
            fn encode(&self, archive: &mut ::tessera::ArchiveWriter<'_>) -> ::tessera::Result<()> {
                ::tessera::enum_codec::encode_enum(self, archive)
            }
        }

        impl #impl_generics ::tessera::SeqElement for #ident #ty_generics #where_clause {}
    })
}
