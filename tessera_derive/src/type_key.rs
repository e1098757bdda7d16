//! `#[derive(TypeKey)]` expansion.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, DeriveInput};

use crate::util::type_params;

pub fn derive(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let name_literal = format!("{{}}::{}@{{}}", ident);

    let mut generics = input.generics.clone();
    let params: Vec<_> = type_params(&generics).cloned().collect();
    for param in &params {
        generics
            .make_where_clause()
            .predicates
            .push(parse_quote!(#param: ::tessera::TypeKey));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let generic_args = if params.is_empty() {
        quote! { ::std::vec::Vec::new() }
    } else {
        quote! {
            ::std::vec![ #( <#params as ::tessera::TypeKey>::type_descriptor() ),* ]
        }
    };

    let body = if params.is_empty() {
        quote! {
            ::tessera::TypeDescriptor::leaf(
                ::std::format!(#name_literal, ::std::module_path!(), ::std::env!("CARGO_PKG_VERSION")),
            )
        }
    } else {
        quote! {
            ::tessera::TypeDescriptor::generic(
                ::std::format!(#name_literal, ::std::module_path!(), ::std::env!("CARGO_PKG_VERSION")),
                #generic_args,
            )
        }
    };

    Ok(quote! {
        impl #impl_generics ::tessera::TypeKey for #ident #ty_generics #where_clause {
            fn type_descriptor() -> ::tessera::TypeDescriptor {
                #body
            }
        }
    })
}
