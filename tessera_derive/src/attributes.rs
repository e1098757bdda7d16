//! Parsing for the `#[tessera(...)]` attribute surface.
//!
//! One container-level struct, one field-level struct, both filled in by
//! walking `syn::Attribute`s via `syn` 2's `Attribute::parse_nested_meta`
//! and rejecting a second, conflicting specification of the same option.

use syn::{Attribute, LitInt, Path};

/// Type-level `#[tessera(...)]` options.
#[derive(Default)]
pub struct ContainerAttributes {
    /// `#[tessera(version = N)]`: overrides the default `MAX_VERSION = 0`.
    pub version: Option<u32>,
}

impl ContainerAttributes {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = ContainerAttributes::default();
        for attr in attrs {
            if !attr.path().is_ident("tessera") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("version") {
                    if out.version.is_some() {
                        return Err(meta.error("`version` specified more than once"));
                    }
                    let lit: LitInt = meta.value()?.parse()?;
                    out.version = Some(lit.base10_parse()?);
                    Ok(())
                } else {
                    Err(meta.error("unrecognized `tessera` container attribute"))
                }
            })?;
        }
        Ok(out)
    }
}

/// Field-level `#[tessera(...)]` options.
#[derive(Default)]
pub struct FieldAttributes {
    /// `#[tessera(with = Wrapper)]`: routes this field through `Wrapper`'s
    /// `EncodeWith`/`DecodeWith` impl instead of the field's own `Encode`/
    /// `Decode`.
    pub with: Option<Path>,
    /// `#[tessera(base)]`: writes/reads this field as a base-class archive
    /// instead of an ordinary field.
    pub base: bool,
}

impl FieldAttributes {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = FieldAttributes::default();
        for attr in attrs {
            if !attr.path().is_ident("tessera") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("with") {
                    if out.with.is_some() {
                        return Err(meta.error("`with` specified more than once"));
                    }
                    let path: Path = meta.value()?.parse()?;
                    out.with = Some(path);
                    Ok(())
                } else if meta.path.is_ident("base") {
                    if out.base {
                        return Err(meta.error("`base` specified more than once"));
                    }
                    out.base = true;
                    Ok(())
                } else {
                    Err(meta.error("unrecognized `tessera` field attribute"))
                }
            })?;
        }
        Ok(out)
    }
}
