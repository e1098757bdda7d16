//! Tolerant type resolver.
//!
//! Wire type names carry the defining crate's version as a `@version` suffix
//! (the Rust analogue of an assembly-qualified name — see `type_key`'s doc
//! comment). This module implements a three-pass fallback against a
//! candidate set of locally known type names, gated by
//! [`crate::config::Config::tolerant_deserialization`]: exact match, then
//! (if tolerant) a simple-name match ignoring the version suffix, then a
//! name-only match ignoring the module path too.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::type_key::TypeDescriptor;

/// Splits a wire type name into (bare name, crate version), where the
/// version is the part after the last `@` stamped in by `tessera_derive`.
/// Names with no `@` have no recorded version.
fn split_version(name: &str) -> &str {
    match name.rsplit_once('@') {
        Some((head, _version)) => head,
        None => name,
    }
}

/// Strips the module path from a fully-qualified name, leaving only the
/// trailing type name (the "name-only" fallback's candidate key).
fn bare_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

/// Resolves `wire_name` against `candidates` using the three-pass algorithm,
/// returning the single matching candidate.
///
/// A non-exact match is only accepted when `tolerant` is set; otherwise
/// anything short of an exact match fails with `TypeResolutionFailed` even
/// though pass 2 or 3 might have found exactly one candidate.
pub fn resolve<'a>(wire_name: &str, candidates: &[&'a str], tolerant: bool) -> Result<&'a str> {
    let exact: Vec<&str> = candidates.iter().copied().filter(|&c| c == wire_name).collect();
    match exact.len() {
        1 => return Ok(exact[0]),
        0 => {}
        _ => {
            return Err(Error::AmbiguousTypeResolution {
                type_name: wire_name.to_string(),
                candidates: exact.into_iter().map(str::to_string).collect(),
            });
        }
    }

    if !tolerant {
        return Err(Error::TypeResolutionFailed {
            type_name: wire_name.to_string(),
        });
    }

    let wire_head = split_version(wire_name);
    let simple: Vec<&str> = candidates.iter().copied().filter(|&c| split_version(c) == wire_head).collect();
    match simple.len() {
        1 => return Ok(simple[0]),
        0 => {}
        _ => {
            return Err(Error::AmbiguousTypeResolution {
                type_name: wire_name.to_string(),
                candidates: simple.into_iter().map(str::to_string).collect(),
            });
        }
    }

    let wire_bare = bare_name(wire_head);
    let name_only: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|&c| bare_name(split_version(c)) == wire_bare)
        .collect();
    match name_only.len() {
        1 => Ok(name_only[0]),
        0 => Err(Error::TypeResolutionFailed {
            type_name: wire_name.to_string(),
        }),
        _ => Err(Error::AmbiguousTypeResolution {
            type_name: wire_name.to_string(),
            candidates: name_only.into_iter().map(str::to_string).collect(),
        }),
    }
}

/// Recursively resolves a whole [`TypeDescriptor`] read off the wire against
/// the one the caller statically expects, honoring the same three passes at
/// every level of a closed generic. Array element types resolve element-wise
/// this way too: in this engine arrays are just `Vec<T>`'s
/// `TypeDescriptor::generic_args`, so resolving the nested descriptor falls
/// out of the recursion for free rather than needing separate array-name
/// parsing.
pub fn resolve_descriptor(wire: &TypeDescriptor, expected: &TypeDescriptor, config: &Config) -> Result<()> {
    resolve(&wire.name, &[expected.name.as_str()], config.tolerant_deserialization)?;
    if wire.generic_args.len() != expected.generic_args.len() {
        return Err(Error::TypeResolutionFailed {
            type_name: wire.to_string(),
        });
    }
    for (w, e) in wire.generic_args.iter().zip(expected.generic_args.iter()) {
        resolve_descriptor(w, e, config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_even_when_intolerant() {
        let candidates = ["demo::Foo@1.0.0"];
        assert_eq!(resolve("demo::Foo@1.0.0", &candidates, false).unwrap(), "demo::Foo@1.0.0");
    }

    #[test]
    fn version_mismatch_requires_tolerant_mode() {
        let candidates = ["demo::Foo@2.0.0"];
        assert!(resolve("demo::Foo@1.0.0", &candidates, false).is_err());
        assert_eq!(resolve("demo::Foo@1.0.0", &candidates, true).unwrap(), "demo::Foo@2.0.0");
    }

    #[test]
    fn name_only_fallback_ignores_module_path() {
        let candidates = ["renamed::module::Foo@2.0.0"];
        assert_eq!(resolve("old::module::Foo@1.0.0", &candidates, true).unwrap(), "renamed::module::Foo@2.0.0");
    }

    #[test]
    fn ambiguous_candidates_are_reported() {
        let candidates = ["a::Foo@2.0.0", "b::Foo@3.0.0"];
        let err = resolve("old::Foo@1.0.0", &candidates, true).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTypeResolution { .. }));
    }

    #[test]
    fn zero_candidates_fails_resolution() {
        let candidates: [&str; 0] = [];
        let err = resolve("demo::Foo@1.0.0", &candidates, true).unwrap_err();
        assert!(matches!(err, Error::TypeResolutionFailed { .. }));
    }
}
