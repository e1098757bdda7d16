//! Session-scoped configuration.
//!
//! A single [`Config`] is shared by a [`crate::session::WriteSession`] or
//! [`crate::session::ReadSession`] for its whole lifetime; nothing here is
//! mutated mid-session.

use std::collections::HashMap;

pub use crate::primitive::Optimization;

/// A directive to use a specific archive version when encoding a named type,
/// irrespective of that type's registered max version.
pub type VersionOverrides = HashMap<String, u32>;

/// Options recognized by the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enables passes 2 and 3 of the tolerant resolver.
    /// Off by default: an exact match is required unless a caller opts in.
    pub tolerant_deserialization: bool,
    /// Selects between native and LEB128/packed codings where applicable.
    pub optimization: Optimization,
    /// Forces a specific archive version for listed types during encode,
    /// keyed by the type's registered name (see [`crate::type_key`]).
    pub version_overrides: VersionOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerant_deserialization: false,
            optimization: Optimization::Size,
            version_overrides: VersionOverrides::new(),
        }
    }
}

impl Config {
    /// A config with every default except `optimization`.
    pub fn with_optimization(optimization: Optimization) -> Self {
        Self {
            optimization,
            ..Self::default()
        }
    }

    /// Returns the version override recorded for `type_name`, if any.
    pub fn version_override(&self, type_name: &str) -> Option<u32> {
        self.version_overrides.get(type_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_size_and_strict() {
        let cfg = Config::default();
        assert_eq!(cfg.optimization, Optimization::Size);
        assert!(!cfg.tolerant_deserialization);
        assert!(cfg.version_override("Foo").is_none());
    }

    #[test]
    fn version_override_is_looked_up_by_name() {
        let mut cfg = Config::default();
        cfg.version_overrides.insert("Foo".to_string(), 3);
        assert_eq!(cfg.version_override("Foo"), Some(3));
        assert_eq!(cfg.version_override("Bar"), None);
    }
}
