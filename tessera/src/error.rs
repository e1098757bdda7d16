//! The closed set of failures the engine can surface.
//!
//! There is no local recovery: every variant here is fatal to the session
//! that produced it. A session that has returned an `Err` must be discarded,
//! not reused; retry and partial-failure semantics are deliberately not
//! offered.

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure mode the engine can produce.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The stream is structurally broken: an unknown tag, a truncated read,
    /// an unbalanced archive, or a malformed LEB128 group.
    #[error("corrupt stream: {reason}")]
    CorruptStream {
        /// What went wrong.
        reason: &'static str,
    },

    /// An archive's version exceeds what the registered decoder supports.
    #[error(
        "type `{type_name}` carries version {got} but only versions up to \
         {max} are supported"
    )]
    VersionNotSupported {
        /// The type the archive belongs to.
        type_name: String,
        /// The version found on the wire.
        got: u32,
        /// The highest version this process's decoder knows how to read.
        max: u32,
    },

    /// No internal or external encoder is registered for a type being
    /// encoded.
    #[error("type `{type_name}` has no registered encoder")]
    NotSerializable {
        /// The type that could not be encoded.
        type_name: String,
    },

    /// The tolerant resolver found zero candidates for a type name.
    #[error("could not resolve type `{type_name}`")]
    TypeResolutionFailed {
        /// The assembly-qualified name that failed to resolve.
        type_name: String,
    },

    /// The tolerant resolver found more than one candidate at a given pass.
    #[error(
        "type name `{type_name}` is ambiguous: {candidates:?}"
    )]
    AmbiguousTypeResolution {
        /// The assembly-qualified name that was ambiguous.
        type_name: String,
        /// The candidates that matched.
        candidates: Vec<String>,
    },

    /// An object reappeared before its own encoding finished.
    #[error("cyclic dependency detected while encoding `{type_name}`")]
    CyclicDependencyDetected {
        /// The type of the object that formed the cycle.
        type_name: String,
    },

    /// A custom encoder or decoder raised its own error.
    #[error("custom serializer for `{type_name}` failed: {source}")]
    UserSerializerError {
        /// The type whose custom codec failed.
        type_name: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Propagated I/O failure from the underlying sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an arbitrary error raised by a custom encoder/decoder.
    pub fn user(
        type_name: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::UserSerializerError {
            type_name: type_name.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn corrupt(reason: &'static str) -> Self {
        Error::CorruptStream { reason }
    }
}
