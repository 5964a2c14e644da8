//! Bridge error types.

use std::path::PathBuf;

/// Errors that can occur while loading, importing or calling foreign functions.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Failed to parse a C function signature.
    #[error("invalid C signature: {detail}")]
    InvalidSignature { detail: String },

    /// A C type the bridge cannot pass by value.
    #[error("unsupported C type '{ctype}'")]
    UnsupportedType { ctype: String },

    /// `void` used as a parameter next to other parameters.
    #[error("void is not a legal parameter type (in '{function}')")]
    IllegalVoidParameter { function: String },

    /// Variadic functions cannot be described by a fixed signature.
    #[error("variadic function '{function}' is not supported")]
    Variadic { function: String },

    /// More parameters than the invocation engine dispatches.
    #[error("function '{function}' takes {count} parameters, at most {max} are supported")]
    TooManyParameters {
        function: String,
        count: usize,
        max: usize,
    },

    /// No shared object matched the requested library name.
    #[error("library '{name}' not found")]
    LibraryNotFound { name: String },

    /// The dynamic loader rejected the library.
    #[error("failed to load library '{}': {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The dynamic loader failed to unload the library.
    #[error("failed to close library '{}': {source}", path.display())]
    LibraryClose {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// Symbol lookup failed.
    #[error("symbol '{name}' not found in '{library}'")]
    SymbolNotFound { name: String, library: String },

    /// Call made with the wrong number of arguments.
    #[error("illegal argument length for '{function}', expected {expected}, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    /// A host value could not be converted to or from a native type.
    #[error("marshal error: {detail}")]
    Marshal { detail: String },

    /// A function expected to hand back memory returned null.
    #[error("'{function}' returned a null pointer")]
    NullReturn { function: String },

    /// An oracle suite is structurally invalid.
    #[error("invalid probe suite: {detail}")]
    InvalidSuite { detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn marshal(detail: impl Into<String>) -> Self {
        BridgeError::Marshal {
            detail: detail.into(),
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
