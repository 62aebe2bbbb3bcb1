//! Error types for typelib operations

use thiserror::Error;

/// Main error type for typelib operations
#[derive(Error, Debug)]
pub enum TypelibError {
    /// Generic structural failure (short buffer, malformed string, ...)
    #[error("Invalid typelib: {0}")]
    Invalid(String),

    #[error("Invalid typelib header: {0}")]
    InvalidHeader(String),

    #[error("Invalid typelib directory: {0}")]
    InvalidDirectory(String),

    #[error("Invalid directory entry: {0}")]
    InvalidEntry(String),

    #[error("Invalid blob: {0}")]
    InvalidBlob(String),

    /// A caller broke an accessor contract, e.g. asked a struct handle for its signals
    #[error("Precondition violated in {operation}: {reason}")]
    PreconditionViolation {
        operation: &'static str,
        reason: String,
    },

    #[error("Index {index} out of range for {section} (count {count})")]
    IndexOutOfRange {
        section: &'static str,
        index: u32,
        count: u32,
    },

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Unresolvable reference {namespace}.{name}")]
    Unresolvable { namespace: String, name: String },

    #[error("Cannot build perfect hash: {0}")]
    Unbuildable(String),

    #[error("Memory mapping failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TypelibError {
    /// Shorthand for [`TypelibError::PreconditionViolation`]
    pub fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        TypelibError::PreconditionViolation {
            operation,
            reason: reason.into(),
        }
    }

    /// Prefix the message of a structural error with validation context.
    /// Non-structural errors are returned unchanged.
    pub fn with_context(self, context: &str) -> Self {
        match self {
            TypelibError::Invalid(m) => TypelibError::Invalid(format!("{context}: {m}")),
            TypelibError::InvalidHeader(m) => {
                TypelibError::InvalidHeader(format!("{context}: {m}"))
            }
            TypelibError::InvalidDirectory(m) => {
                TypelibError::InvalidDirectory(format!("{context}: {m}"))
            }
            TypelibError::InvalidEntry(m) => TypelibError::InvalidEntry(format!("{context}: {m}")),
            TypelibError::InvalidBlob(m) => TypelibError::InvalidBlob(format!("{context}: {m}")),
            other => other,
        }
    }

    /// True for the load-time validation family
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TypelibError::Invalid(_)
                | TypelibError::InvalidHeader(_)
                | TypelibError::InvalidDirectory(_)
                | TypelibError::InvalidEntry(_)
                | TypelibError::InvalidBlob(_)
        )
    }

    /// True for caller contract failures: a wrong-kind accessor or an index
    /// past a section's declared count
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TypelibError::PreconditionViolation { .. } | TypelibError::IndexOutOfRange { .. }
        )
    }
}

/// Convenient Result type
pub type Result<T> = std::result::Result<T, TypelibError>;
