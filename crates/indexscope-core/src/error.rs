//! Error types for indexscope.
//!
//! Expected failures (conflicts, missing rules, a stopped indexing service) are
//! ordinary values of [`IndexScopeError`]. Native adapter faults are kept in
//! their own [`NativeFault`] type and translated at the manager boundary so raw
//! codes never leak to callers.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the indexscope library.
#[derive(Debug, Error)]
pub enum IndexScopeError {
    // Caller input errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Rule set errors
    #[error("A rule already exists for path: {path}")]
    Conflict { path: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    // Privilege errors
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Administrator privileges are required for this operation")]
    InsufficientPrivileges,

    // Environment errors
    #[error("Service unavailable: {service} is not running")]
    ServiceUnavailable { service: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Native error 0x{code:08X}: {message}")]
    UnknownNative { code: i32, message: String },

    #[error("Search manager registration unresolved: {reason}")]
    RegistrationUnresolved { reason: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Unsupported document version {found:?} (expected {expected:?})")]
    UnsupportedVersion { found: String, expected: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for indexscope operations.
pub type Result<T> = std::result::Result<T, IndexScopeError>;

/// Coarse classification of an [`IndexScopeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    AccessDenied,
    ServiceUnavailable,
    Timeout,
    RegistrationUnresolved,
    UnknownNative,
    Internal,
}

/// Fault reported by a native adapter.
///
/// Adapters translate whatever their platform returns (HRESULTs, registry
/// status codes) into one of these before handing control back to the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeFault {
    #[error("rule already exists")]
    DuplicateRule,

    #[error("rule or key not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("class is not registered")]
    ClassNotRegistered,

    #[error("native call failed with 0x{code:08X}: {message}")]
    Failed { code: i32, message: String },
}

impl NativeFault {
    /// Build a generic failure from a raw code and message.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        NativeFault::Failed {
            code,
            message: message.into(),
        }
    }
}

impl From<NativeFault> for IndexScopeError {
    fn from(fault: NativeFault) -> Self {
        match fault {
            NativeFault::DuplicateRule => IndexScopeError::Conflict {
                path: String::new(),
            },
            NativeFault::NotFound => IndexScopeError::NotFound {
                what: "native entry".to_string(),
            },
            NativeFault::AccessDenied => IndexScopeError::AccessDenied {
                message: "the indexing subsystem refused the change".to_string(),
            },
            NativeFault::ClassNotRegistered => IndexScopeError::UnknownNative {
                code: CLASS_NOT_REGISTERED,
                message: "search manager class is not registered".to_string(),
            },
            NativeFault::Failed { code, message } => {
                IndexScopeError::UnknownNative { code, message }
            }
        }
    }
}

/// `REGDB_E_CLASSNOTREG` as a signed HRESULT.
const CLASS_NOT_REGISTERED: i32 = 0x8004_0154_u32 as i32;

impl From<std::io::Error> for IndexScopeError {
    fn from(err: std::io::Error) -> Self {
        IndexScopeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for IndexScopeError {
    fn from(err: serde_json::Error) -> Self {
        IndexScopeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl IndexScopeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        IndexScopeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        IndexScopeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Translate a native fault in the context of a rule path.
    ///
    /// Duplicate and not-found faults pick up the path so the message names
    /// the rule the caller asked about.
    pub fn from_native(fault: NativeFault, path: &str) -> Self {
        match fault {
            NativeFault::DuplicateRule => IndexScopeError::Conflict {
                path: path.to_string(),
            },
            NativeFault::NotFound => IndexScopeError::NotFound {
                what: format!("rule for {}", path),
            },
            other => other.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexScopeError::Validation { .. } | IndexScopeError::UnsupportedVersion { .. } => {
                ErrorKind::Validation
            }
            IndexScopeError::Conflict { .. } => ErrorKind::Conflict,
            IndexScopeError::NotFound { .. } => ErrorKind::NotFound,
            IndexScopeError::AccessDenied { .. } | IndexScopeError::InsufficientPrivileges => {
                ErrorKind::AccessDenied
            }
            IndexScopeError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            IndexScopeError::Timeout(_) => ErrorKind::Timeout,
            IndexScopeError::RegistrationUnresolved { .. } => ErrorKind::RegistrationUnresolved,
            IndexScopeError::UnknownNative { .. } => ErrorKind::UnknownNative,
            IndexScopeError::Io { .. } | IndexScopeError::Json { .. } | IndexScopeError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Convert to a process exit code.
    ///
    /// - 1: Unknown/internal error
    /// - 2: Validation error
    /// - 3: Conflict
    /// - 4: Not found
    /// - 5: Access denied / insufficient privileges
    /// - 6: Indexing service unavailable
    /// - 7: Timeout
    /// - 8: Search manager registration unresolved
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::Conflict => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::AccessDenied => 5,
            ErrorKind::ServiceUnavailable => 6,
            ErrorKind::Timeout => 7,
            ErrorKind::RegistrationUnresolved => 8,
            ErrorKind::UnknownNative | ErrorKind::Internal => 1,
        }
    }
}
