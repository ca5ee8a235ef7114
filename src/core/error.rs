//! Error types and result handling for whouses.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for whouses operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to resolve path: {path}")]
    PathResolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Process Errors =====
    #[error("Failed to enumerate processes: {0}")]
    ProcessEnumeration(String),

    #[error("Cannot access process {pid}: {reason}")]
    ProcessAccess { pid: u32, reason: String },

    #[error("Failed to terminate process {pid}: {reason}")]
    ProcessTermination { pid: u32, reason: String },

    // ===== Lock Registry Errors =====
    #[error("Lock registry session could not be opened (code {code})")]
    LockSession { code: u32 },

    #[error("Lock registry rejected {count} resource(s) (code {code})")]
    LockRegistration { count: usize, code: u32 },

    #[error("Lock registry query failed: {reason}")]
    LockQuery { reason: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a process access error.
    pub fn process_access(pid: u32, reason: impl Into<String>) -> Self {
        Self::ProcessAccess {
            pid,
            reason: reason.into(),
        }
    }

    /// Create a lock query error.
    pub fn lock_query(reason: impl Into<String>) -> Self {
        Self::LockQuery {
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable (the scan skips the item and continues).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProcessAccess { .. }
                | Error::LockSession { .. }
                | Error::LockRegistration { .. }
                | Error::NotSupported(_)
        )
    }

    /// Check if this error is an unexpected lock protocol fault.
    ///
    /// Session and registration failures are ordinary "no findings" outcomes;
    /// only faults past that point are worth surfacing in the log.
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, Error::LockQuery { .. })
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ProcessAccess { .. } | Error::ProcessTermination { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::PathNotFound(_) | Error::PathResolve { .. } => {
                Some("Check that the path exists and is accessible")
            }
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or reset it with `whouses config reset`")
            }
            Error::LockSession { .. } => {
                Some("Too many lock registry sessions may be open; retry shortly")
            }
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PathNotFound(_)
            | Error::PathResolve { .. }
            | Error::Io(_) => ErrorCategory::Io,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::ProcessEnumeration(_)
            | Error::ProcessAccess { .. }
            | Error::ProcessTermination { .. } => ErrorCategory::Process,

            Error::LockSession { .. } | Error::LockRegistration { .. } | Error::LockQuery { .. } => {
                ErrorCategory::LockRegistry
            }

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::NotSupported(_) | Error::Internal(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Process,
    LockRegistry,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Process => write!(f, "Process"),
            Self::LockRegistry => write!(f, "Lock Registry"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}
