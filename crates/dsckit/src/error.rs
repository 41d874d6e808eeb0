//! Error types for DSC orchestration.
//!
//! Errors are categorized so callers can pick a process exit code and show
//! actionable advice. Loading and session setup failures are fatal for the
//! run; invocation failures are per package and follow the
//! [`FailurePolicy`](crate::FailurePolicy).

use std::path::PathBuf;
use thiserror::Error;

/// Categories of orchestration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Manifest (or delegated input) file does not exist
    NotFound,
    /// Manifest failed schema or field validation
    InvalidManifest,
    /// The engine session could not be created or opened
    EnvironmentSetup,
    /// The engine reported errors for a package
    Invocation,
    /// Transport, IO and other unexpected errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Manifest not found",
            Self::InvalidManifest => "Invalid manifest",
            Self::EnvironmentSetup => "Engine setup failed",
            Self::Invocation => "Package invocation failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the manifest path",
            Self::InvalidManifest => {
                "Every package needs a non-empty packageIdentifier and version"
            }
            Self::EnvironmentSetup => {
                "Run `dscrun doctor` to check pwsh and the module directory"
            }
            Self::Invocation => "Re-run the manifest once the reported error is fixed",
            Self::Other => "Check the error details for more information",
        }
    }

    /// Process exit code for this category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NotFound => 2,
            Self::InvalidManifest => 3,
            Self::EnvironmentSetup => 4,
            Self::Invocation => 5,
            Self::Other => 1,
        }
    }
}

/// Errors that can occur while loading manifests or driving the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Input file does not exist
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Manifest validation failed
    #[error("invalid manifest: {message}")]
    InvalidManifest {
        /// Description naming the first offending field
        message: String,
    },

    /// Engine context could not be created or opened
    #[error("environment setup failed: {message}")]
    EnvironmentSetupFailed {
        /// What went wrong while starting the engine
        message: String,
    },

    /// Engine reported errors while applying a package
    #[error("invocation failed for {package} {version}:\n{message}")]
    InvocationFailed {
        /// Package identifier
        package: String,
        /// Requested version
        version: String,
        /// Drained error channel text
        message: String,
    },

    /// The session host was already closed
    #[error("session is closed")]
    SessionClosed,

    /// Engine transport or protocol failure
    #[error("engine error: {message}")]
    Engine {
        /// Details of the failure
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::InvalidManifest { .. } => ErrorCategory::InvalidManifest,
            Error::EnvironmentSetupFailed { .. } => ErrorCategory::EnvironmentSetup,
            Error::InvocationFailed { .. } => ErrorCategory::Invocation,
            _ => ErrorCategory::Other,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        self.category().exit_code()
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidManifest {
            message: message.into(),
        }
    }

    pub(crate) fn setup(message: impl Into<String>) -> Self {
        Error::EnvironmentSetupFailed {
            message: message.into(),
        }
    }

    pub(crate) fn engine(message: impl Into<String>) -> Self {
        Error::Engine {
            message: message.into(),
        }
    }
}

/// Result type for DSC orchestration.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            ErrorCategory::NotFound.exit_code(),
            ErrorCategory::InvalidManifest.exit_code(),
            ErrorCategory::EnvironmentSetup.exit_code(),
            ErrorCategory::Invocation.exit_code(),
            ErrorCategory::Other.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_error_category_mapping() {
        assert_eq!(
            Error::NotFound(PathBuf::from("x.json")).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::invalid("packages").category(),
            ErrorCategory::InvalidManifest
        );
        assert_eq!(
            Error::setup("pwsh missing").category(),
            ErrorCategory::EnvironmentSetup
        );
        assert_eq!(Error::SessionClosed.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_invocation_failed_message() {
        let err = Error::InvocationFailed {
            package: "test.test".to_string(),
            version: "1.0".to_string(),
            message: "\tboom\n".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("test.test 1.0"));
        assert!(text.contains("boom"));
        assert_eq!(err.exit_code(), 5);
    }
}
