//! # Error Handling
//!
//! Error types shared by the token codec and the encrypted room index.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Input Errors                                                      │
//! │  │   ├── InvalidIdentifier     - Empty user or room identifier         │
//! │  │   └── InvalidKey            - Empty token signing key               │
//! │  │                                                                      │
//! │  ├── Token Errors                                                      │
//! │  │   └── SerializationError    - Payload cannot be rendered as JSON    │
//! │  │                                                                      │
//! │  ├── Store Errors                                                      │
//! │  │   └── StoreUnavailable      - Backing store unreachable or failed   │
//! │  │                                                                      │
//! │  └── Configuration Errors                                              │
//! │      └── Configuration         - No usable room index strategy         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Token verification failures are not errors: `verify_token` returns
//! `None` for every kind of bad token so callers learn nothing about which
//! check rejected it.

use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Input Errors (100-199)
    // ========================================================================

    /// A user or room identifier was empty
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The token signing key was empty or unreadable
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    // ========================================================================
    // Token Errors (200-299)
    // ========================================================================

    /// Payload could not be serialized to JSON
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ========================================================================
    // Store Errors (300-399)
    // ========================================================================

    /// The backing store could not be reached or returned an error
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // ========================================================================
    // Configuration Errors (400-499)
    // ========================================================================

    /// The requested configuration cannot be satisfied
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Numeric error code, grouped by category
    ///
    /// - 100-199: Input
    /// - 200-299: Token
    /// - 300-399: Store
    /// - 400-499: Configuration
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidIdentifier(_) => 100,
            Error::InvalidKey(_) => 101,
            Error::SerializationError(_) => 200,
            Error::StoreUnavailable(_) => 300,
            Error::Configuration(_) => 400,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only store failures may go away on retry; the caller owns the retry
    /// policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidIdentifier("".into()).code(), 100);
        assert_eq!(Error::SerializationError("x".into()).code(), 200);
        assert_eq!(Error::StoreUnavailable("down".into()).code(), 300);
        assert_eq!(Error::Configuration("x".into()).code(), 400);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::StoreUnavailable("timeout".into()).is_recoverable());
        assert!(!Error::SerializationError("bad".into()).is_recoverable());
        assert!(!Error::Configuration("none".into()).is_recoverable());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::SerializationError(_)));
    }
}
