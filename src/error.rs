//! Error Types
//!
//! Every fallible operation in the translation and dispatch layer returns
//! [`Error`]. Messages are plain English sentences ending in a period so
//! they can be shown directly in a console or status bar.
//!
//! ## Taxonomy
//!
//! | Variant               | Raised by                                        |
//! |-----------------------|--------------------------------------------------|
//! | `InvalidArgument`     | builders given an empty required argument        |
//! | `UnknownSequence`     | table lookup with no matching command            |
//! | `InvalidArity`        | matched command with a bad argument count        |
//! | `NotSupported`        | backend structurally lacking a capability        |
//! | `UnsupportedCommand`  | translator asked for a verb it cannot emit       |
//! | `Tokenize`            | unbalanced quotes or brackets in a command line  |
//! | `Backend`             | native connection failures, prefixed by command  |

use crate::protocol::TokenizeError;
use thiserror::Error;

/// Errors produced by the translation and dispatch layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A required argument was empty or otherwise unusable.
    #[error("Invalid input argument(s).")]
    InvalidArgument,

    /// No command in the backend table matches the input.
    #[error("Unknown sequence: '{0}'.")]
    UnknownSequence(String),

    /// A command matched but its argument count is out of range.
    #[error("Invalid input argument(s) for command: {command}, expected {expected} argument(s) but got {got}.")]
    InvalidArity {
        command: String,
        expected: String,
        got: usize,
    },

    /// The backend has no support for this kind of operation.
    #[error("Not supported {operation} command for {backend}.")]
    NotSupported {
        operation: &'static str,
        backend: &'static str,
    },

    /// The translator cannot build the requested command.
    #[error("Not supported command: {0}.")]
    UnsupportedCommand(String),

    /// The command line could not be split into arguments.
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    /// The native connection reported a failure.
    #[error("{command} function error: {message}.")]
    Backend { command: String, message: String },

    /// A connection type name did not match any backend.
    #[error("Unknown connection type: {0}.")]
    UnknownConnectionType(String),

    /// Connection settings text could not be parsed.
    #[error("Invalid connection settings: {0}.")]
    InvalidSettings(String),
}

impl Error {
    /// Builds a backend error prefixed with the failing command name.
    pub fn backend(command: impl Into<String>, message: impl ToString) -> Self {
        Error::Backend {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Builds the fixed capability error for a backend.
    pub fn not_supported(operation: &'static str, backend: &'static str) -> Self {
        Error::NotSupported { operation, backend }
    }

    /// Returns true for errors caused by the shape of the input rather
    /// than by the backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument
                | Error::UnknownSequence(_)
                | Error::InvalidArity { .. }
                | Error::Tokenize(_)
        )
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_end_with_period() {
        let errors = [
            Error::InvalidArgument,
            Error::UnknownSequence("FOO bar".into()),
            Error::InvalidArity {
                command: "SET".into(),
                expected: "exactly 2".into(),
                got: 1,
            },
            Error::not_supported("change ttl", "LMDB"),
            Error::UnsupportedCommand("SADD".into()),
            Error::backend("GET", "connection closed"),
            Error::UnknownConnectionType("mongo".into()),
        ];

        for err in errors {
            assert!(err.to_string().ends_with('.'), "{}", err);
        }
    }

    #[test]
    fn test_not_supported_message() {
        let err = Error::not_supported("change ttl", "LMDB");
        assert_eq!(err.to_string(), "Not supported change ttl command for LMDB.");
    }

    #[test]
    fn test_backend_prefix() {
        let err = Error::backend("RENAME", "no such key");
        assert_eq!(err.to_string(), "RENAME function error: no such key.");
        assert!(!err.is_input_error());
    }
}
