//! Error types for the protocol crate.

use std::io;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while framing or parsing protocol traffic.
///
/// Every variant except [`ProtocolError::Io`] is a protocol violation:
/// connection-fatal for the session that produced it, harmless for the
/// process serving it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended before a block terminator.
    #[error("unexpected end of stream inside block")]
    UnexpectedEof,

    /// A command line carried an unknown verb.
    #[error("unknown verb: {verb}")]
    UnknownVerb {
        /// The verb as received.
        verb: String,
    },

    /// A command was missing its required parameter.
    #[error("{verb} requires a parameter")]
    MissingParameter {
        /// The verb as received.
        verb: String,
    },

    /// A command block was empty where a command line was expected.
    #[error("empty command block")]
    EmptyCommand,

    /// A timestamp string was not a decimal epoch-millisecond value.
    #[error("malformed timestamp: {text:?}")]
    BadTimestamp {
        /// The offending text.
        text: String,
    },

    /// The peer broke the handshake or command sequencing.
    #[error("protocol violation: {message}")]
    Violation {
        /// What was expected and what arrived.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a sequencing-violation error.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Violation {
            message: message.into(),
        }
    }
}
