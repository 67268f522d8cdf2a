//! Error types for the server crate.

use cardsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the card server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error on a socket or the store directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer violated the wire protocol; fatal for its connection.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A resource name is empty or would escape the data directory.
    #[error("invalid resource name: {name:?}")]
    InvalidResource {
        /// The offending name.
        name: String,
    },

    /// A requested resource does not exist in the store.
    #[error("no such resource: {name}")]
    ResourceMissing {
        /// The requested name.
        name: String,
    },

    /// Stored or received content failed to parse.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ServerError {
    /// Returns true when the error should close the offending
    /// connection but leave the server running.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Protocol(_)
                | ServerError::Io(_)
                | ServerError::InvalidResource { .. }
                | ServerError::ResourceMissing { .. }
                | ServerError::Codec(_)
        )
    }
}

impl From<cardsync_model::ModelError> for ServerError {
    fn from(err: cardsync_model::ModelError) -> Self {
        ServerError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_fatal_classification() {
        let err = ServerError::InvalidResource {
            name: "../etc".into(),
        };
        assert!(err.is_connection_fatal());

        let err = ServerError::Protocol(ProtocolError::UnexpectedEof);
        assert!(err.is_connection_fatal());
    }
}
