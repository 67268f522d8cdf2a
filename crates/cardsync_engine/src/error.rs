//! Error types for the sync engine.

use cardsync_model::ModelError;
use cardsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Socket or cache-file I/O failed; the attempt aborts with no
    /// rollback of whatever was already transmitted.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The server broke the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local entity content failed to parse or serialize.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The timestamps are unusable: both sides unknown, or the local
    /// baseline claims to be newer than the server beyond clock-skew
    /// tolerance. Requires operator intervention.
    #[error("timestamp divergence: baseline {original}, server {server}")]
    TimestampDivergence {
        /// Cached baseline timestamp.
        original: i64,
        /// Server-reported timestamp.
        server: i64,
    },

    /// Both sides changed and the conflict resolver refused to pick a
    /// direction. Never resolved silently.
    #[error("conflicting changes on {resource}: local and remote both modified")]
    UnsupportedConflict {
        /// The contested resource.
        resource: String,
    },

    /// Another writer kept racing us past the retry budget.
    #[error("gave up syncing {resource} after {attempts} racing attempts")]
    RaceExhausted {
        /// The contested resource.
        resource: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl SyncError {
    /// Returns true if retrying the sync could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Io(_) | SyncError::RaceExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::Io(std::io::Error::other("reset")).is_retryable());
        assert!(!SyncError::TimestampDivergence {
            original: 5000,
            server: 1000
        }
        .is_retryable());
        assert!(!SyncError::UnsupportedConflict {
            resource: "addresses".into()
        }
        .is_retryable());
    }
}
