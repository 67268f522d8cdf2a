//! Error types for the model crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in the entity model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O error while reading or writing a bound resource.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The codec rejected the serialized content.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the parse failure.
        message: String,
    },

    /// The card has no file binding to save to or reload from.
    #[error("card is not bound to a file")]
    NotBound,

    /// The save target does not match the card's binding.
    #[error("save target {target:?} does not match bound file {bound:?}")]
    BindingMismatch {
        /// The file the card is bound to.
        bound: PathBuf,
        /// The file the save was directed at.
        target: PathBuf,
    },
}

impl ModelError {
    /// Creates a codec error from any message.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}
