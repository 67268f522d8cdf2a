//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding serialized entities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A field line carries no unescaped `:` separator.
    #[error("line {line}: missing value separator")]
    MissingValueSeparator {
        /// 1-based line number.
        line: usize,
    },

    /// A field line appeared outside a `BEGIN` / `END` frame.
    #[error("line {line}: field outside contact frame")]
    FieldOutsideContact {
        /// 1-based line number.
        line: usize,
    },

    /// `BEGIN` appeared while a contact frame was already open.
    #[error("line {line}: nested BEGIN")]
    NestedBegin {
        /// 1-based line number.
        line: usize,
    },

    /// `END` appeared with no open contact frame.
    #[error("line {line}: END without BEGIN")]
    EndWithoutBegin {
        /// 1-based line number.
        line: usize,
    },

    /// Input ended inside an open contact frame.
    #[error("unexpected end of input inside contact frame")]
    UnexpectedEof,

    /// A `BKEY` parameter did not hold a positive integer.
    #[error("line {line}: invalid binary key {value:?}")]
    InvalidBinaryKey {
        /// 1-based line number.
        line: usize,
        /// The offending parameter value.
        value: String,
    },
}
