//! Error types for erasure coding operations

use thiserror::Error;

/// Errors that can occur while building codes or running encode/decode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodingError {
    /// Invalid k/m/w combination or otherwise malformed arguments
    #[error("Bad parameters: {0}")]
    BadParameters(String),

    /// A size that must be a multiple of some word size is not
    #[error("{what} of {size} bytes is not a multiple of {multiple}")]
    Alignment {
        what: &'static str,
        size: usize,
        multiple: usize,
    },

    /// Matrix could not be inverted
    #[error("Matrix of {size} rows is singular")]
    SingularMatrix { size: usize },

    /// More units erased than the code can tolerate
    #[error("Cannot decode: {erased} units erased but the code tolerates at most {max}")]
    TooManyErasures { erased: usize, max: usize },

    /// Requested operation is not available for this configuration
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The field backend only covers GF(2^1) through GF(2^32)
    #[error("No Galois field available for w={0}")]
    UnsupportedWordSize(u32),

    /// Unit buffers that must share a size do not
    #[error("Buffer length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Type alias for Result with CodingError
pub type Result<T> = std::result::Result<T, CodingError>;
