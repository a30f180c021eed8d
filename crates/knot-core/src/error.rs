//! Error types for Knot core operations

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing or decoding core types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed hex input
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Fixed-width value with the wrong number of bytes
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Binary encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl CoreError {
    /// Stable error code for logs
    pub fn code(&self) -> u32 {
        match self {
            CoreError::InvalidHex(_) => 1001,
            CoreError::InvalidLength { .. } => 1002,
            CoreError::Codec(_) => 1003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidLength {
            expected: 32,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Invalid length: expected 32 bytes, got 4");
        assert_eq!(err.code(), 1002);
    }
}
