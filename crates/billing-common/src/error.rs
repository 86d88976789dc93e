//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(error: &CommonError) -> &'static str {
        match error {
            CommonError::Io(_) => "io",
            CommonError::ChecksumMismatch { .. } => "checksum",
        }
    }

    #[test]
    fn test_every_variant_is_raised_by_shared_utilities() {
        let io: CommonError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(kind(&io), "io");
        assert_eq!(io.to_string(), "IO error: gone");

        let mismatch = CommonError::ChecksumMismatch {
            path: "staging/billing-2023-01.csv".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(kind(&mismatch), "checksum");
        assert_eq!(
            mismatch.to_string(),
            "Checksum mismatch for 'staging/billing-2023-01.csv': expected aa, got bb"
        );
    }
}
