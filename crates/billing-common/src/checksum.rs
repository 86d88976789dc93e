//! Checksum utilities for file verification

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256, Sha512};
use std::io::Read;
use std::path::Path;

const READ_BUFFER_SIZE: usize = 8192;

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
            ChecksumAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file, algorithm)
}

/// Compute checksum for any readable source
pub fn compute_checksum<R: Read>(reader: &mut R, algorithm: ChecksumAlgorithm) -> Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader),
        ChecksumAlgorithm::Sha512 => digest_reader::<Sha512, R>(reader),
    }
}

fn digest_reader<D: Digest, R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify that `copy` has the same content as `original`
///
/// Returns the shared checksum on success and [`CommonError::ChecksumMismatch`]
/// naming the copy otherwise.
pub fn verify_copy(
    original: impl AsRef<Path>,
    copy: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
) -> Result<String> {
    let expected = compute_file_checksum(original.as_ref(), algorithm)?;
    let actual = compute_file_checksum(copy.as_ref(), algorithm)?;

    if actual == expected {
        Ok(actual)
    } else {
        Err(CommonError::ChecksumMismatch {
            path: copy.as_ref().display().to_string(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_compute_checksum_sha256() {
        let mut cursor = Cursor::new(b"hello world");
        let checksum = compute_checksum(&mut cursor, ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(checksum, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn test_compute_checksum_sha512() {
        let mut cursor = Cursor::new(b"hello world");
        let checksum = compute_checksum(&mut cursor, ChecksumAlgorithm::Sha512).unwrap();
        assert_eq!(
            checksum,
            "309ecc489c12d6eb4cc40f50c902f2b4d0ed77ee511a7c7a9bcd3ca86d4cd86f989dd35bc5ff499670da34255b45b0cfd830e81f605dcf7dc5542e93ae9cd76f"
        );
    }

    #[test]
    fn test_verify_copy() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.csv");
        let same = dir.path().join("b.csv");
        let different = dir.path().join("c.csv");
        std::fs::write(&original, "2023,1,1,555-0100,10.5,3,4\n").unwrap();
        std::fs::write(&same, "2023,1,1,555-0100,10.5,3,4\n").unwrap();
        std::fs::write(&different, "2023,1,1,555-0100,10.5,3,5\n").unwrap();

        assert!(verify_copy(&original, &same, ChecksumAlgorithm::Sha256).is_ok());
        assert!(matches!(
            verify_copy(&original, &different, ChecksumAlgorithm::Sha256),
            Err(CommonError::ChecksumMismatch { .. })
        ));
    }
}
