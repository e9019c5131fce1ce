//! SHA-256 content hashing for deduplication
//!
//! Files are read fully into memory and hashed as a whole, so two
//! byte-identical files always produce the same digest.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Digest of a file's full content
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash an in-memory buffer
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the content hash of a file
pub fn compute_file_hash(path: &Path) -> Result<ContentHash> {
    let mut file = File::open(path).map_err(|e| Error::HashComputation {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .map_err(|e| Error::HashComputation {
            path: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;

    let hash = ContentHash::of_bytes(&buffer);
    trace!(?path, %hash, "Computed file hash");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_compute_file_hash() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let hash = compute_file_hash(file.path()).unwrap();

        // Same content should produce same hash
        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"test content").unwrap();
        file2.flush().unwrap();

        let hash2 = compute_file_hash(file2.path()).unwrap();
        assert_eq!(hash, hash2);
        assert_eq!(hash, ContentHash::of_bytes(b"test content"));
    }

    #[test]
    fn test_different_content_different_hash() {
        let mut file1 = NamedTempFile::new().unwrap();
        file1.write_all(b"content 1").unwrap();
        file1.flush().unwrap();

        let mut file2 = NamedTempFile::new().unwrap();
        file2.write_all(b"content 2").unwrap();
        file2.flush().unwrap();

        let hash1 = compute_file_hash(file1.path()).unwrap();
        let hash2 = compute_file_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_empty_input_digest() {
        assert_eq!(
            ContentHash::of_bytes(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_missing_file_is_hash_error() {
        let err = compute_file_hash(Path::new("/no/such/file.jpg")).unwrap_err();
        assert!(matches!(err, Error::HashComputation { .. }));
    }
}
