//! Streaming file digests
//!
//! The snapshot versioner records the size and SHA-256 of the tracked flat
//! file alongside the pointer produced by the version-control tool, so a
//! pointer can always be cross-checked against the bytes it refers to.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Size and content hash of a tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Hex-encoded SHA-256 of the file contents
    pub sha256: String,
    /// File size in bytes
    pub size: u64,
}

impl std::fmt::Display for FileDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{} ({} bytes)", self.sha256, self.size)
    }
}

/// Compute the digest of a file on disk
pub fn digest_file(path: impl AsRef<Path>) -> Result<FileDigest> {
    let mut file = std::fs::File::open(path)?;
    digest_reader(&mut file)
}

/// Compute the digest of any readable source
pub fn digest_reader<R: Read>(reader: &mut R) -> Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        size += bytes_read as u64;
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(FileDigest {
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_digest_reader_known_value() {
        let mut cursor = Cursor::new(b"hello world");
        let digest = digest_reader(&mut cursor).unwrap();
        assert_eq!(
            digest.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digest.size, 11);
    }

    #[test]
    fn test_digest_empty_input() {
        let mut cursor = Cursor::new(b"");
        let digest = digest_reader(&mut cursor).unwrap();
        assert_eq!(
            digest.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest.size, 0);
    }

    #[test]
    fn test_digest_file_matches_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "date,title\n2024-05-01,T\n").unwrap();

        let from_file = digest_file(&path).unwrap();
        let mut cursor = Cursor::new(b"date,title\n2024-05-01,T\n");
        let from_reader = digest_reader(&mut cursor).unwrap();
        assert_eq!(from_file, from_reader);
    }
}
