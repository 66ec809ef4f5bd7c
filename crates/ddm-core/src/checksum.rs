//! Streaming checksum compute & compare, run after all segments complete.
//!
//! Hashing is not on the hot path: it runs once over the finished file, in
//! 1 MiB blocks, so memory use stays bounded regardless of file size.

use anyhow::{Context, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BLOCK_SIZE: usize = 1024 * 1024;

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgo {
    Md5,
    Sha256,
}

impl ChecksumAlgo {
    /// Parses an algorithm name case-insensitively (`md5`, `sha256`).
    pub fn parse(name: &str) -> Result<Self, UnknownAlgo> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(UnknownAlgo(other.to_string())),
        }
    }
}

impl fmt::Display for ChecksumAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Returned when a checksum algorithm name is not recognized.
#[derive(Debug)]
pub struct UnknownAlgo(String);

impl fmt::Display for UnknownAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown checksum algorithm: {}", self.0)
    }
}

impl std::error::Error for UnknownAlgo {}

/// Computes the digest of a file under `algo`, streamed in 1 MiB blocks.
/// Returns lowercase hex.
pub fn compute(path: &Path, algo: ChecksumAlgo) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    let digest = match algo {
        ChecksumAlgo::Md5 => {
            let mut hasher = Md5::new();
            loop {
                let n = f.read(&mut buf).with_context(|| format!("read {}", path.display()))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hex::encode(hasher.finalize())
        }
        ChecksumAlgo::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = f.read(&mut buf).with_context(|| format!("read {}", path.display()))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hex::encode(hasher.finalize())
        }
    };
    Ok(digest)
}

/// Computes and prints the digest for the CLI's `checksum` command, defaulting
/// to SHA-256 when no hex-string form of `path` resolves to a file.
pub fn sha256_path(path: &Path) -> Result<String> {
    compute(path, ChecksumAlgo::Sha256)
}

/// Compares a file's digest (case-insensitively) against an expected hex value.
pub fn validate(path: &Path, expected: &str, algo: ChecksumAlgo) -> Result<bool> {
    let actual = compute(path, algo)?;
    Ok(actual.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let path = f.path();
        let digest = sha256_path(path).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let path = f.path();
        let digest = sha256_path(path).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn md5_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = compute(f.path(), ChecksumAlgo::Md5).unwrap();
        assert_eq!(digest, "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn validate_matches_case_insensitively() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert!(validate(f.path(), "B1946AC92492D2347C6235B4D2611184", ChecksumAlgo::Md5).unwrap());
        assert!(!validate(f.path(), "deadbeef", ChecksumAlgo::Md5).unwrap());
    }

    #[test]
    fn parse_rejects_unknown_algo() {
        assert!(ChecksumAlgo::parse("crc32").is_err());
        assert!(ChecksumAlgo::parse("SHA256").is_ok());
    }
}
