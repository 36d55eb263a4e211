//! Integrity checks for the classifier model file.
//!
//! The classifier itself is supplied by the host application; this crate only
//! confirms that the file it is about to load is the one the deployment was
//! configured with.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {name} ({path})")]
    MissingModel { name: String, path: PathBuf },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid sha256 digest '{0}': expected 64 hex characters")]
    InvalidDigest(String),

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: String,
        path: PathBuf,
        expected: ModelDigest,
        got: ModelDigest,
    },
}

/// A SHA-256 digest, parsed from hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDigest([u8; 32]);

impl FromStr for ModelDigest {
    type Err = ModelIntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 64 || !s.is_ascii() {
            return Err(ModelIntegrityError::InvalidDigest(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ModelIntegrityError::InvalidDigest(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ModelDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Stream a file through SHA-256.
pub fn digest_file(path: &Path) -> Result<ModelDigest, ModelIntegrityError> {
    let read_err = |source| ModelIntegrityError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(fs::File::open(path).map_err(read_err)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(read_err)?;
    Ok(ModelDigest(hasher.finalize().into()))
}

/// Check `path` against an expected hex digest (case-insensitive).
pub fn verify_file_sha256(
    name: &str,
    path: &Path,
    expected_sha256: &str,
) -> Result<(), ModelIntegrityError> {
    let expected: ModelDigest = expected_sha256.parse()?;

    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    let got = digest_file(path)?;
    if got != expected {
        return Err(ModelIntegrityError::ChecksumMismatch {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected,
            got,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello")
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "facecheck-models-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_digest_parses_and_displays() {
        let digest: ModelDigest = HELLO_SHA256.parse().unwrap();
        assert_eq!(digest.to_string(), HELLO_SHA256);
        let upper: ModelDigest = HELLO_SHA256.to_uppercase().parse().unwrap();
        assert_eq!(digest, upper);
    }

    #[test]
    fn test_digest_rejects_bad_hex() {
        assert!(matches!(
            "00".parse::<ModelDigest>(),
            Err(ModelIntegrityError::InvalidDigest(_))
        ));
        let not_hex = "zz".repeat(32);
        assert!(matches!(
            not_hex.parse::<ModelDigest>(),
            Err(ModelIntegrityError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_verify_rejects_missing_file() {
        let path = scratch_dir("missing").join("classifier.onnx");
        let err = verify_file_sha256("classifier", &path, HELLO_SHA256).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let dir = scratch_dir("mismatch");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("classifier.onnx");
        fs::write(&path, b"hello, world").unwrap();

        let err = verify_file_sha256("classifier", &path, HELLO_SHA256).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_verify_accepts_match() {
        let dir = scratch_dir("match");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("classifier.onnx");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(digest_file(&path).unwrap().to_string(), HELLO_SHA256);
        verify_file_sha256("classifier", &path, HELLO_SHA256).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }
}
