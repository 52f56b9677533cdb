use std::fmt;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::error::{LibraryError, LibraryResult};

const READ_CHUNK: usize = 64 * 1024;

/// Hash algorithms accepted for artifact verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    #[default]
    Sha512,
}

impl DigestAlgorithm {
    /// Canonical name, e.g. `SHA-512`.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Extension of the checksum file a Maven repository publishes next to an artifact.
    pub fn sidecar_extension(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn hasher(&self) -> DigestHasher {
        match self {
            DigestAlgorithm::Md5 => DigestHasher::Md5(Md5::new()),
            DigestAlgorithm::Sha1 => DigestHasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => DigestHasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => DigestHasher::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => DigestHasher::Sha512(Sha512::new()),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = LibraryError;

    /// Accepts `SHA-512`, `sha512`, `Sha_512` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(LibraryError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Incremental hasher, fed chunk by chunk while a transfer is running.
pub enum DigestHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestHasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            DigestHasher::Md5(h) => h.update(bytes),
            DigestHasher::Sha1(h) => h.update(bytes),
            DigestHasher::Sha256(h) => h.update(bytes),
            DigestHasher::Sha384(h) => h.update(bytes),
            DigestHasher::Sha512(h) => h.update(bytes),
        }
    }

    pub fn finalize(self) -> DigestResult {
        let (algorithm, hex) = match self {
            DigestHasher::Md5(h) => (DigestAlgorithm::Md5, hex::encode(h.finalize())),
            DigestHasher::Sha1(h) => (DigestAlgorithm::Sha1, hex::encode(h.finalize())),
            DigestHasher::Sha256(h) => (DigestAlgorithm::Sha256, hex::encode(h.finalize())),
            DigestHasher::Sha384(h) => (DigestAlgorithm::Sha384, hex::encode(h.finalize())),
            DigestHasher::Sha512(h) => (DigestAlgorithm::Sha512, hex::encode(h.finalize())),
        };
        DigestResult { algorithm, hex }
    }
}

/// Lowercase hex digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResult {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl DigestResult {
    pub fn matches(&self, expected: &str) -> bool {
        verify(&self.hex, expected)
    }

    /// Compare against `expected`, producing the integrity error for `target` on mismatch.
    pub fn check(&self, target: &str, expected: &str) -> LibraryResult<()> {
        if self.matches(expected) {
            return Ok(());
        }
        Err(LibraryError::Integrity {
            target: target.to_string(),
            algorithm: self.algorithm.name().to_string(),
            expected: expected.trim().to_ascii_lowercase(),
            actual: self.hex.clone(),
        })
    }
}

impl fmt::Display for DigestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Case-insensitive digest comparison. Surrounding whitespace is ignored.
pub fn verify(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

pub fn digest_bytes(bytes: &[u8], algorithm: DigestAlgorithm) -> DigestResult {
    let mut hasher = algorithm.hasher();
    hasher.update(bytes);
    hasher.finalize()
}

/// Hash everything `reader` yields without buffering the whole payload.
pub async fn compute_digest<R>(mut reader: R, algorithm: DigestAlgorithm) -> std::io::Result<DigestResult>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}

pub async fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> LibraryResult<DigestResult> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(LibraryError::io(path))?;
    compute_digest(file, algorithm)
        .await
        .map_err(LibraryError::io(path))
}
