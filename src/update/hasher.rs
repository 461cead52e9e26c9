use crate::core::OsmfluxError;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Hash function a published digest was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// 128-bit digest, 32 hex characters. What the release pipeline publishes.
    Md5,
    /// 256-bit digest, 64 hex characters.
    Sha256,
}

impl DigestAlgorithm {
    const fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

/// A content digest: algorithm plus lowercase hex string.
///
/// Published digests are bare hex; the algorithm is inferred from the length. An explicit
/// `md5:` or `sha256:` prefix is also accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl ContentDigest {
    /// Parse a digest string as it appears in the update manifest.
    pub fn parse(value: &str) -> Result<Self, OsmfluxError> {
        let value = value.trim().to_lowercase();
        let (prefix, hex) = match value.split_once(':') {
            Some((prefix, hex)) => (Some(prefix.to_string()), hex.to_string()),
            None => (None, value.clone()),
        };

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OsmfluxError::Other {
                message: format!("Invalid digest '{value}': not a hex string"),
            });
        }

        let algorithm = match hex.len() {
            32 => DigestAlgorithm::Md5,
            64 => DigestAlgorithm::Sha256,
            n => {
                return Err(OsmfluxError::Other {
                    message: format!("Invalid digest '{value}': unsupported length {n}"),
                });
            }
        };

        if let Some(prefix) = prefix
            && prefix != algorithm.prefix()
        {
            return Err(OsmfluxError::Other {
                message: format!("Invalid digest '{value}': prefix does not match length"),
            });
        }

        Ok(Self {
            algorithm,
            hex,
        })
    }

    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Computes content digests of command binaries.
///
/// Digests guard against truncated transfers and on-disk corruption; they are not a
/// signature scheme.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest an in-memory buffer.
    #[must_use]
    pub fn digest(algorithm: DigestAlgorithm, bytes: &[u8]) -> ContentDigest {
        let hex = match algorithm {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        };
        debug_assert_eq!(hex.len(), algorithm.hex_len());

        ContentDigest {
            algorithm,
            hex,
        }
    }

    /// Digest a file, reading it in chunks.
    ///
    /// # Errors
    ///
    /// Returns [`OsmfluxError::Io`] when the file cannot be read.
    pub async fn digest_file(
        algorithm: DigestAlgorithm,
        path: &Path,
    ) -> Result<ContentDigest, OsmfluxError> {
        debug!("Computing {:?} digest for: {}", algorithm, path.display());

        let file = fs::File::open(path).await.map_err(|e| OsmfluxError::io("reading", path, &e))?;
        let hex = match algorithm {
            DigestAlgorithm::Md5 => hash_reader::<Md5>(file, path).await?,
            DigestAlgorithm::Sha256 => hash_reader::<Sha256>(file, path).await?,
        };

        Ok(ContentDigest {
            algorithm,
            hex,
        })
    }
}

async fn hash_reader<D: Digest>(mut file: fs::File, path: &Path) -> Result<String, OsmfluxError> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await.map_err(|e| OsmfluxError::io("reading", path, &e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
