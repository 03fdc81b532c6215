#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content digests for yama
//!
//! This crate provides the digest type carried by package references, the
//! streaming hashers used while downloading, and the integrity verifier
//! that checks a staged archive against its expected digest.

mod file_hasher;
mod verify;

pub use file_hasher::{tree_digest, FileHashResult, FileHasher, FileHasherConfig};
pub use verify::IntegrityVerifier;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use yama_errors::{ConfigError, Error, StorageError};

/// Size of chunks for streaming hash computation
pub(crate) const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Digest algorithms accepted for package integrity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    /// Digest length in bytes
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Blake3 | Self::Sha256 => 32,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(ConfigError::InvalidValue {
                field: "digest_algorithm".to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }
}

/// Incremental hasher over any supported algorithm
#[derive(Clone)]
pub enum Hasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl Hasher {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(hasher) => {
                hasher.update(data);
            }
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Blake3(_) => HashAlgorithm::Blake3,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    #[must_use]
    pub fn finalize(self) -> Hash {
        match self {
            Self::Blake3(hasher) => Hash {
                algorithm: HashAlgorithm::Blake3,
                bytes: hasher.finalize().as_bytes().to_vec(),
            },
            Self::Sha256(hasher) => Hash {
                algorithm: HashAlgorithm::Sha256,
                bytes: hasher.finalize().to_vec(),
            },
        }
    }
}

/// A digest value tagged with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Hash {
    /// Create a hash from raw digest bytes
    ///
    /// # Errors
    /// Returns an error if the byte length does not match the algorithm.
    pub fn from_bytes(algorithm: HashAlgorithm, bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() != algorithm.digest_len() {
            return Err(StorageError::CorruptedData {
                message: format!(
                    "{algorithm} digest must be {} bytes, got {}",
                    algorithm.digest_len(),
                    bytes.len()
                ),
            }
            .into());
        }
        Ok(Self { algorithm, bytes })
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string (without the algorithm prefix)
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse from a hex string for a known algorithm
    ///
    /// # Errors
    /// Returns an error if the input is not valid hexadecimal of the right length.
    pub fn from_hex(algorithm: HashAlgorithm, s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s.trim()).map_err(|e| StorageError::CorruptedData {
            message: format!("invalid hex: {e}"),
        })?;
        Self::from_bytes(algorithm, bytes)
    }

    /// Parse `algo:hex`, or bare hex using `default_algorithm`
    ///
    /// # Errors
    /// Returns an error on an unknown algorithm prefix or malformed hex.
    pub fn parse(s: &str, default_algorithm: HashAlgorithm) -> Result<Self, Error> {
        match s.split_once(':') {
            Some((algorithm, hex)) => Self::from_hex(algorithm.parse()?, hex),
            None => Self::from_hex(default_algorithm, s),
        }
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// Compute hash of a file without loading it into memory
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;

        let mut hasher = Hasher::new(algorithm);
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s, HashAlgorithm::default()).map_err(serde::de::Error::custom)
    }
}
