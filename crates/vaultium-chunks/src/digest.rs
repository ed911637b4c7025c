//! SHA-256 content digests
//!
//! The digest of an object's plaintext is recorded in its manifest, checked
//! after decryption, and used as the private witness for ownership proofs.
//! Accepts in-memory buffers or any `AsyncRead` source (read once, in blocks).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

use vaultium_core::{VaultError, VaultResult};

/// Size of a content digest in bytes
pub const DIGEST_SIZE: usize = 32;

const READ_BUF_SIZE: usize = 64 * 1024;

/// A SHA-256 digest, displayed as 64 lowercase hex chars
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char hex string (either case)
    pub fn from_hex(s: &str) -> VaultResult<Self> {
        let raw = hex::decode(s).map_err(|e| VaultError::InvalidDigest(format!("'{s}': {e}")))?;
        let bytes: [u8; DIGEST_SIZE] = raw.try_into().map_err(|v: Vec<u8>| {
            VaultError::InvalidDigest(format!(
                "expected {DIGEST_SIZE} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// Hash a streamed source to completion.
///
/// Fails with `InputRead` if the source errors before EOF.
pub async fn hash_reader<R>(mut reader: R) -> VaultResult<ContentDigest>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(VaultError::InputRead)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ContentDigest(hasher.finalize().into()))
}

/// Hash a file from disk using the streaming interface.
pub async fn hash_file(path: &Path) -> VaultResult<ContentDigest> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(VaultError::InputRead)?;
    hash_reader(file).await
}
