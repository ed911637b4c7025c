//! Content-addressed object store
//!
//! `put` returns the BLAKE3 hex of the bytes and stores them unchanged at
//! `objects/{address}`. Identical content maps to the same key, so an
//! existing object is not rewritten.

use bytes::Bytes;
use opendal::{ErrorKind, Operator};

use vaultium_core::{VaultError, VaultResult};

const OBJECT_PREFIX: &str = "objects";

/// Content address of `data` (BLAKE3, lowercase hex)
pub fn address_of(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

fn validate_address(address: &str) -> VaultResult<()> {
    let well_formed = address.len() == 64
        && address
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err(VaultError::InvalidDigest(format!(
            "'{address}' is not a content address"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ObjectStore {
    op: Operator,
}

impl ObjectStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Storage key for an address
    pub fn key_for(address: &str) -> String {
        format!("{OBJECT_PREFIX}/{address}")
    }

    pub async fn put(&self, data: Bytes) -> VaultResult<String> {
        let address = address_of(&data);
        let key = Self::key_for(&address);

        let present = self
            .op
            .exists(&key)
            .await
            .map_err(|e| VaultError::Storage(format!("checking {key}: {e}")))?;
        if present {
            tracing::debug!(%address, "object already stored");
            return Ok(address);
        }

        let size = data.len();
        self.op
            .write(&key, data)
            .await
            .map_err(|e| VaultError::Storage(format!("writing {key}: {e}")))?;
        tracing::debug!(%address, size, "object stored");

        Ok(address)
    }

    pub async fn get(&self, address: &str) -> VaultResult<Bytes> {
        validate_address(address)?;
        let key = Self::key_for(address);

        match self.op.read(&key).await {
            Ok(buf) => Ok(buf.to_bytes()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VaultError::Storage(format!("object {address} not found")))
            }
            Err(e) => Err(VaultError::Storage(format!("reading {key}: {e}"))),
        }
    }

    pub async fn exists(&self, address: &str) -> VaultResult<bool> {
        validate_address(address)?;
        self.op
            .exists(&Self::key_for(address))
            .await
            .map_err(|e| VaultError::Storage(format!("stat {address}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::memory_operator;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = ObjectStore::new(memory_operator().unwrap());
        let data = Bytes::from_static(b"opaque ciphertext bytes");

        let address = store.put(data.clone()).await.unwrap();
        assert_eq!(address, address_of(&data));
        assert!(store.exists(&address).await.unwrap());
        assert_eq!(store.get(&address).await.unwrap(), data);
    }

    #[tokio::test]
    async fn identical_content_same_address() {
        let store = ObjectStore::new(memory_operator().unwrap());
        let a = store.put(Bytes::from_static(b"same")).await.unwrap();
        let b = store.put(Bytes::from_static(b"same")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn failed_existence_check_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(OBJECT_PREFIX), b"blocker").unwrap();
        let store = ObjectStore::new(crate::operator::fs_operator(tmp.path()).unwrap());

        let err = store.put(Bytes::from_static(b"data")).await.unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
        assert!(err.to_string().contains("checking objects/"), "got {err}");
    }

    #[tokio::test]
    async fn missing_object_is_storage_error() {
        let store = ObjectStore::new(memory_operator().unwrap());
        let err = store.get(&address_of(b"never stored")).await.unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_address_rejected() {
        let store = ObjectStore::new(memory_operator().unwrap());
        let non_hex = "g".repeat(64);
        for bad in ["", "../etc/passwd", "ABCDEF", non_hex.as_str()] {
            assert!(matches!(
                store.get(bad).await,
                Err(VaultError::InvalidDigest(_))
            ));
        }
    }
}
