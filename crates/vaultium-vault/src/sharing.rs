//! Sharing an object's key with another party
//!
//! The key is rebuilt from custody, sealed to the recipient's age public key
//! and appended to a registry at `shared/{recipient}/{address}.json`. The
//! recipient opens the envelope with their identity and retrieves the object
//! through the normal download and verify path.

use chrono::{DateTime, Utc};
use opendal::{EntryMode, ErrorKind, Operator};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use vaultium_core::{VaultError, VaultResult};
use vaultium_crypto::{open_key, parse_recipient, seal_key};

use crate::engine::{ProgressFn, RetrievedObject, Vault};

const SHARED_PREFIX: &str = "shared";

/// What the recipient is told about the object before fetching it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedRecord {
    /// Manifest address of the shared object
    pub address: String,
    /// Owner identity of the sharer
    pub from: String,
    /// Recipient's age public key
    pub to: String,
    pub descriptor: SharedDescriptor,
    /// Armored age envelope holding the object key
    pub envelope: String,
    pub shared_at: DateTime<Utc>,
}

fn validate_segment(what: &str, value: &str) -> VaultResult<()> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(VaultError::InvalidKey(format!("invalid {what} '{value}'")));
    }
    Ok(())
}

/// Append-only registry of [`SharedRecord`]s, keyed by recipient
#[derive(Clone)]
pub struct SharingRegistry {
    op: Operator,
}

impl SharingRegistry {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    fn key_for(recipient: &str, address: &str) -> VaultResult<String> {
        validate_segment("recipient", recipient)?;
        validate_segment("address", address)?;
        Ok(format!("{SHARED_PREFIX}/{recipient}/{address}.json"))
    }

    pub async fn get(&self, recipient: &str, address: &str) -> VaultResult<Option<SharedRecord>> {
        let key = Self::key_for(recipient, address)?;
        match self.op.read(&key).await {
            Ok(buf) => serde_json::from_slice(&buf.to_bytes())
                .map(Some)
                .map_err(|e| VaultError::Storage(format!("parsing {key}: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::Storage(format!("reading {key}: {e}"))),
        }
    }

    /// Write `record` unless one already exists. Returns whether it was written.
    pub async fn put(&self, record: &SharedRecord) -> VaultResult<bool> {
        let key = Self::key_for(&record.to, &record.address)?;
        let present = self
            .op
            .exists(&key)
            .await
            .map_err(|e| VaultError::Storage(format!("checking {key}: {e}")))?;
        if present {
            return Ok(false);
        }
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| VaultError::Storage(format!("serializing shared record: {e}")))?;
        self.op
            .write(&key, body)
            .await
            .map_err(|e| VaultError::Storage(format!("writing {key}: {e}")))?;
        Ok(true)
    }

    /// Records addressed to `recipient`, oldest first
    pub async fn list(&self, recipient: &str) -> VaultResult<Vec<SharedRecord>> {
        validate_segment("recipient", recipient)?;
        let dir = format!("{SHARED_PREFIX}/{recipient}/");

        let entries = match self.op.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::Storage(format!("listing {dir}: {e}"))),
        };

        let mut records = Vec::new();
        for entry in entries {
            if entry.metadata().mode() != EntryMode::FILE || !entry.path().ends_with(".json") {
                continue;
            }
            let body = self
                .op
                .read(entry.path())
                .await
                .map_err(|e| VaultError::Storage(format!("reading {}: {e}", entry.path())))?;
            match serde_json::from_slice::<SharedRecord>(&body.to_bytes()) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = entry.path(), "skipping unreadable shared record: {e}"),
            }
        }

        records.sort_by(|a, b| a.shared_at.cmp(&b.shared_at).then_with(|| a.address.cmp(&b.address)));
        Ok(records)
    }
}

impl Vault {
    /// Give `recipient` (an `age1...` public key) access to the object at `address`.
    ///
    /// Sharing the same object with the same recipient again returns the
    /// existing record.
    pub async fn share_object(&self, address: &str, recipient: &str) -> VaultResult<SharedRecord> {
        let recipient = recipient.trim();
        parse_recipient(recipient)?;

        if let Some(existing) = self.sharing.get(recipient, address).await? {
            tracing::info!(%address, %recipient, "already shared");
            return Ok(existing);
        }

        let manifest = self.fetch_manifest(address).await?;
        let key = self.recover_key(address).await?;
        let envelope = seal_key(&key, recipient)?;
        drop(key);

        let record = SharedRecord {
            address: address.to_string(),
            from: self.ledger.owner().to_string(),
            to: recipient.to_string(),
            descriptor: SharedDescriptor {
                name: manifest.name,
                size: manifest.size,
                mime_type: manifest.mime_type,
            },
            envelope,
            shared_at: Utc::now(),
        };

        if !self.sharing.put(&record).await? {
            // Lost a race with a concurrent share; keep the first record
            if let Some(existing) = self.sharing.get(recipient, address).await? {
                return Ok(existing);
            }
        }

        tracing::info!(%address, %recipient, "object shared");
        Ok(record)
    }

    pub async fn shared_with(&self, recipient: &str) -> VaultResult<Vec<SharedRecord>> {
        self.sharing.list(recipient.trim()).await
    }

    /// Open `record`'s envelope with `identity` and fetch the object.
    ///
    /// A wrong identity fails with `Custody`; tampered content fails as it
    /// would for the owner.
    pub async fn retrieve_shared(
        &self,
        record: &SharedRecord,
        identity: &SecretString,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<RetrievedObject> {
        let key = open_key(&record.envelope, identity)?;
        let manifest = self.fetch_manifest(&record.address).await?;
        self.open_object(&record.address, manifest, key, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultium_storage::memory_operator;

    fn record(to: &str, address: &str, name: &str) -> SharedRecord {
        SharedRecord {
            address: address.into(),
            from: "alice".into(),
            to: to.into(),
            descriptor: SharedDescriptor {
                name: name.into(),
                size: 3,
                mime_type: "text/plain".into(),
            },
            envelope: "-----BEGIN AGE ENCRYPTED FILE-----".into(),
            shared_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_record_wins() {
        let registry = SharingRegistry::new(memory_operator().unwrap());
        assert!(registry.put(&record("age1bob", "abc123", "first")).await.unwrap());
        assert!(!registry.put(&record("age1bob", "abc123", "second")).await.unwrap());

        let stored = registry.get("age1bob", "abc123").await.unwrap().unwrap();
        assert_eq!(stored.descriptor.name, "first");
    }

    #[tokio::test]
    async fn failed_existence_check_is_an_error_not_a_write() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("shared"), b"blocker").unwrap();
        let registry = SharingRegistry::new(vaultium_storage::fs_operator(tmp.path()).unwrap());

        let err = registry.put(&record("age1bob", "abc123", "first")).await.unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)), "got {err:?}");
        assert!(err.to_string().contains("checking shared/age1bob/abc123.json"), "got {err}");
    }

    #[tokio::test]
    async fn list_is_per_recipient() {
        let registry = SharingRegistry::new(memory_operator().unwrap());
        registry.put(&record("age1bob", "aaa", "a")).await.unwrap();
        registry.put(&record("age1bob", "bbb", "b")).await.unwrap();
        registry.put(&record("age1carol", "ccc", "c")).await.unwrap();

        let names: Vec<_> = registry
            .list("age1bob")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.descriptor.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a".to_string()) && names.contains(&"b".to_string()));
        assert!(registry.list("age1nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_segments_are_checked() {
        let registry = SharingRegistry::new(memory_operator().unwrap());
        assert!(registry.get("../etc", "abc").await.is_err());
        assert!(registry.get("age1bob", "a/b").await.is_err());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(record("age1bob", "abc", "n")).unwrap();
        assert!(json.get("sharedAt").is_some());
        assert_eq!(json["descriptor"]["mimeType"], "text/plain");
    }
}
