//! Key-share custody stores, one per trust domain
//!
//! Shares live at `custody/{domain}/{object_id}`. Stores are append-only:
//! a share, once written, is never replaced or deleted.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use zeroize::Zeroizing;

use vaultium_core::config::CustodyConfig;
use vaultium_core::types::TrustDomain;
use vaultium_core::{VaultError, VaultResult};

use crate::operator::{fs_operator, memory_operator};

const CUSTODY_PREFIX: &str = "custody";

/// Independent key-value store holding one share per object
#[async_trait]
pub trait ShareCustody: Send + Sync {
    fn domain(&self) -> TrustDomain;

    async fn put(&self, object_id: &str, share: &str) -> VaultResult<()>;

    async fn get(&self, object_id: &str) -> VaultResult<Option<Zeroizing<String>>>;
}

pub struct OperatorCustody {
    domain: TrustDomain,
    op: Operator,
}

impl OperatorCustody {
    pub fn new(domain: TrustDomain, op: Operator) -> Self {
        Self { domain, op }
    }

    fn key_for(&self, object_id: &str) -> VaultResult<String> {
        if object_id.is_empty() || !object_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(VaultError::Custody(format!("invalid object id '{object_id}'")));
        }
        Ok(format!("{CUSTODY_PREFIX}/{}/{object_id}", self.domain))
    }
}

#[async_trait]
impl ShareCustody for OperatorCustody {
    fn domain(&self) -> TrustDomain {
        self.domain
    }

    async fn put(&self, object_id: &str, share: &str) -> VaultResult<()> {
        let key = self.key_for(object_id)?;
        let present = self
            .op
            .exists(&key)
            .await
            .map_err(|e| VaultError::Custody(format!("{} store checking {object_id}: {e}", self.domain)))?;
        if present {
            return Err(VaultError::Custody(format!(
                "{} store already holds a share for {object_id}",
                self.domain
            )));
        }
        self.op
            .write(&key, share.as_bytes().to_vec())
            .await
            .map_err(|e| VaultError::Custody(format!("{} store write: {e}", self.domain)))?;
        tracing::debug!(domain = %self.domain, %object_id, "share stored");
        Ok(())
    }

    async fn get(&self, object_id: &str) -> VaultResult<Option<Zeroizing<String>>> {
        let key = self.key_for(object_id)?;
        match self.op.read(&key).await {
            Ok(buf) => {
                let raw = Zeroizing::new(buf.to_vec());
                let share = std::str::from_utf8(&raw).map_err(|_| {
                    VaultError::Custody(format!("{} store holds a non-text share", self.domain))
                })?;
                Ok(Some(Zeroizing::new(share.to_string())))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::Custody(format!("{} store read: {e}", self.domain))),
        }
    }
}

/// Device and backup stores on disk, session store in memory.
pub fn custodies_from_config(cfg: &CustodyConfig) -> VaultResult<Vec<Arc<dyn ShareCustody>>> {
    Ok(vec![
        on_disk(TrustDomain::Device, &cfg.device_dir)?,
        Arc::new(OperatorCustody::new(TrustDomain::Session, memory_operator()?)),
        on_disk(TrustDomain::Backup, &cfg.backup_dir)?,
    ])
}

/// All three stores in memory
pub fn memory_custodies() -> VaultResult<Vec<Arc<dyn ShareCustody>>> {
    TrustDomain::ALL
        .into_iter()
        .map(|domain| {
            Ok(Arc::new(OperatorCustody::new(domain, memory_operator()?)) as Arc<dyn ShareCustody>)
        })
        .collect()
}

fn on_disk(domain: TrustDomain, dir: &Path) -> VaultResult<Arc<dyn ShareCustody>> {
    Ok(Arc::new(OperatorCustody::new(domain, fs_operator(dir)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = OperatorCustody::new(TrustDomain::Device, memory_operator().unwrap());
        assert!(store.get("obj1").await.unwrap().is_none());

        store.put("obj1", "01ab").await.unwrap();
        assert_eq!(store.get("obj1").await.unwrap().unwrap().as_str(), "01ab");
    }

    #[tokio::test]
    async fn second_put_rejected() {
        let store = OperatorCustody::new(TrustDomain::Backup, memory_operator().unwrap());
        store.put("obj1", "first").await.unwrap();

        let err = store.put("obj1", "second").await.unwrap_err();
        assert!(matches!(err, VaultError::Custody(_)));
        assert_eq!(store.get("obj1").await.unwrap().unwrap().as_str(), "first");
    }

    #[tokio::test]
    async fn failed_existence_check_blocks_write() {
        // A file where the custody directory belongs makes stat fail
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("custody"), b"not a directory").unwrap();
        let store = OperatorCustody::new(TrustDomain::Device, fs_operator(tmp.path()).unwrap());

        let err = store.put("obj1", "01ab").await.unwrap_err();
        assert!(matches!(err, VaultError::Custody(_)), "got {err:?}");
        assert!(err.to_string().contains("checking obj1"), "got {err}");
        assert_eq!(std::fs::read(tmp.path().join("custody")).unwrap(), b"not a directory");
    }

    #[tokio::test]
    async fn object_ids_cannot_escape_prefix() {
        let store = OperatorCustody::new(TrustDomain::Session, memory_operator().unwrap());
        assert!(store.put("../x", "s").await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[tokio::test]
    async fn config_layout_has_one_store_per_domain() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = CustodyConfig {
            device_dir: tmp.path().join("device"),
            backup_dir: tmp.path().join("backup"),
            threshold: 2,
        };
        let stores = custodies_from_config(&cfg).unwrap();
        let domains: Vec<TrustDomain> = stores.iter().map(|s| s.domain()).collect();
        assert_eq!(domains, TrustDomain::ALL.to_vec());

        stores[0].put("obj", "device-share").await.unwrap();
        assert!(stores[2].get("obj").await.unwrap().is_none());
        assert!(tmp.path().join("device/custody/device/obj").exists());
    }
}
