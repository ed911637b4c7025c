//! Append-only object ledger
//!
//! Each record is its own JSON document at `ledger/{owner}/{sequence:020}.json`;
//! nothing is ever overwritten or deleted. Sequence numbers start at 0 and
//! give the append order, which listing follows exactly. The transaction hash
//! is the BLAKE3 of the record bytes.

use async_trait::async_trait;
use chrono::Utc;
use opendal::{EntryMode, ErrorKind, Operator};
use tokio::sync::Mutex;

use vaultium_core::types::{ObjectRecord, TransactionReceipt};
use vaultium_core::{VaultError, VaultResult};

const LEDGER_PREFIX: &str = "ledger";

/// Authoritative record of which objects an owner has stored
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Identity under which `record_object` appends
    fn owner(&self) -> &str;

    async fn record_object(
        &self,
        address: &str,
        name: &str,
        size: u64,
        mime_type: &str,
    ) -> VaultResult<TransactionReceipt>;

    /// Records for `owner`, oldest first
    async fn list_objects(&self, owner: &str) -> VaultResult<Vec<ObjectRecord>>;
}

/// [`Ledger`] persisted through an OpenDAL operator
pub struct OperatorLedger {
    op: Operator,
    owner: String,
    /// Next free sequence number, loaded from the backend on first append
    next_sequence: Mutex<Option<u64>>,
}

fn validate_owner(owner: &str) -> VaultResult<()> {
    if owner.is_empty() || owner.contains(['/', '\\']) || owner == "." || owner == ".." {
        return Err(VaultError::Ledger(format!("invalid owner identity '{owner}'")));
    }
    Ok(())
}

impl OperatorLedger {
    pub fn new(op: Operator, owner: impl Into<String>) -> VaultResult<Self> {
        let owner = owner.into();
        validate_owner(&owner)?;
        Ok(Self {
            op,
            owner,
            next_sequence: Mutex::new(None),
        })
    }

    fn record_key(owner: &str, sequence: u64) -> String {
        format!("{LEDGER_PREFIX}/{owner}/{sequence:020}.json")
    }

    /// Record files under `dir`, in sequence order
    async fn record_paths(&self, dir: &str) -> VaultResult<Vec<String>> {
        let entries = match self.op.list(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::Ledger(format!("listing {dir}: {e}"))),
        };
        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().mode() == EntryMode::FILE && entry.path().ends_with(".json"))
            .map(|entry| entry.path().to_string())
            .collect();
        // Zero-padded sequence numbers sort lexically
        paths.sort();
        Ok(paths)
    }

    async fn first_free_sequence(&self) -> VaultResult<u64> {
        let dir = format!("{LEDGER_PREFIX}/{}/", self.owner);
        let last = self
            .record_paths(&dir)
            .await?
            .iter()
            .filter_map(|path| parse_sequence(path))
            .max();
        Ok(last.map_or(0, |seq| seq + 1))
    }
}

fn parse_sequence(path: &str) -> Option<u64> {
    path.rsplit('/').next()?.strip_suffix(".json")?.parse().ok()
}

#[async_trait]
impl Ledger for OperatorLedger {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn record_object(
        &self,
        address: &str,
        name: &str,
        size: u64,
        mime_type: &str,
    ) -> VaultResult<TransactionReceipt> {
        let record = ObjectRecord {
            address: address.to_string(),
            name: name.to_string(),
            size,
            mime_type: mime_type.to_string(),
            recorded_at: Utc::now(),
        };
        let body = serde_json::to_vec(&record)
            .map_err(|e| VaultError::Ledger(format!("serializing record: {e}")))?;
        let tx_hash = blake3::hash(&body).to_hex().to_string();

        let mut next = self.next_sequence.lock().await;
        let mut sequence = match *next {
            Some(seq) => seq,
            None => self.first_free_sequence().await?,
        };

        // Another writer may have taken the slot since it was loaded
        let key = loop {
            let key = Self::record_key(&self.owner, sequence);
            let taken = self
                .op
                .exists(&key)
                .await
                .map_err(|e| VaultError::Ledger(format!("checking {key}: {e}")))?;
            if !taken {
                break key;
            }
            sequence += 1;
        };
        self.op
            .write(&key, body)
            .await
            .map_err(|e| VaultError::Ledger(format!("appending {key}: {e}")))?;
        *next = Some(sequence + 1);
        drop(next);

        tracing::info!(owner = %self.owner, %address, %tx_hash, sequence, "object recorded on ledger");

        Ok(TransactionReceipt {
            tx_hash,
            owner: self.owner.clone(),
            sequence,
            recorded_at: record.recorded_at,
        })
    }

    async fn list_objects(&self, owner: &str) -> VaultResult<Vec<ObjectRecord>> {
        validate_owner(owner)?;
        let dir = format!("{LEDGER_PREFIX}/{owner}/");

        let mut records = Vec::new();
        for path in self.record_paths(&dir).await? {
            let body = self
                .op
                .read(&path)
                .await
                .map_err(|e| VaultError::Ledger(format!("reading {path}: {e}")))?;
            match serde_json::from_slice::<ObjectRecord>(&body.to_bytes()) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(%path, "skipping unreadable ledger record: {e}"),
            }
        }
        Ok(records)
    }
}
