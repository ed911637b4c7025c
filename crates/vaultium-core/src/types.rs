use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Independent custody location for one key share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustDomain {
    /// Persistent store on this device
    Device,
    /// Process-lifetime memory
    Session,
    /// Off-device backup service
    Backup,
}

impl TrustDomain {
    pub const ALL: [TrustDomain; 3] = [TrustDomain::Device, TrustDomain::Session, TrustDomain::Backup];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustDomain::Device => "device",
            TrustDomain::Session => "session",
            TrustDomain::Backup => "backup",
        }
    }
}

impl std::fmt::Display for TrustDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry recorded on the ledger for a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Content address of the object's manifest
    pub address: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub recorded_at: DateTime<Utc>,
}

/// Acknowledgement returned by the ledger for an appended record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub owner: String,
    /// Position in the owner's ledger, starting at 0
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
}
