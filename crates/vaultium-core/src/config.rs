use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{VaultError, VaultResult};

/// Top-level client configuration (loaded from vaultium.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultiumConfig {
    /// Upper bound for any single CLI operation, in seconds
    pub operation_timeout_secs: u64,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub custody: CustodyConfig,
    pub ledger: LedgerConfig,
    pub proof: ProofConfig,
    pub sharing: SharingConfig,
}

impl Default for VaultiumConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 300,
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            custody: CustodyConfig::default(),
            ledger: LedgerConfig::default(),
            proof: ProofConfig::default(),
            sharing: SharingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which OpenDAL service backs the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Fs,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend, key prefix for s3
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Fixed fragment size in bytes (default: 1 MiB)
    pub chunk_size: usize,
    /// Concurrent chunk uploads/downloads per object
    pub max_concurrent_transfers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Directory holding the device-local share store
    pub device_dir: PathBuf,
    /// Directory holding the backup share store
    pub backup_dir: PathBuf,
    /// Shares required to reconstruct an object key
    pub threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the append-only ledger
    pub root: PathBuf,
    /// Identity under which objects are recorded and listed
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    /// Directory containing ownership.pk / ownership.vk
    pub artifacts_dir: PathBuf,
    /// Artificial delay for simulated proof generation
    pub simulated_prove_delay_ms: u64,
    /// Artificial delay for simulated verification
    pub simulated_verify_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Directory holding the registry of shared key envelopes
    pub root: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/vaultium/objects"),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "vaultium".into(),
            enforce_tls: false,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            max_concurrent_transfers: 8,
        }
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("~/.local/share/vaultium/custody/device"),
            backup_dir: PathBuf::from("~/.local/share/vaultium/custody/backup"),
            threshold: 2,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.local/share/vaultium/ledger"),
            owner: "local".into(),
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("~/.local/share/vaultium/circuits"),
            simulated_prove_delay_ms: 2000,
            simulated_verify_delay_ms: 1000,
        }
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.local/share/vaultium/shared"),
        }
    }
}

/// Number of custody stores a key is split across (device, session, backup).
pub const CUSTODY_STORES: usize = 3;

impl VaultiumConfig {
    /// Reject settings that would make the pipeline unusable.
    pub fn validate(&self) -> VaultResult<()> {
        if self.chunking.chunk_size == 0 {
            return Err(VaultError::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.max_concurrent_transfers == 0 {
            return Err(VaultError::Config(
                "chunking.max_concurrent_transfers must be > 0".into(),
            ));
        }
        if self.custody.threshold < 2 || self.custody.threshold > CUSTODY_STORES {
            return Err(VaultError::InvalidThreshold {
                threshold: self.custody.threshold,
                total: CUSTODY_STORES,
            });
        }
        if self.storage.backend == StorageBackend::S3
            && self.storage.enforce_tls
            && self.storage.endpoint.starts_with("http://")
        {
            return Err(VaultError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled",
                self.storage.endpoint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
operation_timeout_secs = 60

[logging]
level = "debug"
format = "json"

[storage]
backend = "s3"
endpoint = "https://s3.example.com:8333"
region = "us-west-2"
bucket = "my-bucket"
enforce_tls = true

[chunking]
chunk_size = 262144
max_concurrent_transfers = 4

[custody]
device_dir = "/var/lib/vaultium/device"
backup_dir = "/mnt/backup/vaultium"
threshold = 3

[ledger]
owner = "0xabc"

[proof]
artifacts_dir = "/opt/vaultium/circuits"
simulated_prove_delay_ms = 0
"#;
        let config: VaultiumConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.operation_timeout_secs, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert!(config.storage.enforce_tls);
        assert_eq!(config.storage.bucket, "my-bucket");
        assert_eq!(config.chunking.chunk_size, 262144);
        assert_eq!(config.custody.threshold, 3);
        assert_eq!(config.ledger.owner, "0xabc");
        assert_eq!(config.proof.simulated_prove_delay_ms, 0);
        assert_eq!(config.proof.simulated_verify_delay_ms, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: VaultiumConfig = toml::from_str("").unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.chunking.chunk_size, 1024 * 1024);
        assert_eq!(config.custody.threshold, 2);
        assert_eq!(config.proof.simulated_prove_delay_ms, 2000);
        assert_eq!(config.operation_timeout_secs, 300);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = VaultiumConfig::default();
        config.chunking.chunk_size = 0;
        assert!(matches!(config.validate(), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = VaultiumConfig::default();
        config.custody.threshold = 1;
        assert!(matches!(
            config.validate(),
            Err(VaultError::InvalidThreshold { .. })
        ));
        config.custody.threshold = 4;
        assert!(matches!(
            config.validate(),
            Err(VaultError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_http_s3_with_enforce_tls_rejected() {
        let mut config = VaultiumConfig::default();
        config.storage.backend = StorageBackend::S3;
        config.storage.endpoint = "http://insecure:8333".into();
        config.storage.enforce_tls = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("enforce_tls"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = VaultiumConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: VaultiumConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.custody.threshold, parsed.custody.threshold);
        assert_eq!(config.ledger.owner, parsed.ledger.owner);
    }
}
