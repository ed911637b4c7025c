//! Pipeline orchestrator
//!
//! Store:    hash → encrypt → split → upload chunks → persist manifest
//!           → split key into custody → record on ledger
//! Retrieve: fetch manifest → gather shares → reconstruct key
//!           → download chunks → reassemble → decrypt → verify digest
//!
//! Chunk transfers for one object run concurrently (bounded by
//! `max_concurrent_transfers`). The manifest is only built once every chunk
//! upload has completed, and downloaded chunks are re-sorted by manifest
//! index before reassembly. An upload that fails midway leaves orphaned
//! chunks and nothing referencing them.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use vaultium_chunks::{build_manifest, hash_bytes, reassemble, split, Chunk, ContentDigest, Manifest};
use vaultium_core::config::{StorageBackend, VaultiumConfig};
use vaultium_core::types::{ObjectRecord, TransactionReceipt};
use vaultium_core::{VaultError, VaultResult};
use vaultium_crypto::{decrypt, encrypt, generate_key, reconstruct, split_secret, KeyShare, SymmetricKey};
use vaultium_storage::{
    build_operator, check_health, custodies_from_config, fs_operator, memory_custodies,
    memory_operator, Ledger, ObjectStore, OperatorLedger, S3Credentials, ShareCustody,
};
use vaultium_zk::ProofEngine;

use crate::sharing::SharingRegistry;

/// Progress callback: (completed, total, stage label)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// MIME type recorded when the caller doesn't supply one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Tunables for one [`Vault`]
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub chunk_size: usize,
    pub max_concurrent_transfers: usize,
    /// Shares needed to rebuild an object key
    pub threshold: usize,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            chunk_size: vaultium_chunks::DEFAULT_CHUNK_SIZE,
            max_concurrent_transfers: 8,
            threshold: 2,
        }
    }
}

impl VaultSettings {
    pub fn from_config(cfg: &VaultiumConfig) -> Self {
        Self {
            chunk_size: cfg.chunking.chunk_size,
            max_concurrent_transfers: cfg.chunking.max_concurrent_transfers,
            threshold: cfg.custody.threshold,
        }
    }
}

/// Result of a successful store
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    /// Content address of the manifest; the object's external identifier
    pub address: String,
    pub digest: ContentDigest,
    pub size: u64,
    pub chunks: usize,
    pub ledger: TransactionReceipt,
}

/// Decrypted, verified object
#[derive(Debug, Clone)]
pub struct RetrievedObject {
    pub manifest: Manifest,
    pub content: Bytes,
}

pub struct Vault {
    pub(crate) store: ObjectStore,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) custodies: Vec<Arc<dyn ShareCustody>>,
    pub(crate) proofs: ProofEngine,
    pub(crate) sharing: SharingRegistry,
    pub(crate) settings: VaultSettings,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("owner", &self.ledger.owner())
            .field("custodies", &self.custodies.iter().map(|c| c.domain()).collect::<Vec<_>>())
            .field("proofs", &self.proofs)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Vault {
    pub fn new(
        store: ObjectStore,
        ledger: Arc<dyn Ledger>,
        custodies: Vec<Arc<dyn ShareCustody>>,
        proofs: ProofEngine,
        sharing: SharingRegistry,
        settings: VaultSettings,
    ) -> VaultResult<Self> {
        if settings.chunk_size == 0 {
            return Err(VaultError::Config("chunk size must be > 0".into()));
        }
        if settings.max_concurrent_transfers == 0 {
            return Err(VaultError::Config("max_concurrent_transfers must be > 0".into()));
        }
        let total = custodies.len();
        if total < 2 || settings.threshold < 2 || settings.threshold > total {
            return Err(VaultError::InvalidThreshold {
                threshold: settings.threshold,
                total,
            });
        }

        Ok(Self {
            store,
            ledger,
            custodies,
            proofs,
            sharing,
            settings,
        })
    }

    /// Wire up every collaborator from configuration.
    ///
    /// Paths must already be expanded. The memory backend keeps the ledger,
    /// custody and sharing registry in memory too. Other backends must pass
    /// a health check before the vault is handed out.
    pub async fn from_config(cfg: &VaultiumConfig, credentials: Option<&S3Credentials>) -> VaultResult<Self> {
        cfg.validate()?;
        let objects = build_operator(&cfg.storage, credentials)?;
        if cfg.storage.backend != StorageBackend::Memory {
            check_health(&objects).await?;
            debug!(backend = ?cfg.storage.backend, "object storage reachable");
        }

        let (ledger_op, sharing_op, custodies) = if cfg.storage.backend == StorageBackend::Memory {
            (memory_operator()?, memory_operator()?, memory_custodies()?)
        } else {
            (
                fs_operator(&cfg.ledger.root)?,
                fs_operator(&cfg.sharing.root)?,
                custodies_from_config(&cfg.custody)?,
            )
        };

        let ledger = OperatorLedger::new(ledger_op, cfg.ledger.owner.clone())?;
        let proofs = ProofEngine::probe(&cfg.proof).await;

        Self::new(
            ObjectStore::new(objects),
            Arc::new(ledger),
            custodies,
            proofs,
            SharingRegistry::new(sharing_op),
            VaultSettings::from_config(cfg),
        )
    }

    /// Every collaborator in memory (tests and demos)
    pub fn in_memory(owner: &str, proofs: ProofEngine, settings: VaultSettings) -> VaultResult<Self> {
        Self::new(
            ObjectStore::new(memory_operator()?),
            Arc::new(OperatorLedger::new(memory_operator()?, owner)?),
            memory_custodies()?,
            proofs,
            SharingRegistry::new(memory_operator()?),
            settings,
        )
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn proofs(&self) -> &ProofEngine {
        &self.proofs
    }

    pub fn custodies(&self) -> &[Arc<dyn ShareCustody>] {
        &self.custodies
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn owner(&self) -> &str {
        self.ledger.owner()
    }

    /// Encrypt, chunk and persist `content`, split its key across custody,
    /// and record the object on the ledger.
    pub async fn store_object(
        &self,
        name: &str,
        mime_type: &str,
        content: Bytes,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<StoreReceipt> {
        let size = content.len() as u64;
        let key = generate_key()?;

        let (digest, encrypted, key) = tokio::task::spawn_blocking(move || -> VaultResult<_> {
            let digest = hash_bytes(&content);
            let encrypted = encrypt(&content, &key)?;
            Ok((digest, Bytes::from(encrypted.into_bytes()), key))
        })
        .await
        .map_err(|e| anyhow::anyhow!("encryption task failed: {e}"))??;
        debug!(name, size, encrypted = encrypted.len(), "content encrypted");

        let chunks = split(&encrypted, self.settings.chunk_size)?;
        let chunk_refs = self.upload_chunks(chunks, progress).await?;
        let chunk_count = chunk_refs.len();

        let manifest = build_manifest(name, size, mime_type, chunk_refs, self.settings.chunk_size, digest)?;
        let address = self.store.put(Bytes::from(manifest.to_bytes()?)).await?;
        debug!(%address, chunks = chunk_count, "manifest persisted");

        // Shares go out before the ledger entry: a recorded object is always recoverable
        self.distribute_key(&address, key).await?;
        let ledger = self.ledger.record_object(&address, name, size, mime_type).await?;

        info!(
            %address,
            name,
            size,
            chunks = chunk_count,
            tx = %ledger.tx_hash,
            "object stored"
        );

        Ok(StoreReceipt {
            address,
            digest,
            size,
            chunks: chunk_count,
            ledger,
        })
    }

    /// Read `path` and store it under its file name.
    pub async fn store_file(
        &self,
        path: &Path,
        mime_type: Option<&str>,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<StoreReceipt> {
        let content = tokio::fs::read(path).await.map_err(VaultError::InputRead)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| VaultError::InvalidManifestInput(format!("{} has no file name", path.display())))?;

        self.store_object(
            &name,
            mime_type.unwrap_or(DEFAULT_MIME_TYPE),
            Bytes::from(content),
            progress,
        )
        .await
    }

    /// Fetch, decrypt and verify the object whose manifest lives at `address`.
    pub async fn retrieve_object(
        &self,
        address: &str,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<RetrievedObject> {
        let manifest = self.fetch_manifest(address).await?;
        let key = self.recover_key(address).await?;
        self.open_object(address, manifest, key, progress).await
    }

    /// Objects recorded on the ledger for this vault's owner, oldest first
    pub async fn list_objects(&self) -> VaultResult<Vec<ObjectRecord>> {
        self.ledger.list_objects(self.ledger.owner()).await
    }

    pub(crate) async fn fetch_manifest(&self, address: &str) -> VaultResult<Manifest> {
        let raw = self.store.get(address).await.map_err(|e| match e {
            VaultError::Storage(reason) => VaultError::ManifestFetch {
                address: address.to_string(),
                reason,
            },
            other => other,
        })?;
        Manifest::from_bytes(&raw)
    }

    pub(crate) async fn open_object(
        &self,
        address: &str,
        manifest: Manifest,
        key: SymmetricKey,
        progress: Option<&ProgressFn>,
    ) -> VaultResult<RetrievedObject> {
        let encrypted = self.download_chunks(&manifest, progress).await?;

        let (plaintext, actual) = tokio::task::spawn_blocking(move || -> VaultResult<_> {
            let plaintext = decrypt(&encrypted, &key)?;
            let actual = hash_bytes(&plaintext);
            Ok((Bytes::from(plaintext), actual))
        })
        .await
        .map_err(|e| anyhow::anyhow!("decryption task failed: {e}"))??;

        match &manifest.digest {
            Some(expected) if *expected != actual => {
                warn!(%address, %expected, %actual, "content does not match manifest digest");
                return Err(VaultError::IntegrityMismatch {
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                });
            }
            Some(_) => {}
            None => warn!(%address, "manifest records no digest, integrity not verified"),
        }

        info!(%address, name = %manifest.name, size = plaintext.len(), "object retrieved");
        Ok(RetrievedObject {
            manifest,
            content: plaintext,
        })
    }

    async fn upload_chunks(&self, chunks: Vec<Chunk>, progress: Option<&ProgressFn>) -> VaultResult<Vec<String>> {
        let total = chunks.len() as u64;
        let done = AtomicU64::new(0);
        let done = &done;

        let mut uploaded: Vec<(usize, String)> = stream::iter(chunks)
            .map(|chunk| async move {
                let index = chunk.index;
                let address = self.store.put(chunk.data).await?;
                debug!(index, %address, "chunk uploaded");

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = progress {
                    cb(n, total, &format!("upload chunk {n}/{total}"));
                }
                Ok::<_, VaultError>((index, address))
            })
            .buffer_unordered(self.settings.max_concurrent_transfers)
            .try_collect()
            .await?;

        uploaded.sort_by_key(|(index, _)| *index);
        Ok(uploaded.into_iter().map(|(_, address)| address).collect())
    }

    async fn download_chunks(&self, manifest: &Manifest, progress: Option<&ProgressFn>) -> VaultResult<Bytes> {
        let total = manifest.chunk_count() as u64;
        let done = AtomicU64::new(0);
        let done = &done;

        let parts: Vec<(usize, Bytes)> = stream::iter(manifest.chunk_refs.iter().enumerate())
            .map(|(index, chunk_address)| async move {
                let data = self
                    .store
                    .get(chunk_address)
                    .await
                    .map_err(|e| VaultError::ChunkFetch {
                        index,
                        address: chunk_address.clone(),
                        reason: e.to_string(),
                    })?;
                debug!(index, address = %chunk_address, size = data.len(), "chunk downloaded");

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = progress {
                    cb(n, total, &format!("download chunk {n}/{total}"));
                }
                Ok::<_, VaultError>((index, data))
            })
            .buffer_unordered(self.settings.max_concurrent_transfers)
            .try_collect()
            .await?;

        reassemble(parts, manifest.chunk_count())
    }

    /// Split `key` into one share per custody store, then drop it.
    async fn distribute_key(&self, object_id: &str, key: SymmetricKey) -> VaultResult<()> {
        let shares = split_secret(&key.to_raw(), self.custodies.len(), self.settings.threshold)?;
        drop(key);

        let puts = self.custodies.iter().zip(&shares).map(|(custody, share)| async move {
            let token = share.to_token();
            custody.put(object_id, &token).await
        });
        futures::future::try_join_all(puts).await?;

        debug!(
            object_id,
            shares = shares.len(),
            threshold = self.settings.threshold,
            "key shares distributed"
        );
        Ok(())
    }

    /// Collect whatever shares custody still holds and rebuild the key.
    pub(crate) async fn recover_key(&self, object_id: &str) -> VaultResult<SymmetricKey> {
        let fetched = futures::future::join_all(
            self.custodies
                .iter()
                .map(|custody| async move { (custody.domain(), custody.get(object_id).await) }),
        )
        .await;

        let mut shares = Vec::with_capacity(fetched.len());
        for (domain, result) in fetched {
            match result {
                Ok(Some(token)) => match KeyShare::from_token(&token) {
                    Ok(share) => shares.push(share),
                    Err(e) => warn!(%domain, object_id, "ignoring unreadable share: {e}"),
                },
                Ok(None) => debug!(%domain, object_id, "no share held"),
                Err(e) => warn!(%domain, object_id, "custody store unavailable: {e}"),
            }
        }

        debug!(object_id, available = shares.len(), "reconstructing key");
        let secret = reconstruct(&shares)?;
        SymmetricKey::from_slice(&secret)
    }
}
