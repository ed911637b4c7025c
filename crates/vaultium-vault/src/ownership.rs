//! Ownership proofs against stored objects
//!
//! The public statement is the digest recorded in the object's manifest; the
//! witness is the digest of whatever content the prover supplies.

use std::path::Path;

use tokio::io::AsyncRead;

use vaultium_chunks::ContentDigest;
use vaultium_core::{VaultError, VaultResult};
use vaultium_zk::{OwnershipProof, ProofProtocol, ProofSession};

use crate::engine::Vault;

impl Vault {
    /// Backend the probe selected; callers should surface `Simulated`.
    pub fn proof_protocol(&self) -> ProofProtocol {
        self.proofs.protocol()
    }

    /// Prove that `content` is the object stored at `address`.
    ///
    /// Fails with `ConstraintUnsatisfied` when it is not.
    pub async fn prove_ownership<R>(&self, content: R, address: &str) -> VaultResult<OwnershipProof>
    where
        R: AsyncRead + Unpin,
    {
        let public = self.public_digest(address).await?;
        let mut session = ProofSession::new();
        session.generate(&self.proofs, content, &public).await?;

        tracing::info!(%address, protocol = %self.proofs.protocol(), "ownership proven");
        session
            .into_proof()
            .ok_or_else(|| anyhow::anyhow!("proof session finished without a proof").into())
    }

    pub async fn prove_file(&self, path: &Path, address: &str) -> VaultResult<OwnershipProof> {
        let file = tokio::fs::File::open(path).await.map_err(VaultError::InputRead)?;
        self.prove_ownership(file, address).await
    }

    /// Check `proof` against the digest in the manifest at `address`.
    pub async fn verify_ownership(&self, proof: OwnershipProof, address: &str) -> VaultResult<bool> {
        let public = self.public_digest(address).await?;
        let mut session = ProofSession::from_proof(proof);
        session.verify(&self.proofs, &public).await
    }

    async fn public_digest(&self, address: &str) -> VaultResult<ContentDigest> {
        self.fetch_manifest(address)
            .await?
            .digest
            .ok_or_else(|| VaultError::InvalidManifestInput(format!("manifest {address} records no digest")))
    }
}
