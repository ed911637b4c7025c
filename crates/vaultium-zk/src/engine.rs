//! Ownership proof engine: backend trait and capability probe
//!
//! `ProofEngine::probe` loads Groth16 artifacts when present and falls back
//! to the simulated backend otherwise. Both backends satisfy the same
//! contract; the proof's `protocol` tag tells them apart.

use std::sync::Arc;

use async_trait::async_trait;

use vaultium_chunks::ContentDigest;
use vaultium_core::config::ProofConfig;
use vaultium_core::VaultResult;

use crate::proof::{OwnershipProof, ProofProtocol};
use crate::simulated::SimulatedBackend;

/// A strategy for producing and checking ownership proofs
#[async_trait]
pub trait ProofBackend: Send + Sync {
    fn protocol(&self) -> ProofProtocol;

    /// Prove knowledge of `private` such that it equals `public`.
    ///
    /// Fails with `ConstraintUnsatisfied` for a false statement; no proof
    /// is produced in that case.
    async fn generate_proof(
        &self,
        private: &ContentDigest,
        public: &ContentDigest,
    ) -> VaultResult<OwnershipProof>;

    /// `Ok(false)` for a well-formed proof that does not check out,
    /// `MalformedProof` for one that cannot be decoded.
    async fn verify_proof(&self, proof: &OwnershipProof, public: &ContentDigest) -> VaultResult<bool>;
}

#[derive(Clone)]
pub struct ProofEngine {
    backend: Arc<dyn ProofBackend>,
}

impl std::fmt::Debug for ProofEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofEngine")
            .field("protocol", &self.backend.protocol())
            .finish()
    }
}

impl ProofEngine {
    pub fn with_backend(backend: Arc<dyn ProofBackend>) -> Self {
        Self { backend }
    }

    /// Pick the strongest backend the configuration allows.
    pub async fn probe(cfg: &ProofConfig) -> Self {
        #[cfg(feature = "groth16")]
        match crate::groth16::Groth16Backend::load(&cfg.artifacts_dir).await {
            Ok(backend) => {
                tracing::info!(
                    artifacts = %cfg.artifacts_dir.display(),
                    "ownership proofs: groth16"
                );
                return Self::with_backend(Arc::new(backend));
            }
            Err(e) => {
                tracing::warn!("groth16 artifacts unavailable, using simulated proofs: {e}");
            }
        }

        #[cfg(not(feature = "groth16"))]
        tracing::warn!("built without groth16 support, using simulated proofs");

        Self::with_backend(Arc::new(SimulatedBackend::from_config(cfg)))
    }

    pub fn protocol(&self) -> ProofProtocol {
        self.backend.protocol()
    }

    /// Digests are given as hex; a bad encoding is `InvalidDigest`.
    pub async fn generate_proof(&self, private_hex: &str, public_hex: &str) -> VaultResult<OwnershipProof> {
        let private = ContentDigest::from_hex(private_hex)?;
        let public = ContentDigest::from_hex(public_hex)?;
        self.generate_proof_for(&private, &public).await
    }

    pub async fn generate_proof_for(
        &self,
        private: &ContentDigest,
        public: &ContentDigest,
    ) -> VaultResult<OwnershipProof> {
        let proof = self.backend.generate_proof(private, public).await?;
        tracing::info!(protocol = %proof.protocol, public = %public, "ownership proof generated");
        Ok(proof)
    }

    pub async fn verify_proof(&self, proof: &OwnershipProof, public_hex: &str) -> VaultResult<bool> {
        let public = ContentDigest::from_hex(public_hex)?;
        self.verify_proof_for(proof, &public).await
    }

    pub async fn verify_proof_for(&self, proof: &OwnershipProof, public: &ContentDigest) -> VaultResult<bool> {
        let valid = self.backend.verify_proof(proof, public).await?;
        tracing::info!(protocol = %proof.protocol, public = %public, valid, "ownership proof checked");
        Ok(valid)
    }
}
