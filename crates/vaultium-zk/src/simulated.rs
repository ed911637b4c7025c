//! Simulated proof backend, used when Groth16 artifacts are unavailable
//!
//! The ownership constraint is checked in the clear before anything is
//! emitted, so false statements still fail with `ConstraintUnsatisfied`.
//! The emitted object is a labelled placeholder (`protocol = "simulated"`),
//! and verification only checks its shape and that the public signal is the
//! expected digest. Anyone can forge one: it proves nothing and is not
//! zero-knowledge. Callers must check the protocol tag before trusting a
//! result.

use std::time::Duration;

use async_trait::async_trait;

use vaultium_chunks::ContentDigest;
use vaultium_core::config::ProofConfig;
use vaultium_core::{VaultError, VaultResult};

use crate::engine::ProofBackend;
use crate::proof::{OwnershipProof, ProofProtocol};

const PLACEHOLDER_CONTEXT: &str = "vaultium 2024 simulated ownership proof v1";

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    prove_delay: Duration,
    verify_delay: Duration,
}

impl SimulatedBackend {
    pub fn new(prove_delay: Duration, verify_delay: Duration) -> Self {
        Self {
            prove_delay,
            verify_delay,
        }
    }

    pub fn from_config(cfg: &ProofConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.simulated_prove_delay_ms),
            Duration::from_millis(cfg.simulated_verify_delay_ms),
        )
    }

    /// No artificial delays (tests)
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

fn placeholder(public: &ContentDigest) -> String {
    let mut hasher = blake3::Hasher::new_derive_key(PLACEHOLDER_CONTEXT);
    hasher.update(public.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[async_trait]
impl ProofBackend for SimulatedBackend {
    fn protocol(&self) -> ProofProtocol {
        ProofProtocol::Simulated
    }

    async fn generate_proof(
        &self,
        private: &ContentDigest,
        public: &ContentDigest,
    ) -> VaultResult<OwnershipProof> {
        if private != public {
            return Err(VaultError::ConstraintUnsatisfied);
        }
        if !self.prove_delay.is_zero() {
            tokio::time::sleep(self.prove_delay).await;
        }

        Ok(OwnershipProof {
            protocol: ProofProtocol::Simulated,
            curve: None,
            proof: placeholder(public),
            public_signals: vec![public.to_hex()],
        })
    }

    async fn verify_proof(&self, proof: &OwnershipProof, public: &ContentDigest) -> VaultResult<bool> {
        if proof.protocol != ProofProtocol::Simulated {
            return Err(VaultError::ArtifactsUnavailable(format!(
                "cannot check a {} proof without the verifying key",
                proof.protocol
            )));
        }
        proof.proof_bytes()?;
        let claimed = proof.public_digest()?;

        if !self.verify_delay.is_zero() {
            tokio::time::sleep(self.verify_delay).await;
        }
        Ok(&claimed == public)
    }
}
