//! Per-attempt proof state machine
//!
//! ```text
//! Idle → ComputingWitness → GeneratingProof → ProofReady → Verifying → Verified
//!              │                  │                             └────→ VerificationFailed
//!              └──────────────────┴──→ GenerationFailed
//! ```

use tokio::io::AsyncRead;

use vaultium_chunks::{hash_reader, ContentDigest};
use vaultium_core::{VaultError, VaultResult};

use crate::engine::ProofEngine;
use crate::proof::OwnershipProof;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofState {
    Idle,
    ComputingWitness,
    GeneratingProof,
    ProofReady,
    GenerationFailed,
    Verifying,
    Verified,
    VerificationFailed,
}

impl ProofState {
    fn can_transition_to(self, next: ProofState) -> bool {
        use ProofState::*;
        matches!(
            (self, next),
            (Idle, ComputingWitness)
                | (ComputingWitness, GeneratingProof)
                | (ComputingWitness, GenerationFailed)
                | (GeneratingProof, ProofReady)
                | (GeneratingProof, GenerationFailed)
                | (ProofReady, Verifying)
                | (Verifying, Verified)
                | (Verifying, VerificationFailed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProofState::GenerationFailed | ProofState::Verified | ProofState::VerificationFailed
        )
    }
}

impl std::fmt::Display for ProofState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// One proof attempt. Not reusable once it reaches a terminal state.
#[derive(Debug)]
pub struct ProofSession {
    state: ProofState,
    proof: Option<OwnershipProof>,
}

impl Default for ProofSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofSession {
    pub fn new() -> Self {
        Self {
            state: ProofState::Idle,
            proof: None,
        }
    }

    /// Start at `ProofReady` with a proof received from elsewhere.
    pub fn from_proof(proof: OwnershipProof) -> Self {
        Self {
            state: ProofState::ProofReady,
            proof: Some(proof),
        }
    }

    pub fn state(&self) -> ProofState {
        self.state
    }

    pub fn proof(&self) -> Option<&OwnershipProof> {
        self.proof.as_ref()
    }

    pub fn into_proof(self) -> Option<OwnershipProof> {
        self.proof
    }

    fn advance(&mut self, next: ProofState) -> VaultResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(VaultError::InvalidProofState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.state, to = %next, "proof state");
        self.state = next;
        Ok(())
    }

    /// Hash `content` into the witness, then prove it matches `public`.
    pub async fn generate<R>(
        &mut self,
        engine: &ProofEngine,
        content: R,
        public: &ContentDigest,
    ) -> VaultResult<&OwnershipProof>
    where
        R: AsyncRead + Unpin,
    {
        self.advance(ProofState::ComputingWitness)?;
        let witness = match hash_reader(content).await {
            Ok(digest) => digest,
            Err(e) => {
                self.advance(ProofState::GenerationFailed)?;
                return Err(e);
            }
        };

        self.advance(ProofState::GeneratingProof)?;
        match engine.generate_proof_for(&witness, public).await {
            Ok(proof) => {
                self.advance(ProofState::ProofReady)?;
                Ok(self.proof.insert(proof))
            }
            Err(e) => {
                self.advance(ProofState::GenerationFailed)?;
                Err(e)
            }
        }
    }

    /// Check the ready proof against `public`.
    pub async fn verify(&mut self, engine: &ProofEngine, public: &ContentDigest) -> VaultResult<bool> {
        self.advance(ProofState::Verifying)?;
        let proof = self.proof.as_ref().ok_or_else(|| VaultError::InvalidProofState {
            from: ProofState::Verifying.to_string(),
            to: "verify without proof".into(),
        })?;

        match engine.verify_proof_for(proof, public).await {
            Ok(true) => {
                self.advance(ProofState::Verified)?;
                Ok(true)
            }
            Ok(false) => {
                self.advance(ProofState::VerificationFailed)?;
                Ok(false)
            }
            Err(e) => {
                self.advance(ProofState::VerificationFailed)?;
                Err(e)
            }
        }
    }
}
