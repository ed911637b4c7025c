//! Groth16 backend (BN254, arkworks)
//!
//! Artifacts live in one directory:
//!   - `ownership.pk`: proving key, compressed canonical serialization
//!   - `ownership.vk`: verifying key, same encoding
//!
//! [`setup_artifacts`] runs a local circuit-specific setup. Whoever runs it
//! knows the toxic waste, so locally generated keys are for development.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use async_trait::async_trait;
use rand::{CryptoRng, RngCore};

use vaultium_chunks::ContentDigest;
use vaultium_core::{VaultError, VaultResult};

use crate::circuit::{check_satisfied, digest_limbs, OwnershipCircuit};
use crate::engine::ProofBackend;
use crate::proof::{OwnershipProof, ProofProtocol};

pub const PROVING_KEY_FILE: &str = "ownership.pk";
pub const VERIFYING_KEY_FILE: &str = "ownership.vk";
pub const CURVE: &str = "bn254";

/// Paths written by [`setup_artifacts`]
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub proving_key: PathBuf,
    pub verifying_key: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            proving_key: dir.join(PROVING_KEY_FILE),
            verifying_key: dir.join(VERIFYING_KEY_FILE),
        }
    }
}

pub struct Groth16Backend {
    pk: Arc<ProvingKey<Bn254>>,
    pvk: Arc<PreparedVerifyingKey<Bn254>>,
}

impl Groth16Backend {
    pub fn from_keys(pk: ProvingKey<Bn254>, vk: &VerifyingKey<Bn254>) -> VaultResult<Self> {
        let pvk = Groth16::<Bn254>::process_vk(vk)
            .map_err(|e| VaultError::ArtifactsUnavailable(format!("preparing verifying key: {e}")))?;
        Ok(Self {
            pk: Arc::new(pk),
            pvk: Arc::new(pvk),
        })
    }

    /// Load both artifacts from `dir`. Missing or undecodable files are
    /// reported as `ArtifactsUnavailable`.
    pub async fn load(dir: &Path) -> VaultResult<Self> {
        let paths = ArtifactPaths::in_dir(dir);
        let pk_bytes = read_artifact(&paths.proving_key).await?;
        let vk_bytes = read_artifact(&paths.verifying_key).await?;

        tokio::task::spawn_blocking(move || {
            // Proving key comes from our own setup; skip the expensive subgroup checks
            let pk = ProvingKey::<Bn254>::deserialize_compressed_unchecked(&pk_bytes[..])
                .map_err(|e| VaultError::ArtifactsUnavailable(format!("decoding {PROVING_KEY_FILE}: {e}")))?;
            let vk = VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
                .map_err(|e| VaultError::ArtifactsUnavailable(format!("decoding {VERIFYING_KEY_FILE}: {e}")))?;
            Self::from_keys(pk, &vk)
        })
        .await
        .map_err(|e| anyhow::anyhow!("artifact loading task failed: {e}"))?
    }
}

async fn read_artifact(path: &Path) -> VaultResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| VaultError::ArtifactsUnavailable(format!("{}: {e}", path.display())))
}

/// Circuit-specific setup for the ownership circuit.
pub fn generate_keys<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> VaultResult<(ProvingKey<Bn254>, VerifyingKey<Bn254>)> {
    Groth16::<Bn254>::circuit_specific_setup(OwnershipCircuit::default(), rng)
        .map_err(|e| anyhow::anyhow!("groth16 setup failed: {e}").into())
}

/// Generate fresh keys and write both artifacts into `dir`.
pub async fn setup_artifacts(dir: &Path) -> VaultResult<ArtifactPaths> {
    let (pk_bytes, vk_bytes) = tokio::task::spawn_blocking(|| -> VaultResult<(Vec<u8>, Vec<u8>)> {
        let (pk, vk) = generate_keys(&mut rand::thread_rng())?;
        let mut pk_bytes = Vec::new();
        pk.serialize_compressed(&mut pk_bytes)
            .map_err(|e| anyhow::anyhow!("serializing proving key: {e}"))?;
        let mut vk_bytes = Vec::new();
        vk.serialize_compressed(&mut vk_bytes)
            .map_err(|e| anyhow::anyhow!("serializing verifying key: {e}"))?;
        Ok((pk_bytes, vk_bytes))
    })
    .await
    .map_err(|e| anyhow::anyhow!("setup task failed: {e}"))??;

    tokio::fs::create_dir_all(dir).await?;
    let paths = ArtifactPaths::in_dir(dir);
    tokio::fs::write(&paths.proving_key, &pk_bytes).await?;
    tokio::fs::write(&paths.verifying_key, &vk_bytes).await?;

    tracing::info!(
        dir = %dir.display(),
        pk_bytes = pk_bytes.len(),
        vk_bytes = vk_bytes.len(),
        "groth16 artifacts written"
    );
    Ok(paths)
}

#[async_trait]
impl ProofBackend for Groth16Backend {
    fn protocol(&self) -> ProofProtocol {
        ProofProtocol::Groth16
    }

    async fn generate_proof(
        &self,
        private: &ContentDigest,
        public: &ContentDigest,
    ) -> VaultResult<OwnershipProof> {
        // A false statement must never reach the prover
        check_satisfied(OwnershipCircuit::new(private, public))?;

        let circuit = OwnershipCircuit::new(private, public);
        let pk = Arc::clone(&self.pk);
        let proof = tokio::task::spawn_blocking(move || {
            Groth16::<Bn254>::prove(&pk, circuit, &mut rand::thread_rng())
        })
        .await
        .map_err(|e| anyhow::anyhow!("proving task failed: {e}"))?
        .map_err(|e| anyhow::anyhow!("groth16 proving failed: {e}"))?;

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| anyhow::anyhow!("serializing proof: {e}"))?;

        Ok(OwnershipProof {
            protocol: ProofProtocol::Groth16,
            curve: Some(CURVE.into()),
            proof: hex::encode(bytes),
            public_signals: vec![public.to_hex()],
        })
    }

    async fn verify_proof(&self, proof: &OwnershipProof, public: &ContentDigest) -> VaultResult<bool> {
        if proof.protocol != ProofProtocol::Groth16 {
            tracing::warn!(protocol = %proof.protocol, "refusing non-groth16 proof");
            return Ok(false);
        }
        if proof.curve.as_deref().is_some_and(|c| c != CURVE) {
            return Ok(false);
        }
        let bytes = proof.proof_bytes()?;
        let claimed = proof.public_digest()?;
        if &claimed != public {
            return Ok(false);
        }

        let parsed = Proof::<Bn254>::deserialize_compressed(&bytes[..])
            .map_err(|e| VaultError::MalformedProof(format!("decoding groth16 proof: {e}")))?;
        let inputs = digest_limbs(public);
        let pvk = Arc::clone(&self.pvk);

        tokio::task::spawn_blocking(move || {
            Groth16::<Bn254>::verify_with_processed_vk(&pvk, &inputs, &parsed)
        })
        .await
        .map_err(|e| anyhow::anyhow!("verification task failed: {e}"))?
        .map_err(|e| VaultError::MalformedProof(format!("groth16 verification: {e}")))
    }
}
