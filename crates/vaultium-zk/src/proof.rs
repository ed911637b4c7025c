//! Ownership proof object and its JSON form
//!
//! ```json
//! {
//!   "protocol": "groth16",
//!   "curve": "bn254",
//!   "proof": "<hex>",
//!   "publicSignals": ["<public digest>"]
//! }
//! ```

use serde::{Deserialize, Serialize};

use vaultium_chunks::ContentDigest;
use vaultium_core::{VaultError, VaultResult};

/// Which backend produced a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofProtocol {
    /// Succinct zero-knowledge proof checked against a verifying key
    Groth16,
    /// Placeholder from the fallback path; carries no cryptographic weight
    Simulated,
}

impl ProofProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofProtocol::Groth16 => "groth16",
            ProofProtocol::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for ProofProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipProof {
    pub protocol: ProofProtocol,
    pub curve: Option<String>,
    /// Hex-encoded proof bytes
    pub proof: String,
    /// Public inputs; the first is the public digest
    pub public_signals: Vec<String>,
}

impl OwnershipProof {
    pub fn is_simulated(&self) -> bool {
        self.protocol == ProofProtocol::Simulated
    }

    /// The digest this proof claims, parsed from the first public signal.
    pub fn public_digest(&self) -> VaultResult<ContentDigest> {
        let signal = self
            .public_signals
            .first()
            .ok_or_else(|| VaultError::MalformedProof("no public signals".into()))?;
        ContentDigest::from_hex(signal)
            .map_err(|_| VaultError::MalformedProof(format!("public signal '{signal}' is not a digest")))
    }

    pub fn proof_bytes(&self) -> VaultResult<Vec<u8>> {
        let bytes = hex::decode(&self.proof)
            .map_err(|e| VaultError::MalformedProof(format!("proof encoding: {e}")))?;
        if bytes.is_empty() {
            return Err(VaultError::MalformedProof("empty proof".into()));
        }
        Ok(bytes)
    }

    pub fn to_json(&self) -> VaultResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::MalformedProof(format!("serializing proof: {e}")))
    }

    pub fn from_json(data: &str) -> VaultResult<Self> {
        serde_json::from_str(data).map_err(|e| VaultError::MalformedProof(format!("parsing proof: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultium_chunks::hash_bytes;

    fn sample() -> OwnershipProof {
        OwnershipProof {
            protocol: ProofProtocol::Groth16,
            curve: Some("bn254".into()),
            proof: "00ff".into(),
            public_signals: vec![hash_bytes(b"doc").to_hex()],
        }
    }

    #[test]
    fn json_field_names() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["protocol"], "groth16");
        assert_eq!(json["curve"], "bn254");
        assert_eq!(json["publicSignals"][0], hash_bytes(b"doc").to_hex());
    }

    #[test]
    fn simulated_tag_parses() {
        let raw = r#"{"protocol":"simulated","curve":null,"proof":"ab","publicSignals":[]}"#;
        let proof = OwnershipProof::from_json(raw).unwrap();
        assert!(proof.is_simulated());
        assert!(matches!(proof.public_digest(), Err(VaultError::MalformedProof(_))));
    }

    #[test]
    fn structural_errors_are_malformed() {
        assert!(matches!(
            OwnershipProof::from_json(r#"{"protocol":"plonk"}"#),
            Err(VaultError::MalformedProof(_))
        ));

        let mut p = sample();
        p.proof = "xyz".into();
        assert!(matches!(p.proof_bytes(), Err(VaultError::MalformedProof(_))));
        p.proof = String::new();
        assert!(matches!(p.proof_bytes(), Err(VaultError::MalformedProof(_))));
        p.public_signals = vec!["short".into()];
        assert!(matches!(p.public_digest(), Err(VaultError::MalformedProof(_))));
    }
}
