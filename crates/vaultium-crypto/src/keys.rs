//! Per-object symmetric keys and their portable (JWK) form

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use vaultium_core::{VaultError, VaultResult};

use crate::KEY_SIZE;

const JWK_KTY: &str = "oct";
const JWK_ALG: &str = "A256GCM";

/// A per-object 256-bit AES-GCM key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Rebuild a key from raw bytes (e.g. a reconstructed secret).
    pub fn from_slice(raw: &[u8]) -> VaultResult<Self> {
        let bytes: [u8; KEY_SIZE] = raw.try_into().map_err(|_| {
            VaultError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", raw.len()))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Raw export used as the secret for threshold splitting.
    pub fn to_raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.bytes.to_vec())
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh key from the operating system's CSPRNG.
pub fn generate_key() -> VaultResult<SymmetricKey> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
    Ok(SymmetricKey::from_bytes(bytes))
}

/// JSON Web Key form of a symmetric key: `{"kty":"oct","alg":"A256GCM","k":"..."}`
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyJwk {
    pub kty: String,
    pub alg: String,
    /// base64url (unpadded) raw key
    pub k: String,
}

impl std::fmt::Debug for KeyJwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyJwk")
            .field("kty", &self.kty)
            .field("alg", &self.alg)
            .field("k", &"[REDACTED]")
            .finish()
    }
}

impl KeyJwk {
    pub fn to_json(&self) -> VaultResult<Zeroizing<Vec<u8>>> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| VaultError::InvalidKey(format!("serializing JWK: {e}")))
    }

    pub fn from_json(data: &[u8]) -> VaultResult<Self> {
        serde_json::from_slice(data).map_err(|e| VaultError::InvalidKey(format!("parsing JWK: {e}")))
    }
}

pub fn export_key(key: &SymmetricKey) -> KeyJwk {
    KeyJwk {
        kty: JWK_KTY.into(),
        alg: JWK_ALG.into(),
        k: URL_SAFE_NO_PAD.encode(key.as_bytes()),
    }
}

/// Inverse of [`export_key`]. Only 256-bit `A256GCM` octet keys are accepted.
pub fn import_key(jwk: &KeyJwk) -> VaultResult<SymmetricKey> {
    if jwk.kty != JWK_KTY || jwk.alg != JWK_ALG {
        return Err(VaultError::InvalidKey(format!(
            "unsupported key type {}/{}",
            jwk.kty, jwk.alg
        )));
    }
    let raw = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(jwk.k.as_bytes())
            .map_err(|e| VaultError::InvalidKey(format!("key encoding: {e}")))?,
    );
    SymmetricKey::from_slice(&raw)
}
