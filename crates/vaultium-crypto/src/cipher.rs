//! AES-256-GCM object encryption
//!
//! Encrypted object format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Every call draws a fresh nonce from the thread CSPRNG, so concurrent
//! encryptions under one key never share state. Random 96-bit nonces carry
//! a birthday bound: keep well under 2^32 encryptions per key. Keys here
//! are per object, so a key sees one encryption in practice.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use vaultium_core::{VaultError, VaultResult};

use crate::keys::SymmetricKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Nonce plus authenticated ciphertext for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedObject {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedObject {
    /// Wire form: `nonce || ciphertext`
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a wire-form object. Anything too short to hold a nonce and
    /// tag cannot authenticate and is reported as a decryption failure.
    pub fn parse(data: &[u8]) -> VaultResult<Self> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Decryption);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> VaultResult<EncryptedObject> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| anyhow::anyhow!("object encryption failed: {e}"))?;

    Ok(EncryptedObject { nonce, ciphertext })
}

/// Decrypt a wire-form object (`nonce || ciphertext`).
///
/// Wrong key, truncation and any modified byte all fail with `Decryption`.
pub fn decrypt(encrypted: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::Decryption);
    }
    let (nonce, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Decryption)
}
