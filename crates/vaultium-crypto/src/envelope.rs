//! age envelopes for handing an object key to another party (age 0.11 API)
//!
//! The key's JWK form is encrypted to the recipient's X25519 public key and
//! ASCII-armored so it can sit in a JSON record.

use std::io::{Read, Write};
use std::str::FromStr;

use age::armor::{ArmoredReader, ArmoredWriter, Format};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use vaultium_core::{VaultError, VaultResult};

use crate::keys::{export_key, import_key, KeyJwk, SymmetricKey};

/// A freshly generated sharing identity
pub struct SharingIdentity {
    /// `AGE-SECRET-KEY-1...`
    pub secret: SecretString,
    /// `age1...`, safe to publish
    pub recipient: String,
}

pub fn generate_identity() -> SharingIdentity {
    let identity = age::x25519::Identity::generate();
    SharingIdentity {
        recipient: identity.to_public().to_string(),
        secret: identity.to_string(),
    }
}

/// Check that `recipient` is a valid age X25519 public key.
pub fn parse_recipient(recipient: &str) -> VaultResult<age::x25519::Recipient> {
    age::x25519::Recipient::from_str(recipient.trim())
        .map_err(|e| VaultError::InvalidKey(format!("recipient '{recipient}': {e}")))
}

/// Encrypt `key` to `recipient`, returning armored age ciphertext.
pub fn seal_key(key: &SymmetricKey, recipient: &str) -> VaultResult<String> {
    let recipient = parse_recipient(recipient)?;
    let plaintext = export_key(key).to_json()?;

    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| anyhow::anyhow!("creating age encryptor: {e}"))?;

    let mut out = Vec::new();
    let armor = ArmoredWriter::wrap_output(&mut out, Format::AsciiArmor)?;
    let mut writer = encryptor.wrap_output(armor)?;
    writer.write_all(&plaintext)?;
    writer.finish().and_then(|armor| armor.finish())?;

    String::from_utf8(out).map_err(|e| anyhow::anyhow!("armored output not UTF-8: {e}").into())
}

/// Decrypt an envelope produced by [`seal_key`] with the matching identity.
pub fn open_key(envelope: &str, identity: &SecretString) -> VaultResult<SymmetricKey> {
    let identity = age::x25519::Identity::from_str(identity.expose_secret().trim())
        .map_err(|e| VaultError::InvalidKey(format!("age identity: {e}")))?;

    let decryptor = age::Decryptor::new(ArmoredReader::new(envelope.as_bytes()))
        .map_err(|e| VaultError::Custody(format!("reading key envelope: {e}")))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(&identity as &dyn age::Identity))
        .map_err(|e| VaultError::Custody(format!("opening key envelope: {e}")))?;

    let mut plaintext = Zeroizing::new(Vec::new());
    reader.read_to_end(&mut plaintext)?;

    import_key(&KeyJwk::from_json(&plaintext)?)
}
