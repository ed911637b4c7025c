//! vaultium-crypto: client-side encryption for stored objects
//!
//! Pipeline: plaintext → AES-256-GCM (per-object key) → chunk → upload
//!
//! Key custody:
//! ```text
//! SymmetricKey (256-bit random, one per object, never persisted whole)
//!   ├── Shamir split → N KeyShares, one per custody domain (device, session, backup)
//!   └── JWK export → age envelope, when shared with a recipient
//! ```

pub mod cipher;
pub mod envelope;
pub mod keys;
pub mod shamir;

pub use cipher::{decrypt, encrypt, EncryptedObject};
pub use envelope::{generate_identity, open_key, parse_recipient, seal_key, SharingIdentity};
pub use keys::{export_key, generate_key, import_key, KeyJwk, SymmetricKey};
pub use shamir::{reconstruct, split_secret, KeyShare};

/// Size of an object key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
