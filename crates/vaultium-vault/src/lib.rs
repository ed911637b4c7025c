//! vaultium-vault: the secure-object pipeline
//!
//! [`Vault`] ties the pieces together:
//! - `engine`: store / retrieve / list over chunks, custody and the ledger
//! - `ownership`: prove and verify ownership of a stored object
//! - `sharing`: hand an object key to another party via an age envelope

pub mod engine;
pub mod ownership;
pub mod sharing;

pub use engine::{ProgressFn, RetrievedObject, StoreReceipt, Vault, VaultSettings, DEFAULT_MIME_TYPE};
pub use sharing::{SharedDescriptor, SharedRecord, SharingRegistry};
