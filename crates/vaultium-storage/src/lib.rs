//! vaultium-storage: the pipeline's external collaborators, all over OpenDAL
//!
//! - `object_store`: content-addressed blobs (chunks and manifests)
//! - `ledger`: append-only record of stored objects per owner
//! - `custody`: one key-value share store per trust domain
//! - `operator`: backend construction from config (memory, fs, s3)

pub mod custody;
pub mod health;
pub mod ledger;
pub mod object_store;
pub mod operator;

pub use custody::{custodies_from_config, memory_custodies, OperatorCustody, ShareCustody};
pub use health::check_health;
pub use ledger::{Ledger, OperatorLedger};
pub use object_store::{address_of, ObjectStore};
pub use operator::{build_operator, fs_operator, memory_operator, S3Credentials};
