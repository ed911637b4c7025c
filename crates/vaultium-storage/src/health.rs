//! Storage health check

use opendal::{ErrorKind, Operator};

use vaultium_core::{VaultError, VaultResult};

/// Verify the storage backend answers a root listing.
///
/// A backend with nothing written yet (no root) counts as reachable.
pub async fn check_health(op: &Operator) -> VaultResult<()> {
    match op.list("/").await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::Storage(format!("storage health check failed: {e}"))),
    }
}
