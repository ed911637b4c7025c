//! OpenDAL Operator factory for vaultium storage backends

use std::path::Path;

use opendal::Operator;

use vaultium_core::config::{StorageBackend, StorageConfig};
use vaultium_core::{VaultError, VaultResult};

/// S3 access keys. When absent, OpenDAL falls back to its own
/// environment/profile loading.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl S3Credentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

/// Build the object-store operator described by `storage`.
///
/// Plaintext HTTP S3 endpoints are refused when `enforce_tls` is set and
/// logged as a warning otherwise.
pub fn build_operator(
    storage: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> VaultResult<Operator> {
    match storage.backend {
        StorageBackend::Memory => memory_operator(),
        StorageBackend::Fs => fs_operator(&storage.root),
        StorageBackend::S3 => s3_operator(storage, credentials),
    }
}

/// Volatile in-process backend (tests, session custody)
pub fn memory_operator() -> VaultResult<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .map_err(|e| VaultError::Storage(format!("creating memory operator: {e}")))?
        .finish())
}

/// Local directory backend rooted at `root` (created on first write)
pub fn fs_operator(root: &Path) -> VaultResult<Operator> {
    let root = root
        .to_str()
        .ok_or_else(|| VaultError::Config(format!("non UTF-8 path: {}", root.display())))?;

    let op = Operator::new(opendal::services::Fs::default().root(root))
        .map_err(|e| VaultError::Storage(format!("creating fs operator at {root}: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// S3-compatible backend with path-style addressing (the opendal 0.55 default)
fn s3_operator(storage: &StorageConfig, credentials: Option<&S3Credentials>) -> VaultResult<Operator> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            return Err(VaultError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    let mut builder = opendal::services::S3::default()
        .endpoint(&storage.endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket);
    if let Some(root) = storage.root.to_str().filter(|r| !r.is_empty()) {
        builder = builder.root(root);
    }
    if let Some(creds) = credentials {
        builder = builder
            .access_key_id(&creds.access_key_id)
            .secret_access_key(&creds.secret_access_key);
    }

    let op = Operator::new(builder)
        .map_err(|e| VaultError::Storage(format!("creating S3 operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config(endpoint: &str, enforce_tls: bool) -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::S3,
            root: "/vaultium".into(),
            endpoint: endpoint.into(),
            enforce_tls,
            ..Default::default()
        }
    }

    fn creds() -> S3Credentials {
        S3Credentials {
            access_key_id: "test-key".into(),
            secret_access_key: "test-secret".into(),
        }
    }

    #[test]
    fn s3_http_allowed_without_enforce_tls() {
        let op = build_operator(&s3_config("http://localhost:8333", false), Some(&creds()));
        assert!(op.is_ok());
    }

    #[test]
    fn s3_http_rejected_with_enforce_tls() {
        let err = build_operator(&s3_config("http://insecure:8333", true), Some(&creds())).unwrap_err();
        assert!(
            err.to_string().contains("enforce_tls"),
            "error message should mention enforce_tls"
        );
    }

    #[test]
    fn s3_https_with_enforce_tls() {
        let op = build_operator(&s3_config("https://s3.example.com", true), None);
        assert!(op.is_ok());
    }

    #[test]
    fn fs_and_memory_backends() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = StorageConfig {
            backend: StorageBackend::Fs,
            root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        assert!(build_operator(&fs, None).is_ok());

        let mem = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(build_operator(&mem, None).is_ok());
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", creds());
        assert!(rendered.contains("test-key"));
        assert!(!rendered.contains("test-secret"));
    }
}
