use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("failed to read input content: {0}")]
    InputRead(#[source] std::io::Error),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Authentication tag mismatch: wrong key, corrupted or tampered ciphertext.
    #[error("decryption failed: wrong key or tampered data")]
    Decryption,

    /// Key material, share token, or sharing identity could not be parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid manifest input: {0}")]
    InvalidManifestInput(String),

    #[error("invalid threshold {threshold} for {total} shares (need 2 <= threshold <= total, total >= 2)")]
    InvalidThreshold { threshold: usize, total: usize },

    #[error("cannot reconstruct key: {0}")]
    InsufficientShares(String),

    #[error("ownership constraint unsatisfied: private digest does not match public digest")]
    ConstraintUnsatisfied,

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("chunk {index} ({address}) unavailable: {reason}")]
    ChunkFetch {
        index: usize,
        address: String,
        reason: String,
    },

    #[error("manifest {address} unavailable: {reason}")]
    ManifestFetch { address: String, reason: String },

    /// Decrypted content does not hash to the digest recorded in the manifest.
    #[error("integrity check failed: manifest digest {expected}, content digest {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("proof artifacts unavailable: {0}")]
    ArtifactsUnavailable(String),

    #[error("invalid proof state transition: {from} -> {to}")]
    InvalidProofState { from: String, to: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("custody error: {0}")]
    Custody(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse grouping used to decide what the end user is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Content failed authentication or digest verification.
    Tampered,
    /// Storage backend or network-shaped failure; the caller may retry.
    Transport,
    /// Key custody could not supply a usable key.
    Custody,
    /// Ownership proof could not be produced or checked.
    Proof,
    /// Caller supplied invalid input.
    Input,
    Internal,
}

impl VaultError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VaultError::Decryption | VaultError::IntegrityMismatch { .. } => ErrorCategory::Tampered,
            VaultError::ChunkFetch { .. }
            | VaultError::ManifestFetch { .. }
            | VaultError::Storage(_)
            | VaultError::Ledger(_) => ErrorCategory::Transport,
            VaultError::InsufficientShares(_) | VaultError::Custody(_) => ErrorCategory::Custody,
            VaultError::ConstraintUnsatisfied
            | VaultError::MalformedProof(_)
            | VaultError::ArtifactsUnavailable(_)
            | VaultError::InvalidProofState { .. } => ErrorCategory::Proof,
            VaultError::InputRead(_)
            | VaultError::InvalidManifestInput(_)
            | VaultError::InvalidThreshold { .. }
            | VaultError::InvalidDigest(_)
            | VaultError::InvalidKey(_)
            | VaultError::Config(_) => ErrorCategory::Input,
            VaultError::KeyGeneration(_) | VaultError::Io(_) | VaultError::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether the content was shown to be tampered with (as opposed to unavailable).
    pub fn is_tampered(&self) -> bool {
        self.category() == ErrorCategory::Tampered
    }

    /// Network-shaped failures are candidates for a retry by the caller.
    /// Cryptographic failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::ChunkFetch { .. } | VaultError::ManifestFetch { .. } | VaultError::Storage(_)
        )
    }
}
