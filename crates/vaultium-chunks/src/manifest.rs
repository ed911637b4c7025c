//! Object manifest
//!
//! Persisted as pretty-printed JSON with the field names below; the manifest
//! is stored like any other object and addressed by its own content hash.
//!
//! ```json
//! {
//!   "name": "report.pdf",
//!   "size": 3670016,
//!   "type": "application/pdf",
//!   "chunkSize": 1048576,
//!   "chunks": ["<address>", "..."],
//!   "hash": "<sha-256 of plaintext>",
//!   "uploadedAt": "2024-05-01T12:00:00.000Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaultium_core::{VaultError, VaultResult};

use crate::digest::ContentDigest;

/// Reassembly and integrity metadata for one stored object. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    /// Plaintext size in bytes
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(rename = "chunkSize")]
    pub chunk_size: usize,
    /// Chunk addresses in reassembly order
    #[serde(rename = "chunks")]
    pub chunk_refs: Vec<String>,
    /// Digest of the decrypted content; `null` for manifests written without one
    #[serde(rename = "hash")]
    pub digest: Option<ContentDigest>,
    #[serde(rename = "uploadedAt", with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// Build a manifest. Pure: performs no I/O.
pub fn build_manifest(
    name: impl Into<String>,
    size: u64,
    mime_type: impl Into<String>,
    chunk_refs: Vec<String>,
    chunk_size: usize,
    digest: ContentDigest,
) -> VaultResult<Manifest> {
    if chunk_refs.is_empty() && size > 0 {
        return Err(VaultError::InvalidManifestInput(format!(
            "no chunk references for a {size}-byte object"
        )));
    }
    if chunk_size == 0 {
        return Err(VaultError::InvalidManifestInput(
            "chunk size must be positive".into(),
        ));
    }

    let now = Utc::now();
    // Truncate to the wire precision so a parsed manifest compares equal
    let created_at = DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

    Ok(Manifest {
        name: name.into(),
        size,
        mime_type: mime_type.into(),
        chunk_size,
        chunk_refs,
        digest: Some(digest),
        created_at,
    })
}

impl Manifest {
    pub fn chunk_count(&self) -> usize {
        self.chunk_refs.len()
    }

    /// Serialize to the persisted JSON form.
    pub fn to_bytes(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| VaultError::InvalidManifestInput(format!("serializing manifest: {e}")))
    }

    /// Parse the persisted JSON form.
    pub fn from_bytes(data: &[u8]) -> VaultResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| VaultError::InvalidManifestInput(format!("parsing manifest: {e}")))
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::hash_bytes;

    fn refs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i:064x}")).collect()
    }

    #[test]
    fn empty_refs_with_content_rejected() {
        let err = build_manifest("a.bin", 10, "application/octet-stream", vec![], 1024, hash_bytes(b"x"))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidManifestInput(_)));
    }

    #[test]
    fn empty_object_needs_no_refs() {
        let m = build_manifest("empty", 0, "text/plain", vec![], 1024, hash_bytes(b"")).unwrap();
        assert_eq!(m.chunk_count(), 0);
    }

    #[test]
    fn wire_field_names() {
        let m = build_manifest("report.pdf", 3_670_016, "application/pdf", refs(4), 1 << 20, hash_bytes(b"report"))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&m.to_bytes().unwrap()).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["chunkSize", "chunks", "hash", "name", "size", "type", "uploadedAt"]
        );
        assert_eq!(obj["type"], "application/pdf");
        assert_eq!(obj["chunks"].as_array().unwrap().len(), 4);
        assert_eq!(obj["hash"], hash_bytes(b"report").to_hex());

        let ts = obj["uploadedAt"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        // 2024-05-01T12:00:00.000Z
        assert_eq!(ts.len(), 24);
    }

    #[test]
    fn persisted_form_parses_back_identically() {
        let m = build_manifest("n", 5, "text/plain", refs(1), 16, hash_bytes(b"hello")).unwrap();
        let parsed = Manifest::from_bytes(&m.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn parses_externally_written_manifest_with_null_hash() {
        let raw = br#"{
            "name": "legacy.txt",
            "size": 3,
            "type": "text/plain",
            "chunkSize": 1048576,
            "chunks": ["bafy-one"],
            "hash": null,
            "uploadedAt": "2024-01-15T09:30:00.123Z"
        }"#;
        let m = Manifest::from_bytes(raw).unwrap();
        assert_eq!(m.digest, None);
        assert_eq!(m.chunk_refs, vec!["bafy-one".to_string()]);
        assert_eq!(m.created_at.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn garbage_is_invalid_manifest() {
        assert!(matches!(
            Manifest::from_bytes(b"not json"),
            Err(VaultError::InvalidManifestInput(_))
        ));
    }
}
