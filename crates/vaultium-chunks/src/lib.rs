//! vaultium-chunks: content digests, fixed-size chunking, and object manifests
//!
//! # Overview
//! - `digest`: SHA-256 fingerprint of plaintext (integrity + proof witness)
//! - `fixed`: fixed-size splitting of encrypted objects and ordered reassembly
//! - `manifest`: the persisted description of one stored object

pub mod digest;
pub mod fixed;
pub mod manifest;

pub use digest::{hash_bytes, hash_file, hash_reader, ContentDigest, DIGEST_SIZE};
pub use fixed::{chunk_count, reassemble, split, Chunk};
pub use manifest::{build_manifest, Manifest};

/// Default fragment size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
