//! Fixed-size chunking of encrypted objects
//!
//! Chunk `i` covers `[i * chunk_size, min((i + 1) * chunk_size, len))`.
//! Chunks are zero-copy slices of the source `Bytes`.

use bytes::{Bytes, BytesMut};

use vaultium_core::{VaultError, VaultResult};

/// One contiguous fragment of an encrypted object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in manifest order
    pub index: usize,
    /// Byte offset within the encrypted object
    pub offset: u64,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Number of chunks `split` produces for `len` bytes.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

/// Split `content` into ordered fixed-size chunks.
///
/// Empty content yields zero chunks. A zero `chunk_size` is rejected.
pub fn split(content: &Bytes, chunk_size: usize) -> VaultResult<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(VaultError::InvalidManifestInput(
            "chunk size must be positive".into(),
        ));
    }

    let chunks = (0..chunk_count(content.len(), chunk_size))
        .map(|index| {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(content.len());
            Chunk {
                index,
                offset: start as u64,
                data: content.slice(start..end),
            }
        })
        .collect();

    Ok(chunks)
}

/// Concatenate fetched fragments in manifest order.
///
/// `parts` may arrive in any order (e.g. network completion order); each is
/// tagged with its manifest index. Every index in `0..expected` must be
/// present exactly once.
pub fn reassemble(mut parts: Vec<(usize, Bytes)>, expected: usize) -> VaultResult<Bytes> {
    parts.sort_unstable_by_key(|(index, _)| *index);

    if parts.len() != expected {
        return Err(VaultError::InvalidManifestInput(format!(
            "expected {expected} chunks, got {}",
            parts.len()
        )));
    }
    for (position, (index, _)) in parts.iter().enumerate() {
        if *index != position {
            return Err(VaultError::InvalidManifestInput(format!(
                "chunk index {index} out of place at position {position}"
            )));
        }
    }

    let total: usize = parts.iter().map(|(_, data)| data.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for (_, data) in parts {
        out.extend_from_slice(&data);
    }
    tracing::trace!(chunks = expected, bytes = total, "reassembled");
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunks = split(&Bytes::new(), 1024).unwrap();
        assert!(chunks.is_empty());
        assert_eq!(reassemble(vec![], 0).unwrap(), Bytes::new());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = split(&Bytes::from_static(b"abc"), 0).unwrap_err();
        assert!(matches!(err, VaultError::InvalidManifestInput(_)));
    }

    #[test]
    fn three_and_a_half_mib_gives_four_chunks() {
        let size = 3 * MIB + MIB / 2;
        let content = Bytes::from(vec![0xA5u8; size]);
        let chunks = split(&content, MIB).unwrap();

        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|c| c.len() == MIB));
        assert_eq!(chunks[3].len(), MIB / 2);
        assert_eq!(chunks[3].offset, 3 * MIB as u64);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let content = Bytes::from(vec![1u8; 4096]);
        let chunks = split(&content, 1024).unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == 1024));
    }

    #[test]
    fn reassemble_resorts_out_of_order_parts() {
        let content = Bytes::from_static(b"0123456789abcdef");
        let mut parts: Vec<(usize, Bytes)> = split(&content, 5)
            .unwrap()
            .into_iter()
            .map(|c| (c.index, c.data))
            .collect();
        parts.reverse();
        parts.swap(0, 2);

        assert_eq!(reassemble(parts, 4).unwrap(), content);
    }

    #[test]
    fn reassemble_rejects_missing_or_duplicate_index() {
        let a = Bytes::from_static(b"aa");
        let missing = vec![(0, a.clone()), (2, a.clone())];
        assert!(reassemble(missing, 2).is_err());

        let duplicate = vec![(0, a.clone()), (0, a.clone())];
        assert!(reassemble(duplicate, 2).is_err());

        let short = vec![(0, a)];
        assert!(reassemble(short, 2).is_err());
    }

    proptest! {
        #[test]
        fn split_covers_content_exactly(
            data in proptest::collection::vec(any::<u8>(), 0..=8192),
            chunk_size in 1usize..=2048,
        ) {
            let content = Bytes::from(data);
            let chunks = split(&content, chunk_size).unwrap();

            prop_assert_eq!(chunks.len(), chunk_count(content.len(), chunk_size));

            let mut offset = 0u64;
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.offset, offset);
                prop_assert!(!chunk.is_empty());
                prop_assert!(chunk.len() <= chunk_size);
                if i + 1 < chunks.len() {
                    prop_assert_eq!(chunk.len(), chunk_size);
                }
                offset += chunk.len() as u64;
            }
            prop_assert_eq!(offset as usize, content.len());

            let parts = chunks.into_iter().map(|c| (c.index, c.data)).collect();
            prop_assert_eq!(reassemble(parts, chunk_count(content.len(), chunk_size)).unwrap(), content);
        }
    }
}
