//! Shamir secret sharing over GF(2^8)
//!
//! Each secret byte gets its own random polynomial of degree `threshold - 1`
//! whose constant term is that byte; share `x` holds the evaluations at `x`
//! (ids `1..=total`). Any `threshold` shares recover the secret by Lagrange
//! interpolation at zero. Fewer reveal nothing about the payload bytes.
//!
//! Every share of one split carries the same random 16-byte set id and a
//! BLAKE3 commitment to `(set id, secret)`. Reconstruction only mixes shares
//! whose headers agree and rejects any interpolated secret whose
//! commitment does not match, so corruption is reported instead of
//! returning a wrong key. The commitment is a hash of a full-entropy key and
//! leaks nothing short of brute force over the key space.
//!
//! Share token (lowercase hex):
//! ```text
//! [1: version][1: threshold][1: id][16: set id][32: commitment][N: payload]
//! ```

use std::collections::BTreeMap;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use vaultium_core::{VaultError, VaultResult};

const TOKEN_VERSION: u8 = 1;
const SET_ID_SIZE: usize = 16;
const COMMITMENT_SIZE: usize = 32;
const HEADER_SIZE: usize = 3 + SET_ID_SIZE + COMMITMENT_SIZE;
const COMMITMENT_CONTEXT: &str = "vaultium 2024 key-share commitment v1";

/// Upper bound on threshold-subsets tried per share set before giving up.
const MAX_SUBSET_ATTEMPTS: usize = 256;

/// One share of a split secret
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    threshold: u8,
    id: u8,
    set_id: [u8; SET_ID_SIZE],
    commitment: [u8; COMMITMENT_SIZE],
    payload: Vec<u8>,
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("set_id", &hex::encode(self.set_id))
            .field("payload", &"[REDACTED]")
            .finish()
    }
}

impl KeyShare {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn threshold(&self) -> usize {
        self.threshold as usize
    }

    /// Identifier shared by every share from the same split
    pub fn set_id(&self) -> String {
        hex::encode(self.set_id)
    }

    pub fn to_token(&self) -> Zeroizing<String> {
        let mut raw = Zeroizing::new(Vec::with_capacity(HEADER_SIZE + self.payload.len()));
        raw.push(TOKEN_VERSION);
        raw.push(self.threshold);
        raw.push(self.id);
        raw.extend_from_slice(&self.set_id);
        raw.extend_from_slice(&self.commitment);
        raw.extend_from_slice(&self.payload);
        Zeroizing::new(hex::encode(&*raw))
    }

    pub fn from_token(token: &str) -> VaultResult<Self> {
        let raw = Zeroizing::new(
            hex::decode(token.trim())
                .map_err(|e| VaultError::InvalidKey(format!("share token encoding: {e}")))?,
        );
        if raw.len() <= HEADER_SIZE {
            return Err(VaultError::InvalidKey(format!(
                "share token too short: {} bytes",
                raw.len()
            )));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(VaultError::InvalidKey(format!(
                "unsupported share token version {}",
                raw[0]
            )));
        }
        let (threshold, id) = (raw[1], raw[2]);
        if threshold < 2 || id == 0 {
            return Err(VaultError::InvalidKey(format!(
                "share token has threshold {threshold}, id {id}"
            )));
        }

        let mut set_id = [0u8; SET_ID_SIZE];
        set_id.copy_from_slice(&raw[3..3 + SET_ID_SIZE]);
        let mut commitment = [0u8; COMMITMENT_SIZE];
        commitment.copy_from_slice(&raw[3 + SET_ID_SIZE..HEADER_SIZE]);

        Ok(Self {
            threshold,
            id,
            set_id,
            commitment,
            payload: raw[HEADER_SIZE..].to_vec(),
        })
    }
}

/// Split `secret` into `total` shares, any `threshold` of which reconstruct it.
pub fn split_secret(secret: &[u8], total: usize, threshold: usize) -> VaultResult<Vec<KeyShare>> {
    if total < 2 || threshold < 2 || threshold > total || total > u8::MAX as usize {
        return Err(VaultError::InvalidThreshold { threshold, total });
    }
    if secret.is_empty() {
        return Err(VaultError::InvalidKey("cannot split an empty secret".into()));
    }

    let mut rng = rand::thread_rng();
    let mut set_id = [0u8; SET_ID_SIZE];
    rng.fill_bytes(&mut set_id);
    let commitment = commit(&set_id, secret);

    let mut payloads: Vec<Vec<u8>> = vec![Vec::with_capacity(secret.len()); total];
    let mut coeffs = Zeroizing::new(vec![0u8; threshold]);

    for &byte in secret {
        coeffs[0] = byte;
        rng.fill_bytes(&mut coeffs[1..]);
        for (i, payload) in payloads.iter_mut().enumerate() {
            payload.push(gf256::eval(&coeffs, (i + 1) as u8));
        }
    }

    tracing::debug!(total, threshold, "secret split into shares");

    Ok(payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| KeyShare {
            threshold: threshold as u8,
            id: (i + 1) as u8,
            set_id,
            commitment,
            payload,
        })
        .collect())
}

/// Reconstruct the secret from any `threshold` consistent shares.
///
/// Shares are grouped by their full header (set id, threshold, commitment,
/// payload length), so a share with a damaged header lands in a group of its
/// own and cannot shadow a clean subset. Duplicate ids within a group are
/// ignored. Fails with `InsufficientShares` when no group holds enough
/// distinct shares or no subset reproduces the committed secret.
pub fn reconstruct(shares: &[KeyShare]) -> VaultResult<Zeroizing<Vec<u8>>> {
    if shares.is_empty() {
        return Err(VaultError::InsufficientShares("no shares supplied".into()));
    }

    let mut groups: BTreeMap<GroupKey, Vec<&KeyShare>> = BTreeMap::new();
    for share in shares {
        let group = groups.entry(GroupKey::of(share)).or_default();
        if group.iter().any(|s| s.id == share.id) {
            continue;
        }
        group.push(share);
    }
    if groups.len() > 1 {
        tracing::warn!(groups = groups.len(), "shares disagree on split header");
    }

    let mut best = (0usize, 0usize);
    let mut integrity_failure = false;

    for group in groups.values() {
        let needed = group[0].threshold();
        if group.len() > best.0 {
            best = (group.len(), needed);
        }
        if group.len() < needed {
            continue;
        }

        for subset in Subsets::new(group.len(), needed).take(MAX_SUBSET_ATTEMPTS) {
            let picked: Vec<&KeyShare> = subset.iter().map(|&i| group[i]).collect();
            let secret = interpolate(&picked);
            if commit(&picked[0].set_id, &secret) == picked[0].commitment {
                return Ok(secret);
            }
            integrity_failure = true;
            tracing::warn!("share subset failed commitment check");
        }
    }

    if integrity_failure {
        return Err(VaultError::InsufficientShares(
            "shares are corrupted: no subset matches the split commitment".into(),
        ));
    }
    Err(VaultError::InsufficientShares(format!(
        "have {} consistent shares, need {}",
        best.0, best.1
    )))
}

/// Shares only combine when every header field agrees
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    set_id: [u8; SET_ID_SIZE],
    threshold: u8,
    commitment: [u8; COMMITMENT_SIZE],
    payload_len: usize,
}

impl GroupKey {
    fn of(share: &KeyShare) -> Self {
        Self {
            set_id: share.set_id,
            threshold: share.threshold,
            commitment: share.commitment,
            payload_len: share.payload.len(),
        }
    }
}

fn interpolate(shares: &[&KeyShare]) -> Zeroizing<Vec<u8>> {
    let len = shares[0].payload.len();
    let xs: Vec<u8> = shares.iter().map(|s| s.id).collect();
    let mut ys = Zeroizing::new(vec![0u8; shares.len()]);
    let mut secret = Zeroizing::new(Vec::with_capacity(len));

    for byte in 0..len {
        for (y, share) in ys.iter_mut().zip(shares) {
            *y = share.payload[byte];
        }
        secret.push(gf256::interpolate_at_zero(&xs, &ys));
    }
    secret
}

fn commit(set_id: &[u8; SET_ID_SIZE], secret: &[u8]) -> [u8; COMMITMENT_SIZE] {
    let mut hasher = blake3::Hasher::new_derive_key(COMMITMENT_CONTEXT);
    hasher.update(set_id);
    hasher.update(secret);
    *hasher.finalize().as_bytes()
}

/// k-combinations of `0..n` in lexicographic order
struct Subsets {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Subsets {
    fn new(n: usize, k: usize) -> Self {
        let current = (k <= n).then(|| (0..k).collect());
        Self { n, current }
    }
}

impl Iterator for Subsets {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let out = self.current.clone()?;
        let k = out.len();

        let mut next = out.clone();
        let mut i = k;
        loop {
            if i == 0 {
                self.current = None;
                break;
            }
            i -= 1;
            if next[i] < self.n - k + i {
                next[i] += 1;
                for j in i + 1..k {
                    next[j] = next[j - 1] + 1;
                }
                self.current = Some(next);
                break;
            }
        }
        Some(out)
    }
}

/// Arithmetic in GF(2^8) with the AES polynomial x^8 + x^4 + x^3 + x + 1.
mod gf256 {
    pub(super) fn mul(mut a: u8, mut b: u8) -> u8 {
        let mut acc = 0u8;
        for _ in 0..8 {
            // Branch-free: mask is 0xFF when the low bit of b is set
            acc ^= a & (b & 1).wrapping_neg();
            let carry = (a >> 7).wrapping_neg();
            a = (a << 1) ^ (carry & 0x1B);
            b >>= 1;
        }
        acc
    }

    /// a^254 = a^-1 for non-zero a
    pub(super) fn inv(a: u8) -> u8 {
        let mut result = 1u8;
        let mut base = a;
        let mut exp = 254u8;
        while exp > 0 {
            if exp & 1 == 1 {
                result = mul(result, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Horner evaluation; `coeffs[0]` is the constant term.
    pub(super) fn eval(coeffs: &[u8], x: u8) -> u8 {
        coeffs.iter().rev().fold(0u8, |acc, &c| mul(acc, x) ^ c)
    }

    /// Lagrange interpolation of f(0) from distinct non-zero x values.
    pub(super) fn interpolate_at_zero(xs: &[u8], ys: &[u8]) -> u8 {
        let mut acc = 0u8;
        for (i, (&xi, &yi)) in xs.iter().zip(ys).enumerate() {
            let mut num = 1u8;
            let mut den = 1u8;
            for (j, &xj) in xs.iter().enumerate() {
                if i != j {
                    num = mul(num, xj);
                    den = mul(den, xj ^ xi);
                }
            }
            acc ^= mul(mul(num, inv(den)), yi);
        }
        acc
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> [u8; 32] {
        let mut k = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut k);
        k
    }

    #[test]
    fn two_of_three_any_pair() {
        let secret = key();
        let shares = split_secret(&secret, 3, 2).unwrap();
        assert_eq!(shares.len(), 3);

        let a = reconstruct(&[shares[0].clone(), shares[2].clone()]).unwrap();
        let b = reconstruct(&[shares[1].clone(), shares[2].clone()]).unwrap();
        assert_eq!(&a[..], &secret[..]);
        assert_eq!(&a[..], &b[..]);

        let err = reconstruct(&[shares[0].clone()]).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares(_)));
    }

    #[test]
    fn invalid_thresholds() {
        let secret = key();
        for (total, threshold) in [(3, 4), (3, 1), (1, 1), (256, 2)] {
            assert!(matches!(
                split_secret(&secret, total, threshold),
                Err(VaultError::InvalidThreshold { .. })
            ));
        }
    }

    #[test]
    fn duplicates_do_not_count_twice() {
        let shares = split_secret(&key(), 3, 2).unwrap();
        let err = reconstruct(&[shares[1].clone(), shares[1].clone()]).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares(_)));
    }

    #[test]
    fn mixed_splits_use_the_consistent_set() {
        let secret = key();
        let ours = split_secret(&secret, 3, 2).unwrap();
        let other = split_secret(&key(), 3, 2).unwrap();

        let mixed = [other[0].clone(), ours[0].clone(), ours[1].clone()];
        assert_eq!(&reconstruct(&mixed).unwrap()[..], &secret[..]);

        // One from each split never combines
        let err = reconstruct(&[other[0].clone(), ours[1].clone()]).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares(_)));
    }

    #[test]
    fn corrupted_share_is_rejected_not_misreconstructed() {
        let secret = key();
        let mut shares = split_secret(&secret, 3, 2).unwrap();
        shares[0].payload[5] ^= 0x01;

        let err = reconstruct(&shares[..2]).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares(_)));

        // The clean pair is still found when all three are supplied
        assert_eq!(&reconstruct(&shares).unwrap()[..], &secret[..]);
    }

    #[test]
    fn damaged_threshold_on_first_share_does_not_hide_clean_pair() {
        let secret = [7u8; 32];
        let mut shares = split_secret(&secret, 3, 2).unwrap();
        shares[0].threshold = 3;
        assert_eq!(&reconstruct(&shares).unwrap()[..], &secret[..]);
    }

    #[test]
    fn damaged_commitment_on_first_share_does_not_hide_clean_pair() {
        let secret = [7u8; 32];
        let mut shares = split_secret(&secret, 3, 2).unwrap();
        shares[0].commitment[0] ^= 1;
        assert_eq!(&reconstruct(&shares).unwrap()[..], &secret[..]);

        // Alone with one clean share, the damaged one still can't combine
        let err = reconstruct(&shares[..2]).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares(_)));
    }

    #[test]
    fn truncated_payload_on_first_share_does_not_hide_clean_pair() {
        let secret = key();
        let mut shares = split_secret(&secret, 3, 2).unwrap();
        shares[0].payload.pop();
        assert_eq!(&reconstruct(&shares).unwrap()[..], &secret[..]);
    }

    #[test]
    fn token_roundtrip_and_rejects_garbage() {
        let shares = split_secret(&key(), 3, 2).unwrap();
        let token = shares[2].to_token();
        assert_eq!(token.len(), 2 * (HEADER_SIZE + 32));

        let parsed = KeyShare::from_token(&token).unwrap();
        assert_eq!(parsed, shares[2]);
        assert_eq!(parsed.id(), 3);

        assert!(KeyShare::from_token("zz").is_err());
        assert!(KeyShare::from_token("0102").is_err());
        let mut wrong_version = token.to_string();
        wrong_version.replace_range(0..2, "09");
        assert!(KeyShare::from_token(&wrong_version).is_err());
    }

    #[test]
    fn subsets_enumerate_all_combinations() {
        let all: Vec<Vec<usize>> = Subsets::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Subsets::new(2, 3).count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn any_threshold_subset_reconstructs(
            secret in proptest::collection::vec(any::<u8>(), 1..=64),
            total in 2usize..=7,
            threshold_seed in any::<usize>(),
            pick_seed in any::<u64>(),
        ) {
            let threshold = 2 + threshold_seed % (total - 1);
            let shares = split_secret(&secret, total, threshold).unwrap();

            // Deterministic pseudo-random subset of exactly `threshold` shares
            let mut order: Vec<usize> = (0..total).collect();
            let mut s = pick_seed;
            for i in (1..order.len()).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                order.swap(i, (s >> 33) as usize % (i + 1));
            }

            let subset: Vec<KeyShare> = order[..threshold].iter().map(|&i| shares[i].clone()).collect();
            prop_assert_eq!(&reconstruct(&subset).unwrap()[..], &secret[..]);

            let short: Vec<KeyShare> = order[..threshold - 1].iter().map(|&i| shares[i].clone()).collect();
            let insufficient = matches!(reconstruct(&short), Err(VaultError::InsufficientShares(_)));
            prop_assert!(insufficient);
        }
    }
}
