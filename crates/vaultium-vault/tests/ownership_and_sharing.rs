//! Integration test: ownership proofs and recipient sharing on stored objects

use std::sync::Arc;

use bytes::Bytes;
use secrecy::SecretString;

use vaultium_core::VaultError;
use vaultium_crypto::generate_identity;
use vaultium_vault::{Vault, VaultSettings};
use vaultium_zk::{OwnershipProof, ProofEngine, ProofProtocol, SimulatedBackend};

fn vault() -> Vault {
    Vault::in_memory(
        "alice",
        ProofEngine::with_backend(Arc::new(SimulatedBackend::instant())),
        VaultSettings {
            chunk_size: 2048,
            ..VaultSettings::default()
        },
    )
    .unwrap()
}

async fn store(vault: &Vault, name: &str, content: &'static [u8]) -> String {
    vault
        .store_object(name, "text/plain", Bytes::from_static(content), None)
        .await
        .unwrap()
        .address
}

#[tokio::test]
async fn owner_proves_and_verifies() {
    let vault = vault();
    let address = store(&vault, "deed.txt", b"the deed to the house").await;

    let proof = vault
        .prove_ownership(&b"the deed to the house"[..], &address)
        .await
        .unwrap();
    assert_eq!(proof.protocol, ProofProtocol::Simulated);
    assert_eq!(vault.proof_protocol(), ProofProtocol::Simulated);

    // Survives the JSON wire form
    let proof = OwnershipProof::from_json(&proof.to_json().unwrap()).unwrap();
    assert!(vault.verify_ownership(proof, &address).await.unwrap());
}

#[tokio::test]
async fn wrong_content_produces_no_proof() {
    let vault = vault();
    let address = store(&vault, "deed.txt", b"the deed to the house").await;

    let err = vault
        .prove_ownership(&b"a forged deed"[..], &address)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::ConstraintUnsatisfied));
}

#[tokio::test]
async fn proof_does_not_transfer_to_another_object() {
    let vault = vault();
    let mine = store(&vault, "mine", b"mine").await;
    let theirs = store(&vault, "theirs", b"theirs").await;

    let proof = vault.prove_ownership(&b"mine"[..], &mine).await.unwrap();
    assert!(!vault.verify_ownership(proof, &theirs).await.unwrap());
}

#[tokio::test]
async fn proving_from_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("deed.txt");
    std::fs::write(&path, b"on disk").unwrap();

    let vault = vault();
    let receipt = vault.store_file(&path, None, None).await.unwrap();
    let proof = vault.prove_file(&path, &receipt.address).await.unwrap();
    assert!(vault.verify_ownership(proof, &receipt.address).await.unwrap());

    let err = vault
        .prove_file(&tmp.path().join("gone"), &receipt.address)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InputRead(_)));
}

#[tokio::test]
async fn proving_against_unknown_object_fails_fetch() {
    let vault = vault();
    let err = vault
        .prove_ownership(&b"x"[..], &"a".repeat(64))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::ManifestFetch { .. }));
}

#[tokio::test]
async fn share_roundtrip() {
    let vault = vault();
    let address = store(&vault, "photo.txt", b"a picture, in words").await;
    let bob = generate_identity();

    let record = vault.share_object(&address, &bob.recipient).await.unwrap();
    assert_eq!(record.address, address);
    assert_eq!(record.from, "alice");
    assert_eq!(record.to, bob.recipient);
    assert_eq!(record.descriptor.name, "photo.txt");
    assert_eq!(record.descriptor.size, 19);
    assert!(record.envelope.contains("BEGIN AGE ENCRYPTED FILE"));

    let listed = vault.shared_with(&bob.recipient).await.unwrap();
    assert_eq!(listed, vec![record.clone()]);

    let retrieved = vault.retrieve_shared(&record, &bob.secret, None).await.unwrap();
    assert_eq!(retrieved.content, "a picture, in words");
}

#[tokio::test]
async fn sharing_twice_is_a_no_op() {
    let vault = vault();
    let address = store(&vault, "once", b"once").await;
    let bob = generate_identity();

    let first = vault.share_object(&address, &bob.recipient).await.unwrap();
    let second = vault.share_object(&address, &bob.recipient).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(vault.shared_with(&bob.recipient).await.unwrap().len(), 1);
}

#[tokio::test]
async fn wrong_identity_cannot_open_share() {
    let vault = vault();
    let address = store(&vault, "private", b"for bob only").await;
    let bob = generate_identity();
    let eve = generate_identity();

    let record = vault.share_object(&address, &bob.recipient).await.unwrap();
    let err = vault.retrieve_shared(&record, &eve.secret, None).await.unwrap_err();
    assert!(matches!(err, VaultError::Custody(_)), "got {err:?}");

    let err = vault
        .retrieve_shared(&record, &SecretString::from("not an identity".to_string()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidKey(_)));
}

#[tokio::test]
async fn invalid_recipient_is_rejected() {
    let vault = vault();
    let address = store(&vault, "x", b"x").await;
    let err = vault.share_object(&address, "bob@example.com").await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidKey(_)));
}

#[tokio::test]
async fn nothing_shared_lists_empty() {
    let vault = vault();
    let carol = generate_identity();
    assert!(vault.shared_with(&carol.recipient).await.unwrap().is_empty());
}

#[cfg(feature = "groth16")]
mod groth16 {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vaultium_zk::groth16::generate_keys;
    use vaultium_zk::Groth16Backend;

    #[tokio::test]
    async fn groth16_proof_for_stored_object() {
        let (pk, vk) = generate_keys(&mut StdRng::seed_from_u64(7)).unwrap();
        let engine = ProofEngine::with_backend(Arc::new(Groth16Backend::from_keys(pk, &vk).unwrap()));
        let vault = Vault::in_memory("alice", engine, VaultSettings::default()).unwrap();

        let address = store(&vault, "deed", b"real proof").await;
        let proof = vault.prove_ownership(&b"real proof"[..], &address).await.unwrap();
        assert_eq!(proof.protocol, ProofProtocol::Groth16);
        assert!(vault.verify_ownership(proof.clone(), &address).await.unwrap());

        let other = store(&vault, "other", b"someone else's").await;
        assert!(!vault.verify_ownership(proof, &other).await.unwrap());
    }
}
