//! vaultium-zk: ownership proofs
//!
//! A proof shows that the prover holds content whose digest equals a public
//! digest. Two interchangeable backends sit behind [`ProofBackend`]:
//!
//! - `groth16` (feature `groth16`, on by default): Groth16 over BN254,
//!   needs `ownership.pk` / `ownership.vk` artifacts
//! - `simulated`: checks the statement in the clear and emits a labelled
//!   placeholder; used when the artifacts are missing
//!
//! [`ProofEngine::probe`] picks one at runtime; [`ProofSession`] tracks a
//! single attempt through its states.

#[cfg(feature = "groth16")]
pub mod circuit;
pub mod engine;
#[cfg(feature = "groth16")]
pub mod groth16;
pub mod proof;
pub mod session;
pub mod simulated;

pub use engine::{ProofBackend, ProofEngine};
pub use proof::{OwnershipProof, ProofProtocol};
pub use session::{ProofSession, ProofState};
pub use simulated::SimulatedBackend;

#[cfg(feature = "groth16")]
pub use groth16::{setup_artifacts, ArtifactPaths, Groth16Backend};
