//! R1CS ownership circuit over BN254
//!
//! Each 32-byte digest becomes two 128-bit big-endian limbs, which fit in
//! the scalar field without reduction. Public inputs are the public
//! digest's limbs; the witness limbs must equal them.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError};

use vaultium_chunks::ContentDigest;
use vaultium_core::{VaultError, VaultResult};

pub const LIMBS: usize = 2;

pub fn digest_limbs(digest: &ContentDigest) -> [Fr; LIMBS] {
    let bytes = digest.as_bytes();
    [
        Fr::from_be_bytes_mod_order(&bytes[..16]),
        Fr::from_be_bytes_mod_order(&bytes[16..]),
    ]
}

/// Statement: the prover knows limbs equal to the public digest's limbs.
///
/// Both assignments are `None` during key generation.
#[derive(Clone, Default)]
pub struct OwnershipCircuit {
    pub private_limbs: Option<[Fr; LIMBS]>,
    pub public_limbs: Option<[Fr; LIMBS]>,
}

impl OwnershipCircuit {
    pub fn new(private: &ContentDigest, public: &ContentDigest) -> Self {
        Self {
            private_limbs: Some(digest_limbs(private)),
            public_limbs: Some(digest_limbs(public)),
        }
    }
}

impl ConstraintSynthesizer<Fr> for OwnershipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        for i in 0..LIMBS {
            let public = FpVar::new_input(cs.clone(), || {
                self.public_limbs
                    .map(|l| l[i])
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
            let private = FpVar::new_witness(cs.clone(), || {
                self.private_limbs
                    .map(|l| l[i])
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
            private.enforce_equal(&public)?;
        }
        Ok(())
    }
}

/// Synthesize the circuit locally and fail if the assignment violates it.
pub fn check_satisfied(circuit: OwnershipCircuit) -> VaultResult<()> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| anyhow::anyhow!("synthesizing ownership circuit: {e}"))?;
    let satisfied = cs
        .is_satisfied()
        .map_err(|e| anyhow::anyhow!("checking ownership circuit: {e}"))?;
    if !satisfied {
        return Err(VaultError::ConstraintUnsatisfied);
    }
    Ok(())
}
