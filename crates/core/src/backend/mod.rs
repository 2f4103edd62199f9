//! Proving and verification backends
//!
//! The Groth16 algorithms themselves live outside this crate. The traits
//! below are the seam the orchestrator and verifier call through; each call
//! is a single blocking operation. [`SnarkjsBackend`] drives the `snarkjs`
//! command-line tool.

pub mod snarkjs;

use std::path::Path;

use crate::circuit::proof::{Groth16Proof, PublicSignals, VerificationKey};
use crate::error::Result;
use crate::witness::WitnessHandle;

pub use snarkjs::SnarkjsBackend;

/// Turns a witness and proving key into a proof and its public signals
pub trait ProvingBackend: Send + Sync {
    fn prove(
        &self,
        proving_key: &Path,
        witness: &WitnessHandle,
    ) -> Result<(Groth16Proof, PublicSignals)>;
}

/// Checks a proof against a verification key
///
/// `Ok(false)` means the backend ran and rejected the proof; `Err` means no
/// answer could be obtained.
pub trait VerificationBackend: Send + Sync {
    fn verify(
        &self,
        key: &VerificationKey,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<bool>;
}
