//! Circuit orchestration
//!
//! Everything between holder attributes and the Groth16 backends:
//!
//! ## 1. Circuit selection
//! - `descriptor` - static description of each circuit (artifacts, widths, signal schema)
//! - `registry` - resolves a descriptor to its artifact files on disk
//!
//! ## 2. Encoding
//! - `encoding` - fixed-width circuit input
//! - `commitment` - SHA-256 commitment and its per-circuit projection
//!
//! ## 3. Proving
//! - `prover` - `ProofOrchestrator`, the validate → resolve → encode → witness → prove pipeline
//! - `proof` - proof payloads, public signals, verification keys
//!
//! ## 4. Verification
//! - `verifier` - payload normalisation and single-proof verification
//! - `batch` - verification of many proofs with an aggregated report

pub mod batch;
pub mod commitment;
pub mod descriptor;
pub mod encoding;
pub mod proof;
pub mod prover;
pub mod registry;
pub mod verifier;

pub use batch::{BatchItem, BatchReport, BatchVerificationReporter, ItemOutcome, ItemReport, LoadError};
pub use commitment::{check_encoded_commitment, compute_commitment, Commitment, ProjectedCommitment};
pub use descriptor::{ArtifactSlot, CircuitDescriptor, CircuitId, CommitmentEncoding, FieldWidths};
pub use encoding::{AttributeEncoder, EncodedInput};
pub use proof::{GeneratedProof, Groth16Proof, InterpretedClaim, ProofMetadata, PublicSignals, VerificationKey};
pub use prover::{ProofOrchestrator, ProofOutcome, ProofRun, ProofStage};
pub use registry::{ArtifactLocation, BundleStatus, CircuitRegistry, FileBundle};
pub use verifier::{ProofReconciler, VerificationResult, Verifier};
