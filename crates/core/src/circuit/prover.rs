//! Proof generation
//!
//! A proof attempt walks a fixed sequence of stages:
//!
//! ```text
//! Idle → ValidatingInput → ResolvingFiles → Encoding → AwaitingWitness → Proving → Completed
//!                                                                                 ↘ Failed
//! ```
//!
//! Any stage may fail; the attempt then ends in `Failed` carrying the error
//! raised by that stage, untouched. Nothing is retried.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use permis_core::backend::SnarkjsBackend;
//! use permis_core::circuit::{CircuitId, ProofOrchestrator};
//! use permis_core::config::PermisConfig;
//! use permis_core::credential::CredentialAttributes;
//!
//! let config = PermisConfig::default();
//! let orchestrator = ProofOrchestrator::from_config(
//!     &config,
//!     Arc::new(SnarkjsBackend::from_config(&config)),
//! );
//!
//! let attributes = CredentialAttributes::new("Jean", "Durand", "2000-01-01").with_license("A");
//! let proof = orchestrator.prove(CircuitId::License, &attributes)?;
//! println!("hasLicenseA = {:?}", proof.metadata.claim);
//! # Ok::<(), permis_core::error::PermisError>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};

use crate::backend::ProvingBackend;
use crate::circuit::commitment::check_encoded_commitment;
use crate::circuit::descriptor::{ArtifactSlot, CircuitId};
use crate::circuit::encoding::AttributeEncoder;
use crate::circuit::proof::{GeneratedProof, InterpretedClaim, ProofMetadata};
use crate::circuit::registry::CircuitRegistry;
use crate::config::PermisConfig;
use crate::credential::CredentialAttributes;
use crate::error::{PermisError, Result};
use crate::witness::WitnessProcessBridge;

/// Stage of a proof attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStage {
    Idle,
    ValidatingInput,
    ResolvingFiles,
    Encoding,
    AwaitingWitness,
    Proving,
    Completed,
    Failed,
}

impl fmt::Display for ProofStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProofStage::Idle => "idle",
            ProofStage::ValidatingInput => "validating input",
            ProofStage::ResolvingFiles => "resolving files",
            ProofStage::Encoding => "encoding",
            ProofStage::AwaitingWitness => "awaiting witness",
            ProofStage::Proving => "proving",
            ProofStage::Completed => "completed",
            ProofStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal state of a proof attempt
#[derive(Debug)]
pub enum ProofOutcome {
    Completed(GeneratedProof),
    Failed(PermisError),
}

/// A finished proof attempt and the stages it went through
#[derive(Debug)]
pub struct ProofRun {
    pub stages: Vec<ProofStage>,
    pub outcome: ProofOutcome,
}

impl ProofRun {
    /// Last stage reached before the terminal one
    pub fn last_active_stage(&self) -> ProofStage {
        self.stages
            .iter()
            .rev()
            .copied()
            .find(|stage| !matches!(stage, ProofStage::Completed | ProofStage::Failed))
            .unwrap_or(ProofStage::Idle)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ProofOutcome::Completed(_))
    }

    pub fn into_result(self) -> Result<GeneratedProof> {
        match self.outcome {
            ProofOutcome::Completed(proof) => Ok(proof),
            ProofOutcome::Failed(err) => Err(err),
        }
    }
}

/// Drives validation, encoding, witness computation and proving
pub struct ProofOrchestrator {
    registry: CircuitRegistry,
    bridge: WitnessProcessBridge,
    backend: Arc<dyn ProvingBackend>,
    reference_date: Option<NaiveDate>,
}

impl ProofOrchestrator {
    pub fn new(
        registry: CircuitRegistry,
        bridge: WitnessProcessBridge,
        backend: Arc<dyn ProvingBackend>,
    ) -> Self {
        Self {
            registry,
            bridge,
            backend,
            reference_date: None,
        }
    }

    pub fn from_config(config: &PermisConfig, backend: Arc<dyn ProvingBackend>) -> Self {
        Self::new(
            CircuitRegistry::from_config(config),
            WitnessProcessBridge::from_config(config),
            backend,
        )
    }

    /// Compute ages against `date` instead of today
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    /// Generate a proof, returning only the terminal result
    pub fn prove(&self, circuit: CircuitId, attributes: &CredentialAttributes) -> Result<GeneratedProof> {
        self.run(circuit, attributes).into_result()
    }

    /// Generate a proof, keeping the stage trace
    pub fn run(&self, circuit: CircuitId, attributes: &CredentialAttributes) -> ProofRun {
        let mut stages = vec![ProofStage::Idle];

        let outcome = match self.drive(circuit, attributes, &mut stages) {
            Ok(proof) => {
                stages.push(ProofStage::Completed);
                ProofOutcome::Completed(proof)
            }
            Err(err) => {
                let stage = stages.last().copied().unwrap_or(ProofStage::Idle);
                log::warn!("Proof generation for {} failed while {}: {}", circuit, stage, err);
                stages.push(ProofStage::Failed);
                ProofOutcome::Failed(err)
            }
        };

        ProofRun { stages, outcome }
    }

    fn drive(
        &self,
        circuit: CircuitId,
        attributes: &CredentialAttributes,
        stages: &mut Vec<ProofStage>,
    ) -> Result<GeneratedProof> {
        let start = Instant::now();
        let mut enter = |stage: ProofStage| {
            log::debug!("{}: {}", circuit, stage);
            stages.push(stage);
        };

        // Step 1: Validate attributes (no I/O)
        enter(ProofStage::ValidatingInput);
        let descriptor = self.registry.descriptor(circuit)?;
        let as_of = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let credential = attributes.validate(descriptor, as_of)?;
        log::info!("✓ Attributes validated for {}", descriptor.name());

        // Step 2: Resolve a complete artifact bundle
        enter(ProofStage::ResolvingFiles);
        let bundle = self.registry.resolve(descriptor);
        bundle.ensure_complete()?;
        log::info!("✓ Resolved {}", bundle.status());

        // Step 3: Encode and cross-check the commitment
        enter(ProofStage::Encoding);
        let encoded = AttributeEncoder::for_circuit(descriptor).encode(&credential)?;
        check_encoded_commitment(
            &encoded.input,
            &credential,
            descriptor.widths(),
            descriptor.commitment_encoding(),
        )?;
        log::info!("✓ Computed commitment: {}", encoded.commitment.to_hex());

        // Step 4: External witness computation
        enter(ProofStage::AwaitingWitness);
        let witness = self.bridge.compute_for_input(
            bundle.require(ArtifactSlot::Wasm)?,
            bundle.require(ArtifactSlot::WitnessExecutable)?,
            &encoded.input,
        )?;

        // Step 5: Proving backend
        enter(ProofStage::Proving);
        let (proof, public_signals) = self
            .backend
            .prove(bundle.require(ArtifactSlot::ProvingKey)?, &witness)?;

        let schema = descriptor.public_signals();
        if public_signals.len() < schema.len() {
            return Err(PermisError::format(
                "publicSignals",
                format!("at least {} signals", schema.len()),
                format!("{} signals", public_signals.len()),
            ));
        }

        let claim = InterpretedClaim::from_signals(schema, &public_signals);
        let duration = start.elapsed();
        log::info!("✓ Proof generated in {:.2?}", duration);
        if let Some(claim) = &claim {
            log::info!("✓ {} = {}", claim.label, claim.value);
        }

        Ok(GeneratedProof {
            proof,
            public_signals,
            metadata: ProofMetadata {
                circuit,
                generated_at: Utc::now(),
                generation_time_ms: duration.as_millis() as u64,
                commitment: encoded.commitment.to_hex(),
                claim,
            },
        })
    }
}
