//! Backend driving the `snarkjs` CLI
//!
//! ```text
//! snarkjs groth16 prove  <circuit.zkey> <witness.wtns> <proof.json> <public.json>
//! snarkjs groth16 verify <verification_key.json> <public.json> <proof.json>
//! ```
//!
//! Every file handed to or produced by snarkjs is a scratch file, removed
//! when the call returns.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{ProvingBackend, VerificationBackend};
use crate::circuit::proof::{Groth16Proof, PublicSignals, VerificationKey};
use crate::config::PermisConfig;
use crate::error::{PermisError, Result};
use crate::witness::process::{run_bounded, ProcessExit, ProcessOutcome, SpawnFailure};
use crate::witness::{ScratchFile, WitnessHandle};

/// Marker snarkjs prints when a pairing check fails
const INVALID_PROOF_MARKER: &str = "Invalid proof";

/// Groth16 prover and verifier backed by the `snarkjs` command
#[derive(Debug, Clone)]
pub struct SnarkjsBackend {
    command: PathBuf,
    timeout: Duration,
    capture_limit: usize,
    scratch_dir: PathBuf,
}

impl SnarkjsBackend {
    pub fn new(
        command: impl Into<PathBuf>,
        timeout: Duration,
        capture_limit: usize,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            timeout,
            capture_limit,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn from_config(config: &PermisConfig) -> Self {
        Self::new(
            config.snarkjs_command.clone(),
            config.backend_timeout(),
            config.capture_limit_bytes,
            config.scratch_dir.clone(),
        )
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn run(&self, args: &[&OsStr]) -> std::result::Result<ProcessOutcome, String> {
        run_bounded(&self.command, args, self.timeout, self.capture_limit).map_err(|failure| {
            match failure {
                SpawnFailure::NotFound => format!("{} not found", self.command.display()),
                SpawnFailure::ResourceExhausted => "too many open files".to_string(),
                SpawnFailure::Other(reason) => reason,
            }
        })
    }
}

impl ProvingBackend for SnarkjsBackend {
    fn prove(
        &self,
        proving_key: &Path,
        witness: &WitnessHandle,
    ) -> Result<(Groth16Proof, PublicSignals)> {
        let witness_file = ScratchFile::create(&self.scratch_dir, "snarkjs-witness", "wtns", witness.bytes())?;
        let proof_file = ScratchFile::allocate(&self.scratch_dir, "snarkjs-proof", "json");
        let public_file = ScratchFile::allocate(&self.scratch_dir, "snarkjs-public", "json");

        log::info!("Running snarkjs groth16 prove");
        let outcome = self
            .run(&[
                OsStr::new("groth16"),
                OsStr::new("prove"),
                proving_key.as_os_str(),
                witness_file.path().as_os_str(),
                proof_file.path().as_os_str(),
                public_file.path().as_os_str(),
            ])
            .map_err(PermisError::ProvingBackendError)?;

        match outcome.exit {
            ProcessExit::Exited(0) => {}
            ProcessExit::TimedOut => {
                return Err(PermisError::ProvingBackendError(format!(
                    "snarkjs prove timed out after {:?}",
                    self.timeout
                )))
            }
            other => {
                return Err(PermisError::ProvingBackendError(format!(
                    "snarkjs prove {}: {}",
                    describe_exit(other),
                    outcome.output.stderr_tail(500)
                )))
            }
        }

        let proof: Groth16Proof = read_json(&proof_file, "proof")?;
        let signals: Vec<String> = read_json(&public_file, "public signals")?;

        log::info!("✓ snarkjs produced a proof with {} public signals in {:.2?}", signals.len(), outcome.elapsed);
        Ok((proof, PublicSignals::new(signals)))
    }
}

impl VerificationBackend for SnarkjsBackend {
    fn verify(
        &self,
        key: &VerificationKey,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<bool> {
        let backend_err = |err: serde_json::Error| PermisError::VerificationBackendError(err.to_string());

        let key_file = ScratchFile::create(
            &self.scratch_dir,
            "snarkjs-vk",
            "json",
            serde_json::to_string(key.as_json()).map_err(backend_err)?.as_bytes(),
        )?;
        let public_file = ScratchFile::create(
            &self.scratch_dir,
            "snarkjs-public",
            "json",
            serde_json::to_string(signals).map_err(backend_err)?.as_bytes(),
        )?;
        let proof_file = ScratchFile::create(
            &self.scratch_dir,
            "snarkjs-proof",
            "json",
            serde_json::to_string(proof).map_err(backend_err)?.as_bytes(),
        )?;

        let outcome = self
            .run(&[
                OsStr::new("groth16"),
                OsStr::new("verify"),
                key_file.path().as_os_str(),
                public_file.path().as_os_str(),
                proof_file.path().as_os_str(),
            ])
            .map_err(PermisError::VerificationBackendError)?;

        let rejected = outcome.output.stdout.contains(INVALID_PROOF_MARKER)
            || outcome.output.stderr.contains(INVALID_PROOF_MARKER);

        match outcome.exit {
            ProcessExit::Exited(0) if !rejected => Ok(true),
            ProcessExit::Exited(_) if rejected => Ok(false),
            ProcessExit::TimedOut => Err(PermisError::VerificationBackendError(format!(
                "snarkjs verify timed out after {:?}",
                self.timeout
            ))),
            other => Err(PermisError::VerificationBackendError(format!(
                "snarkjs verify {}: {}",
                describe_exit(other),
                outcome.output.stderr_tail(500)
            ))),
        }
    }
}

fn describe_exit(exit: ProcessExit) -> String {
    match exit {
        ProcessExit::Exited(code) => format!("exited with status {}", code),
        ProcessExit::Signalled(signal) => format!("terminated by signal {}", signal),
        ProcessExit::TimedOut => "timed out".to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(file: &ScratchFile, what: &str) -> Result<T> {
    let bytes = file.read().map_err(|err| {
        PermisError::ProvingBackendError(format!("snarkjs wrote no {}: {}", what, err))
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        PermisError::ProvingBackendError(format!("unreadable {} from snarkjs: {}", what, err))
    })
}
