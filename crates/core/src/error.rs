//! Error types for the permis core library

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::circuit::descriptor::{ArtifactSlot, CircuitId};
use crate::witness::CapturedOutput;

/// Result type alias for permis operations
pub type Result<T> = std::result::Result<T, PermisError>;

/// Error types that can occur while encoding, proving or verifying
///
/// Every stage forwards these unchanged; nothing upstream rewraps a
/// lower-layer variant into a more generic one.
#[derive(Error, Debug)]
pub enum PermisError {
    /// Malformed or out-of-domain attribute
    #[error("invalid {field}: {reason}")]
    ValidationError { field: &'static str, reason: String },

    /// The circuit's artifact bundle is incomplete
    #[error("circuit '{circuit}' is missing artifacts: {}", join_slots(.missing))]
    MissingArtifactError {
        circuit: CircuitId,
        missing: Vec<ArtifactSlot>,
    },

    /// A field does not fit its declared width, or the encoded input is inconsistent
    #[error("cannot encode {field}: {reason}")]
    EncodingError { field: &'static str, reason: String },

    /// The witness executable could not be found
    #[error("witness executable not found: {}", .path.display())]
    WitnessExecutableNotFound { path: PathBuf },

    /// The witness process ran past its deadline and was killed
    #[error("witness computation timed out after {timeout:?}")]
    WitnessTimeout {
        timeout: Duration,
        diagnostics: CapturedOutput,
    },

    /// The witness process finished but left no usable output file
    #[error("witness output {} is {state}", .path.display())]
    WitnessOutputEmptyOrAbsent {
        path: PathBuf,
        state: OutputState,
        diagnostics: CapturedOutput,
    },

    /// The witness process failed for any other reason
    #[error("witness process failed: {failure}")]
    WitnessProcessError {
        failure: WitnessFailure,
        diagnostics: CapturedOutput,
    },

    /// The proving backend failed
    #[error("proving backend failed: {0}")]
    ProvingBackendError(String),

    /// A proof payload or public signal list has the wrong shape
    #[error("malformed proof at {location}: expected {expected}, found {actual}")]
    ProofFormatError {
        location: String,
        expected: String,
        actual: String,
    },

    /// A bare proof was supplied without public signals
    #[error("proof carries no public signals and none were supplied")]
    MissingPublicSignalsError,

    /// Verification key missing, unreadable or lacking required fields
    #[error("invalid verification key {}: {reason}", .path.display())]
    InvalidVerificationKey { path: PathBuf, reason: String },

    /// The verification backend could not give an answer
    #[error("verification backend failed: {0}")]
    VerificationBackendError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PermisError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        PermisError::ValidationError {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(field: &'static str, width: usize, actual: usize) -> Self {
        PermisError::EncodingError {
            field,
            reason: format!("{} characters exceed width {}", actual, width),
        }
    }

    pub(crate) fn format(
        location: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        PermisError::ProofFormatError {
            location: location.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PermisError::ValidationError { .. } => "validation",
            PermisError::MissingArtifactError { .. } => "missing_artifact",
            PermisError::EncodingError { .. } => "encoding",
            PermisError::WitnessExecutableNotFound { .. } => "witness_executable_not_found",
            PermisError::WitnessTimeout { .. } => "witness_timeout",
            PermisError::WitnessOutputEmptyOrAbsent { .. } => "witness_output",
            PermisError::WitnessProcessError { .. } => "witness_process",
            PermisError::ProvingBackendError(_) => "proving_backend",
            PermisError::ProofFormatError { .. } => "proof_format",
            PermisError::MissingPublicSignalsError => "missing_public_signals",
            PermisError::InvalidVerificationKey { .. } => "invalid_verification_key",
            PermisError::VerificationBackendError(_) => "verification_backend",
            PermisError::IoError(_) => "io",
            PermisError::JsonError(_) => "json",
        }
    }
}

/// State of a witness output file that failed the non-empty check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Absent,
    Empty,
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputState::Absent => f.write_str("absent"),
            OutputState::Empty => f.write_str("empty"),
        }
    }
}

/// Why a witness process failed, when it was neither missing nor timed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessFailure {
    /// Exited with a non-zero status
    NonZeroExit(i32),
    /// Killed by a signal
    Signalled(i32),
    /// The OS or the child ran out of file descriptors
    ResourceExhausted,
    /// Spawning failed for a reason other than a missing executable
    Spawn(String),
}

impl fmt::Display for WitnessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WitnessFailure::NonZeroExit(code) => write!(f, "exited with status {}", code),
            WitnessFailure::Signalled(signal) => write!(f, "terminated by signal {}", signal),
            WitnessFailure::ResourceExhausted => f.write_str("too many open files"),
            WitnessFailure::Spawn(reason) => write!(f, "could not start: {}", reason),
        }
    }
}

fn join_slots(slots: &[ArtifactSlot]) -> String {
    slots
        .iter()
        .map(|slot| slot.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PermisError::MissingPublicSignalsError;
        assert_eq!(
            err.to_string(),
            "proof carries no public signals and none were supplied"
        );

        let err = PermisError::MissingArtifactError {
            circuit: CircuitId::License,
            missing: vec![ArtifactSlot::ProvingKey, ArtifactSlot::WitnessExecutable],
        };
        let text = err.to_string();
        assert!(text.contains("license"));
        assert!(text.contains("provingKey, witnessExecutable"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PermisError = io_err.into();
        assert!(matches!(err, PermisError::IoError(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_witness_failure_display() {
        assert_eq!(WitnessFailure::NonZeroExit(3).to_string(), "exited with status 3");
        assert_eq!(WitnessFailure::ResourceExhausted.to_string(), "too many open files");
        assert_eq!(OutputState::Empty.to_string(), "empty");
    }
}
