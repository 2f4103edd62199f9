//! Groth16 proof payloads, public signals and verification keys
//!
//! A generated proof is stored in the container shape
//!
//! ```json
//! { "proof": { "pi_a": [..], "pi_b": [[..]], "pi_c": [..] },
//!   "publicSignals": ["1"],
//!   "metadata": { "circuit": "license", ... } }
//! ```
//!
//! which [`ProofReconciler`](crate::circuit::verifier::ProofReconciler)
//! accepts directly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::circuit::descriptor::{CircuitId, PublicSignalSchema};
use crate::error::{PermisError, Result};

/// Fields a Groth16 verification key must carry
pub const VERIFICATION_KEY_FIELDS: [&str; 4] =
    ["vk_alpha_1", "vk_beta_2", "vk_gamma_2", "vk_delta_2"];

/// The three pairing-group elements of a Groth16 proof, as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

/// Ordered public signals; meaning is fixed by the circuit's schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicSignals(Vec<String>);

impl PublicSignals {
    pub fn new(signals: Vec<String>) -> Self {
        PublicSignals(signals)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for PublicSignals {
    fn from(signals: Vec<String>) -> Self {
        PublicSignals(signals)
    }
}

/// The circuit's boolean answer, read from its claim signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretedClaim {
    pub label: String,
    pub value: bool,
}

impl InterpretedClaim {
    /// Read the claim signal named by `schema`; `"1"` is true, anything else false
    ///
    /// `None` if the schema has no claim signal or the signal list is too short.
    pub fn from_signals(schema: &PublicSignalSchema, signals: &PublicSignals) -> Option<Self> {
        let (index, spec) = schema.claim()?;
        let raw = signals.get(index)?;
        Some(InterpretedClaim {
            label: spec.label.to_string(),
            value: raw == "1",
        })
    }
}

/// Metadata wrapped around a freshly generated proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofMetadata {
    pub circuit: CircuitId,
    pub generated_at: DateTime<Utc>,
    pub generation_time_ms: u64,
    /// Hex SHA-256 commitment digest
    pub commitment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<InterpretedClaim>,
}

/// Proof, public signals and metadata, in the container shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProof {
    pub proof: Groth16Proof,
    #[serde(rename = "publicSignals")]
    pub public_signals: PublicSignals,
    pub metadata: ProofMetadata,
}

impl GeneratedProof {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)?;
        log::info!("✓ Proof written to {}", path.display());
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// A Groth16 verification key, opaque beyond its required fields
#[derive(Debug, Clone)]
pub struct VerificationKey {
    path: PathBuf,
    raw: serde_json::Value,
}

impl VerificationKey {
    /// Load and shape-check a verification key file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| PermisError::InvalidVerificationKey {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let raw: serde_json::Value =
            serde_json::from_str(&text).map_err(|err| PermisError::InvalidVerificationKey {
                path: path.to_path_buf(),
                reason: format!("not JSON: {}", err),
            })?;
        Self::from_value(path, raw)
    }

    /// Shape-check an already parsed key; `path` is used for diagnostics only
    pub fn from_value(path: impl Into<PathBuf>, raw: serde_json::Value) -> Result<Self> {
        let path = path.into();
        let object = raw.as_object().ok_or_else(|| PermisError::InvalidVerificationKey {
            path: path.clone(),
            reason: "expected a JSON object".to_string(),
        })?;

        let missing: Vec<&str> = VERIFICATION_KEY_FIELDS
            .iter()
            .copied()
            .filter(|field| object.get(*field).map_or(true, |value| !value.is_array()))
            .collect();
        if !missing.is_empty() {
            return Err(PermisError::InvalidVerificationKey {
                path,
                reason: format!("missing or malformed {}", missing.join(", ")),
            });
        }

        log::debug!("Loaded verification key {}", path.display());
        Ok(Self { path, raw })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::descriptor::CircuitDescriptor;
    use serde_json::json;

    fn sample_vk() -> serde_json::Value {
        json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": 1,
            "vk_alpha_1": ["1", "2", "1"],
            "vk_beta_2": [["1", "2"], ["3", "4"], ["1", "0"]],
            "vk_gamma_2": [["1", "2"], ["3", "4"], ["1", "0"]],
            "vk_delta_2": [["1", "2"], ["3", "4"], ["1", "0"]],
            "IC": [["1", "2", "1"], ["3", "4", "1"]]
        })
    }

    fn sample_proof() -> Groth16Proof {
        Groth16Proof {
            pi_a: vec!["1".into(), "2".into(), "1".into()],
            pi_b: vec![
                vec!["1".into(), "2".into()],
                vec!["3".into(), "4".into()],
                vec!["1".into(), "0".into()],
            ],
            pi_c: vec!["5".into(), "6".into(), "1".into()],
            protocol: Some("groth16".into()),
            curve: Some("bn128".into()),
        }
    }

    #[test]
    fn test_interpret_claim() {
        let schema = CircuitDescriptor::license("circuits").public_signals().clone();

        let yes = InterpretedClaim::from_signals(&schema, &PublicSignals::new(vec!["1".into()])).unwrap();
        assert_eq!(yes.label, "hasLicenseA");
        assert!(yes.value);

        let no = InterpretedClaim::from_signals(&schema, &PublicSignals::new(vec!["0".into()])).unwrap();
        assert!(!no.value);

        assert!(InterpretedClaim::from_signals(&schema, &PublicSignals::default()).is_none());
    }

    #[test]
    fn test_container_shape() {
        let generated = GeneratedProof {
            proof: sample_proof(),
            public_signals: PublicSignals::new(vec!["1".into()]),
            metadata: ProofMetadata {
                circuit: CircuitId::License,
                generated_at: Utc::now(),
                generation_time_ms: 42,
                commitment: "ab".repeat(32),
                claim: Some(InterpretedClaim {
                    label: "hasLicenseA".into(),
                    value: true,
                }),
            },
        };

        let value = serde_json::to_value(&generated).unwrap();
        assert_eq!(value["publicSignals"], json!(["1"]));
        assert_eq!(value["proof"]["pi_b"][2], json!(["1", "0"]));
        assert_eq!(value["metadata"]["circuit"], "license");
        assert!(value["metadata"]["generated_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof.json");
        let generated = GeneratedProof {
            proof: sample_proof(),
            public_signals: PublicSignals::new(vec!["0".into()]),
            metadata: ProofMetadata {
                circuit: CircuitId::Age18,
                generated_at: Utc::now(),
                generation_time_ms: 7,
                commitment: "00".repeat(32),
                claim: None,
            },
        };

        generated.write_to_file(&path).unwrap();
        assert_eq!(GeneratedProof::read_from_file(&path).unwrap(), generated);
    }

    #[test]
    fn test_verification_key_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verification_key.json");
        std::fs::write(&path, sample_vk().to_string()).unwrap();
        let key = VerificationKey::load(&path).unwrap();
        assert_eq!(key.as_json()["curve"], "bn128");

        let mut partial = sample_vk();
        partial.as_object_mut().unwrap().remove("vk_gamma_2");
        match VerificationKey::from_value("vk.json", partial) {
            Err(PermisError::InvalidVerificationKey { reason, .. }) => {
                assert!(reason.contains("vk_gamma_2"))
            }
            other => panic!("expected invalid key, got {:?}", other),
        }

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            VerificationKey::load(&path),
            Err(PermisError::InvalidVerificationKey { .. })
        ));
        assert!(matches!(
            VerificationKey::load(dir.path().join("absent.json")),
            Err(PermisError::InvalidVerificationKey { .. })
        ));
    }
}
