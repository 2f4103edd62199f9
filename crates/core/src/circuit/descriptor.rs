//! Static description of the circuits this layer can drive.
//!
//! A [`CircuitDescriptor`] is built once and never mutated. It names the
//! files a circuit needs, how wide each encoded attribute is, how the
//! commitment digest is projected into circuit inputs, and what each public
//! signal means.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::credential::LicenseCategory;
use crate::error::{PermisError, Result};

/// Age the adult circuit checks against
pub const ADULT_AGE: u32 = 18;

/// Identifier of a supported circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitId {
    /// Driving-license category possession
    License,
    /// Holder is at least 18
    Age18,
}

impl CircuitId {
    pub const ALL: [CircuitId; 2] = [CircuitId::License, CircuitId::Age18];

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitId::License => "license",
            CircuitId::Age18 => "age18",
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = PermisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "license" | "permis" => Ok(CircuitId::License),
            "age18" | "age" => Ok(CircuitId::Age18),
            other => Err(PermisError::validation(
                "circuit",
                format!("unknown circuit '{}' (expected license or age18)", other),
            )),
        }
    }
}

/// One of the four files a circuit bundle needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactSlot {
    Wasm,
    ProvingKey,
    VerificationKey,
    WitnessExecutable,
}

impl ArtifactSlot {
    pub const ALL: [ArtifactSlot; 4] = [
        ArtifactSlot::Wasm,
        ArtifactSlot::ProvingKey,
        ArtifactSlot::VerificationKey,
        ArtifactSlot::WitnessExecutable,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ArtifactSlot::Wasm => "wasm",
            ArtifactSlot::ProvingKey => "provingKey",
            ArtifactSlot::VerificationKey => "verificationKey",
            ArtifactSlot::WitnessExecutable => "witnessExecutable",
        }
    }

    fn index(&self) -> usize {
        match self {
            ArtifactSlot::Wasm => 0,
            ArtifactSlot::ProvingKey => 1,
            ArtifactSlot::VerificationKey => 2,
            ArtifactSlot::WitnessExecutable => 3,
        }
    }
}

impl fmt::Display for ArtifactSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared widths, in characters, of each fixed-width encoded field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWidths {
    pub name: usize,
    pub surname: usize,
    pub date: usize,
    pub nonce: usize,
}

impl Default for FieldWidths {
    fn default() -> Self {
        Self {
            name: 32,
            surname: 32,
            date: 10,
            nonce: crate::credential::NONCE_LEN,
        }
    }
}

/// How the 32-byte commitment digest is handed to the circuit
///
/// The circuit variants in use disagree on this, so it is chosen per
/// descriptor rather than globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentEncoding {
    /// 256 input bits, most significant bit of each byte first
    BitArray256,
    /// Two big-endian 128-bit integers `(high, low)`
    SplitU128,
    /// Simplified circuits that take no commitment input
    Unused,
}

/// Meaning of one public signal position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMeaning {
    /// `1` iff the holder's license covers this category
    HasLicenseCategory(LicenseCategory),
    /// `1` iff the holder's age is at least this many years
    AgeAtLeast(u32),
    /// High 128 bits of the commitment digest
    CommitmentHigh,
    /// Low 128 bits of the commitment digest
    CommitmentLow,
}

impl SignalMeaning {
    /// Whether this signal is the circuit's boolean answer
    pub fn is_claim(&self) -> bool {
        matches!(
            self,
            SignalMeaning::HasLicenseCategory(_) | SignalMeaning::AgeAtLeast(_)
        )
    }
}

/// A labelled public signal position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSpec {
    pub label: &'static str,
    pub meaning: SignalMeaning,
}

/// Ordered meaning of a circuit's public signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSignalSchema {
    signals: Vec<SignalSpec>,
}

impl PublicSignalSchema {
    pub fn new(signals: Vec<SignalSpec>) -> Self {
        Self { signals }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SignalSpec> {
        self.signals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalSpec> {
        self.signals.iter()
    }

    /// Position and spec of the boolean claim signal
    pub fn claim(&self) -> Option<(usize, &SignalSpec)> {
        self.signals
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.meaning.is_claim())
    }
}

/// Immutable configuration record for one circuit
#[derive(Debug, Clone)]
pub struct CircuitDescriptor {
    id: CircuitId,
    name: String,
    base_dir: PathBuf,
    candidates: [Vec<String>; 4],
    widths: FieldWidths,
    commitment_encoding: CommitmentEncoding,
    public_signals: PublicSignalSchema,
}

impl CircuitDescriptor {
    /// Built-in descriptor for `id`, with its base directory under `circuits_root`
    pub fn builtin(id: CircuitId, circuits_root: impl AsRef<Path>) -> Self {
        match id {
            CircuitId::License => Self::license(circuits_root),
            CircuitId::Age18 => Self::age18(circuits_root),
        }
    }

    /// Driving license category A circuit
    pub fn license(circuits_root: impl AsRef<Path>) -> Self {
        Self::new(
            CircuitId::License,
            "Driving license category",
            circuits_root.as_ref().join(CircuitId::License.as_str()),
            [
                strings(&["license.wasm", "permis.wasm", "license_js/license.wasm"]),
                strings(&["license_final.zkey", "license_0001.zkey", "license.zkey"]),
                strings(&["verification_key.json", "license_verification_key.json"]),
                strings(&["generate_witness", "generate_witness.sh", "license_js/generate_witness"]),
            ],
            FieldWidths::default(),
            CommitmentEncoding::BitArray256,
            PublicSignalSchema::new(vec![SignalSpec {
                label: "hasLicenseA",
                meaning: SignalMeaning::HasLicenseCategory(LicenseCategory::A),
            }]),
        )
    }

    /// Adult (18+) circuit
    pub fn age18(circuits_root: impl AsRef<Path>) -> Self {
        Self::new(
            CircuitId::Age18,
            "Age 18 or over",
            circuits_root.as_ref().join(CircuitId::Age18.as_str()),
            [
                strings(&["age18.wasm", "age_check.wasm", "age18_js/age18.wasm"]),
                strings(&["age18_final.zkey", "age18_0001.zkey", "age18.zkey"]),
                strings(&["verification_key.json", "age18_verification_key.json"]),
                strings(&["generate_witness", "generate_witness.sh", "age18_js/generate_witness"]),
            ],
            FieldWidths::default(),
            CommitmentEncoding::SplitU128,
            PublicSignalSchema::new(vec![
                SignalSpec {
                    label: "isAdult",
                    meaning: SignalMeaning::AgeAtLeast(ADULT_AGE),
                },
                SignalSpec {
                    label: "commitmentHigh",
                    meaning: SignalMeaning::CommitmentHigh,
                },
                SignalSpec {
                    label: "commitmentLow",
                    meaning: SignalMeaning::CommitmentLow,
                },
            ]),
        )
    }

    pub fn new(
        id: CircuitId,
        name: impl Into<String>,
        base_dir: PathBuf,
        candidates: [Vec<String>; 4],
        widths: FieldWidths,
        commitment_encoding: CommitmentEncoding,
        public_signals: PublicSignalSchema,
    ) -> Self {
        log::debug!(
            "Circuit '{}' projects its commitment as {:?}",
            id,
            commitment_encoding
        );
        Self {
            id,
            name: name.into(),
            base_dir,
            candidates,
            widths,
            commitment_encoding,
            public_signals,
        }
    }

    /// Same circuit with a different commitment projection (simplified variants)
    pub fn with_commitment_encoding(mut self, encoding: CommitmentEncoding) -> Self {
        log::debug!("Circuit '{}' overridden to {:?}", self.id, encoding);
        self.commitment_encoding = encoding;
        self
    }

    /// Same circuit with different declared field widths
    pub fn with_widths(mut self, widths: FieldWidths) -> Self {
        self.widths = widths;
        self
    }

    pub fn id(&self) -> CircuitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Candidate filenames for a slot, primary first
    pub fn candidates(&self, slot: ArtifactSlot) -> &[String] {
        &self.candidates[slot.index()]
    }

    pub fn widths(&self) -> &FieldWidths {
        &self.widths
    }

    pub fn commitment_encoding(&self) -> CommitmentEncoding {
        self.commitment_encoding
    }

    pub fn public_signals(&self) -> &PublicSignalSchema {
        &self.public_signals
    }

    /// Minimum age checked by this circuit, if it is an age circuit
    pub fn age_threshold(&self) -> Option<u32> {
        self.public_signals.iter().find_map(|spec| match spec.meaning {
            SignalMeaning::AgeAtLeast(age) => Some(age),
            _ => None,
        })
    }

    /// Whether this circuit encodes a license category
    pub fn uses_license_category(&self) -> bool {
        self.public_signals
            .iter()
            .any(|spec| matches!(spec.meaning, SignalMeaning::HasLicenseCategory(_)))
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_id_parse() {
        assert_eq!("license".parse::<CircuitId>().unwrap(), CircuitId::License);
        assert_eq!("AGE18".parse::<CircuitId>().unwrap(), CircuitId::Age18);
        assert!("passport".parse::<CircuitId>().is_err());
    }

    #[test]
    fn test_license_descriptor() {
        let descriptor = CircuitDescriptor::license("/srv/circuits");
        assert_eq!(descriptor.base_dir(), Path::new("/srv/circuits/license"));
        assert_eq!(descriptor.candidates(ArtifactSlot::Wasm)[0], "license.wasm");
        assert_eq!(descriptor.commitment_encoding(), CommitmentEncoding::BitArray256);
        assert!(descriptor.uses_license_category());
        assert_eq!(descriptor.age_threshold(), None);

        let (index, spec) = descriptor.public_signals().claim().unwrap();
        assert_eq!(index, 0);
        assert_eq!(spec.label, "hasLicenseA");
    }

    #[test]
    fn test_age_descriptor() {
        let descriptor = CircuitDescriptor::age18("circuits");
        assert_eq!(descriptor.age_threshold(), Some(18));
        assert!(!descriptor.uses_license_category());
        assert_eq!(descriptor.commitment_encoding(), CommitmentEncoding::SplitU128);
        assert_eq!(descriptor.public_signals().len(), 3);
    }

    #[test]
    fn test_simplified_variant() {
        let descriptor =
            CircuitDescriptor::license("circuits").with_commitment_encoding(CommitmentEncoding::Unused);
        assert_eq!(descriptor.commitment_encoding(), CommitmentEncoding::Unused);
        assert_eq!(descriptor.id(), CircuitId::License);
    }
}
