//! Proof verification
//!
//! Payloads arrive in two shapes:
//!
//! - a container `{ "proof": {..}, "publicSignals": [..] }` (what
//!   [`GeneratedProof`](crate::circuit::proof::GeneratedProof) writes);
//! - a bare proof `{ "pi_a": .., "pi_b": .., "pi_c": .. }`, whose public
//!   signals must be supplied separately.
//!
//! [`ProofReconciler`] turns either into a checked `(Groth16Proof,
//! PublicSignals)` pair. [`Verifier`] hands that pair to the verification
//! backend and reads the circuit's claim from the signals. The commitment is
//! never recomputed here.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::backend::VerificationBackend;
use crate::circuit::descriptor::{CircuitDescriptor, CircuitId};
use crate::circuit::proof::{Groth16Proof, InterpretedClaim, PublicSignals, VerificationKey};
use crate::error::{PermisError, Result};

/// Normalises and shape-checks proof payloads
pub struct ProofReconciler;

impl ProofReconciler {
    /// Extract the proof and its public signals from `payload`
    ///
    /// Signals carried by the payload take precedence over `supplied`.
    pub fn normalize(payload: &Value, supplied: Option<&Value>) -> Result<(Groth16Proof, PublicSignals)> {
        let object = payload
            .as_object()
            .ok_or_else(|| PermisError::format("payload", "JSON object", describe(payload)))?;

        let proof_value = match object.get("proof") {
            Some(inner) => inner,
            None if is_bare_proof(payload) => payload,
            None => {
                return Err(PermisError::format(
                    "payload",
                    "object with 'proof' or 'pi_a'/'pi_b'/'pi_c'",
                    format!("object with keys [{}]", keys(payload)),
                ))
            }
        };

        // A malformed proof outranks missing signals.
        let proof = Self::check_proof(proof_value)?;

        let signals_value = match object.get("publicSignals") {
            Some(embedded) => {
                if supplied.is_some() {
                    log::debug!("Payload carries its own public signals; ignoring supplied ones");
                }
                embedded
            }
            None => supplied.ok_or(PermisError::MissingPublicSignalsError)?,
        };

        let signals = Self::check_signals(signals_value)?;
        Ok((proof, signals))
    }

    /// Check the three pairing components and their element counts
    pub fn check_proof(value: &Value) -> Result<Groth16Proof> {
        let object = value
            .as_object()
            .ok_or_else(|| PermisError::format("proof", "JSON object", describe(value)))?;

        let pi_a = g1_point(object.get("pi_a"), "proof.pi_a")?;
        let pi_b = g2_point(object.get("pi_b"), "proof.pi_b")?;
        let pi_c = g1_point(object.get("pi_c"), "proof.pi_c")?;

        Ok(Groth16Proof {
            pi_a,
            pi_b,
            pi_c,
            protocol: object.get("protocol").and_then(Value::as_str).map(str::to_string),
            curve: object.get("curve").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Check a non-empty list of non-negative integers (strings or numbers)
    pub fn check_signals(value: &Value) -> Result<PublicSignals> {
        let items = value
            .as_array()
            .ok_or_else(|| PermisError::format("publicSignals", "array", describe(value)))?;
        if items.is_empty() {
            return Err(PermisError::format("publicSignals", "non-empty array", "empty array"));
        }

        let signals = items
            .iter()
            .enumerate()
            .map(|(i, item)| field_element(item, &format!("publicSignals[{}]", i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(PublicSignals::new(signals))
    }
}

fn is_bare_proof(payload: &Value) -> bool {
    ["pi_a", "pi_b", "pi_c"]
        .iter()
        .any(|key| payload.get(*key).is_some())
}

fn g1_point(value: Option<&Value>, location: &str) -> Result<Vec<String>> {
    let value = value.ok_or_else(|| PermisError::format(location, "array of 3 field elements", "nothing"))?;
    let items = value
        .as_array()
        .filter(|items| items.len() == 3)
        .ok_or_else(|| PermisError::format(location, "array of 3 field elements", describe(value)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| field_element(item, &format!("{}[{}]", location, i)))
        .collect()
}

fn g2_point(value: Option<&Value>, location: &str) -> Result<Vec<Vec<String>>> {
    let expected = "array of 3 pairs of field elements";
    let value = value.ok_or_else(|| PermisError::format(location, expected, "nothing"))?;
    let rows = value
        .as_array()
        .filter(|rows| rows.len() == 3)
        .ok_or_else(|| PermisError::format(location, expected, describe(value)))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<Vec<String>> {
            let row_location = format!("{}[{}]", location, i);
            let pair = row
                .as_array()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| PermisError::format(&row_location, "array of 2 field elements", describe(row)))?;
            pair.iter()
                .enumerate()
                .map(|(j, item)| field_element(item, &format!("{}[{}]", row_location, j)))
                .collect()
        })
        .collect()
}

/// A non-negative integer, as a decimal string or a JSON number
fn field_element(value: &Value, location: &str) -> Result<String> {
    match value {
        Value::String(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(text.clone())
        }
        Value::Number(number) if number.is_u64() => Ok(number.to_string()),
        other => Err(PermisError::format(location, "non-negative integer", describe(other))),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) if s.chars().count() > 32 => {
            format!("string \"{}...\"", s.chars().take(32).collect::<String>())
        }
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

fn keys(value: &Value) -> String {
    value
        .as_object()
        .map(|object| object.keys().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

/// Timing and shape details of one verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationDiagnostics {
    pub backend_time_ms: u64,
    pub signal_count: usize,
    pub schema_len: usize,
}

/// Outcome of a verification the backend answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub circuit: CircuitId,
    pub valid: bool,
    #[serde(rename = "publicSignals")]
    pub public_signals: PublicSignals,
    pub claim: Option<InterpretedClaim>,
    pub diagnostics: VerificationDiagnostics,
}

impl VerificationResult {
    /// Valid proof whose claim signal is true
    pub fn claim_holds(&self) -> bool {
        self.valid && self.claim.as_ref().map_or(false, |claim| claim.value)
    }
}

/// Checks proofs through a verification backend
#[derive(Clone)]
pub struct Verifier {
    backend: Arc<dyn VerificationBackend>,
}

impl Verifier {
    pub fn new(backend: Arc<dyn VerificationBackend>) -> Self {
        Self { backend }
    }

    /// Verify an already normalised proof against `descriptor`'s schema
    pub fn verify(
        &self,
        descriptor: &CircuitDescriptor,
        key: &VerificationKey,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<VerificationResult> {
        let schema = descriptor.public_signals();
        if signals.len() < schema.len() {
            return Err(PermisError::format(
                "publicSignals",
                format!("at least {} signals for {}", schema.len(), descriptor.id()),
                format!("{} signals", signals.len()),
            ));
        }

        log::debug!("Verifying {} proof with {} public signals", descriptor.id(), signals.len());
        let start = Instant::now();
        let valid = self.backend.verify(key, proof, signals)?;
        let elapsed = start.elapsed();

        let claim = InterpretedClaim::from_signals(schema, signals);
        if valid {
            log::info!("✓ Proof verified in {:.2?}", elapsed);
        } else {
            log::warn!("Proof rejected by the verification backend");
        }

        Ok(VerificationResult {
            circuit: descriptor.id(),
            valid,
            public_signals: signals.clone(),
            claim,
            diagnostics: VerificationDiagnostics {
                backend_time_ms: elapsed.as_millis() as u64,
                signal_count: signals.len(),
                schema_len: schema.len(),
            },
        })
    }

    /// Normalise a raw payload, then verify it
    pub fn verify_payload(
        &self,
        descriptor: &CircuitDescriptor,
        key: &VerificationKey,
        payload: &Value,
        supplied_signals: Option<&Value>,
    ) -> Result<VerificationResult> {
        let (proof, signals) = ProofReconciler::normalize(payload, supplied_signals)?;
        self.verify(descriptor, key, &proof, &signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bare() -> Value {
        json!({
            "pi_a": ["1", "2", "1"],
            "pi_b": [["1", "2"], ["3", "4"], ["1", "0"]],
            "pi_c": ["5", "6", "1"],
            "protocol": "groth16",
            "curve": "bn128"
        })
    }

    fn key() -> VerificationKey {
        VerificationKey::from_value(
            "vk.json",
            json!({
                "vk_alpha_1": ["1"],
                "vk_beta_2": [["1"]],
                "vk_gamma_2": [["1"]],
                "vk_delta_2": [["1"]]
            }),
        )
        .unwrap()
    }

    struct FixedBackend(Result<bool>);

    impl VerificationBackend for FixedBackend {
        fn verify(&self, _: &VerificationKey, _: &Groth16Proof, _: &PublicSignals) -> Result<bool> {
            match &self.0 {
                Ok(answer) => Ok(*answer),
                Err(err) => Err(PermisError::VerificationBackendError(err.to_string())),
            }
        }
    }

    #[test]
    fn test_container_shape() {
        let payload = json!({ "proof": bare(), "publicSignals": ["1"] });
        let (proof, signals) = ProofReconciler::normalize(&payload, None).unwrap();
        assert_eq!(proof.pi_b.len(), 3);
        assert_eq!(proof.protocol.as_deref(), Some("groth16"));
        assert_eq!(signals.as_slice(), &["1".to_string()]);
    }

    #[test]
    fn test_bare_proof_needs_signals() {
        assert!(matches!(
            ProofReconciler::normalize(&bare(), None),
            Err(PermisError::MissingPublicSignalsError)
        ));

        let (_, signals) = ProofReconciler::normalize(&bare(), Some(&json!([0, "1"]))).unwrap();
        assert_eq!(signals.as_slice(), &["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_container_without_signals_uses_supplied() {
        let payload = json!({ "proof": bare() });
        assert!(matches!(
            ProofReconciler::normalize(&payload, None),
            Err(PermisError::MissingPublicSignalsError)
        ));
        assert!(ProofReconciler::normalize(&payload, Some(&json!(["1"]))).is_ok());
    }

    #[test]
    fn test_missing_pi_b_is_format_error() {
        let mut proof = bare();
        proof.as_object_mut().unwrap().remove("pi_b");
        let payload = json!({ "proof": proof, "publicSignals": ["1"] });

        match ProofReconciler::normalize(&payload, None) {
            Err(PermisError::ProofFormatError { location, actual, .. }) => {
                assert_eq!(location, "proof.pi_b");
                assert_eq!(actual, "nothing");
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_pi_b_without_signals() {
        let mut proof = bare();
        proof.as_object_mut().unwrap().remove("pi_b");

        for payload in [proof.clone(), json!({ "proof": proof })] {
            match ProofReconciler::normalize(&payload, None) {
                Err(PermisError::ProofFormatError { location, .. }) => assert_eq!(location, "proof.pi_b"),
                other => panic!("expected format error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_element_count_shapes() {
        let mut short_a = bare();
        short_a["pi_a"] = json!(["1", "2"]);
        match ProofReconciler::check_proof(&short_a) {
            Err(PermisError::ProofFormatError { location, actual, .. }) => {
                assert_eq!(location, "proof.pi_a");
                assert_eq!(actual, "array of 2");
            }
            other => panic!("expected format error, got {:?}", other),
        }

        let mut bad_pair = bare();
        bad_pair["pi_b"][1] = json!(["3"]);
        match ProofReconciler::check_proof(&bad_pair) {
            Err(PermisError::ProofFormatError { location, .. }) => assert_eq!(location, "proof.pi_b[1]"),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_signal_values() {
        assert!(ProofReconciler::check_signals(&json!([])).is_err());
        assert!(ProofReconciler::check_signals(&json!(["-1"])).is_err());
        assert!(ProofReconciler::check_signals(&json!([1.5])).is_err());
        assert!(ProofReconciler::check_signals(&json!(["0x10"])).is_err());
        match ProofReconciler::check_signals(&json!(["1", "abc"])) {
            Err(PermisError::ProofFormatError { location, .. }) => assert_eq!(location, "publicSignals[1]"),
            other => panic!("expected format error, got {:?}", other),
        }
        assert_eq!(
            ProofReconciler::check_signals(&json!(["21888242871839275222246405745257275088548364400416034343698204186575808495617"]))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_non_proof_payloads() {
        assert!(ProofReconciler::normalize(&json!([1, 2]), None).is_err());
        match ProofReconciler::normalize(&json!({ "foo": 1 }), None) {
            Err(PermisError::ProofFormatError { actual, .. }) => assert!(actual.contains("foo")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_interprets_claim() {
        let descriptor = CircuitDescriptor::license("circuits");
        let verifier = Verifier::new(Arc::new(FixedBackend(Ok(true))));

        let payload = json!({ "proof": bare(), "publicSignals": ["1"] });
        let result = verifier.verify_payload(&descriptor, &key(), &payload, None).unwrap();
        assert!(result.valid);
        assert!(result.claim_holds());
        assert_eq!(result.claim.as_ref().unwrap().label, "hasLicenseA");

        let payload = json!({ "proof": bare(), "publicSignals": ["0"] });
        let result = verifier.verify_payload(&descriptor, &key(), &payload, None).unwrap();
        assert!(result.valid);
        assert!(!result.claim_holds());
    }

    #[test]
    fn test_backend_rejection_and_failure() {
        let descriptor = CircuitDescriptor::license("circuits");
        let payload = json!({ "proof": bare(), "publicSignals": ["1"] });

        let rejecting = Verifier::new(Arc::new(FixedBackend(Ok(false))));
        let result = rejecting.verify_payload(&descriptor, &key(), &payload, None).unwrap();
        assert!(!result.valid);
        assert!(!result.claim_holds());

        let failing = Verifier::new(Arc::new(FixedBackend(Err(
            PermisError::VerificationBackendError("pairing engine crashed".into()),
        ))));
        let err = failing.verify_payload(&descriptor, &key(), &payload, None).unwrap_err();
        assert_eq!(err.kind(), "verification_backend");
    }

    #[test]
    fn test_too_few_signals_for_schema() {
        let descriptor = CircuitDescriptor::age18("circuits");
        let verifier = Verifier::new(Arc::new(FixedBackend(Ok(true))));
        let payload = json!({ "proof": bare(), "publicSignals": ["1"] });

        let err = verifier.verify_payload(&descriptor, &key(), &payload, None).unwrap_err();
        assert_eq!(err.kind(), "proof_format");
    }
}
