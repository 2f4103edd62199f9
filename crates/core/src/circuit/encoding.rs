//! Fixed-width encoding of credential attributes into circuit input
//!
//! Strings become arrays of character codes, right-padded with zeros to the
//! declared width. Dates are carried as their literal ten characters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::circuit::commitment::{compute_commitment, Commitment, ProjectedCommitment};
use crate::circuit::descriptor::{CircuitDescriptor, CommitmentEncoding, FieldWidths};
use crate::credential::{ClaimInput, ValidatedCredential};
use crate::error::{PermisError, Result};

/// Circuit input object, serialised as the witness executable's JSON input
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedInput {
    pub name: Vec<u32>,
    pub surname: Vec<u32>,
    pub dob: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub nonce: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<ProjectedCommitment>,
}

impl fmt::Debug for EncodedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedInput")
            .field("name_width", &self.name.len())
            .field("surname_width", &self.surname.len())
            .field("has_category", &self.category.is_some())
            .field("has_expiration", &self.expiration.is_some())
            .field("has_age", &self.age.is_some())
            .field("has_commitment", &self.commitment.is_some())
            .finish()
    }
}

impl EncodedInput {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Output of one encoding pass: the circuit input plus the commitment it embeds
#[derive(Debug, Clone)]
pub struct Encoded {
    pub input: EncodedInput,
    pub commitment: Commitment,
}

/// Encodes validated credentials for a particular circuit
#[derive(Debug, Clone, Copy)]
pub struct AttributeEncoder {
    widths: FieldWidths,
    commitment_encoding: CommitmentEncoding,
}

impl AttributeEncoder {
    pub fn new(widths: FieldWidths, commitment_encoding: CommitmentEncoding) -> Self {
        Self {
            widths,
            commitment_encoding,
        }
    }

    pub fn for_circuit(descriptor: &CircuitDescriptor) -> Self {
        Self::new(*descriptor.widths(), descriptor.commitment_encoding())
    }

    pub fn widths(&self) -> &FieldWidths {
        &self.widths
    }

    pub fn commitment_encoding(&self) -> CommitmentEncoding {
        self.commitment_encoding
    }

    /// Encode a credential; width overflow is an error, never a truncation
    pub fn encode(&self, credential: &ValidatedCredential) -> Result<Encoded> {
        let widths = &self.widths;

        let name = encode_text("name", &credential.name, widths.name)?;
        let surname = encode_text("surname", &credential.surname, widths.surname)?;
        let dob = encode_text("dob", &credential.date_of_birth, widths.date)?;
        let nonce = encode_text("nonce", credential.nonce.as_str(), widths.nonce)?;

        let (category, age) = match credential.claim {
            ClaimInput::License(category) => (Some(category.code()), None),
            ClaimInput::Age(age) => (None, Some(age)),
        };

        let expiration = match &credential.expires_on {
            Some(expires_on) => Some(encode_text("expiration", expires_on, widths.date)?),
            None => None,
        };

        let commitment = compute_commitment(credential, widths)?;

        let input = EncodedInput {
            name,
            surname,
            dob,
            category,
            expiration,
            age,
            nonce,
            commitment: commitment.project(self.commitment_encoding),
        };

        log::debug!(
            "Encoded input: widths name={} surname={}, commitment {:?}",
            input.name.len(),
            input.surname.len(),
            self.commitment_encoding
        );

        Ok(Encoded { input, commitment })
    }
}

/// Character codes of `value`, zero-padded on the right to `width`
pub fn encode_text(field: &'static str, value: &str, width: usize) -> Result<Vec<u32>> {
    let len = value.chars().count();
    if len > width {
        return Err(PermisError::overflow(field, width, len));
    }
    let mut codes: Vec<u32> = value.chars().map(|c| c as u32).collect();
    codes.resize(width, 0);
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::commitment::check_encoded_commitment;
    use crate::credential::CredentialAttributes;
    use chrono::NaiveDate;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn license_credential() -> (CircuitDescriptor, ValidatedCredential) {
        let descriptor = CircuitDescriptor::license("circuits");
        let credential = CredentialAttributes::new("Jean", "Durand", "2000-01-01")
            .with_license("A")
            .with_nonce("x7Tr9sP0")
            .validate(&descriptor, as_of())
            .unwrap();
        (descriptor, credential)
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("name", "AB", 4).unwrap(), vec![65, 66, 0, 0]);
        assert_eq!(encode_text("name", "ABCD", 4).unwrap(), vec![65, 66, 67, 68]);
        let err = encode_text("name", "ABCDE", 4).unwrap_err();
        assert!(matches!(err, PermisError::EncodingError { field: "name", .. }));
    }

    #[test]
    fn test_encode_license_input() {
        let (descriptor, credential) = license_credential();
        let encoded = AttributeEncoder::for_circuit(&descriptor).encode(&credential).unwrap();

        assert_eq!(encoded.input.name.len(), 32);
        assert_eq!(&encoded.input.name[..4], &[74, 101, 97, 110]);
        assert_eq!(encoded.input.dob.len(), 10);
        assert_eq!(encoded.input.dob[4], '-' as u32);
        assert_eq!(encoded.input.category, Some(65));
        assert_eq!(encoded.input.age, None);
        match &encoded.input.commitment {
            Some(ProjectedCommitment::Bits(bits)) => assert_eq!(bits.len(), 256),
            other => panic!("unexpected commitment shape: {:?}", other),
        }
    }

    #[test]
    fn test_encode_age_input() {
        let descriptor = CircuitDescriptor::age18("circuits");
        let credential = CredentialAttributes::new("Jean", "Durand", "2000-01-01")
            .with_nonce("x7Tr9sP0")
            .validate(&descriptor, as_of())
            .unwrap();

        let encoded = AttributeEncoder::for_circuit(&descriptor).encode(&credential).unwrap();
        assert_eq!(encoded.input.age, Some(25));
        assert_eq!(encoded.input.category, None);
        assert!(matches!(encoded.input.commitment, Some(ProjectedCommitment::Halves(_))));

        let json: serde_json::Value = serde_json::from_str(&encoded.input.to_json().unwrap()).unwrap();
        assert!(json.get("category").is_none());
        assert_eq!(json["age"], 25);
        assert!(json["commitment"][0].is_string());
    }

    #[test]
    fn test_encoder_rejects_overflow_with_narrow_widths() {
        let (_, credential) = license_credential();
        let widths = FieldWidths {
            surname: 5,
            ..FieldWidths::default()
        };
        let err = AttributeEncoder::new(widths, CommitmentEncoding::Unused)
            .encode(&credential)
            .unwrap_err();
        assert!(matches!(err, PermisError::EncodingError { field: "surname", .. }));
    }

    #[test]
    fn test_encoded_commitment_is_consistent() {
        let (descriptor, credential) = license_credential();
        let encoded = AttributeEncoder::for_circuit(&descriptor).encode(&credential).unwrap();

        let recomputed = check_encoded_commitment(
            &encoded.input,
            &credential,
            descriptor.widths(),
            descriptor.commitment_encoding(),
        )
        .unwrap();
        assert_eq!(recomputed, encoded.commitment);

        // Tampered projection is caught
        let mut tampered = encoded.input.clone();
        if let Some(ProjectedCommitment::Bits(bits)) = tampered.commitment.as_mut() {
            bits[0] ^= 1;
        }
        assert!(check_encoded_commitment(
            &tampered,
            &credential,
            descriptor.widths(),
            descriptor.commitment_encoding(),
        )
        .is_err());
    }

    #[test]
    fn test_expiration_encoded_for_license_only() {
        let descriptor = CircuitDescriptor::license("circuits");
        let credential = CredentialAttributes::new("Jean", "Durand", "2000-01-01")
            .with_license("C")
            .with_expiration("2032-05-17")
            .with_nonce("x7Tr9sP0")
            .validate(&descriptor, as_of())
            .unwrap();
        let encoded = AttributeEncoder::for_circuit(&descriptor).encode(&credential).unwrap();
        assert_eq!(encoded.input.expiration.as_ref().map(Vec::len), Some(10));
    }
}
