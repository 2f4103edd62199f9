//! Commitment to holder attributes
//!
//! The commitment binds the private attributes to a public value:
//!
//! ```text
//! SHA-256( pad(name) || pad(surname) || dob || category || expiration? || nonce )
//! ```
//!
//! where `pad` right-fills with U+0000 up to the circuit's declared width and
//! the hash runs over the UTF-8 bytes of the whole string. The 32-byte
//! digest is then projected into whatever shape the circuit takes (see
//! [`CommitmentEncoding`]). Every recomputation, including the check made
//! before the witness process runs, goes through [`compute_commitment`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::circuit::descriptor::{CommitmentEncoding, FieldWidths};
use crate::circuit::encoding::EncodedInput;
use crate::credential::ValidatedCredential;
use crate::error::{PermisError, Result};

/// SHA-256 commitment digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Commitment(digest)
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 256 bits, digest byte order, most significant bit of each byte first
    pub fn bits(&self) -> Vec<u8> {
        self.0
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
            .collect()
    }

    /// Big-endian `(high, low)` 128-bit halves
    pub fn halves(&self) -> (u128, u128) {
        let mut high = [0u8; 16];
        let mut low = [0u8; 16];
        high.copy_from_slice(&self.0[..16]);
        low.copy_from_slice(&self.0[16..]);
        (u128::from_be_bytes(high), u128::from_be_bytes(low))
    }

    /// Shape handed to a circuit with the given encoding
    pub fn project(&self, encoding: CommitmentEncoding) -> Option<ProjectedCommitment> {
        match encoding {
            CommitmentEncoding::BitArray256 => Some(ProjectedCommitment::Bits(self.bits())),
            CommitmentEncoding::SplitU128 => {
                let (high, low) = self.halves();
                Some(ProjectedCommitment::Halves([high.to_string(), low.to_string()]))
            }
            CommitmentEncoding::Unused => None,
        }
    }
}

/// Commitment as it appears in the circuit input JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectedCommitment {
    /// 256 values, each 0 or 1
    Bits(Vec<u8>),
    /// Decimal strings of the high and low halves
    Halves([String; 2]),
}

/// Right-pad `value` with U+0000 to `width` characters
///
/// Fails rather than truncating when `value` is longer than `width`.
pub fn pad_to_width(field: &'static str, value: &str, width: usize) -> Result<String> {
    let len = value.chars().count();
    if len > width {
        return Err(PermisError::overflow(field, width, len));
    }
    let mut padded = String::with_capacity(value.len() + (width - len));
    padded.push_str(value);
    padded.extend(std::iter::repeat('\0').take(width - len));
    Ok(padded)
}

/// The exact string that gets hashed
pub fn canonical_string(credential: &ValidatedCredential, widths: &FieldWidths) -> Result<String> {
    let mut canonical = String::new();
    canonical.push_str(&pad_to_width("name", &credential.name, widths.name)?);
    canonical.push_str(&pad_to_width("surname", &credential.surname, widths.surname)?);
    canonical.push_str(&credential.date_of_birth);
    canonical.push_str(&credential.category_text());
    if let Some(expires_on) = &credential.expires_on {
        canonical.push_str(expires_on);
    }
    canonical.push_str(credential.nonce.as_str());
    Ok(canonical)
}

/// Compute the commitment to a validated credential and its nonce
pub fn compute_commitment(
    credential: &ValidatedCredential,
    widths: &FieldWidths,
) -> Result<Commitment> {
    let canonical = canonical_string(credential, widths)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();

    let commitment = Commitment(digest);
    log::debug!("Commitment computed: {}", commitment.to_hex());
    Ok(commitment)
}

/// Recompute the commitment and check it against what `encoded` carries
///
/// Returns the recomputed commitment on success. Inputs without a
/// commitment (the `Unused` encoding) always match.
pub fn check_encoded_commitment(
    encoded: &EncodedInput,
    credential: &ValidatedCredential,
    widths: &FieldWidths,
    encoding: CommitmentEncoding,
) -> Result<Commitment> {
    let commitment = compute_commitment(credential, widths)?;
    let expected = commitment.project(encoding);

    if encoded.commitment != expected {
        return Err(PermisError::EncodingError {
            field: "commitment",
            reason: format!(
                "encoded input does not match recomputed {:?} commitment {}",
                encoding,
                commitment.to_hex()
            ),
        });
    }
    Ok(commitment)
}
