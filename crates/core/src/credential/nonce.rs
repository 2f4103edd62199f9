use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{PermisError, Result};

/// Length of a commitment nonce
pub const NONCE_LEN: usize = 8;

/// Single-use random salt mixed into a commitment
///
/// Two proofs over identical attributes get different commitments unless the
/// caller pins the nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Fresh 8-character alphanumeric nonce
    pub fn generate() -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        Nonce(value)
    }

    /// Caller-supplied nonce, for deterministic runs
    pub fn parse(value: &str) -> Result<Self> {
        if value.chars().count() != NONCE_LEN {
            return Err(PermisError::validation(
                "nonce",
                format!("must be {} characters, got {}", NONCE_LEN, value.chars().count()),
            ));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PermisError::validation("nonce", "must be alphanumeric"));
        }
        Ok(Nonce(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Kept out of logs and debug output.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(********)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let nonce = Nonce::generate();
        assert_eq!(nonce.as_str().len(), NONCE_LEN);
        assert!(nonce.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_nonces_differ() {
        let a = Nonce::generate();
        let b = Nonce::generate();
        // 62^8 possibilities
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Nonce::parse("x7Tr9sP0").unwrap().as_str(), "x7Tr9sP0");
        assert!(Nonce::parse("short").is_err());
        assert!(Nonce::parse("x7Tr9sP0x").is_err());
        assert!(Nonce::parse("x7Tr-sP0").is_err());
    }

    #[test]
    fn test_debug_hides_value() {
        let nonce = Nonce::parse("x7Tr9sP0").unwrap();
        assert!(!format!("{:?}", nonce).contains("x7Tr9sP0"));
    }
}
