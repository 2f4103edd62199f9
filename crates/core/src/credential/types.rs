//! Data structures for holder credential attributes

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::circuit::descriptor::CircuitDescriptor;
use crate::credential::Nonce;
use crate::error::{PermisError, Result};

/// Attributes supplied by the holder for one proof
///
/// Plain strings as entered; [`CredentialAttributes::validate`] turns them
/// into a [`ValidatedCredential`] for a given circuit.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialAttributes {
    /// Given name
    pub name: String,

    /// Family name
    pub surname: String,

    /// Date of birth in YYYY-MM-DD format
    #[serde(alias = "dob")]
    pub date_of_birth: String,

    /// License category (A, B or C), for the license circuit
    #[serde(default, alias = "license")]
    pub license_category: Option<String>,

    /// License expiration in YYYY-MM-DD format
    #[serde(default)]
    pub expires_on: Option<String>,

    /// Fixed nonce; a fresh one is drawn per proof when absent
    #[serde(default)]
    pub nonce: Option<String>,
}

impl fmt::Debug for CredentialAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAttributes")
            .field("name_len", &self.name.chars().count())
            .field("surname_len", &self.surname.chars().count())
            .field("license_category", &self.license_category)
            .field("has_expiration", &self.expires_on.is_some())
            .field("has_nonce", &self.nonce.is_some())
            .finish()
    }
}

impl CredentialAttributes {
    pub fn new(
        name: impl Into<String>,
        surname: impl Into<String>,
        date_of_birth: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            date_of_birth: date_of_birth.into(),
            license_category: None,
            expires_on: None,
            nonce: None,
        }
    }

    pub fn with_license(mut self, category: impl Into<String>) -> Self {
        self.license_category = Some(category.into());
        self
    }

    pub fn with_expiration(mut self, expires_on: impl Into<String>) -> Self {
        self.expires_on = Some(expires_on.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Check every attribute against `descriptor` before any I/O happens
    ///
    /// `as_of` is the reference date for the age computation.
    pub fn validate(
        &self,
        descriptor: &CircuitDescriptor,
        as_of: NaiveDate,
    ) -> Result<ValidatedCredential> {
        let widths = descriptor.widths();

        check_text("name", &self.name, widths.name)?;
        check_text("surname", &self.surname, widths.surname)?;

        let date_of_birth = parse_calendar_date("date_of_birth", &self.date_of_birth)?;
        if date_of_birth > as_of {
            return Err(PermisError::validation(
                "date_of_birth",
                "lies in the future",
            ));
        }

        // Only the license circuit commits to an expiration date.
        let expires_on = match &self.expires_on {
            Some(text) if descriptor.uses_license_category() => {
                parse_calendar_date("expires_on", text)?;
                Some(text.clone())
            }
            _ => None,
        };

        let claim = if descriptor.uses_license_category() {
            let raw = self.license_category.as_deref().ok_or_else(|| {
                PermisError::validation("license_category", "required for the license circuit")
            })?;
            ClaimInput::License(raw.parse()?)
        } else {
            let age = age_on(date_of_birth, as_of);
            let age = u32::try_from(age).map_err(|_| {
                PermisError::validation("age", format!("{} is not a non-negative integer", age))
            })?;
            ClaimInput::Age(age)
        };

        let nonce = match &self.nonce {
            Some(value) => Nonce::parse(value)?,
            None => Nonce::generate(),
        };

        Ok(ValidatedCredential {
            name: self.name.clone(),
            surname: self.surname.clone(),
            date_of_birth: self.date_of_birth.clone(),
            claim,
            expires_on,
            nonce,
        })
    }
}

/// The circuit-specific part of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimInput {
    License(LicenseCategory),
    Age(u32),
}

/// Attributes that passed validation for one circuit, with their nonce fixed
#[derive(Clone)]
pub struct ValidatedCredential {
    pub name: String,
    pub surname: String,
    /// Calendar-checked YYYY-MM-DD text
    pub date_of_birth: String,
    pub claim: ClaimInput,
    pub expires_on: Option<String>,
    pub nonce: Nonce,
}

impl ValidatedCredential {
    /// Category letter, or the empty string for circuits without one
    pub fn category_text(&self) -> String {
        match self.claim {
            ClaimInput::License(category) => category.as_char().to_string(),
            ClaimInput::Age(_) => String::new(),
        }
    }
}

impl fmt::Debug for ValidatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedCredential")
            .field("claim", &self.claim)
            .field("has_expiration", &self.expires_on.is_some())
            .finish()
    }
}

/// Driving-license category accepted by the license circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseCategory {
    A,
    B,
    C,
}

impl LicenseCategory {
    pub fn as_char(&self) -> char {
        match self {
            LicenseCategory::A => 'A',
            LicenseCategory::B => 'B',
            LicenseCategory::C => 'C',
        }
    }

    /// Character code handed to the circuit
    pub fn code(&self) -> u32 {
        self.as_char() as u32
    }
}

impl fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for LicenseCategory {
    type Err = PermisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(LicenseCategory::A),
            "B" => Ok(LicenseCategory::B),
            "C" => Ok(LicenseCategory::C),
            other => Err(PermisError::validation(
                "license_category",
                format!("'{}' is not one of A, B, C", other),
            )),
        }
    }
}

/// Parse a strict `YYYY-MM-DD` string that names a real calendar day
pub fn parse_calendar_date(field: &'static str, text: &str) -> Result<NaiveDate> {
    let bytes = text.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(PermisError::validation(field, "expected YYYY-MM-DD"));
    }

    // All ASCII digits at these positions, so the slices parse.
    let year: i32 = text[0..4].parse().map_err(|_| PermisError::validation(field, "bad year"))?;
    let month: u32 = text[5..7].parse().map_err(|_| PermisError::validation(field, "bad month"))?;
    let day: u32 = text[8..10].parse().map_err(|_| PermisError::validation(field, "bad day"))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| PermisError::validation(field, format!("{} is not a calendar date", text)))
}

/// Age in whole years on `as_of`
pub fn age_on(date_of_birth: NaiveDate, as_of: NaiveDate) -> i64 {
    let mut age = (as_of.year() - date_of_birth.year()) as i64;

    // Birthday not reached yet this year
    if as_of.month() < date_of_birth.month()
        || (as_of.month() == date_of_birth.month() && as_of.day() < date_of_birth.day())
    {
        age -= 1;
    }

    age
}

fn check_text(field: &'static str, value: &str, width: usize) -> Result<()> {
    if value.is_empty() {
        return Err(PermisError::validation(field, "must not be empty"));
    }
    let len = value.chars().count();
    if len > width {
        return Err(PermisError::validation(
            field,
            format!("{} characters exceed width {}", len, width),
        ));
    }
    if value.contains('\0') {
        return Err(PermisError::validation(field, "must not contain NUL"));
    }
    Ok(())
}
