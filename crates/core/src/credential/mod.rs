//! Holder-supplied credential attributes and their validation

mod nonce;
mod types;

pub use nonce::{Nonce, NONCE_LEN};
pub use types::{
    age_on, parse_calendar_date, ClaimInput, CredentialAttributes, LicenseCategory,
    ValidatedCredential,
};
