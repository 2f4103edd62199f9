//! Permis Core Library
//!
//! This library orchestrates zero-knowledge proofs over driving-license
//! credentials: it resolves circuit artifacts, canonically encodes and
//! commits to holder attributes, drives the external witness generator,
//! and hands witnesses and proofs to a Groth16 backend.

pub mod backend;
pub mod circuit;
pub mod config;
pub mod credential;
pub mod error;
pub mod witness;

pub use config::PermisConfig;
pub use error::{PermisError, Result};
