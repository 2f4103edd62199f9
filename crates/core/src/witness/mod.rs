//! External witness computation
//!
//! The witness generator is an untrusted subprocess. [`bridge`] defines the
//! request/response boundary around it, [`process`] the bounded runner it
//! shares with the proving backend, and [`scratch`] the self-deleting
//! scratch files that keep concurrent invocations apart.

pub mod bridge;
pub mod process;
pub mod scratch;

pub use bridge::{WitnessHandle, WitnessProcessBridge, WitnessRequest};
pub use process::CapturedOutput;
pub use scratch::ScratchFile;
