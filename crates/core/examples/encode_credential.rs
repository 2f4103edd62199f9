//! Example: Encode a credential for the license circuit
//!
//! Usage:
//!   cargo run --example encode_credential -- <name> <surname> <dob> <category> [nonce]

use chrono::Utc;
use permis_core::circuit::{AttributeEncoder, CircuitDescriptor};
use permis_core::credential::CredentialAttributes;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 5 {
        eprintln!("Usage: {} <name> <surname> <dob> <category> [nonce]", args[0]);
        eprintln!("Example: {} Jean Durand 2000-01-01 A x7Tr9sP0", args[0]);
        std::process::exit(1);
    }

    let mut attributes = CredentialAttributes::new(&args[1], &args[2], &args[3]).with_license(&args[4]);
    if let Some(nonce) = args.get(5) {
        attributes = attributes.with_nonce(nonce);
    }

    let descriptor = CircuitDescriptor::license("circuits");
    let credential = match attributes.validate(&descriptor, Utc::now().date_naive()) {
        Ok(credential) => credential,
        Err(e) => {
            eprintln!("❌ Invalid credential: {}", e);
            std::process::exit(1);
        }
    };

    match AttributeEncoder::for_circuit(&descriptor).encode(&credential) {
        Ok(encoded) => {
            println!("✅ Encoded for the {} circuit", descriptor.id());
            println!();
            println!("🔐 Commitment: {}", encoded.commitment.to_hex());
            println!("   Nonce:      {}", credential.nonce.as_str());
            println!();
            match encoded.input.to_json() {
                Ok(json) => println!("📋 Witness input:\n{}", json),
                Err(e) => eprintln!("❌ Could not serialise input: {}", e),
            }
        }
        Err(e) => {
            eprintln!("❌ Encoding failed: {}", e);
            std::process::exit(1);
        }
    }
}
