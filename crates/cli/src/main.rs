//! CLI tool for Permis Zero-Knowledge Proofs
//!
//! Non-interactive front-end over `permis_core`: circuit status, commitments,
//! license and age proofs, single and batch verification.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use permis_core::backend::SnarkjsBackend;
use permis_core::circuit::{
    compute_commitment, ArtifactSlot, BatchItem, BatchVerificationReporter, CircuitId,
    CircuitRegistry, ItemOutcome, ProofOrchestrator, ProofOutcome, VerificationKey, Verifier,
};
use permis_core::credential::CredentialAttributes;
use permis_core::PermisConfig;

#[derive(Parser)]
#[command(name = "permis-zk")]
#[command(about = "Zero-Knowledge Proofs for driving-license credentials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per circuit
    #[arg(long, global = true)]
    circuits_dir: Option<PathBuf>,

    /// Witness computation timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which circuit artifacts were found
    Status {
        /// Circuit to inspect (license, age18); all circuits if omitted
        #[arg(short, long)]
        circuit: Option<CircuitId>,
    },

    /// Compute the attribute commitment without proving
    Commitment {
        #[command(flatten)]
        holder: HolderArgs,

        /// License category (A, B, C); omit for the age circuit
        #[arg(short, long)]
        license: Option<String>,

        /// License expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,
    },

    /// Prove possession of license category A
    ProveLicense {
        #[command(flatten)]
        holder: HolderArgs,

        /// License category (A, B, C)
        #[arg(short, long)]
        license: String,

        /// License expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,

        /// Output file for proof
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Prove being 18 or over
    ProveAge {
        #[command(flatten)]
        holder: HolderArgs,

        /// Output file for proof
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify a proof file
    Verify {
        /// Path to proof file (container or bare proof)
        #[arg(short, long)]
        proof: PathBuf,

        /// Circuit the proof was generated for
        #[arg(short, long, default_value = "license")]
        circuit: CircuitId,

        /// Public signals file, for bare proofs
        #[arg(short = 's', long)]
        public_signals: Option<PathBuf>,

        /// Verification key; resolved from the circuit directory if omitted
        #[arg(short = 'k', long)]
        verification_key: Option<PathBuf>,
    },

    /// Verify many proof files and print a report
    VerifyBatch {
        /// Proof files
        #[arg(required = true)]
        proofs: Vec<PathBuf>,

        /// Circuit the proofs were generated for
        #[arg(short, long, default_value = "license")]
        circuit: CircuitId,

        /// Verification key; resolved from the circuit directory if omitted
        #[arg(short = 'k', long)]
        verification_key: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show example usage
    Examples,
}

#[derive(clap::Args)]
struct HolderArgs {
    /// Given name
    #[arg(short, long)]
    name: String,

    /// Surname
    #[arg(long)]
    surname: String,

    /// Date of birth (YYYY-MM-DD)
    #[arg(short, long)]
    dob: String,

    /// Fixed 8-character nonce (random if omitted)
    #[arg(long)]
    nonce: Option<String>,
}

impl HolderArgs {
    fn attributes(&self) -> CredentialAttributes {
        let attributes = CredentialAttributes::new(&self.name, &self.surname, &self.dob);
        match &self.nonce {
            Some(nonce) => attributes.with_nonce(nonce),
            None => attributes,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Status { circuit } => cmd_status(&config, circuit),
        Commands::Commitment { holder, license, expires } => {
            cmd_commitment(&config, holder, license, expires)
        }
        Commands::ProveLicense { holder, license, expires, output } => {
            let mut attributes = holder.attributes().with_license(license);
            if let Some(expires) = expires {
                attributes = attributes.with_expiration(expires);
            }
            cmd_prove(&config, CircuitId::License, attributes, output)
        }
        Commands::ProveAge { holder, output } => {
            cmd_prove(&config, CircuitId::Age18, holder.attributes(), output)
        }
        Commands::Verify { proof, circuit, public_signals, verification_key } => {
            cmd_verify(&config, proof, circuit, public_signals, verification_key)
        }
        Commands::VerifyBatch { proofs, circuit, verification_key, json } => {
            cmd_verify_batch(&config, proofs, circuit, verification_key, json)
        }
        Commands::Examples => cmd_examples(),
    }
}

fn load_config(cli: &Cli) -> Result<PermisConfig> {
    let mut config = match &cli.config {
        Some(path) => PermisConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PermisConfig::default(),
    };
    if let Some(dir) = &cli.circuits_dir {
        config.circuits_root = dir.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.witness_timeout_secs = timeout;
    }
    Ok(config)
}

fn cmd_status(config: &PermisConfig, circuit: Option<CircuitId>) -> Result<()> {
    println!("📦 Circuit artifacts under {}", config.circuits_root.display());
    println!();

    let registry = CircuitRegistry::from_config(config);
    let ids = match circuit {
        Some(id) => vec![id],
        None => CircuitId::ALL.to_vec(),
    };

    for id in ids {
        let descriptor = registry.descriptor(id)?;
        let bundle = registry.resolve(descriptor);
        let marker = if bundle.is_complete() { "✅" } else { "❌" };
        println!("{} {} ({})", marker, bundle.status(), descriptor.name());
        for slot in ArtifactSlot::ALL {
            match bundle.path(slot) {
                Some(path) => println!("   {:<18} {}", slot.name(), path.display()),
                None => println!(
                    "   {:<18} missing (tried {})",
                    slot.name(),
                    descriptor.candidates(slot).join(", ")
                ),
            }
        }
        println!();
    }
    Ok(())
}

fn cmd_commitment(
    config: &PermisConfig,
    holder: HolderArgs,
    license: Option<String>,
    expires: Option<String>,
) -> Result<()> {
    let circuit = if license.is_some() { CircuitId::License } else { CircuitId::Age18 };
    let registry = CircuitRegistry::from_config(config);
    let descriptor = registry.descriptor(circuit)?;

    let mut attributes = holder.attributes();
    if let Some(license) = license {
        attributes = attributes.with_license(license);
    }
    if let Some(expires) = expires {
        attributes = attributes.with_expiration(expires);
    }

    let credential = attributes.validate(descriptor, chrono::Utc::now().date_naive())?;
    let commitment = compute_commitment(&credential, descriptor.widths())?;
    let (high, low) = commitment.halves();

    println!("🔐 Commitment for the {} circuit", circuit);
    println!();
    println!("SHA-256: {}", commitment.to_hex());
    println!("High:    {}", high);
    println!("Low:     {}", low);
    println!("Nonce:   {}", credential.nonce.as_str());
    println!();
    println!("Reuse the nonce with --nonce to reproduce this commitment.");
    Ok(())
}

fn cmd_prove(
    config: &PermisConfig,
    circuit: CircuitId,
    attributes: CredentialAttributes,
    output: PathBuf,
) -> Result<()> {
    println!("🔐 Generating {} proof...", circuit);
    println!();

    let orchestrator = ProofOrchestrator::from_config(config, Arc::new(SnarkjsBackend::from_config(config)));
    let run = orchestrator.run(circuit, &attributes);

    let stages: Vec<String> = run.stages.iter().map(|stage| stage.to_string()).collect();
    log::debug!("Stages: {}", stages.join(" → "));

    let proof = match run.outcome {
        ProofOutcome::Completed(proof) => proof,
        ProofOutcome::Failed(err) => {
            anyhow::bail!("proof generation failed while {}: {}", run_stage(&stages), err)
        }
    };

    proof.write_to_file(&output)?;

    println!("✅ Proof generated successfully!");
    println!("   Commitment: {}", proof.metadata.commitment);
    if let Some(claim) = &proof.metadata.claim {
        println!("   {}: {}", claim.label, claim.value);
    }
    println!("   Time: {} ms", proof.metadata.generation_time_ms);
    println!("   Saved to: {}", output.display());
    println!();
    println!("To verify this proof, use:");
    println!("  permis-zk verify --proof {} --circuit {}", output.display(), circuit);
    Ok(())
}

/// Stage name preceding the terminal "failed" entry
fn run_stage(stages: &[String]) -> &str {
    stages
        .iter()
        .rev()
        .nth(1)
        .map(String::as_str)
        .unwrap_or("idle")
}

fn verification_key(
    config: &PermisConfig,
    circuit: CircuitId,
    explicit: Option<PathBuf>,
) -> Result<VerificationKey> {
    let path = match explicit {
        Some(path) => path,
        None => CircuitRegistry::from_config(config)
            .resolve_id(circuit)?
            .require(ArtifactSlot::VerificationKey)?
            .to_path_buf(),
    };
    Ok(VerificationKey::load(path)?)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_verify(
    config: &PermisConfig,
    proof_path: PathBuf,
    circuit: CircuitId,
    public_signals: Option<PathBuf>,
    key_path: Option<PathBuf>,
) -> Result<()> {
    println!("🔍 Verifying {} proof...", circuit);
    println!();

    let registry = CircuitRegistry::from_config(config);
    let descriptor = registry.descriptor(circuit)?;
    let key = verification_key(config, circuit, key_path)?;
    let payload = read_json(&proof_path)?;
    let supplied = public_signals.as_deref().map(read_json).transpose()?;

    let verifier = Verifier::new(Arc::new(SnarkjsBackend::from_config(config)));
    let result = verifier.verify_payload(descriptor, &key, &payload, supplied.as_ref())?;

    println!("Public signals: {:?}", result.public_signals.as_slice());
    if result.valid {
        println!("✅ Proof is VALID!");
        if let Some(claim) = &result.claim {
            println!("   {}: {}", claim.label, claim.value);
        }
    } else {
        println!("❌ Proof is INVALID!");
    }
    Ok(())
}

fn cmd_verify_batch(
    config: &PermisConfig,
    proofs: Vec<PathBuf>,
    circuit: CircuitId,
    key_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let registry = CircuitRegistry::from_config(config);
    let descriptor = registry.descriptor(circuit)?.clone();
    let key = verification_key(config, circuit, key_path)?;

    // Unreadable files become errored items rather than aborting the batch
    let items: Vec<BatchItem> = proofs.iter().map(BatchItem::load).collect();

    let verifier = Verifier::new(Arc::new(SnarkjsBackend::from_config(config)));
    let report = BatchVerificationReporter::new(verifier, descriptor, key)
        .with_concurrency(config.effective_concurrency())
        .verify_all(&items);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔍 Batch verification ({} proofs)", report.total);
    println!();
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Valid { claim } => {
                let claim = claim
                    .as_ref()
                    .map(|claim| format!(" ({}: {})", claim.label, claim.value))
                    .unwrap_or_default();
                println!("  ✅ {}{} [{} ms]", item.label, claim, item.elapsed_ms);
            }
            ItemOutcome::Invalid => println!("  ❌ {} invalid [{} ms]", item.label, item.elapsed_ms),
            ItemOutcome::Errored { kind, message } => {
                println!("  ⚠️  {} {}: {}", item.label, kind, message)
            }
        }
    }
    println!();
    println!(
        "Valid: {}/{}  Invalid: {}  Errored: {}",
        report.valid, report.total, report.invalid, report.errored
    );
    println!(
        "Time: {} ms total, {:.1} ms mean",
        report.total_time_ms, report.mean_time_ms
    );
    Ok(())
}

fn cmd_examples() -> Result<()> {
    println!("📚 Example Usage");
    println!();
    println!("1. Check which circuit artifacts are installed:");
    println!("   permis-zk status --circuits-dir ./circuits");
    println!();
    println!("2. Compute a commitment with a fixed nonce:");
    println!("   permis-zk commitment -n Jean --surname Durand -d 2000-01-01 -l A --nonce x7Tr9sP0");
    println!();
    println!("3. Generate a license proof:");
    println!("   permis-zk prove-license -n Jean --surname Durand -d 2000-01-01 -l A -o proof.json");
    println!();
    println!("4. Generate an age proof (18+):");
    println!("   permis-zk prove-age -n Jean --surname Durand -d 2000-01-01 -o age_proof.json");
    println!();
    println!("5. Verify a proof:");
    println!("   permis-zk verify -p proof.json -c license");
    println!();
    println!("6. Verify a bare proof with separate public signals:");
    println!("   permis-zk verify -p proof.json -s public.json -c license");
    println!();
    println!("7. Verify several proofs at once:");
    println!("   permis-zk verify-batch proof1.json proof2.json proof3.json --json");
    println!();
    println!("💡 Tips:");
    println!("   - Use --verbose or -v for detailed logging");
    println!("   - Without --nonce every proof gets a fresh random nonce");
    println!("   - Proofs are zero-knowledge: they don't reveal name, surname or date of birth");
    println!("   - Proving and verification need `snarkjs` on PATH (see snarkjs_command in --config)");
    println!();

    Ok(())
}
