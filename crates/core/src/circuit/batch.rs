//! Batch verification of many proofs against one circuit
//!
//! Items are independent: a malformed payload or a backend failure is
//! recorded against that item and the rest of the batch still runs. Items
//! are verified on a bounded rayon pool; the report keeps input order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use permis_core::backend::SnarkjsBackend;
//! use permis_core::circuit::{BatchItem, BatchVerificationReporter, CircuitDescriptor, VerificationKey, Verifier};
//! use permis_core::config::PermisConfig;
//!
//! let config = PermisConfig::default();
//! let descriptor = CircuitDescriptor::license(&config.circuits_root);
//! let key = VerificationKey::load("circuits/license/verification_key.json")?;
//! let verifier = Verifier::new(Arc::new(SnarkjsBackend::from_config(&config)));
//!
//! let items = vec![
//!     BatchItem::from_file("proof1.json")?,
//!     BatchItem::from_file("proof2.json")?,
//! ];
//! let report = BatchVerificationReporter::new(verifier, descriptor, key)
//!     .with_concurrency(config.effective_concurrency())
//!     .verify_all(&items);
//! println!("{}/{} valid", report.valid, report.total);
//! # Ok::<(), permis_core::error::PermisError>(())
//! ```

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::circuit::descriptor::{CircuitDescriptor, CircuitId};
use crate::circuit::proof::{InterpretedClaim, VerificationKey};
use crate::circuit::verifier::Verifier;
use crate::config::DEFAULT_BATCH_CONCURRENCY;
use crate::error::{PermisError, Result};

/// One proof payload to verify
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub label: String,
    pub payload: Value,
    pub public_signals: Option<Value>,
    /// Error hit while reading the payload; reported as-is
    pub load_error: Option<LoadError>,
}

/// Why a payload could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub kind: String,
    pub message: String,
}

impl From<&PermisError> for LoadError {
    fn from(err: &PermisError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl BatchItem {
    pub fn new(label: impl Into<String>, payload: Value) -> Self {
        Self {
            label: label.into(),
            payload,
            public_signals: None,
            load_error: None,
        }
    }

    /// Signals for a bare proof payload
    pub fn with_public_signals(mut self, signals: Value) -> Self {
        self.public_signals = Some(signals);
        self
    }

    /// Read a payload file; the label is the file name
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let payload: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Self::new(file_label(path), payload))
    }

    /// Like [`BatchItem::from_file`], but a read or parse failure is kept on
    /// the item and shows up in the report instead of failing the batch
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::from_file(path).unwrap_or_else(|err| {
            log::warn!("Could not load {}: {}", path.display(), err);
            Self {
                load_error: Some(LoadError::from(&err)),
                ..Self::new(file_label(path), Value::Null)
            }
        })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-item result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Backend accepted the proof
    Valid { claim: Option<InterpretedClaim> },
    /// Backend rejected the proof
    Invalid,
    /// No verdict: bad shape, missing signals or backend failure
    Errored { kind: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub label: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
    pub elapsed_ms: u64,
}

/// Aggregated batch result
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub circuit: CircuitId,
    pub items: Vec<ItemReport>,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errored: usize,
    /// Sum of per-item verification times
    pub total_time_ms: u64,
    pub mean_time_ms: f64,
    /// Wall-clock time of the whole batch
    pub wall_time_ms: u64,
}

impl BatchReport {
    fn from_items(circuit: CircuitId, items: Vec<ItemReport>, wall_time_ms: u64) -> Self {
        let count = |wanted: fn(&ItemOutcome) -> bool| items.iter().filter(|item| wanted(&item.outcome)).count();
        let valid = count(|outcome| matches!(outcome, ItemOutcome::Valid { .. }));
        let invalid = count(|outcome| matches!(outcome, ItemOutcome::Invalid));
        let errored = count(|outcome| matches!(outcome, ItemOutcome::Errored { .. }));

        let total_time_ms: u64 = items.iter().map(|item| item.elapsed_ms).sum();
        let mean_time_ms = if items.is_empty() {
            0.0
        } else {
            total_time_ms as f64 / items.len() as f64
        };

        Self {
            circuit,
            total: items.len(),
            valid,
            invalid,
            errored,
            total_time_ms,
            mean_time_ms,
            wall_time_ms,
            items,
        }
    }

    pub fn all_valid(&self) -> bool {
        self.total > 0 && self.valid == self.total
    }
}

/// Runs [`Verifier`] over many payloads and aggregates the results
pub struct BatchVerificationReporter {
    verifier: Verifier,
    descriptor: CircuitDescriptor,
    key: VerificationKey,
    concurrency: usize,
}

impl BatchVerificationReporter {
    pub fn new(verifier: Verifier, descriptor: CircuitDescriptor, key: VerificationKey) -> Self {
        Self {
            verifier,
            descriptor,
            key,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Upper bound on items verified at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn verify_all(&self, items: &[BatchItem]) -> BatchReport {
        log::info!(
            "Verifying batch of {} {} proofs ({} workers)",
            items.len(),
            self.descriptor.id(),
            self.concurrency
        );
        let start = Instant::now();

        let reports = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .map(|(index, item)| self.verify_one(index, item))
                    .collect::<Vec<_>>()
            }),
            Err(err) => {
                log::warn!("Could not build verification pool ({}); verifying sequentially", err);
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.verify_one(index, item))
                    .collect()
            }
        };

        let report = BatchReport::from_items(
            self.descriptor.id(),
            reports,
            start.elapsed().as_millis() as u64,
        );
        log::info!(
            "✓ Batch done: {}/{} valid, {} invalid, {} errored (mean {:.1} ms)",
            report.valid,
            report.total,
            report.invalid,
            report.errored,
            report.mean_time_ms
        );
        report
    }

    fn verify_one(&self, index: usize, item: &BatchItem) -> ItemReport {
        let start = Instant::now();
        if let Some(err) = &item.load_error {
            return ItemReport {
                index,
                label: item.label.clone(),
                outcome: ItemOutcome::Errored {
                    kind: err.kind.clone(),
                    message: err.message.clone(),
                },
                elapsed_ms: start.elapsed().as_millis() as u64,
            };
        }

        let outcome = match self.verifier.verify_payload(
            &self.descriptor,
            &self.key,
            &item.payload,
            item.public_signals.as_ref(),
        ) {
            Ok(result) if result.valid => ItemOutcome::Valid { claim: result.claim },
            Ok(_) => ItemOutcome::Invalid,
            Err(err) => {
                log::warn!("Batch item {} ({}) errored: {}", index, item.label, err);
                ItemOutcome::Errored {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                }
            }
        };

        ItemReport {
            index,
            label: item.label.clone(),
            outcome,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}
