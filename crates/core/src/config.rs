//! Runtime configuration for circuit resolution, the witness process and
//! batch verification.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default wall-clock limit for one witness computation
pub const DEFAULT_WITNESS_TIMEOUT_SECS: u64 = 60;

/// Default combined stdout+stderr capture limit (10 MiB)
pub const DEFAULT_CAPTURE_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Default wall-clock limit for one proving or verification backend call
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 300;

/// Default worker count for batch verification
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Configuration shared by the registry, the witness bridge and the backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermisConfig {
    /// Root under which each circuit has a `<circuit id>` directory
    pub circuits_root: PathBuf,

    /// Extra directories probed after a circuit's base directory, in order
    pub auxiliary_dirs: Vec<PathBuf>,

    /// Witness process timeout in seconds
    pub witness_timeout_secs: u64,

    /// Proving/verification backend timeout in seconds
    pub backend_timeout_secs: u64,

    /// Combined stdout+stderr bytes retained per child process
    pub capture_limit_bytes: usize,

    /// Where per-invocation scratch files are created
    pub scratch_dir: PathBuf,

    /// Upper bound on parallel batch verifications
    pub batch_concurrency: usize,

    /// Program used by the snarkjs backend
    pub snarkjs_command: PathBuf,
}

impl Default for PermisConfig {
    fn default() -> Self {
        Self {
            circuits_root: PathBuf::from("circuits"),
            auxiliary_dirs: Vec::new(),
            witness_timeout_secs: DEFAULT_WITNESS_TIMEOUT_SECS,
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            capture_limit_bytes: DEFAULT_CAPTURE_LIMIT_BYTES,
            scratch_dir: std::env::temp_dir(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            snarkjs_command: PathBuf::from("snarkjs"),
        }
    }
}

impl PermisConfig {
    /// Load a configuration file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from {}", path.display());

        let raw = std::fs::read_to_string(path)?;
        let config: PermisConfig = serde_json::from_str(&raw)?;

        log::debug!(
            "circuits_root={}, aux_dirs={}, witness_timeout={}s, batch_concurrency={}",
            config.circuits_root.display(),
            config.auxiliary_dirs.len(),
            config.witness_timeout_secs,
            config.batch_concurrency
        );
        Ok(config)
    }

    /// Configuration rooted at a specific circuits directory
    pub fn with_circuits_root(root: impl Into<PathBuf>) -> Self {
        Self {
            circuits_root: root.into(),
            ..Self::default()
        }
    }

    pub fn witness_timeout(&self) -> Duration {
        Duration::from_secs(self.witness_timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Worker count, never below one
    pub fn effective_concurrency(&self) -> usize {
        self.batch_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PermisConfig::default();
        assert_eq!(config.witness_timeout(), Duration::from_secs(60));
        assert_eq!(config.backend_timeout(), Duration::from_secs(300));
        assert_eq!(config.capture_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.circuits_root, PathBuf::from("circuits"));
        assert!(config.auxiliary_dirs.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"circuits_root": "/opt/circuits", "batch_concurrency": 0}}"#).unwrap();

        let config = PermisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.circuits_root, PathBuf::from("/opt/circuits"));
        assert_eq!(config.witness_timeout_secs, DEFAULT_WITNESS_TIMEOUT_SECS);
        assert_eq!(config.effective_concurrency(), 1);
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = PermisConfig::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), "json");
    }
}
