//! Invocation contract for the external witness generator
//!
//! The generator is called as `<exe> <wasm> <input.json> <output.wtns>` and
//! must exit zero after writing a non-empty witness file. A request owns its
//! input and output scratch files; both are gone by the time
//! [`WitnessProcessBridge::compute_witness`] returns, whatever the outcome.
//! There is no in-process fallback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::circuit::encoding::EncodedInput;
use crate::config::PermisConfig;
use crate::error::{OutputState, PermisError, Result, WitnessFailure};
use crate::witness::process::{run_bounded, CapturedOutput, ProcessExit, SpawnFailure};
use crate::witness::scratch::ScratchFile;

/// One witness computation request
#[derive(Debug)]
pub struct WitnessRequest {
    pub executable: PathBuf,
    pub wasm: PathBuf,
    pub input: ScratchFile,
    pub output: ScratchFile,
}

/// A computed witness, read into memory before its file was removed
#[derive(Debug, Clone)]
pub struct WitnessHandle {
    bytes: Vec<u8>,
    diagnostics: CapturedOutput,
    elapsed: Duration,
}

impl WitnessHandle {
    pub fn new(bytes: Vec<u8>, diagnostics: CapturedOutput, elapsed: Duration) -> Self {
        Self {
            bytes,
            diagnostics,
            elapsed,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Child stdout/stderr, informational only
    pub fn diagnostics(&self) -> &CapturedOutput {
        &self.diagnostics
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Runs the witness executable under a timeout and capture limit
#[derive(Debug, Clone)]
pub struct WitnessProcessBridge {
    timeout: Duration,
    capture_limit: usize,
    scratch_dir: PathBuf,
}

impl WitnessProcessBridge {
    pub fn new(timeout: Duration, capture_limit: usize, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            timeout,
            capture_limit,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn from_config(config: &PermisConfig) -> Self {
        Self::new(
            config.witness_timeout(),
            config.capture_limit_bytes,
            config.scratch_dir.clone(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Write `input` to a fresh scratch file and compute its witness
    pub fn compute_for_input(
        &self,
        wasm: &Path,
        executable: &Path,
        input: &EncodedInput,
    ) -> Result<WitnessHandle> {
        let input_file =
            ScratchFile::create(&self.scratch_dir, "witness-input", "json", input.to_json()?.as_bytes())?;
        let output_file = ScratchFile::allocate(&self.scratch_dir, "witness-output", "wtns");

        self.compute_witness(WitnessRequest {
            executable: executable.to_path_buf(),
            wasm: wasm.to_path_buf(),
            input: input_file,
            output: output_file,
        })
    }

    /// Run the executable for `request`; its scratch files drop on return
    pub fn compute_witness(&self, request: WitnessRequest) -> Result<WitnessHandle> {
        let WitnessRequest {
            executable,
            wasm,
            input,
            output,
        } = request;

        if !executable.exists() {
            return Err(PermisError::WitnessExecutableNotFound { path: executable });
        }

        log::info!("Computing witness with {}", executable.display());

        let outcome = run_bounded(
            &executable,
            [wasm.as_os_str(), input.path().as_os_str(), output.path().as_os_str()],
            self.timeout,
            self.capture_limit,
        )
        .map_err(|failure| match failure {
            SpawnFailure::NotFound => PermisError::WitnessExecutableNotFound {
                path: executable.clone(),
            },
            SpawnFailure::ResourceExhausted => PermisError::WitnessProcessError {
                failure: WitnessFailure::ResourceExhausted,
                diagnostics: CapturedOutput::default(),
            },
            SpawnFailure::Other(reason) => PermisError::WitnessProcessError {
                failure: WitnessFailure::Spawn(reason),
                diagnostics: CapturedOutput::default(),
            },
        })?;

        let diagnostics = outcome.output;
        match outcome.exit {
            ProcessExit::Exited(0) => {}
            ProcessExit::TimedOut => {
                log::warn!("Witness process exceeded {:?}; killed", self.timeout);
                return Err(PermisError::WitnessTimeout {
                    timeout: self.timeout,
                    diagnostics,
                });
            }
            ProcessExit::Signalled(signal) => {
                return Err(PermisError::WitnessProcessError {
                    failure: WitnessFailure::Signalled(signal),
                    diagnostics,
                });
            }
            ProcessExit::Exited(code) => {
                log::warn!(
                    "Witness process exited with {}: {}",
                    code,
                    diagnostics.stderr_tail(200)
                );
                // The exit code decided failure; captured output only picks the kind.
                let failure = if diagnostics.mentions_resource_exhaustion() {
                    WitnessFailure::ResourceExhausted
                } else {
                    WitnessFailure::NonZeroExit(code)
                };
                return Err(PermisError::WitnessProcessError {
                    failure,
                    diagnostics,
                });
            }
        }

        let state = match std::fs::metadata(output.path()) {
            Err(_) => Some(OutputState::Absent),
            Ok(meta) if meta.len() == 0 => Some(OutputState::Empty),
            Ok(_) => None,
        };
        if let Some(state) = state {
            return Err(PermisError::WitnessOutputEmptyOrAbsent {
                path: output.path().to_path_buf(),
                state,
                diagnostics,
            });
        }

        let bytes = output.read()?;
        log::info!(
            "✓ Witness computed: {} bytes in {:.2?}",
            bytes.len(),
            outcome.elapsed
        );

        Ok(WitnessHandle::new(bytes, diagnostics, outcome.elapsed))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn bridge(scratch: &Path, timeout: Duration) -> WitnessProcessBridge {
        WitnessProcessBridge::new(timeout, 1024 * 1024, scratch)
    }

    fn sample_input() -> EncodedInput {
        EncodedInput {
            name: vec![74, 0],
            surname: vec![68, 0],
            dob: vec![50; 10],
            category: Some(65),
            expiration: None,
            age: None,
            nonce: vec![120; 8],
            commitment: None,
        }
    }

    fn scratch_is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_success_reads_witness_and_cleans_up() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#"cp "$2" "$3"; echo done"#);

        let handle = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap();

        let witness: EncodedInput = serde_json::from_slice(handle.bytes()).unwrap();
        assert_eq!(witness, sample_input());
        assert_eq!(handle.diagnostics().stdout.trim(), "done");
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_receives_exactly_three_arguments() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(
            tools.path(),
            "gen",
            r#"[ "$#" -eq 3 ] || exit 9; printf '%s' "$1" > "$3""#,
        );

        let handle = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("/circuits/license.wasm"), &exe, &sample_input())
            .unwrap();
        assert_eq!(handle.bytes(), b"/circuits/license.wasm");
    }

    #[test]
    fn test_missing_executable() {
        let scratch = tempfile::tempdir().unwrap();
        let err = bridge(scratch.path(), Duration::from_secs(1))
            .compute_for_input(
                Path::new("circuit.wasm"),
                Path::new("/nonexistent/generate_witness"),
                &sample_input(),
            )
            .unwrap_err();

        assert!(matches!(err, PermisError::WitnessExecutableNotFound { .. }));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_timeout_kills_and_cleans_up() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#"echo partial > "$3"; exec sleep 30"#);

        let err = bridge(scratch.path(), Duration::from_millis(300))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap_err();

        match err {
            PermisError::WitnessTimeout { timeout, .. } => {
                assert_eq!(timeout, Duration::from_millis(300))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_empty_output_is_failure_even_on_exit_zero() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#": > "$3"; exit 0"#);

        let err = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap_err();

        assert!(matches!(
            err,
            PermisError::WitnessOutputEmptyOrAbsent {
                state: OutputState::Empty,
                ..
            }
        ));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_absent_output() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", "exit 0");

        let err = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap_err();

        assert!(matches!(
            err,
            PermisError::WitnessOutputEmptyOrAbsent {
                state: OutputState::Absent,
                ..
            }
        ));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_non_zero_exit_keeps_diagnostics() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#"echo written > "$3"; echo 'bad input' 1>&2; exit 4"#);

        let err = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap_err();

        match err {
            PermisError::WitnessProcessError {
                failure,
                diagnostics,
            } => {
                assert_eq!(failure, WitnessFailure::NonZeroExit(4));
                assert!(diagnostics.stderr.contains("bad input"));
            }
            other => panic!("expected process error, got {:?}", other),
        }
        assert!(scratch_is_empty(scratch.path()));
    }

    #[test]
    fn test_resource_exhaustion_is_distinct() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#"echo 'Error: EMFILE, too many open files' 1>&2; exit 1"#);

        let err = bridge(scratch.path(), Duration::from_secs(10))
            .compute_for_input(Path::new("circuit.wasm"), &exe, &sample_input())
            .unwrap_err();

        assert!(matches!(
            err,
            PermisError::WitnessProcessError {
                failure: WitnessFailure::ResourceExhausted,
                ..
            }
        ));
    }

    #[test]
    fn test_concurrent_invocations_do_not_collide() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let exe = script(tools.path(), "gen", r#"cp "$2" "$3""#);
        let bridge = bridge(scratch.path(), Duration::from_secs(10));

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u32)
                .map(|i| {
                    let bridge = &bridge;
                    let exe = &exe;
                    scope.spawn(move || {
                        let mut input = sample_input();
                        input.age = Some(i);
                        let handle = bridge
                            .compute_for_input(Path::new("circuit.wasm"), exe, &input)
                            .unwrap();
                        let echoed: EncodedInput = serde_json::from_slice(handle.bytes()).unwrap();
                        assert_eq!(echoed.age, Some(i));
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });

        assert!(scratch_is_empty(scratch.path()));
    }
}
