//! Bounded execution of an external program
//!
//! The child gets a wall-clock deadline and a shared byte budget for its
//! stdout and stderr. Output past the budget is drained and discarded so the
//! child never blocks on a full pipe.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// How often the child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for pipe readers after the child is gone
///
/// A grandchild can keep a pipe open after its parent was killed; the
/// readers are abandoned rather than waited on forever.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// Captured stdout/stderr of a child process, kept for diagnostics only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Whether output was dropped because the capture limit was reached
    pub truncated: bool,
}

impl CapturedOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Whether the child reported running out of file descriptors
    ///
    /// Only used to pick an error kind after a non-zero exit.
    pub fn mentions_resource_exhaustion(&self) -> bool {
        [&self.stdout, &self.stderr]
            .iter()
            .any(|text| text.contains("EMFILE") || text.contains("Too many open files"))
    }

    /// Last `max_chars` characters of stderr, for log lines
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let count = self.stderr.chars().count();
        self.stderr.chars().skip(count.saturating_sub(max_chars)).collect()
    }
}

/// How the child finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(i32),
    Signalled(i32),
    TimedOut,
}

/// Result of a child that was started successfully
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    pub output: CapturedOutput,
    pub elapsed: Duration,
}

/// Why a child could not be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnFailure {
    NotFound,
    ResourceExhausted,
    Other(String),
}

/// Run `program` with `args`, killing it once `timeout` elapses
pub fn run_bounded<I, S>(
    program: &Path,
    args: I,
    timeout: Duration,
    capture_limit: usize,
) -> Result<ProcessOutcome, SpawnFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(classify_spawn_error)?;

    let capture = Arc::new(Mutex::new(CaptureBuffer::new(capture_limit)));
    let (done_tx, done_rx) = mpsc::channel();
    let mut readers = 0;

    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Stream::Stdout, capture.clone(), done_tx.clone());
        readers += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Stream::Stderr, capture.clone(), done_tx.clone());
        readers += 1;
    }
    drop(done_tx);

    let exit = wait_with_deadline(&mut child, start + timeout);

    let drain_deadline = Instant::now() + DRAIN_GRACE;
    for _ in 0..readers {
        let remaining = drain_deadline.saturating_duration_since(Instant::now());
        if done_rx.recv_timeout(remaining).is_err() {
            log::debug!("Child output readers still open after exit; abandoning them");
            break;
        }
    }

    let output = match capture.lock() {
        Ok(buffer) => buffer.snapshot(),
        Err(poisoned) => poisoned.into_inner().snapshot(),
    };

    Ok(ProcessOutcome {
        exit,
        output,
        elapsed: start.elapsed(),
    })
}

fn wait_with_deadline(child: &mut Child, deadline: Instant) -> ProcessExit {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return exit_of(status),
            Ok(None) => {}
            Err(err) => {
                log::warn!("Failed to poll child status: {}", err);
            }
        }

        if Instant::now() >= deadline {
            if let Err(err) = child.kill() {
                log::warn!("Failed to kill timed-out child: {}", err);
            }
            if let Err(err) = child.wait() {
                log::warn!("Failed to reap timed-out child: {}", err);
            }
            return ProcessExit::TimedOut;
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn exit_of(status: ExitStatus) -> ProcessExit {
    if let Some(code) = status.code() {
        return ProcessExit::Exited(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ProcessExit::Signalled(signal);
        }
    }
    ProcessExit::Signalled(-1)
}

fn classify_spawn_error(err: io::Error) -> SpawnFailure {
    // EMFILE / ENFILE
    if matches!(err.raw_os_error(), Some(23) | Some(24)) {
        return SpawnFailure::ResourceExhausted;
    }
    match err.kind() {
        io::ErrorKind::NotFound => SpawnFailure::NotFound,
        _ => SpawnFailure::Other(err.to_string()),
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

struct CaptureBuffer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    remaining: usize,
    truncated: bool,
}

impl CaptureBuffer {
    fn new(limit: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            remaining: limit,
            truncated: false,
        }
    }

    fn push(&mut self, stream: Stream, bytes: &[u8]) {
        let take = bytes.len().min(self.remaining);
        if take < bytes.len() {
            self.truncated = true;
        }
        let target = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };
        target.extend_from_slice(&bytes[..take]);
        self.remaining -= take;
    }

    fn snapshot(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            truncated: self.truncated,
        }
    }
}

fn spawn_reader<R>(
    mut reader: R,
    stream: Stream,
    capture: Arc<Mutex<CaptureBuffer>>,
    done: mpsc::Sender<()>,
) where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if let Ok(mut buffer) = capture.lock() {
                        buffer.push(stream, &chunk[..n]);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done.send(());
    });
}
