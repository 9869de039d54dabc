use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::engine::EngineError;

/// A program invocation: executable, arguments, and optional standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<String>,
}

impl CommandSpec {
    /// Invocation of `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text fed to the child's standard input, after which it is closed.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Arguments, in order.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Text fed to standard input, if any.
    pub fn stdin_text(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Program name for logs and errors.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program_name()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// True when the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Standard output, or standard error when nothing was printed to stdout.
    pub fn text(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }

    /// Standard output followed by standard error.
    pub fn merged(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Owns a running child; killing and reaping it on drop unless it already exited.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "kill after early exit failed");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "failed to reap child process");
        }
    }
}

/// Run a process to completion, bounded by `timeout`.
///
/// Output streams are drained on background threads so a chatty child cannot
/// block on a full pipe. On expiry the child is killed and reaped and
/// [`EngineError::Timeout`] is returned. The same deadline covers draining:
/// a descendant that keeps the streams open past it also yields a timeout.
/// A nonzero exit is not an error here.
pub fn run(spec: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, EngineError> {
    let program = spec.program_name();
    debug!(command = %spec.display(), ?timeout, "spawning process");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = command.spawn().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };

    if let (Some(input), Some(mut stdin)) = (spec.stdin.clone(), guard.child.stdin.take()) {
        thread::spawn(move || {
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                debug!(error = %e, "child closed stdin before reading all input");
            }
        });
    }
    let started = Instant::now();
    let stdout = drain(guard.child.stdout.take());
    let stderr = drain(guard.child.stderr.take());

    let status = guard
        .child
        .wait_timeout(timeout)
        .map_err(|source| EngineError::Io {
            context: format!("waiting for {program}"),
            source,
        })?;
    let Some(status) = status else {
        warn!(%program, ?timeout, "process timed out, killing it");
        return Err(EngineError::Timeout { program, timeout });
    };
    guard.reaped = true;

    let output = ProcessOutput {
        stdout: collect(stdout, &program, started, timeout)?,
        stderr: collect(stderr, &program, started, timeout)?,
        exit_code: status.code(),
    };
    debug!(
        %program,
        exit_code = ?output.exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "process finished"
    );
    Ok(output)
}

/// Like [`run`], but a nonzero exit becomes [`EngineError::Status`].
pub fn run_checked(spec: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, EngineError> {
    let output = run(spec, timeout)?;
    if output.success() {
        return Ok(output);
    }
    Err(EngineError::Status {
        program: spec.program_name(),
        code: output.exit_code,
        output: output.merged(),
    })
}

type Drained = Receiver<std::io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Option<Drained> {
    source.map(|mut source| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let read = source.read_to_end(&mut buf).map(|_| buf);
            if tx.send(read).is_err() {
                debug!("output arrived after the deadline, dropped");
            }
        });
        rx
    })
}

fn collect(
    drained: Option<Drained>,
    program: &str,
    started: Instant,
    timeout: Duration,
) -> Result<String, EngineError> {
    let Some(drained) = drained else {
        return Ok(String::new());
    };
    let remaining = timeout.saturating_sub(started.elapsed());
    let bytes = match drained.recv_timeout(remaining) {
        Ok(read) => read.map_err(|source| EngineError::Io {
            context: format!("reading output of {program}"),
            source,
        })?,
        Err(RecvTimeoutError::Timeout) => {
            warn!(%program, ?timeout, "output still held open by a descendant process");
            return Err(EngineError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(EngineError::Io {
                context: format!("reading output of {program}"),
                source: std::io::Error::other("output reader thread panicked"),
            });
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
