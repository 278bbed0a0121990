//! Helpers for running child processes with an optional timeout and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// Reader threads were abandoned after a timeout kill because a
    /// grandchild still held the pipes; output is whatever arrived until then.
    pub output_incomplete: bool,
}

/// How long to keep draining pipes after killing a timed-out child.
const READER_GRACE: Duration = Duration::from_millis(500);

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// One-paragraph diagnostic for error messages: exit status (or timeout)
    /// followed by the trimmed stderr, falling back to stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let mut msg = if self.timed_out {
            "timed out".to_string()
        } else {
            self.status.to_string()
        };
        let (stream, truncated, label) = if self.stderr.iter().all(u8::is_ascii_whitespace) {
            (&self.stdout, self.stdout_truncated, "stdout")
        } else {
            (&self.stderr, self.stderr_truncated, "stderr")
        };
        let text = String::from_utf8_lossy(stream);
        let text = text.trim();
        if !text.is_empty() {
            msg.push('\n');
            msg.push_str(text);
        }
        if truncated > 0 {
            msg.push_str(&format!("\n[{label} truncated {truncated} bytes]"));
        }
        if self.output_incomplete {
            msg.push_str("\n[output incomplete: pipes still held after kill]");
        }
        msg
    }
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// With `timeout` set, a child that outlives it is killed and `timed_out` is reported; without
/// one the call waits for the child indefinitely.
///
/// `kill` only reaches the direct child, so after a timeout the readers get a short grace
/// period and are then abandoned; descendants that keep the pipes open cannot extend the step.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, program = ?cmd.get_program(), "failed to spawn command");
            return Err(e)
                .with_context(|| format!("spawn {}", cmd.get_program().to_string_lossy()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_capture = spawn_reader(stdout, output_limit_bytes, done_tx.clone());
    let stderr_capture = spawn_reader(stderr, output_limit_bytes, done_tx);

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let grace = timed_out.then_some(READER_GRACE);
    let output_incomplete = wait_for_readers(&done_rx, 2, grace)?;
    let (stdout, stdout_truncated) = take_capture(&stdout_capture).context("collect stdout")?;
    let (stderr, stderr_truncated) = take_capture(&stderr_capture).context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        output_incomplete,
    })
}

/// Render an argv for log lines and error messages.
pub fn display_argv(argv: &[String]) -> String {
    argv.join(" ")
}

#[derive(Debug, Default)]
struct Capture {
    buf: Vec<u8>,
    truncated: usize,
}

type SharedCapture = Arc<Mutex<Capture>>;

/// Drain `reader` on a thread into a shared buffer and signal `done` when the pipe closes.
fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    done: Sender<Result<()>>,
) -> SharedCapture {
    let capture = SharedCapture::default();
    let sink = Arc::clone(&capture);
    thread::spawn(move || {
        let result = read_stream_limited(reader, limit, &sink);
        // The receiver is gone once the readers were abandoned.
        let _ = done.send(result);
    });
    capture
}

/// Wait for `count` readers. With `grace` set, give up after it and return `true`.
fn wait_for_readers(
    done: &Receiver<Result<()>>,
    count: usize,
    grace: Option<Duration>,
) -> Result<bool> {
    let deadline = grace.map(|grace| Instant::now() + grace);
    for _ in 0..count {
        let result = match deadline {
            None => done
                .recv()
                .map_err(|_| anyhow!("output reader thread panicked"))?,
            Some(deadline) => {
                match done.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!("output pipes still open after kill, abandoning readers");
                        return Ok(true);
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        bail!("output reader thread panicked")
                    }
                }
            }
        };
        result?;
    }
    Ok(false)
}

fn take_capture(capture: &SharedCapture) -> Result<(Vec<u8>, usize)> {
    let mut guard = capture
        .lock()
        .map_err(|_| anyhow!("output buffer poisoned"))?;
    Ok((std::mem::take(&mut guard.buf), guard.truncated))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, sink: &SharedCapture) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut capture = sink
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let remaining = limit.saturating_sub(capture.buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            capture.buf.extend_from_slice(&chunk[..keep]);
            capture.truncated += n.saturating_sub(keep);
        } else {
            capture.truncated += n;
        }
    }

    Ok(())
}
