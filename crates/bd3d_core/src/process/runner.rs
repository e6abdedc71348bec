//! Blocking tool execution with captured output and a wall-clock limit.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;

use super::command::ToolCommand;
use crate::logging::JobLogger;

/// Interval between exit checks while waiting on a child.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to keep draining pipes after the child is gone.
///
/// Grandchildren can inherit the pipes and hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Errors starting or waiting on an external tool.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Options for one tool run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the child after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    /// Timeout in whole seconds; 0 disables it.
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub tool: String,
    pub command_line: String,
    /// RFC 3339 start time.
    pub started_at: String,
    /// RFC 3339 end time.
    pub finished_at: String,
    pub duration: Duration,
    /// Exit code, `None` when killed or terminated by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Combined stdout and stderr lines in arrival order.
    pub output: String,
}

impl ToolRun {
    /// Exit code with -1 standing in for "no code".
    pub fn effective_exit_code(&self) -> i32 {
        if self.timed_out {
            return -1;
        }
        self.exit_code.unwrap_or(-1)
    }

    /// True when the tool exited with status 0 inside its time limit.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// A run that never started, for recording spawn failures.
    pub fn not_started(command: &ToolCommand, error: &ProcessError) -> Self {
        let now = Local::now().to_rfc3339();
        Self {
            tool: command.tool().to_string(),
            command_line: command.command_line(),
            started_at: now.clone(),
            finished_at: now,
            duration: Duration::ZERO,
            exit_code: None,
            timed_out: false,
            output: error.to_string(),
        }
    }

    /// Last `n` lines of output.
    pub fn output_tail(&self, n: usize) -> String {
        let lines: Vec<&str> = self.output.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run a tool to completion, capturing its output.
///
/// Both pipes are drained on reader threads so a chatty child never
/// blocks on a full pipe. Each line is forwarded to `logger` (if given)
/// as it arrives. Exceeding `options.timeout` kills the child and marks
/// the run as timed out.
pub fn run_tool(
    command: &ToolCommand,
    options: &RunOptions,
    logger: Option<&JobLogger>,
) -> Result<ToolRun, ProcessError> {
    let command_line = command.command_line();
    if let Some(logger) = logger {
        logger.command(&command_line);
    }
    tracing::debug!(tool = command.tool(), "Running: {}", command_line);

    let started_at = Local::now();
    let start = Instant::now();

    let mut child = Command::new(command.program())
        .args(command.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

    let (tx, rx) = mpsc::channel::<(Stream, String)>();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Stream::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Stream::Stderr, tx.clone());
    }
    drop(tx);

    let deadline = options.timeout.map(|limit| start + limit);
    let mut transcript: Vec<String> = Vec::new();
    let mut status: Option<ExitStatus> = None;
    let mut timed_out = false;
    let mut finished_at: Option<Instant> = None;
    let mut readers_done = false;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((stream, line)) => {
                if let Some(logger) = logger {
                    logger.output_line(&line, matches!(stream, Stream::Stderr));
                }
                transcript.push(line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                readers_done = true;
                if finished_at.is_none() {
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        if status.is_none() && !timed_out {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    status = Some(exit);
                    finished_at = Some(Instant::now());
                }
                Ok(None) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        tracing::warn!(tool = command.tool(), "Time limit exceeded, killing process");
                        if let Err(e) = child.kill() {
                            tracing::debug!("Kill after timeout returned: {}", e);
                        }
                        status = child.wait().ok();
                        timed_out = true;
                        finished_at = Some(Instant::now());
                    }
                }
                Err(source) => {
                    let _ = child.kill();
                    return Err(ProcessError::Wait {
                        program: command.program().to_string(),
                        source,
                    });
                }
            }
        }

        if let Some(done) = finished_at {
            if readers_done || done.elapsed() >= DRAIN_GRACE {
                break;
            }
        }
    }

    let run = ToolRun {
        tool: command.tool().to_string(),
        command_line,
        started_at: started_at.to_rfc3339(),
        finished_at: Local::now().to_rfc3339(),
        duration: start.elapsed(),
        exit_code: if timed_out {
            None
        } else {
            status.and_then(|s| s.code())
        },
        timed_out,
        output: transcript.join("\n"),
    };

    tracing::debug!(
        tool = %run.tool,
        exit_code = run.effective_exit_code(),
        timed_out = run.timed_out,
        "Finished in {:.1}s",
        run.duration.as_secs_f64()
    );

    Ok(run)
}

fn spawn_reader<R>(pipe: R, stream: Stream, tx: Sender<(Stream, String)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
