//! Append-only JSON Lines record of every external tool invocation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::job_logger::{sanitize_filename, JobLogger};
use crate::process::ToolRun;

/// One tool invocation as written to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// Which eye or purpose (`left`, `right`, `encode`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub command_line: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub output: String,
    /// Classification or gate result for this invocation.
    pub outcome: String,
}

impl ToolEvent {
    /// Build an event from a finished run.
    pub fn from_run(run: &ToolRun, chunk_index: Option<usize>, outcome: impl Into<String>) -> Self {
        Self {
            tool: run.tool.clone(),
            chunk_index,
            purpose: None,
            command_line: run.command_line.clone(),
            started_at: run.started_at.clone(),
            finished_at: run.finished_at.clone(),
            duration_ms: run.duration.as_millis() as u64,
            exit_code: run.exit_code,
            timed_out: run.timed_out,
            output: run.output.clone(),
            outcome: outcome.into(),
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Append-only event log, one JSON object per line.
pub struct ToolEventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ToolEventLog {
    /// Open (or create) `<job>.events.jsonl` in `log_dir` for appending.
    pub fn open(job_name: &str, log_dir: impl AsRef<Path>) -> io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{}.events.jsonl", sanitize_filename(job_name)));
        Self::open_path(path)
    }

    /// Open an explicit path for appending.
    pub fn open_path(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and flush it to disk.
    pub fn record(&self, event: &ToolEvent) -> io::Result<()> {
        let line = serde_json::to_string(event).map_err(io::Error::other)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }

    /// Append an event, logging instead of failing on I/O errors.
    pub fn record_or_warn(&self, event: &ToolEvent) {
        if let Err(e) = self.record(event) {
            tracing::warn!(path = %self.path.display(), "Failed to write tool event: {}", e);
        }
    }
}

/// Job log and event log pair handed to tool adapters.
#[derive(Clone, Copy)]
pub struct ToolReporter<'a> {
    pub logger: &'a JobLogger,
    pub events: &'a ToolEventLog,
}

impl<'a> ToolReporter<'a> {
    pub fn new(logger: &'a JobLogger, events: &'a ToolEventLog) -> Self {
        Self { logger, events }
    }

    /// Record a finished run with its outcome.
    pub fn record(&self, run: &ToolRun, chunk_index: usize, purpose: &str, outcome: &str) {
        self.events
            .record_or_warn(&ToolEvent::from_run(run, Some(chunk_index), outcome).with_purpose(purpose));
    }
}

/// Read every event from a log file.
pub fn read_events(path: impl AsRef<Path>) -> io::Result<Vec<ToolEvent>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(io::Error::other))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_run(exit_code: Option<i32>) -> ToolRun {
        ToolRun {
            tool: "x264".to_string(),
            command_line: "x264 --fps 24000/1001".to_string(),
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            finished_at: "2026-01-01T00:00:03+00:00".to_string(),
            duration: Duration::from_millis(3000),
            exit_code,
            timed_out: false,
            output: "x264 [info]: 3D mode\nencoded 300 frames".to_string(),
        }
    }

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let log = ToolEventLog::open("job:1", dir.path()).unwrap();
        assert!(log.path().ends_with("job_1.events.jsonl"));

        log.record(&ToolEvent::from_run(&sample_run(Some(0)), Some(0), "Accepted"))
            .unwrap();
        log.record(
            &ToolEvent::from_run(&sample_run(Some(1)), Some(1), "Rejected(NonZeroExit)")
                .with_purpose("encode"),
        )
        .unwrap();

        let events = read_events(log.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, "Accepted");
        assert_eq!(events[1].chunk_index, Some(1));
        assert_eq!(events[1].purpose.as_deref(), Some("encode"));
        assert_eq!(events[1].duration_ms, 3000);
    }

    #[test]
    fn reopening_keeps_previous_events() {
        let dir = tempdir().unwrap();
        {
            let log = ToolEventLog::open("job", dir.path()).unwrap();
            log.record(&ToolEvent::from_run(&sample_run(Some(0)), None, "ok"))
                .unwrap();
        }
        let log = ToolEventLog::open("job", dir.path()).unwrap();
        log.record(&ToolEvent::from_run(&sample_run(Some(0)), None, "ok"))
            .unwrap();

        assert_eq!(read_events(log.path()).unwrap().len(), 2);
    }
}
