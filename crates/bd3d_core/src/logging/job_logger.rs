//! Per-job log file with optional console echo.
//!
//! The file is opened for append, so every run of a job lands in the same
//! file after a run banner. While a chunk is being processed its label
//! tags every line, including the raw output of the tools run for it, and
//! the tail buffer only holds that chunk's tool output.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{ConsoleCallback, LogConfig, LogLevel, MessagePrefix};
use crate::models::Chunk;

/// Mutable logger state behind one lock, so tagged lines never interleave.
struct LoggerState {
    file: Option<BufWriter<File>>,
    /// Label of the chunk being processed.
    chunk: Option<String>,
    tail: VecDeque<String>,
    last_progress: u32,
}

/// Job log shared by every step and tool adapter of a run.
pub struct JobLogger {
    log_path: PathBuf,
    config: LogConfig,
    console: Option<ConsoleCallback>,
    state: Mutex<LoggerState>,
}

impl JobLogger {
    /// Open (or create) `<log_dir>/<job>.log` for appending.
    pub fn new(
        job_name: &str,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        console: Option<ConsoleCallback>,
    ) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(job_name)));
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        Ok(Self {
            log_path,
            state: Mutex::new(LoggerState {
                file: Some(BufWriter::new(file)),
                chunk: None,
                tail: VecDeque::with_capacity(config.error_tail),
                last_progress: 0,
            }),
            config,
            console,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Separate this run from earlier ones in the same file.
    pub fn begin_run(&self, job_id: &str) {
        let banner = format!(
            "########## run {} started {} ##########",
            job_id,
            Local::now().to_rfc3339()
        );
        let mut state = self.state.lock();
        self.write(&mut state, &banner);
    }

    /// Tag following lines with `chunk` until the returned scope drops.
    ///
    /// Entering a chunk starts a fresh tail buffer.
    pub fn enter_chunk(&self, chunk: &Chunk, total: usize) -> ChunkScope<'_> {
        {
            let mut state = self.state.lock();
            state.tail.clear();
            state.chunk = None;
            let header = MessagePrefix::Section.format(&format!(
                "Chunk {}/{}: {} frames {}..{}",
                chunk.index + 1,
                total,
                chunk.label(),
                chunk.start,
                chunk.end
            ));
            let line = self.format(&state, &header);
            self.write(&mut state, &line);
            state.chunk = Some(chunk.label());
        }
        ChunkScope { logger: self }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let mut state = self.state.lock();
        let line = self.format(&state, message);
        self.write(&mut state, &line);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log a tool command line.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log overall progress. Compact mode only logs each `progress_step`.
    ///
    /// Returns false when the update was filtered.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut state = self.state.lock();
            let step = self.config.progress_step.max(1);
            if percent / step <= state.last_progress / step && percent < 100 {
                return false;
            }
            state.last_progress = percent;
        }
        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record one line of tool output.
    ///
    /// Always kept in the tail buffer; written out only outside compact mode.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        let mut state = self.state.lock();
        if self.config.error_tail > 0 {
            if state.tail.len() >= self.config.error_tail {
                state.tail.pop_front();
            }
            state.tail.push_back(line.to_string());
        }

        if self.config.compact {
            return;
        }
        let raw = if is_stderr {
            format!("[stderr] {}", line)
        } else {
            line.to_string()
        };
        let formatted = self.format(&state, &raw);
        self.write(&mut state, &formatted);
    }

    /// Write out the buffered tool output of the current chunk.
    pub fn show_tail(&self, tool: &str) {
        let mut state = self.state.lock();
        if state.tail.is_empty() {
            return;
        }
        let header = self.format(&state, &format!("[{} tail]", tool));
        self.write(&mut state, &header);
        let lines: Vec<String> = state.tail.iter().map(|l| format!("  {}", l)).collect();
        for line in lines {
            let formatted = self.format(&state, &line);
            self.write(&mut state, &formatted);
        }
    }

    /// Flush and release the file. Later messages only reach the console.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
    }

    fn format(&self, state: &LoggerState, message: &str) -> String {
        let mut line = String::new();
        if self.config.show_timestamps {
            line.push_str(&format!("[{}] ", Local::now().format("%H:%M:%S")));
        }
        if let Some(chunk) = &state.chunk {
            line.push_str(&format!("[{}] ", chunk));
        }
        line.push_str(message);
        line
    }

    fn write(&self, state: &mut LoggerState, line: &str) {
        if let Some(file) = state.file.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
        if let Some(console) = &self.console {
            console(line);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Keeps a chunk's label on the job log; clears it when dropped.
#[must_use = "the chunk tag is removed as soon as the scope is dropped"]
pub struct ChunkScope<'a> {
    logger: &'a JobLogger,
}

impl Drop for ChunkScope<'_> {
    fn drop(&mut self) {
        self.logger.state.lock().chunk = None;
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::tempdir;

    fn plain() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    fn read(logger: JobLogger) -> String {
        let path = logger.log_path().to_path_buf();
        drop(logger);
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn runs_append_after_banners() {
        let dir = tempdir().unwrap();
        {
            let logger = JobLogger::new("movie", dir.path(), plain(), None).unwrap();
            logger.begin_run("run-1");
            logger.info("first");
        }
        let logger = JobLogger::new("movie", dir.path(), plain(), None).unwrap();
        logger.begin_run("run-2");
        logger.info("second");

        let content = read(logger);
        let first = content.find("run run-1 started").unwrap();
        let second = content.find("run run-2 started").unwrap();
        assert!(first < content.find("first").unwrap());
        assert!(second > content.find("first").unwrap());
        assert!(content.contains("second"));
    }

    #[test]
    fn chunk_scope_tags_lines_and_tool_output() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: false,
            ..plain()
        };
        let logger = JobLogger::new("movie", dir.path(), config, None).unwrap();

        {
            let _scope = logger.enter_chunk(&Chunk::new(2, 600, 900), 3);
            logger.command("x264 --stereo-mode mvc");
            logger.output_line("x264 [info]: 3D mode: MVC", true);
        }
        logger.info("after");

        let content = read(logger);
        assert!(content.contains("--- Chunk 3/3: chunk_00002 frames 600..900 ---"));
        assert!(content.contains("[chunk_00002] $ x264 --stereo-mode mvc"));
        assert!(content.contains("[chunk_00002] [stderr] x264 [info]: 3D mode: MVC"));
        assert!(content.lines().any(|l| l == "after"));
    }

    #[test]
    fn tail_holds_only_current_chunk_output() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 3,
            ..plain()
        };
        let logger = JobLogger::new("movie", dir.path(), config, None).unwrap();

        {
            let _scope = logger.enter_chunk(&Chunk::new(0, 0, 300), 2);
            logger.output_line("from chunk zero", false);
        }
        {
            let _scope = logger.enter_chunk(&Chunk::new(1, 300, 600), 2);
            for i in 0..5 {
                logger.output_line(&format!("line {}", i), false);
            }
            logger.show_tail("x264");
        }

        let content = read(logger);
        assert!(!content.contains("from chunk zero"));
        assert!(content.contains("[chunk_00001] [x264 tail]"));
        assert!(!content.contains("line 1"));
        assert!(content.contains("[chunk_00001]   line 2"));
        assert!(content.contains("[chunk_00001]   line 4"));
    }

    #[test]
    fn console_receives_formatted_lines_at_level() {
        let dir = tempdir().unwrap();
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let console: ConsoleCallback = Box::new(move |line| sink.lock().push(line.to_string()));

        let logger = JobLogger::new("movie", dir.path(), plain(), Some(console)).unwrap();
        logger.info("Message 1");
        logger.warn("Message 2");
        logger.debug("filtered at info level");

        assert_eq!(*seen.lock(), vec!["Message 1", "[WARNING] Message 2"]);
    }

    #[test]
    fn compact_mode_filters_progress() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: true,
            progress_step: 20,
            ..plain()
        };
        let logger = JobLogger::new("movie", dir.path(), config, None).unwrap();

        assert!(!logger.progress(5));
        assert!(!logger.progress(15));
        assert!(logger.progress(33));
        assert!(!logger.progress(34));
        assert!(logger.progress(66));
        assert!(logger.progress(100));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
