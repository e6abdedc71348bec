//! Logging for encode jobs.
//!
//! - [`JobLogger`]: per-job human-readable log, appended across runs, with
//!   chunk tagging and a tail buffer of tool output
//! - [`ToolEventLog`]: JSON Lines record of every external tool invocation
//! - [`env_filter`]: the `tracing` filter used for the application log
//!
//! # Example
//!
//! ```no_run
//! use bd3d_core::logging::{JobLogger, LogConfig};
//! use bd3d_core::models::Chunk;
//!
//! let logger = JobLogger::new("movie_3d", "/path/to/logs", LogConfig::default(), None)?;
//! logger.begin_run("movie_3d");
//! logger.phase("EncodeChunks");
//! {
//!     let _chunk = logger.enter_chunk(&Chunk::new(0, 0, 300), 3);
//!     logger.command("x264 --stereo-mode mvc ...");
//! }
//! logger.success("Stream confirmed");
//! # Ok::<(), std::io::Error>(())
//! ```

mod job_logger;
mod tool_events;
mod types;

pub use job_logger::{sanitize_filename, ChunkScope, JobLogger};
pub use tool_events::{read_events, ToolEvent, ToolEventLog, ToolReporter};
pub use types::{ConsoleCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::EnvFilter;

/// Filter honouring `RUST_LOG`, falling back to `default_level`.
pub fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
