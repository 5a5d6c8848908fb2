//! Tracing setup for the CLI and tests.
//!
//! The CLI logs to a daily file under `$XDG_STATE_HOME/taskpilot/`, named
//! after [`Config::log_path`] plus a date suffix. The terminal is left to
//! command output. `RUST_LOG` overrides `logging.level`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Keeps the background log writer running; pending lines are flushed on drop.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber writing to the taskpilot log file.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_path = Config::log_path();
    let appender = daily_appender(&log_path, config.max_files)?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(level_filter(&config.level))
        .with(file_layer)
        .init();

    tracing::info!(
        log_path = %log_path.display(),
        level = %config.level,
        "taskpilot logging started"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Test subscriber on the libtest writer; a second call is a no-op.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Rotating appender next to `log_path`, keeping at most `max_files` days.
fn daily_appender(log_path: &Path, max_files: usize) -> Result<RollingFileAppender> {
    let dir = log_path
        .parent()
        .ok_or_else(|| Error::Config(format!("no directory for log file {}", log_path.display())))?;
    let prefix = log_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Config(format!("bad log file name {}", log_path.display())))?;

    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to open log file in {}: {}", dir.display(), e)))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
