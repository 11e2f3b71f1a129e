//! Tracing setup.
//!
//! Logs go to a daily rolling file so they never interleave with streamed
//! assistant output on stdout. `PREP_LOG` takes an `EnvFilter` directive.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive.
pub const LOG_FILTER_ENV: &str = "PREP_LOG";

const DEFAULT_FILTER: &str = "prep_core=info,prep=info";

/// Installs the global subscriber writing to `<log_dir>/prep.log.<date>`.
///
/// The returned guard must be held until exit so buffered lines are flushed.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let appender = tracing_appender::rolling::daily(log_dir, "prep.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}
