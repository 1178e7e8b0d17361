use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GUTHEALTH_LOG";
pub const LOG_FILE: &str = "guthealth.log";

/// Level filter from GUTHEALTH_LOG, then the configured level, then `info`.
fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .ok()
        .or_else(|| configured.and_then(|level| level.parse().ok()))
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Log to a file so the terminal UI owns the screen. Keep the guard alive
/// until exit or buffered lines are lost.
pub fn init_file(dir: &Path, configured: Option<&str>) -> Result<WorkerGuard> {
    fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(guard)
}

/// Log to stderr for the one-shot commands
pub fn init_stderr(configured: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
