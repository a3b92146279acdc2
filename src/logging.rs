use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "capital-iq.log";

/// Level for one-shot commands when `RUST_LOG` is unset: results only.
pub const COMMAND_LEVEL: &str = "warn";
/// Level for the dashboard's log file when `RUST_LOG` is unset.
pub const DASHBOARD_LEVEL: &str = "info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// One-shot commands: log to stderr so stdout carries only results.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(COMMAND_LEVEL))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Dashboard: the terminal belongs to the TUI, so log to a file in `dir`.
/// Keep the guard alive for the whole session or buffered lines are lost.
pub fn init_file(dir: &Path) -> Option<WorkerGuard> {
    if std::fs::create_dir_all(dir).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter(DASHBOARD_LEVEL))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .ok()?;
    Some(guard)
}
