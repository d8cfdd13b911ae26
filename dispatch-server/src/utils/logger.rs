//! Logging Infrastructure
//!
//! `EnvFilter`-driven fmt subscriber; optional JSON lines and a daily
//! rolling file under the work dir.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with defaults (info, plain text, stdout)
pub fn init_logger() {
    init_logger_with_file(None, None, None);
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` takes precedence over `log_level` when set. Calling this
/// twice is harmless; the second install is ignored.
pub fn init_logger_with_file(log_level: Option<&str>, json: Option<bool>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = json.unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true);

    let file_dir = log_dir.map(Path::new).filter(|p| p.exists());

    let installed = match (file_dir, json) {
        (Some(dir), true) => {
            let appender = tracing_appender::rolling::daily(dir, "dispatch-server");
            builder.json().with_writer(appender).try_init()
        }
        (Some(dir), false) => {
            let appender = tracing_appender::rolling::daily(dir, "dispatch-server");
            builder.with_ansi(false).with_writer(appender).try_init()
        }
        (None, true) => builder.json().try_init(),
        (None, false) => builder.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Logger already initialized");
    }
}
