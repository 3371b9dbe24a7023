//! Logging Infrastructure
//!
//! Structured logging through `tracing`: stderr by default, or a daily
//! rolling file. Stdout stays free for command output.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger (stderr, `info` unless `RUST_LOG` says otherwise)
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is a no-op.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&Path>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        if std::fs::create_dir_all(dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(dir, "pos-server");
            let _ = builder.with_ansi(false).with_writer(file_appender).try_init();
            return;
        }
        eprintln!("Cannot create log directory {}, logging to stderr", dir.display());
    }

    let _ = builder.with_writer(std::io::stderr).try_init();
}
