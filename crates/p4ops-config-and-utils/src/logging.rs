//! Logging initialization for p4ops binaries.
//!
//! Wraps the observability crate: JSONL events go to
//! `~/.p4ops/logs/p4ops.jsonl`, and optionally to stderr.

use std::path::PathBuf;

pub use observability::LogConfig;

/// Install the global subscriber at `level` (overridden by `RUST_LOG`).
///
/// With `also_stderr` events are echoed to stderr as well. Failing to open
/// the log file is reported on stderr and logging continues without it.
pub fn init_logging(level: &str, also_stderr: bool) -> Option<PathBuf> {
    init_logging_for_service("p4ops", level, also_stderr)
}

/// Same as [`init_logging`] with a custom `service` field.
pub fn init_logging_for_service(service_name: &str, level: &str, also_stderr: bool) -> Option<PathBuf> {
    let config = LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        also_stderr,
        ..Default::default()
    };

    match observability::init_with_config(config.clone()) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("warning: could not open log file: {err}");
            let _ = observability::init_with_config(LogConfig {
                file_output: false,
                ..config
            });
            None
        }
    }
}

/// Parse a log level name; unknown names mean INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
