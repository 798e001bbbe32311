//! # Observability
//!
//! Logging setup shared by the p4ops binaries.
//!
//! Library crates only emit `tracing` events. The binary calls
//! [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL file layer appending to `~/.p4ops/logs/p4ops.jsonl`
//!   (one object per event, flushed per line so several processes can share
//!   the file),
//! - optionally a compact human-readable layer on stderr.
//!
//! Both layers honor `RUST_LOG`, falling back to the configured level.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "p4ops".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! })?;
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{default_log_path, LogFileWriter};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written into every log line as `service`.
    pub service_name: String,

    /// Filter used when `RUST_LOG` is not set (e.g. "info", "p4_cli_ops=debug").
    pub default_level: String,

    /// Log file. Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Also print events to stderr.
    pub also_stderr: bool,

    /// Write the JSONL file at all. Disabled when no home directory exists
    /// and no `log_path` is given.
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            file_output: true,
        }
    }
}

/// Initialize with default settings for `service_name`.
pub fn init(service_name: &str) -> io::Result<Option<PathBuf>> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber.
///
/// Returns the log file in use, if any. Calling this a second time in the
/// same process leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) -> io::Result<Option<PathBuf>> {
    let log_path = if config.file_output {
        config.log_path.clone().or_else(default_log_path)
    } else {
        None
    };

    let json_layer = match &log_path {
        Some(path) => {
            let writer = LogFileWriter::new(path)?;
            Some(
                JsonLayer::new(config.service_name.clone(), writer)
                    .with_filter(env_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        if let Some(path) = &log_path {
            tracing::debug!(log_path = %path.display(), "observability initialized");
        }
    }
    Ok(log_path)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub use tracing::Level;
pub use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
        assert!(config.file_output);
    }

    #[test]
    fn test_init_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("test.jsonl");

        let used = init_with_config(LogConfig {
            service_name: "p4ops-test".into(),
            default_level: "info".into(),
            log_path: Some(path.clone()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));

        tracing::info!(files = 3, "synced");

        let content = std::fs::read_to_string(&path).unwrap();
        let line = content
            .lines()
            .find(|line| line.contains("synced"))
            .expect("event written");
        let entry: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(entry["service"], "p4ops-test");
        assert_eq!(entry["level"], "INFO");
        assert_eq!(entry["fields"]["files"], 3);
    }
}
