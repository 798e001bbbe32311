//! Persistent settings for p4ops.

use crate::{CoreError, CoreResult, Paths};
use p4_cli_ops::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings stored in `~/.p4ops/config.json`.
///
/// Every field is optional in the file; missing ones take their defaults.
/// Perforce values left empty are resolved by `p4 set` when connecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// trace, debug, info, warn or error.
    pub log_level: String,
    /// Workspace root. Falls back to `P4ROOT`, then the current directory.
    pub perforce_root: Option<PathBuf>,
    pub user: Option<String>,
    pub client: Option<String>,
    pub server: Option<String>,
    /// Explicit p4 executable; `P4_PATH` and `PATH` are searched otherwise.
    pub p4_executable: Option<PathBuf>,
    /// Per-command timeout in seconds. Unset means wait forever.
    pub command_timeout_secs: Option<u64>,
    pub online_check: bool,
    pub max_parallel_connections: u32,
    /// Suppress not-under-root validation and per-file warnings.
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            perforce_root: None,
            user: None,
            client: None,
            server: None,
            p4_executable: None,
            command_timeout_secs: None,
            online_check: true,
            max_parallel_connections: 1,
            silent: true,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load `config.json` if it exists, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.load_from_env();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// `P4OPS_LOG_LEVEL` overrides the log level, `P4ROOT` the workspace root.
    fn load_from_env(&mut self) {
        if let Some(level) = env_value("P4OPS_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(root) = env_value("P4ROOT") {
            self.perforce_root = Some(PathBuf::from(root));
        }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.max_parallel_connections == 0 {
            return Err(CoreError::Config(
                "max_parallel_connections must be at least 1".to_string(),
            ));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(CoreError::Config(
                "command_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the client configuration, rooted at the configured root or
    /// `fallback_root`.
    pub fn client_config(&self, fallback_root: impl Into<PathBuf>) -> ClientConfig {
        let root = self
            .perforce_root
            .clone()
            .unwrap_or_else(|| fallback_root.into());

        let mut config = ClientConfig::new(root)
            .with_silent(self.silent)
            .with_online_check(self.online_check)
            .with_max_parallel_connections(self.max_parallel_connections);
        if let Some(user) = &self.user {
            config = config.with_user(user.clone());
        }
        if let Some(client) = &self.client {
            config = config.with_client(client.clone());
        }
        if let Some(server) = &self.server {
            config = config.with_server(server.clone());
        }
        if let Some(executable) = &self.p4_executable {
            config = config.with_p4_executable(executable.clone());
        }
        if let Some(secs) = self.command_timeout_secs {
            config = config.with_command_timeout(Duration::from_secs(secs));
        }
        config
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.online_check);
        assert!(config.silent);
        assert_eq!(config.max_parallel_connections, 1);
        assert!(config.command_timeout_secs.is_none());
    }

    #[test]
    fn test_config_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "server": "perforce:1666", "max_parallel_connections": 4 }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.as_deref(), Some("perforce:1666"));
        assert_eq!(config.max_parallel_connections, 4);
        assert!(config.online_check);
    }

    #[test]
    fn test_config_rejects_zero_parallelism() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "max_parallel_connections": 0 }"#).unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_config_invalid_json() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            user: Some("alice".to_string()),
            command_timeout_secs: Some(30),
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert!(config.user.is_none());
        assert!(config.online_check);
    }

    #[test]
    fn test_client_config_mapping() {
        let config = Config {
            perforce_root: None,
            user: Some("alice".to_string()),
            server: Some("perforce:1666".to_string()),
            command_timeout_secs: Some(5),
            max_parallel_connections: 8,
            silent: false,
            ..Config::default()
        };

        let client = config.client_config("/work/game");
        assert_eq!(client.perforce_root, PathBuf::from("/work/game"));
        assert_eq!(client.user.as_deref(), Some("alice"));
        assert_eq!(client.server.as_deref(), Some("perforce:1666"));
        assert!(client.client.is_none());
        assert_eq!(client.command_timeout, Some(Duration::from_secs(5)));
        assert_eq!(client.max_parallel_connections, 8);
        assert!(!client.silent);
    }

    #[test]
    fn test_configured_root_wins() {
        let config = Config {
            perforce_root: Some(PathBuf::from("/work/configured")),
            ..Config::default()
        };
        assert_eq!(
            config.client_config("/work/cwd").perforce_root,
            PathBuf::from("/work/configured")
        );
    }
}
