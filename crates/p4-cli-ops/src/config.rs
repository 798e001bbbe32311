//! Connection settings for a [`P4Client`](crate::P4Client).

use std::path::PathBuf;
use std::time::Duration;

/// Settings used to build a client. Anything left as `None` is resolved
/// from `p4 set` when connecting.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Workspace root. A `.p4config` in this folder or one of its parents
    /// replaces it as the root.
    pub perforce_root: PathBuf,

    /// P4USER.
    pub user: Option<String>,

    /// P4CLIENT (workspace name).
    pub client: Option<String>,

    /// P4PORT, e.g. `ssl:perforce.example.com:1666`.
    pub server: Option<String>,

    /// Suppress warnings and skip root validation of file arguments.
    pub silent: bool,

    /// Explicit path to the p4 executable.
    pub p4_executable: Option<PathBuf>,

    /// Upper bound for a single p4 invocation. `None` waits indefinitely.
    pub command_timeout: Option<Duration>,

    /// Probe the server before queries that can fall back to local data.
    pub online_check: bool,

    /// Threads used by `p4 sync --parallel`. 1 disables parallel sync.
    pub max_parallel_connections: u32,
}

impl ClientConfig {
    pub fn new(perforce_root: impl Into<PathBuf>) -> Self {
        Self {
            perforce_root: perforce_root.into(),
            user: None,
            client: None,
            server: None,
            silent: true,
            p4_executable: None,
            command_timeout: None,
            online_check: true,
            max_parallel_connections: 1,
        }
    }

    /// Root taken from the `P4ROOT` environment variable (empty when unset).
    pub fn from_env() -> Self {
        Self::new(std::env::var("P4ROOT").unwrap_or_default())
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_p4_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.p4_executable = Some(executable.into());
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn with_online_check(mut self, online_check: bool) -> Self {
        self.online_check = online_check;
        self
    }

    pub fn with_max_parallel_connections(mut self, connections: u32) -> Self {
        self.max_parallel_connections = connections.max(1);
        self
    }
}
