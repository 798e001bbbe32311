use thiserror::Error;

/// Error taxonomy for Perforce CLI orchestration.
#[derive(Debug, Error)]
pub enum P4CliOpsError {
    #[error("Perforce CLI (p4) is not installed")]
    P4NotInstalled,

    #[error("Perforce session is not authenticated: {message}")]
    NotAuthenticated { message: String },

    #[error("Perforce server {server} is not reachable")]
    ServerOffline { server: String },

    #[error("Workspace error: {message}")]
    Workspace { message: String },

    #[error("Changelist error: {message}")]
    Changelist { message: String },

    #[error("{path} is not under perforce root: {root}")]
    NotUnderRoot { path: String, root: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Perforce command failed: {message}")]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    #[error("Perforce command timed out after {timeout_secs}s: {command}")]
    Timeout {
        command: String,
        timeout_secs: u64,
    },

    #[error("Failed to parse Perforce output: {message}")]
    ParseError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl P4CliOpsError {
    /// Stable machine-readable error code for CLI and queue consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::P4NotInstalled => "p4_not_installed",
            Self::NotAuthenticated { .. } => "not_authenticated",
            Self::ServerOffline { .. } => "server_offline",
            Self::Workspace { .. } => "workspace_error",
            Self::Changelist { .. } => "changelist_error",
            Self::NotUnderRoot { .. } => "not_under_root",
            Self::InvalidParams { .. } => "invalid_params",
            Self::NotFound { .. } => "not_found",
            Self::CommandFailed { .. } => "command_failed",
            Self::Timeout { .. } => "timeout",
            Self::ParseError { .. } => "parse_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Errors that make every remaining batch of a command pointless, as
    /// opposed to per-file diagnostics.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::P4NotInstalled
                | Self::NotAuthenticated { .. }
                | Self::ServerOffline { .. }
                | Self::Workspace { .. }
                | Self::Changelist { .. }
                | Self::InvalidParams { .. }
                | Self::Timeout { .. }
        )
    }
}

/// Result type alias using P4CliOpsError.
pub type P4Result<T> = Result<T, P4CliOpsError>;
