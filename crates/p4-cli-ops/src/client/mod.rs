//! The Perforce client: connection settings plus every p4 operation.
//!
//! Operations are split by concern:
//! - `files`: descriptors and open/sync/revert operations
//! - `changelists`: pending changelist management and submission
//! - `paths`: `where` lookups and history

mod changelists;
mod files;
mod paths;

use crate::batch::{split_into_batches, MAX_ARG_LEN, MAX_CMD_LEN};
use crate::command_runner::{CommandRequest, P4CommandRunner};
use crate::types::{CommandOutput, P4Port, RunOptions};
use crate::{ClientConfig, P4CliOpsError, P4Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub(crate) use paths::normalize_folder;

const HOST_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Client bound to one Perforce workspace.
///
/// Every operation shells out to `p4` with the workspace root as working
/// directory. Subprocesses of one operation run one after another.
#[derive(Debug, Clone)]
pub struct P4Client {
    runner: P4CommandRunner,
    perforce_root: PathBuf,
    user: String,
    workspace: String,
    server: String,
    silent: bool,
    command_timeout: Option<Duration>,
    online_check: bool,
    max_parallel_connections: u32,
}

impl P4Client {
    /// Build a client, resolving any setting the config leaves unset.
    pub async fn connect(config: ClientConfig) -> P4Result<Self> {
        let requested_root = absolute_path(&config.perforce_root);
        let perforce_root = match find_p4config_root(&requested_root) {
            Some(root) => {
                info!(root = %root.display(), ".p4config found");
                root
            }
            None => {
                if !config.silent {
                    warn!(root = %requested_root.display(), "No .p4config file found");
                }
                requested_root
            }
        };

        let mut client = Self {
            runner: P4CommandRunner::new(config.p4_executable.as_deref()),
            perforce_root,
            user: config.user.clone().unwrap_or_default(),
            workspace: config.client.clone().unwrap_or_default(),
            server: config.server.clone().unwrap_or_default(),
            silent: config.silent,
            command_timeout: config.command_timeout,
            online_check: config.online_check,
            max_parallel_connections: config.max_parallel_connections.max(1),
        };

        if config.user.is_none() {
            client.user = client
                .get_p4_setting("P4USER")
                .await?
                .ok_or_else(|| P4CliOpsError::Workspace {
                    message: "Could not find P4USER".to_string(),
                })?;
        }

        if config.server.is_none() {
            client.server = client
                .find_p4_port()
                .await?
                .ok_or_else(|| P4CliOpsError::Workspace {
                    message: "Could not find P4PORT".to_string(),
                })?;
        }

        if config.client.is_none() {
            client.workspace = client
                .find_p4_client()
                .await?
                .ok_or_else(|| P4CliOpsError::Workspace {
                    message: "Could not find P4CLIENT".to_string(),
                })?;
        }

        debug!(
            user = %client.user,
            workspace = %client.workspace,
            server = %client.server,
            root = %client.perforce_root.display(),
            "p4 client ready"
        );
        Ok(client)
    }

    /// [`connect`](Self::connect) with the root taken from `P4ROOT`.
    pub async fn from_env(mut config: ClientConfig) -> P4Result<Self> {
        config.perforce_root = PathBuf::from(std::env::var("P4ROOT").unwrap_or_default());
        Self::connect(config).await
    }

    pub fn perforce_root(&self) -> &Path {
        &self.perforce_root
    }

    /// Change the working directory used for later commands. No `.p4config`
    /// search is done.
    pub fn set_perforce_root(&mut self, root: impl Into<PathBuf>) {
        self.perforce_root = root.into();
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn max_parallel_connections(&self) -> u32 {
        self.max_parallel_connections
    }

    pub fn set_max_parallel_connections(&mut self, connections: u32) {
        self.max_parallel_connections = connections.max(1);
    }

    /// Value of a p4 setting as printed by `p4 set NAME`.
    pub async fn get_p4_setting(&self, name: &str) -> P4Result<Option<String>> {
        let output = self
            .run_cmd("set", &[name.to_string()], &[], RunOptions::local())
            .await
            .map_err(|err| match err {
                P4CliOpsError::P4NotInstalled => err,
                other => P4CliOpsError::Workspace {
                    message: format!("Unable to find setting {name}: {other}"),
                },
            })?;
        Ok(parse_p4_setting(name, output.stdout()))
    }

    /// P4CLIENT when set, otherwise the first of the user's workspaces.
    pub async fn find_p4_client(&self) -> P4Result<Option<String>> {
        if let Some(client) = self.get_p4_setting("P4CLIENT").await? {
            return Ok(Some(client));
        }
        Ok(self.get_all_workspaces().await?.into_iter().next())
    }

    pub async fn find_p4_port(&self) -> P4Result<Option<String>> {
        self.get_p4_setting("P4PORT").await
    }

    /// Names of every workspace owned by the user.
    pub async fn get_all_workspaces(&self) -> P4Result<Vec<String>> {
        let output = self
            .run_cmd(
                "clients",
                &["-u".to_string(), self.user.clone()],
                &[],
                RunOptions {
                    online_check: false,
                    ..RunOptions::default()
                },
            )
            .await?
            .ensure_success()?;

        Ok(output
            .records
            .iter()
            .filter_map(|record| record.get("client").map(str::to_string))
            .collect())
    }

    /// Switch to another of the user's workspaces.
    pub async fn set_workspace(&mut self, workspace: &str) -> P4Result<()> {
        let workspaces = self.get_all_workspaces().await?;
        if !workspaces.iter().any(|name| name == workspace) {
            return Err(P4CliOpsError::Workspace {
                message: format!(
                    "Tried to set a workspace/client({workspace}) that did not exist"
                ),
            });
        }
        self.workspace = workspace.to_string();
        Ok(())
    }

    /// Whether a TCP connection to the P4PORT host succeeds within 2 seconds.
    pub async fn host_online(&self) -> bool {
        let Some(port) = P4Port::parse(&self.server) else {
            return false;
        };
        matches!(
            timeout(
                HOST_CHECK_TIMEOUT,
                TcpStream::connect((port.host.as_str(), port.port))
            )
            .await,
            Ok(Ok(_))
        )
    }

    /// Run an arbitrary p4 command.
    ///
    /// `flags` are repeated for every batch; `args` (usually file paths) are
    /// split so no batch exceeds [`MAX_ARG_LEN`]. Outputs of all batches are
    /// merged. Fatal errors (authentication, connection, workspace, usage)
    /// abort; per-file diagnostics end up in [`CommandOutput::messages`].
    pub async fn run_cmd(
        &self,
        cmd: &str,
        flags: &[String],
        args: &[String],
        options: RunOptions,
    ) -> P4Result<CommandOutput> {
        if options.online_check && !self.is_online().await {
            warn!(server = %self.server, "Can't connect to perforce server");
        }

        let mut prefix: Vec<String> = Vec::new();
        if options.tagged {
            prefix.push("-ztag".to_string());
        }
        if options.use_global_options {
            prefix.extend(self.global_args());
        }
        prefix.push(cmd.to_string());
        prefix.extend(flags.iter().cloned());

        let batches = if args.is_empty() {
            vec![Vec::new()]
        } else {
            split_into_batches(args, MAX_ARG_LEN)
        };

        let mut merged: Option<CommandOutput> = None;
        for batch in batches {
            let mut full_args = prefix.clone();
            full_args.extend(batch);

            let command_line = self.runner.describe(&full_args);
            if command_line.len() > MAX_CMD_LEN {
                warn!(
                    length = command_line.len(),
                    max = MAX_CMD_LEN,
                    command = %command_line,
                    "Command length exceeds MAX_CMD_LEN"
                );
            }

            let output = self.execute(full_args, None, options.tagged).await?;
            match merged.as_mut() {
                Some(existing) => existing.merge(output),
                None => merged = Some(output),
            }
        }

        let output = merged.unwrap_or_else(CommandOutput::empty);
        if !self.silent {
            for message in &output.messages {
                warn!(command = cmd, "{message}");
            }
        }
        Ok(output)
    }

    /// Run one p4 invocation with optional stdin and abort on fatal errors.
    async fn execute(
        &self,
        args: Vec<String>,
        input: Option<String>,
        tagged: bool,
    ) -> P4Result<CommandOutput> {
        let request = CommandRequest {
            args,
            working_dir: Some(self.perforce_root.clone()),
            input,
            timeout: self.command_timeout,
        };
        let run = self.runner.run(&request).await?;
        let output = CommandOutput::from_run(run, tagged);

        match output.failure() {
            Some(err) if err.is_fatal() => Err(err),
            _ => Ok(output),
        }
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.user.is_empty() {
            args.push("-u".to_string());
            args.push(self.user.clone());
        }
        if !self.workspace.is_empty() {
            args.push("-c".to_string());
            args.push(self.workspace.clone());
        }
        args
    }

    async fn is_online(&self) -> bool {
        !self.online_check || self.host_online().await
    }

    /// Reject local paths outside the workspace root. Skipped when silent.
    fn validate_paths(&self, paths: &[String]) -> P4Result<()> {
        if self.silent {
            return Ok(());
        }
        let root = self.perforce_root.to_string_lossy().replace('\\', "/");
        let root_lower = root.to_lowercase();
        for path in paths {
            if path.starts_with("//") || Path::new(path).is_relative() {
                continue;
            }
            if !path.replace('\\', "/").to_lowercase().starts_with(&root_lower) {
                return Err(P4CliOpsError::NotUnderRoot {
                    path: path.clone(),
                    root: root.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Parse `NAME=value (source)` as printed by `p4 set NAME`.
pub(crate) fn parse_p4_setting(name: &str, output: &str) -> Option<String> {
    let prefix = format!("{name}=");
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| {
            line.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
        })?;
    let value = line.get(prefix.len()..)?.split_whitespace().next()?;
    if value.is_empty() || value == "none" {
        return None;
    }
    Some(value.to_string())
}

/// Closest folder at or above `start` holding a `.p4config` file.
fn find_p4config_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".p4config").is_file())
        .map(Path::to_path_buf)
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn to_args(values: &[impl AsRef<str>]) -> Vec<String> {
    values.iter().map(|value| value.as_ref().to_string()).collect()
}
