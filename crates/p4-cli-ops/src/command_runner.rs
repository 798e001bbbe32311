use crate::P4CliOpsError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[cfg(unix)]
const INSTALL_CANDIDATES: &[&str] = &["/opt/homebrew/bin/p4", "/usr/local/bin/p4", "/usr/bin/p4"];
#[cfg(windows)]
const INSTALL_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Perforce\p4.exe",
    r"C:\Program Files (x86)\Perforce\p4.exe",
];
#[cfg(not(any(unix, windows)))]
const INSTALL_CANDIDATES: &[&str] = &[];

/// A single p4 invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Text written to the child's stdin (e.g. a changelist form for `change -i`).
    pub input: Option<String>,
    pub timeout: Option<Duration>,
}

/// Raw command output from a p4 subprocess.
#[derive(Debug, Clone)]
pub struct CommandRunOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Responsible for locating and executing the Perforce CLI.
#[derive(Debug, Clone)]
pub struct P4CommandRunner {
    executable: PathBuf,
}

impl Default for P4CommandRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl P4CommandRunner {
    pub fn new(executable: Option<&Path>) -> Self {
        Self {
            executable: resolve_p4_executable(executable),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Human readable command line, used for logs and error messages.
    pub fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.executable.display(), args.join(" "))
    }

    /// Run p4 to completion. Any exit code is returned as output; only
    /// spawn failures and timeouts are errors here.
    pub async fn run(&self, request: &CommandRequest) -> Result<CommandRunOutput, P4CliOpsError> {
        let command_repr = self.describe(&request.args);
        debug!(command = %command_repr, "running p4 command");

        let mut cmd = Command::new(&self.executable);
        cmd.args(&request.args);
        cmd.stdin(if request.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        apply_non_interactive_env(&mut cmd);

        if let Some(dir) = request.working_dir.as_deref() {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                P4CliOpsError::P4NotInstalled
            } else {
                P4CliOpsError::CommandFailed {
                    message: format!("failed to execute p4 command: {err}"),
                    exit_code: None,
                    stderr: String::new(),
                    stdout: String::new(),
                }
            }
        })?;

        if let Some(input) = request.input.as_deref() {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = match request.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Err(_) => {
                    return Err(P4CliOpsError::Timeout {
                        command: command_repr,
                        timeout_secs: limit.as_secs(),
                    });
                }
                Ok(result) => result?,
            },
            None => child.wait_with_output().await?,
        };

        Ok(CommandRunOutput {
            command: command_repr,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

fn apply_non_interactive_env(cmd: &mut Command) {
    // Form-editing commands (change, client, submit) must never open an editor.
    #[cfg(unix)]
    cmd.env("P4EDITOR", "true");
    #[cfg(windows)]
    cmd.env("P4EDITOR", "cmd /c exit");
}

fn resolve_p4_executable(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("P4_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    for candidate in INSTALL_CANDIDATES {
        if Path::new(candidate).exists() {
            return PathBuf::from(candidate);
        }
    }

    PathBuf::from("p4")
}

pub(crate) fn classify_failed_command(
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> P4CliOpsError {
    let combined = format!("{stderr}\n{stdout}").to_ascii_lowercase();

    if combined.contains("perforce password (p4passwd) invalid or unset")
        || combined.contains("your session has expired")
        || combined.contains("please login again")
    {
        return P4CliOpsError::NotAuthenticated {
            message: non_empty(stderr, stdout, "Perforce session is not authenticated"),
        };
    }

    if combined.contains("connect to server failed") || combined.contains("tcp connect to") {
        return P4CliOpsError::ServerOffline {
            server: non_empty(stderr, stdout, "unknown server"),
        };
    }

    if combined.contains("unknown client")
        || (combined.contains("client '") && combined.contains("unknown"))
        || combined.contains("use 'client' command to create it")
    {
        return P4CliOpsError::Workspace {
            message: non_empty(stderr, stdout, "invalid workspace"),
        };
    }

    if combined.contains("no such changelist")
        || (combined.contains("change ") && combined.contains("unknown"))
    {
        return P4CliOpsError::Changelist {
            message: non_empty(stderr, stdout, "invalid changelist"),
        };
    }

    if combined.contains("no such file(s)") || combined.contains("not found") {
        return P4CliOpsError::NotFound {
            message: non_empty(stderr, stdout, "resource not found"),
        };
    }

    if combined.contains("usage:")
        || combined.contains("invalid option")
        || combined.contains("unknown command")
        || combined.contains("missing/wrong number of arguments")
    {
        return P4CliOpsError::InvalidParams {
            message: non_empty(stderr, stdout, "invalid parameters"),
        };
    }

    P4CliOpsError::CommandFailed {
        message: non_empty(
            stderr,
            stdout,
            &format!("p4 command failed with exit code {:?}", exit_code),
        ),
        exit_code,
        stderr: stderr.to_string(),
        stdout: stdout.to_string(),
    }
}

fn non_empty(primary: &str, secondary: &str, fallback: &str) -> String {
    if !primary.trim().is_empty() {
        primary.trim().to_string()
    } else if !secondary.trim().is_empty() {
        secondary.trim().to_string()
    } else {
        fallback.to_string()
    }
}
