use chrono::{DateTime, Utc};
use p4_cli_ops::{ChangelistRef, CommandOutput, P4CliOpsError, P4File, RunOptions, SyncOptions};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier handed out by the queue: `op_000001`, `op_000002`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(format!("op_{sequence:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A client call waiting to run on the queue's worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OperationRequest {
    RunCommand {
        cmd: String,
        flags: Vec<String>,
        args: Vec<String>,
        options: RunOptions,
    },
    SyncFiles {
        files: Vec<String>,
        options: SyncOptions,
    },
    SyncFolders {
        folders: Vec<String>,
    },
    SubmitChangelist {
        changelist: ChangelistRef,
    },
    FilesToP4Files {
        files: Vec<String>,
        allow_invalid: bool,
    },
    FolderToP4Files {
        folder: String,
        include_subfolders: bool,
        allow_invalid: bool,
    },
    MakeNewChangelist {
        description: String,
    },
    MoveFilesToChangelist {
        files: Vec<String>,
        changelist: ChangelistRef,
    },
    RevertFiles {
        files: Vec<String>,
        unchanged_only: bool,
    },
}

impl OperationRequest {
    /// Name of the client method the request maps to.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::RunCommand { .. } => "run_cmd",
            Self::SyncFiles { .. } => "sync_files",
            Self::SyncFolders { .. } => "sync_folders",
            Self::SubmitChangelist { .. } => "submit_changelist",
            Self::FilesToP4Files { .. } => "files_to_p4files",
            Self::FolderToP4Files { .. } => "folder_to_p4files",
            Self::MakeNewChangelist { .. } => "make_new_changelist",
            Self::MoveFilesToChangelist { .. } => "move_files_to_changelist",
            Self::RevertFiles { .. } => "revert_files",
        }
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationOutput {
    Command(CommandOutput),
    Files(Vec<P4File>),
    Changelist(u32),
}

impl OperationOutput {
    pub fn as_command(&self) -> Option<&CommandOutput> {
        match self {
            Self::Command(output) => Some(output),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&[P4File]> {
        match self {
            Self::Files(files) => Some(files),
            _ => None,
        }
    }

    pub fn as_changelist(&self) -> Option<u32> {
        match self {
            Self::Changelist(number) => Some(*number),
            _ => None,
        }
    }
}

/// Error recorded for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: String,
    pub message: String,
}

impl From<&P4CliOpsError> for OperationError {
    fn from(err: &P4CliOpsError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Completed, failed and cancelled operations never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Point-in-time view of a queued operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: OperationId,
    pub method: String,
    pub request: OperationRequest,
    pub status: OperationStatus,
    pub output: Option<OperationOutput>,
    pub error: Option<OperationError>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 0.0 until the operation finishes, 100.0 once it completed.
    pub progress: f32,
}

impl OperationSnapshot {
    pub(crate) fn pending(id: OperationId, request: OperationRequest) -> Self {
        Self {
            id,
            method: request.method_name().to_string(),
            request,
            status: OperationStatus::Pending,
            output: None,
            error: None,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            progress: 0.0,
        }
    }

    /// Run time, once the operation has started and finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Lifecycle notification broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum OperationEvent {
    Started(OperationSnapshot),
    Completed(OperationSnapshot),
    Failed(OperationSnapshot),
    Cancelled(OperationSnapshot),
}

impl OperationEvent {
    pub fn snapshot(&self) -> &OperationSnapshot {
        match self {
            Self::Started(snapshot)
            | Self::Completed(snapshot)
            | Self::Failed(snapshot)
            | Self::Cancelled(snapshot) => snapshot,
        }
    }
}
