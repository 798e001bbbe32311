//! Per-file state as reported by `p4 fstat`.

use crate::types::parse_epoch_seconds;
use crate::ztag::ZtagRecord;
use crate::{P4Client, P4Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived state of a file, in the order the checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    OpenForDelete,
    NeedSync,
    DepotOnly,
    OpenForAdd,
    OpenForEdit,
    Untracked,
    Moved,
    UpToDate,
    Unknown,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenForDelete => "OPEN_FOR_DELETE",
            Self::NeedSync => "NEED_SYNC",
            Self::DepotOnly => "DEPOT_ONLY",
            Self::OpenForAdd => "OPEN_FOR_ADD",
            Self::OpenForEdit => "OPEN_FOR_EDIT",
            Self::Untracked => "UNTRACKED",
            Self::Moved => "MOVED",
            Self::UpToDate => "UP_TO_DATE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one file's Perforce state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct P4File {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depot_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub have_rev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_rev: Option<u32>,
    /// Open action in this workspace (`edit`, `add`, `delete`, `move/add`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Action of the head revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_time: Option<DateTime<Utc>>,
    /// `user@workspace` entries of everyone else that has the file open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checked_out_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_submitted_by: Option<String>,
    /// p4 reported `no such file(s)` for this path.
    #[serde(default)]
    pub untracked: bool,
    /// p4 reported the path outside the client root or view.
    #[serde(default)]
    pub outside_root: bool,
    /// Built without contacting the server.
    #[serde(default)]
    pub offline: bool,
    /// Diagnostic line p4 printed for this file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl P4File {
    pub fn new(local_path: Option<String>, depot_path: Option<String>) -> Self {
        Self {
            local_path,
            depot_path,
            ..Self::default()
        }
    }

    pub fn from_fstat(record: &ZtagRecord) -> Self {
        Self {
            local_path: record.get("clientFile").map(str::to_string),
            depot_path: record.get("depotFile").map(str::to_string),
            have_rev: record.get_u32("haveRev"),
            head_rev: record.get_u32("headRev"),
            action: non_empty_field(record, "action"),
            head_action: non_empty_field(record, "headAction"),
            head_time: record.get("headTime").and_then(parse_epoch_seconds),
            checked_out_by: record
                .indexed("otherOpen")
                .into_iter()
                .map(str::to_string)
                .collect(),
            ..Self::default()
        }
    }

    pub fn untracked(local_path: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            local_path: Some(local_path.into()),
            untracked: true,
            diagnostic: Some(diagnostic.into()),
            ..Self::default()
        }
    }

    pub fn outside_root(local_path: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            local_path: Some(local_path.into()),
            outside_root: true,
            diagnostic: Some(diagnostic.into()),
            ..Self::default()
        }
    }

    pub fn offline(local_path: impl Into<String>) -> Self {
        Self {
            local_path: Some(local_path.into()),
            offline: true,
            diagnostic: Some("HOST OFFLINE".to_string()),
            ..Self::default()
        }
    }

    /// Depot path when known, local path otherwise.
    pub fn query_path(&self) -> Option<&str> {
        self.depot_path.as_deref().or(self.local_path.as_deref())
    }

    pub fn is_valid(&self) -> bool {
        self.local_path.is_some() || self.depot_path.is_some()
    }

    pub fn is_open_for_add(&self) -> bool {
        self.action.as_deref() == Some("add")
    }

    pub fn is_open_for_edit(&self) -> bool {
        self.action.as_deref() == Some("edit")
    }

    pub fn is_untracked(&self) -> bool {
        self.untracked
    }

    pub fn is_local_only(&self) -> bool {
        self.is_untracked()
    }

    pub fn is_checked_out(&self) -> bool {
        self.action.is_some()
    }

    pub fn is_depot_only(&self) -> bool {
        self.have_rev.is_none() && self.head_rev.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.head_action.as_deref() == Some("delete")
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.action.as_deref() == Some("delete")
    }

    pub fn is_moved_deleted(&self) -> bool {
        self.action.as_deref() == Some("move/delete")
            || self.head_action.as_deref() == Some("move/delete")
    }

    pub fn is_moved_added(&self) -> bool {
        self.action.as_deref() == Some("move/add")
    }

    pub fn is_up_to_date(&self) -> bool {
        self.head_rev.is_some() && self.have_rev == self.head_rev
    }

    pub fn is_under_client_root(&self) -> bool {
        !self.outside_root
    }

    pub fn needs_syncing(&self) -> bool {
        if self.is_deleted()
            || self.is_moved_deleted()
            || self.is_open_for_add()
            || self.is_open_for_edit()
        {
            return false;
        }
        match (self.have_rev, self.head_rev) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(have), Some(head)) => have < head,
        }
    }

    pub fn status(&self) -> FileStatus {
        if self.offline || self.outside_root {
            return FileStatus::Unknown;
        }
        if self.is_marked_for_delete() {
            FileStatus::OpenForDelete
        } else if self.needs_syncing() {
            FileStatus::NeedSync
        } else if self.is_depot_only() {
            FileStatus::DepotOnly
        } else if self.is_open_for_add() {
            FileStatus::OpenForAdd
        } else if self.is_open_for_edit() {
            FileStatus::OpenForEdit
        } else if self.is_local_only() {
            FileStatus::Untracked
        } else if self.is_moved_added() {
            FileStatus::Moved
        } else if self.is_up_to_date() {
            FileStatus::UpToDate
        } else {
            FileStatus::Unknown
        }
    }

    /// Re-query this file and replace every field with the fresh state.
    /// Leaves the descriptor untouched when p4 reports nothing for it.
    pub async fn refresh(&mut self, client: &P4Client) -> P4Result<()> {
        let Some(path) = self.query_path().map(str::to_string) else {
            return Ok(());
        };
        if let Some(fresh) = client.files_to_p4files(&[path], true).await?.into_iter().next() {
            *self = fresh;
        }
        Ok(())
    }

    /// Fill `last_submitted_by` from the most recent change of the file.
    pub async fn update_last_submitted_by(&mut self, client: &P4Client) -> P4Result<()> {
        let Some(depot_path) = self.depot_path.clone() else {
            return Ok(());
        };
        let submitter = client.last_submitter(&depot_path).await?;
        self.last_submitted_by = Some(submitter.unwrap_or_else(|| "UNKNOWN".to_string()));
        Ok(())
    }
}

fn non_empty_field(record: &ZtagRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
