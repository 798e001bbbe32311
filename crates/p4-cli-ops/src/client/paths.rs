use super::{to_args, P4Client};
use crate::types::{ChangeRecord, P4ChangeEntry, RunOptions};
use crate::ztag::ZtagRecord;
use crate::{P4CliOpsError, P4Result};
use tracing::warn;

impl P4Client {
    /// Depot paths of local files or folders. Folders are queried as
    /// `folder/...` and returned without the wildcard.
    pub async fn get_depot_paths(&self, paths: &[impl AsRef<str>]) -> P4Result<Vec<String>> {
        let queries: Vec<String> = paths
            .iter()
            .map(|path| {
                let cleaned = path.as_ref().replace('\\', "/");
                let cleaned = cleaned.trim_end_matches('/');
                if self.resolve_local(cleaned).is_dir() {
                    format!("{cleaned}/...")
                } else {
                    cleaned.to_string()
                }
            })
            .collect();

        let records = self.where_records(&queries).await?;
        Ok(records
            .iter()
            .filter_map(|record| record.get("depotFile"))
            .map(|depot| depot.strip_suffix("/...").unwrap_or(depot).to_string())
            .collect())
    }

    /// Local paths of depot or local paths. Revision specifiers are ignored.
    pub async fn get_local_paths(&self, paths: &[impl AsRef<str>]) -> P4Result<Vec<String>> {
        let queries: Vec<String> = paths
            .iter()
            .map(|path| strip_revision(path.as_ref()).to_string())
            .collect();

        let records = self.where_records(&queries).await?;
        Ok(records
            .iter()
            .filter_map(|record| record.get("path"))
            .map(str::to_string)
            .collect())
    }

    /// Submitted and pending changes touching each path, path by path.
    pub async fn get_history(&self, paths: &[impl AsRef<str>]) -> P4Result<Vec<ChangeRecord>> {
        let mut history = Vec::new();
        for path in to_args(paths) {
            let output = self
                .run_cmd(
                    "changes",
                    &["-l".to_string()],
                    &[path],
                    RunOptions::default(),
                )
                .await?
                .ensure_success()?;
            history.extend(change_records(&output.records)?);
        }
        Ok(history)
    }

    /// User of the most recent change of `depot_path`.
    pub(crate) async fn last_submitter(&self, depot_path: &str) -> P4Result<Option<String>> {
        let output = self
            .run_cmd(
                "changes",
                &["-m".to_string(), "1".to_string()],
                &[depot_path.to_string()],
                RunOptions::default(),
            )
            .await?
            .ensure_success()?;
        Ok(output
            .records
            .first()
            .and_then(|record| record.get("user"))
            .map(str::to_string))
    }

    async fn where_records(&self, queries: &[String]) -> P4Result<Vec<ZtagRecord>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let output = self
            .run_cmd("where", &[], queries, RunOptions::default())
            .await?
            .ensure_success()?;

        // Exclusion mappings come back as records flagged `unmap`.
        Ok(output
            .records
            .into_iter()
            .filter(|record| !record.contains("unmap"))
            .collect())
    }
}

pub(crate) fn change_records(records: &[ZtagRecord]) -> P4Result<Vec<ChangeRecord>> {
    let mut changes = Vec::with_capacity(records.len());
    for record in records {
        let entry: P4ChangeEntry = record.deserialize().map_err(|err| P4CliOpsError::ParseError {
            message: format!("invalid change record: {err}"),
        })?;
        match entry.into_record() {
            Some(change) => changes.push(change),
            None => warn!(record = ?record, "Skipping change record without a number"),
        }
    }
    Ok(changes)
}

/// `folder/...` with separators normalized and trailing slashes removed.
pub(crate) fn normalize_folder(folder: &str) -> String {
    let cleaned = folder.replace('\\', "/");
    format!("{}/...", cleaned.trim_end_matches('/'))
}

/// Drop a `#rev` specifier from the file name part of a path.
pub(crate) fn strip_revision(path: &str) -> &str {
    let name_start = path.rfind(['/', '\\']).map(|idx| idx + 1).unwrap_or(0);
    match path[name_start..].find('#') {
        Some(idx) => &path[..name_start + idx],
        None => path,
    }
}
