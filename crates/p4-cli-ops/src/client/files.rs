use super::{normalize_folder, to_args, P4Client};
use crate::types::{Changelist, ChangelistRef, CommandOutput, RunOptions, SyncOptions};
use crate::{P4File, P4Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

impl P4Client {
    /// Describe `files` with one batched `fstat`.
    ///
    /// Paths p4 does not know become untracked descriptors; paths outside the
    /// client root or view are flagged as such. When the server cannot be
    /// reached every path gets an offline descriptor. Unless `allow_invalid`,
    /// files deleted at head (including move/delete) are left out.
    pub async fn files_to_p4files(
        &self,
        files: &[impl AsRef<str>],
        allow_invalid: bool,
    ) -> P4Result<Vec<P4File>> {
        let files = to_args(files);
        if files.is_empty() {
            return Ok(Vec::new());
        }

        if !self.is_online().await {
            warn!(server = %self.server, "Server unreachable, returning offline descriptors");
            return Ok(files.into_iter().map(P4File::offline).collect());
        }

        let output = self
            .run_cmd("fstat", &[], &files, RunOptions::default())
            .await?;
        let mut descriptors = fstat_to_p4files(&output, allow_invalid);
        order_by_input(&mut descriptors, &files);
        Ok(descriptors)
    }

    /// Describe every file in `folder`, recursively when `include_subfolders`.
    /// Offline, the local folder is walked instead.
    pub async fn folder_to_p4files(
        &self,
        folder: &str,
        include_subfolders: bool,
        allow_invalid: bool,
    ) -> P4Result<Vec<P4File>> {
        if !self.is_online().await {
            let local = self.collect_local_files(folder, include_subfolders);
            return Ok(local.into_iter().map(P4File::offline).collect());
        }

        let pattern = if include_subfolders {
            normalize_folder(folder)
        } else {
            format!("{}/*", folder.replace('\\', "/").trim_end_matches('/'))
        };

        let output = self
            .run_cmd("fstat", &[], &[pattern], RunOptions::default())
            .await?;
        Ok(fstat_to_p4files(&output, allow_invalid))
    }

    /// Open files for edit in `changelist`, creating it when given by an
    /// unknown description.
    pub async fn edit_files(
        &self,
        files: &[impl AsRef<str>],
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to edit");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&files)?;
        let changelist = self.ensure_changelist(changelist).await?;
        self.open_files("edit", &files, changelist).await
    }

    pub async fn add_files(
        &self,
        files: &[impl AsRef<str>],
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to add");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&files)?;
        let changelist = self.ensure_changelist(changelist).await?;
        self.open_files("add", &files, changelist).await
    }

    /// Add files p4 does not track (or that are deleted at head) and edit
    /// tracked ones. Files already open are left alone.
    pub async fn add_or_edit_files(
        &self,
        files: &[impl AsRef<str>],
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to add or edit");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&files)?;

        let mut to_add = Vec::new();
        let mut to_edit = Vec::new();
        for file in self.files_to_p4files(&files, true).await? {
            if file.is_checked_out() || file.offline || file.outside_root {
                continue;
            }
            if file.is_local_only() || file.is_deleted() || file.is_moved_deleted() {
                if let Some(path) = file.local_path {
                    to_add.push(path);
                }
            } else if let Some(depot_path) = file.depot_path {
                to_edit.push(depot_path);
            }
        }

        if to_add.is_empty() && to_edit.is_empty() {
            debug!("Nothing to add or edit");
            return Ok(CommandOutput::empty());
        }

        let changelist = self.ensure_changelist(changelist).await?;
        let mut output = CommandOutput::empty();
        if !to_add.is_empty() {
            output.merge(self.open_files("add", &to_add, changelist).await?);
        }
        if !to_edit.is_empty() {
            output.merge(self.open_files("edit", &to_edit, changelist).await?);
        }
        Ok(output)
    }

    /// [`add_or_edit_files`](Self::add_or_edit_files) over the files found
    /// on disk in `folders`.
    pub async fn add_or_edit_folders(
        &self,
        folders: &[impl AsRef<str>],
        include_subfolders: bool,
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files: Vec<String> = folders
            .iter()
            .flat_map(|folder| self.collect_local_files(folder.as_ref(), include_subfolders))
            .collect();
        self.add_or_edit_files(&files, changelist).await
    }

    /// Mark files for delete.
    pub async fn delete_files(
        &self,
        files: &[impl AsRef<str>],
        changelist: &ChangelistRef,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to delete");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&files)?;
        let changelist = self.ensure_changelist(changelist).await?;
        self.open_files("delete", &files, changelist).await
    }

    /// Revert files; with `unchanged_only` only files without local changes
    /// (`revert -a`).
    pub async fn revert_files(
        &self,
        files: &[impl AsRef<str>],
        unchanged_only: bool,
    ) -> P4Result<CommandOutput> {
        let files = to_args(files);
        if files.is_empty() {
            warn!("No files given to revert");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&files)?;

        let flags = if unchanged_only {
            vec!["-a".to_string()]
        } else {
            Vec::new()
        };
        self.run_cmd("revert", &flags, &files, RunOptions::default())
            .await
    }

    /// Recursively revert whole folders.
    pub async fn revert_folders(&self, folders: &[impl AsRef<str>]) -> P4Result<CommandOutput> {
        let folders = to_args(folders);
        if folders.is_empty() {
            warn!("No folders given to revert");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&folders)?;

        let patterns: Vec<String> = folders.iter().map(|f| normalize_folder(f)).collect();
        self.run_cmd("revert", &[], &patterns, RunOptions::default())
            .await
    }

    /// Sync files to head or to `options.revision`.
    ///
    /// With `options.verify` (head syncs only) every synced file is looked up
    /// with `where` and a warning is logged for each one missing on disk.
    pub async fn sync_files(
        &self,
        files: &[impl AsRef<str>],
        options: &SyncOptions,
    ) -> P4Result<CommandOutput> {
        let mut files = to_args(files);
        if files.is_empty() {
            warn!("No files given to sync");
            return Ok(CommandOutput::empty());
        }

        let mut verify = options.verify;
        if let Some(revision) = options.revision {
            verify = false;
            files = files
                .into_iter()
                .map(|path| format!("{path}#{revision}"))
                .collect();
        }
        self.validate_paths(&files)?;

        let mut flags = Vec::new();
        if options.force {
            flags.push("-f".to_string());
        }
        flags.extend(self.parallel_flag());

        let output = self
            .run_cmd("sync", &flags, &files, RunOptions::default())
            .await?;

        if verify {
            for local_path in self.get_local_paths(&files).await? {
                if !Path::new(&local_path).is_file() {
                    warn!(
                        path = %local_path,
                        "File didn't exist after syncing, try force syncing it instead"
                    );
                }
            }
        }

        Ok(output)
    }

    /// Recursively sync whole folders to head.
    pub async fn sync_folders(&self, folders: &[impl AsRef<str>]) -> P4Result<CommandOutput> {
        let folders = to_args(folders);
        if folders.is_empty() {
            warn!("No folders given to sync");
            return Ok(CommandOutput::empty());
        }
        self.validate_paths(&folders)?;

        let patterns: Vec<String> = folders.iter().map(|f| normalize_folder(f)).collect();
        self.run_cmd("sync", &self.parallel_flag(), &patterns, RunOptions::default())
            .await
    }

    /// `p4 move` a file. Returns whether p4 reported the move.
    pub async fn rename_file(
        &self,
        old_path: &str,
        new_path: &str,
        changelist: &ChangelistRef,
    ) -> P4Result<bool> {
        self.move_or_copy("move", old_path, new_path, changelist)
            .await
    }

    /// `p4 copy` a file. Returns whether p4 reported the copy.
    pub async fn copy_file(
        &self,
        source_path: &str,
        target_path: &str,
        changelist: &ChangelistRef,
    ) -> P4Result<bool> {
        self.move_or_copy("copy", source_path, target_path, changelist)
            .await
    }

    async fn move_or_copy(
        &self,
        cmd: &str,
        from: &str,
        to: &str,
        changelist: &ChangelistRef,
    ) -> P4Result<bool> {
        let paths = vec![from.to_string(), to.to_string()];
        self.validate_paths(&paths)?;
        let changelist = self.ensure_changelist(changelist).await?;

        let output = self
            .run_cmd(
                cmd,
                &["-c".to_string(), changelist.as_arg()],
                &paths,
                RunOptions::default(),
            )
            .await?;
        Ok(output.succeeded() && !output.records.is_empty())
    }

    async fn open_files(
        &self,
        cmd: &str,
        files: &[String],
        changelist: Changelist,
    ) -> P4Result<CommandOutput> {
        self.run_cmd(
            cmd,
            &["-c".to_string(), changelist.as_arg()],
            files,
            RunOptions::default(),
        )
        .await
    }

    fn parallel_flag(&self) -> Vec<String> {
        if self.max_parallel_connections > 1 {
            vec![format!("--parallel=threads={}", self.max_parallel_connections)]
        } else {
            Vec::new()
        }
    }

    pub(super) fn resolve_local(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_relative() {
            self.perforce_root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn collect_local_files(&self, folder: &str, include_subfolders: bool) -> Vec<String> {
        let max_depth = if include_subfolders { usize::MAX } else { 1 };
        WalkDir::new(self.resolve_local(folder))
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect()
    }
}

fn fstat_to_p4files(output: &CommandOutput, allow_invalid: bool) -> Vec<P4File> {
    output
        .records
        .iter()
        .map(P4File::from_fstat)
        .chain(output.messages.iter().filter_map(|line| parse_fstat_diagnostic(line)))
        .filter(|file| {
            allow_invalid || (file.is_valid() && !file.is_deleted() && !file.is_moved_deleted())
        })
        .collect()
}

/// Descriptor for a per-file `fstat` diagnostic p4 printed on stderr.
pub(crate) fn parse_fstat_diagnostic(line: &str) -> Option<P4File> {
    let line = line.trim();

    // Paths may themselves contain " - ", so split at the last one.
    if line.contains(" - no such file(s)") {
        let (path, _) = line.rsplit_once(" - ")?;
        return Some(P4File::untracked(path, line));
    }

    if line.contains("is not under client's root") {
        let path = match line.strip_prefix("Path '") {
            Some(rest) => rest.split_once('\'').map(|(path, _)| path)?,
            None => line.rsplit_once(" - ").map(|(path, _)| path).unwrap_or(line),
        };
        return Some(P4File::outside_root(path, line));
    }

    if line.contains("not in client view") {
        let (path, _) = line.rsplit_once(" - ")?;
        return Some(P4File::outside_root(path, line));
    }

    None
}

/// Sort descriptors by the position of the input path they answer.
/// Descriptors that match no input keep their relative order at the end.
fn order_by_input(descriptors: &mut [P4File], inputs: &[String]) {
    let normalized: Vec<String> = inputs.iter().map(|path| path.replace('\\', "/")).collect();
    descriptors.sort_by_key(|file| {
        normalized
            .iter()
            .position(|input| {
                [file.local_path.as_deref(), file.depot_path.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|known| known.replace('\\', "/") == *input)
            })
            .unwrap_or(usize::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_diagnostic() {
        let file = parse_fstat_diagnostic("/ws/new.txt - no such file(s).").expect("file");
        assert!(file.is_untracked());
        assert_eq!(file.local_path.as_deref(), Some("/ws/new.txt"));
    }

    #[test]
    fn outside_root_diagnostics() {
        let file = parse_fstat_diagnostic("Path '/tmp/x.txt' is not under client's root '/ws'.")
            .expect("file");
        assert!(!file.is_under_client_root());
        assert_eq!(file.local_path.as_deref(), Some("/tmp/x.txt"));

        let file = parse_fstat_diagnostic("/ws/private/x.txt - file(s) not in client view.")
            .expect("file");
        assert!(!file.is_under_client_root());
        assert_eq!(file.local_path.as_deref(), Some("/ws/private/x.txt"));
    }

    #[test]
    fn diagnostic_paths_may_contain_dashes() {
        let file = parse_fstat_diagnostic("/ws/config - Copy.json - no such file(s).")
            .expect("file");
        assert_eq!(file.local_path.as_deref(), Some("/ws/config - Copy.json"));
    }

    #[test]
    fn unrelated_diagnostic_is_ignored() {
        assert!(parse_fstat_diagnostic("some other warning").is_none());
    }

    #[test]
    fn descriptors_follow_input_order() {
        let mut descriptors = vec![
            P4File::untracked("/ws/c.txt", "/ws/c.txt - no such file(s)."),
            P4File::new(Some("/ws/b.txt".into()), Some("//depot/b.txt".into())),
            P4File::new(Some("/ws/zzz.txt".into()), None),
            P4File::new(Some("/ws/a.txt".into()), Some("//depot/a.txt".into())),
        ];
        let inputs = vec![
            "//depot/a.txt".to_string(),
            "/ws/b.txt".to_string(),
            "/ws/c.txt".to_string(),
        ];
        order_by_input(&mut descriptors, &inputs);
        let order: Vec<_> = descriptors
            .iter()
            .map(|f| f.local_path.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(order, vec!["/ws/a.txt", "/ws/b.txt", "/ws/c.txt", "/ws/zzz.txt"]);
    }
}
