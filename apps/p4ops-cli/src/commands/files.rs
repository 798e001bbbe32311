//! File commands: describe, sync, open, revert, move.

use super::{report, Context};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use p4_cli_ops::{ChangelistRef, SyncOptions};
use p4_operation_queue::{OperationEvent, OperationStatus, QueuedP4Client};

pub async fn fstat(
    ctx: &Context,
    files: &[String],
    allow_invalid: bool,
    format: &OutputFormat,
) -> Result<()> {
    let descriptors = ctx.client.files_to_p4files(files, allow_invalid).await?;
    output::print_files(&descriptors, format)
}

pub async fn status_folder(
    ctx: &Context,
    folder: &str,
    include_subfolders: bool,
    allow_invalid: bool,
    format: &OutputFormat,
) -> Result<()> {
    let descriptors = ctx
        .client
        .folder_to_p4files(folder, include_subfolders, allow_invalid)
        .await?;
    output::print_files(&descriptors, format)
}

pub async fn sync(
    ctx: &Context,
    files: &[String],
    revision: Option<u32>,
    force: bool,
    verify: bool,
    format: &OutputFormat,
) -> Result<()> {
    let mut options = match revision {
        Some(revision) => SyncOptions::at_revision(revision),
        None => SyncOptions::head(),
    };
    options.verify = verify && revision.is_none();
    if force {
        options = options.forced();
    }
    let result = ctx.client.sync_files(files, &options).await?;
    report("Synced", &result, format)
}

/// Queue one sync per folder and report each as it finishes.
pub async fn sync_folders(ctx: Context, folders: &[String], format: &OutputFormat) -> Result<()> {
    let queue = QueuedP4Client::new(ctx.client);
    let mut events = queue.subscribe();
    let ids: Vec<_> = folders
        .iter()
        .map(|folder| queue.queue_sync_folders(std::slice::from_ref(folder)))
        .collect();

    let mut remaining = ids.len();
    while remaining > 0 {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };
        let snapshot = event.snapshot();
        let folder = match &snapshot.request {
            p4_operation_queue::OperationRequest::SyncFolders { folders } => folders.join(" "),
            _ => continue,
        };
        match (&event, format) {
            (OperationEvent::Started(_), OutputFormat::Text) => println!("Syncing {}...", folder),
            (OperationEvent::Completed(_), OutputFormat::Text) => {
                let count = snapshot
                    .output
                    .as_ref()
                    .and_then(|out| out.as_command())
                    .map_or(0, |out| out.records.len());
                println!("Synced {}: {} file(s)", folder, count);
            }
            (OperationEvent::Failed(_), OutputFormat::Text) => {
                let message = snapshot
                    .error
                    .as_ref()
                    .map_or("unknown error", |err| err.message.as_str());
                eprintln!("Failed to sync {}: {}", folder, message);
            }
            _ => {}
        }
        if snapshot.status.is_terminal() {
            remaining -= 1;
        }
    }

    queue.wait_for_all(None).await;
    let snapshots = queue.operations();
    queue.shutdown().await;

    if *format == OutputFormat::Json {
        output::print_json(&snapshots)?;
    }
    let failed = snapshots
        .iter()
        .filter(|snapshot| snapshot.status == OperationStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{} of {} folder sync(s) failed", failed, snapshots.len());
    }
    Ok(())
}

pub async fn edit(
    ctx: &Context,
    files: &[String],
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx
        .client
        .edit_files(files, &ChangelistRef::from(changelist))
        .await?;
    report("Opened for edit", &result, format)
}

pub async fn add(
    ctx: &Context,
    files: &[String],
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx
        .client
        .add_files(files, &ChangelistRef::from(changelist))
        .await?;
    report("Opened for add", &result, format)
}

pub async fn add_or_edit(
    ctx: &Context,
    paths: &[String],
    folders: bool,
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let changelist = ChangelistRef::from(changelist);
    let result = if folders {
        ctx.client
            .add_or_edit_folders(paths, true, &changelist)
            .await?
    } else {
        ctx.client.add_or_edit_files(paths, &changelist).await?
    };
    report("Opened", &result, format)
}

pub async fn delete(
    ctx: &Context,
    files: &[String],
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx
        .client
        .delete_files(files, &ChangelistRef::from(changelist))
        .await?;
    report("Opened for delete", &result, format)
}

pub async fn revert(
    ctx: &Context,
    files: &[String],
    unchanged_only: bool,
    format: &OutputFormat,
) -> Result<()> {
    let result = ctx.client.revert_files(files, unchanged_only).await?;
    report("Reverted", &result, format)
}

pub async fn revert_folders(ctx: &Context, folders: &[String], format: &OutputFormat) -> Result<()> {
    let result = ctx.client.revert_folders(folders).await?;
    report("Reverted", &result, format)
}

pub async fn move_file(
    ctx: &Context,
    from: &str,
    to: &str,
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let moved = ctx
        .client
        .rename_file(from, to, &ChangelistRef::from(changelist))
        .await?;
    if !moved {
        bail!("p4 did not move {} to {}", from, to);
    }
    output::print_success(&format!("Moved {} to {}", from, to), format);
    Ok(())
}

pub async fn copy_file(
    ctx: &Context,
    from: &str,
    to: &str,
    changelist: &str,
    format: &OutputFormat,
) -> Result<()> {
    let copied = ctx
        .client
        .copy_file(from, to, &ChangelistRef::from(changelist))
        .await?;
    if !copied {
        bail!("p4 did not copy {} to {}", from, to);
    }
    output::print_success(&format!("Copied {} to {}", from, to), format);
    Ok(())
}
