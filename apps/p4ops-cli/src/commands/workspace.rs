//! Connection, path mapping and raw command helpers.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use p4_cli_ops::RunOptions;

pub async fn info(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let client = &ctx.client;
    let online = client.host_online().await;
    let log_file = ctx
        .log_file
        .as_ref()
        .map(|path| path.display().to_string());

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "root": client.perforce_root(),
            "user": client.user(),
            "workspace": client.workspace(),
            "server": client.server(),
            "online": online,
            "log_file": log_file,
        })),
        OutputFormat::Text => {
            output::print_heading("Perforce");
            output::print_row("Root", &client.perforce_root().display().to_string());
            output::print_row("User", client.user());
            output::print_row("Workspace", client.workspace());
            output::print_row("Server", client.server());
            output::print_row("Online", if online { "yes" } else { "no" });
            output::print_row("Log file", log_file.as_deref().unwrap_or("-"));
            Ok(())
        }
    }
}

pub async fn workspaces(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let workspaces = ctx.client.get_all_workspaces().await?;
    let current = ctx.client.workspace();
    match format {
        OutputFormat::Json => output::print_json(&workspaces),
        OutputFormat::Text => {
            for workspace in &workspaces {
                let marker = if workspace == current { "*" } else { " " };
                println!("{} {}", marker, workspace);
            }
            Ok(())
        }
    }
}

pub async fn where_depot(ctx: &Context, paths: &[String], format: &OutputFormat) -> Result<()> {
    let depot = ctx.client.get_depot_paths(paths).await?;
    output::print_lines(&depot, "No depot paths found", format)
}

pub async fn where_local(ctx: &Context, paths: &[String], format: &OutputFormat) -> Result<()> {
    let local = ctx.client.get_local_paths(paths).await?;
    output::print_lines(&local, "No local paths found", format)
}

pub async fn history(ctx: &Context, paths: &[String], format: &OutputFormat) -> Result<()> {
    let changes = ctx.client.get_history(paths).await?;
    output::print_changes(&changes, format)
}

/// `p4ops run <cmd> [flags...] [args...]`. Leading `-x` style arguments are
/// passed as flags so they repeat in every batch.
pub async fn run_raw(
    ctx: &Context,
    cmd: &str,
    args: &[String],
    untagged: bool,
    format: &OutputFormat,
) -> Result<()> {
    let (flags, args) = split_flags(args);
    let options = RunOptions {
        tagged: !untagged,
        ..RunOptions::default()
    };
    let result = ctx.client.run_cmd(cmd, &flags, &args, options).await?;
    output::print_command_output(&result, format)
}

/// Split leading option arguments from the rest. A value following a flag
/// is kept with it unless it looks like a path.
fn split_flags(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut flags = Vec::new();
    let mut idx = 0;
    while idx < args.len() && args[idx].starts_with('-') {
        flags.push(args[idx].clone());
        idx += 1;
        if let Some(value) = args.get(idx) {
            if !value.starts_with('-') && !looks_like_path(value) {
                flags.push(value.clone());
                idx += 1;
            }
        }
    }
    (flags, args[idx..].to_vec())
}

fn looks_like_path(value: &str) -> bool {
    value.starts_with("//") || value.contains('/') || value.contains('\\') || value.contains('.')
}
