//! CLI command implementations.

mod changes;
mod files;
mod workspace;

pub use changes::{
    changes_delete, changes_exists, changes_files, changes_new, changes_pending, changes_reopen,
    changes_revert, changes_shelved, changes_submit, opened_in,
};
pub use files::{
    add, add_or_edit, copy_file, delete, edit, fstat, move_file, revert, revert_folders,
    status_folder, sync, sync_folders,
};
pub use workspace::{history, info, run_raw, where_depot, where_local, workspaces};

use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use p4_cli_ops::{CommandOutput, P4Client};
use p4ops_config_and_utils::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Global flags shared by every subcommand.
#[derive(Debug, Default)]
pub struct Globals {
    pub root: Option<PathBuf>,
    pub user: Option<String>,
    pub client: Option<String>,
    pub port: Option<String>,
    pub timeout: Option<u64>,
    pub log_level: Option<String>,
    pub verbose: bool,
}

/// Connected client plus the settings it came from.
pub struct Context {
    pub client: P4Client,
    pub log_file: Option<PathBuf>,
}

/// Load `~/.p4ops/config.json`, apply command-line overrides, start logging
/// and connect.
pub async fn connect(globals: Globals) -> Result<Context> {
    let mut config = match Paths::new() {
        Ok(paths) => Config::load(&paths).context("Failed to load p4ops config")?,
        Err(_) => Config::new(),
    };
    apply_overrides(&mut config, &globals);

    let log_file = init_logging(&config.log_level, globals.verbose);
    debug!(?config, "Loaded configuration");

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let client = P4Client::connect(config.client_config(cwd)).await?;
    Ok(Context { client, log_file })
}

fn apply_overrides(config: &mut Config, globals: &Globals) {
    if let Some(root) = &globals.root {
        config.perforce_root = Some(root.clone());
    }
    if let Some(user) = &globals.user {
        config.user = Some(user.clone());
    }
    if let Some(client) = &globals.client {
        config.client = Some(client.clone());
    }
    if let Some(port) = &globals.port {
        config.server = Some(port.clone());
    }
    if let Some(timeout) = globals.timeout {
        config.command_timeout_secs = Some(timeout);
    }
    if let Some(level) = &globals.log_level {
        config.log_level = level.clone();
    }
    if globals.verbose {
        config.silent = false;
    }
}

/// Print what a file command did: a one-line summary in text mode, the full
/// output in JSON mode. Per-file messages go to stderr.
fn report(action: &str, result: &CommandOutput, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(result),
        OutputFormat::Text => {
            for message in &result.messages {
                eprintln!("{}", message);
            }
            println!("{}: {} file(s)", action, result.records.len());
            Ok(())
        }
    }
}
