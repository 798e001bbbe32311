//! p4ops - Perforce workflows from the command line.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use commands::Globals;
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;

/// p4ops - Inspect, open, sync and submit Perforce files.
#[derive(Parser, Debug)]
#[command(name = "p4ops")]
#[command(about = "Typed wrapper around the Perforce p4 command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (defaults to the config file, then P4ROOT, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Perforce user (P4USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Perforce workspace (P4CLIENT)
    #[arg(long, global = true)]
    client: Option<String>,

    /// Perforce server (P4PORT)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Validate paths against the root and report per-file warnings
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the resolved connection settings
    Info,

    /// List the user's workspaces
    Workspaces,

    /// Describe files
    Fstat {
        #[arg(required = true)]
        files: Vec<String>,
        /// Keep files deleted at head
        #[arg(long)]
        allow_invalid: bool,
    },

    /// Describe every file in a folder
    StatusFolder {
        folder: String,
        /// Only the folder itself, not its subfolders
        #[arg(long)]
        top_level: bool,
        #[arg(long)]
        allow_invalid: bool,
    },

    /// Sync files to head or a revision
    Sync {
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(short, long)]
        revision: Option<u32>,
        /// Force sync (p4 sync -f)
        #[arg(long)]
        force: bool,
        /// Skip the check that synced files exist on disk
        #[arg(long)]
        no_verify: bool,
    },

    /// Sync whole folders to head, one queued operation per folder
    SyncFolders {
        #[arg(required = true)]
        folders: Vec<String>,
    },

    /// Open files for edit
    Edit {
        #[arg(required = true)]
        files: Vec<String>,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Open files for add
    Add {
        #[arg(required = true)]
        files: Vec<String>,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Open files for add or edit, whichever applies
    AddOrEdit {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Treat paths as folders and walk them recursively
        #[arg(long)]
        folders: bool,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Open files for delete
    Delete {
        #[arg(required = true)]
        files: Vec<String>,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Revert files
    Revert {
        #[arg(required = true)]
        files: Vec<String>,
        /// Only revert files without local changes
        #[arg(short = 'a', long)]
        unchanged: bool,
    },

    /// Revert every opened file below folders
    RevertFolders {
        #[arg(required = true)]
        folders: Vec<String>,
    },

    /// Move (rename) a file
    Move {
        from: String,
        to: String,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Copy a file
    Copy {
        from: String,
        to: String,
        #[command(flatten)]
        target: ChangelistArg,
    },

    /// Manage changelists
    Changes {
        #[command(subcommand)]
        command: ChangesCommands,
    },

    /// Map paths between depot and local syntax
    Where {
        #[command(subcommand)]
        command: WhereCommands,
    },

    /// Submitted changes touching paths
    History {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Changelist a depot file is opened in
    OpenedIn { depot_path: String },

    /// Run any p4 command with argument batching
    Run {
        cmd: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Plain output instead of -ztag
        #[arg(long)]
        untagged: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChangelistArg {
    /// Changelist number, "default" or a description (created when missing)
    #[arg(long = "changelist", default_value = "default")]
    pub changelist: String,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Description to match (empty matches all)
    #[arg(default_value = "")]
    pub description: String,
    /// Match the whole description
    #[arg(long)]
    pub exact: bool,
    #[arg(long)]
    pub case_sensitive: bool,
}

#[derive(Subcommand, Debug)]
enum ChangesCommands {
    /// List pending changelists
    Pending {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Create a numbered changelist
    New { description: String },
    /// Delete matching pending changelists
    Delete {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Files opened in a changelist
    Files { changelist: String },
    /// Whether a changelist exists
    Exists { changelist: String },
    /// Submit a changelist
    Submit { changelist: String },
    /// Shelved files in pending changelists
    Shelved,
    /// Revert every file in a changelist
    Revert {
        changelist: String,
        #[arg(short = 'a', long)]
        unchanged: bool,
    },
    /// Move opened files into a changelist
    Reopen {
        changelist: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum WhereCommands {
    /// Local paths to depot paths
    Depot {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Depot paths to local paths
    Local {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<p4_cli_ops::P4CliOpsError>()
                .map(|p4_err| p4_err.code());
            output::print_error(&format!("{:#}", err), code, &format);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let globals = Globals {
        root: cli.root,
        user: cli.user,
        client: cli.client,
        port: cli.port,
        timeout: cli.timeout,
        log_level: cli.log_level,
        verbose: cli.verbose,
    };
    let format = cli.format;
    let ctx = commands::connect(globals).await?;

    match cli.command {
        Commands::Info => commands::info(&ctx, &format).await,
        Commands::Workspaces => commands::workspaces(&ctx, &format).await,
        Commands::Fstat {
            files,
            allow_invalid,
        } => commands::fstat(&ctx, &files, allow_invalid, &format).await,
        Commands::StatusFolder {
            folder,
            top_level,
            allow_invalid,
        } => commands::status_folder(&ctx, &folder, !top_level, allow_invalid, &format).await,
        Commands::Sync {
            files,
            revision,
            force,
            no_verify,
        } => commands::sync(&ctx, &files, revision, force, !no_verify, &format).await,
        Commands::SyncFolders { folders } => commands::sync_folders(ctx, &folders, &format).await,
        Commands::Edit { files, target } => {
            commands::edit(&ctx, &files, &target.changelist, &format).await
        }
        Commands::Add { files, target } => {
            commands::add(&ctx, &files, &target.changelist, &format).await
        }
        Commands::AddOrEdit {
            paths,
            folders,
            target,
        } => commands::add_or_edit(&ctx, &paths, folders, &target.changelist, &format).await,
        Commands::Delete { files, target } => {
            commands::delete(&ctx, &files, &target.changelist, &format).await
        }
        Commands::Revert { files, unchanged } => {
            commands::revert(&ctx, &files, unchanged, &format).await
        }
        Commands::RevertFolders { folders } => {
            commands::revert_folders(&ctx, &folders, &format).await
        }
        Commands::Move { from, to, target } => {
            commands::move_file(&ctx, &from, &to, &target.changelist, &format).await
        }
        Commands::Copy { from, to, target } => {
            commands::copy_file(&ctx, &from, &to, &target.changelist, &format).await
        }
        Commands::Changes { command } => match command {
            ChangesCommands::Pending { filter } => {
                commands::changes_pending(&ctx, &filter, &format).await
            }
            ChangesCommands::New { description } => {
                commands::changes_new(&ctx, &description, &format).await
            }
            ChangesCommands::Delete { filter } => {
                commands::changes_delete(&ctx, &filter, &format).await
            }
            ChangesCommands::Files { changelist } => {
                commands::changes_files(&ctx, &changelist, &format).await
            }
            ChangesCommands::Exists { changelist } => {
                commands::changes_exists(&ctx, &changelist, &format).await
            }
            ChangesCommands::Submit { changelist } => {
                commands::changes_submit(&ctx, &changelist, &format).await
            }
            ChangesCommands::Shelved => commands::changes_shelved(&ctx, &format).await,
            ChangesCommands::Revert {
                changelist,
                unchanged,
            } => commands::changes_revert(&ctx, &changelist, unchanged, &format).await,
            ChangesCommands::Reopen { changelist, files } => {
                commands::changes_reopen(&ctx, &changelist, &files, &format).await
            }
        },
        Commands::Where { command } => match command {
            WhereCommands::Depot { paths } => commands::where_depot(&ctx, &paths, &format).await,
            WhereCommands::Local { paths } => commands::where_local(&ctx, &paths, &format).await,
        },
        Commands::History { paths } => commands::history(&ctx, &paths, &format).await,
        Commands::OpenedIn { depot_path } => {
            commands::opened_in(&ctx, &depot_path, &format).await
        }
        Commands::Run {
            cmd,
            args,
            untagged,
        } => commands::run_raw(&ctx, &cmd, &args, untagged, &format).await,
    }
}
