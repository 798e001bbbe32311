//! # p4-cli-ops: Typed Perforce CLI orchestration
//!
//! Wraps the `p4` command-line client so version-control operations are
//! plain async function calls returning typed data. Every operation shells
//! out to `p4 -ztag`, parses the tagged output and maps failures into
//! [`P4CliOpsError`]. No Perforce protocol is reimplemented here.
//!
//! ## Key Operations
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`P4Client::connect`] | Resolve root, user, workspace and server |
//! | [`P4Client::files_to_p4files`] | Describe files with `fstat` |
//! | [`P4Client::sync_files`] | Sync files to head or a revision |
//! | [`P4Client::add_or_edit_files`] | Open files for add or edit as needed |
//! | [`P4Client::get_pending_changelists`] | List and filter pending changelists |
//! | [`P4Client::make_new_changelist`] | Create a numbered changelist |
//! | [`P4Client::submit_changelist`] | Submit a numbered changelist |
//! | [`P4Client::run_cmd`] | Run any p4 command with argument batching |
//!
//! ## Architecture
//!
//! ```text
//! caller ──► P4Client ──► P4CommandRunner ──► p4 -ztag ... (tokio::process)
//!                │                                   │
//!                │            stdout ──► parse_ztag_output ──► ZtagRecord
//!                │            stderr ──► CommandOutput::messages
//!                ▼
//!         P4File / PendingChangelist / ChangeRecord
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use p4_cli_ops::{ChangelistRef, ClientConfig, P4Client};
//!
//! let client = P4Client::connect(ClientConfig::new("/work/game")).await?;
//! for file in client.files_to_p4files(&["/work/game/config.json"], false).await? {
//!     println!("{:?}: {}", file.depot_path, file.status());
//! }
//! client
//!     .add_or_edit_files(&["/work/game/config.json"], &ChangelistRef::from("Tuning"))
//!     .await?;
//! ```

mod batch;
mod client;
mod command_runner;
mod config;
mod error;
mod file;
mod types;
mod ztag;

pub use batch::{split_into_batches, MAX_ARG_LEN, MAX_CMD_LEN};
pub use client::P4Client;
pub use command_runner::{CommandRequest, CommandRunOutput, P4CommandRunner};
pub use config::ClientConfig;
pub use error::{P4CliOpsError, P4Result};
pub use file::{FileStatus, P4File};
pub use types::{
    ChangeRecord, Changelist, ChangelistFilter, ChangelistRef, CommandOutput, P4Port,
    PendingChangelist, RunOptions, ShelvedFile, SyncOptions,
};
pub use ztag::{parse_ztag_output, ZtagOutput, ZtagRecord};
