//! # p4-operation-queue: Background Perforce operations
//!
//! Long-running p4 calls (syncing a project, submitting, describing large
//! folders) should not block the caller. [`QueuedP4Client`] owns a
//! [`P4Client`](p4_cli_ops::P4Client) and a single worker task that runs
//! queued requests strictly one after another.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌──────────────┐  run   ┌──────────┐
//! │    caller    │──────────▶│ MPSC channel │──────▶│  worker  │──▶ P4Client
//! └──────┬───────┘   op_id    └──────────────┘        └────┬─────┘
//!        │                                                  │
//!        │   operation() / wait_for()   ┌────────────┐     │ snapshots
//!        └─────────────────────────────▶│   state    │◀────┘
//!                                       └─────┬──────┘
//!                                             ▼
//!                                  broadcast OperationEvent
//! ```
//!
//! ## Lifecycle
//!
//! `Pending → Running → Completed | Failed`, or `Pending → Cancelled` when
//! [`QueuedP4Client::cancel`] is called before the worker picks it up.
//!
//! ## Example
//!
//! ```ignore
//! use p4_operation_queue::QueuedP4Client;
//!
//! let queue = QueuedP4Client::new(client);
//! let id = queue.queue_sync_folders(&["//depot/Game"]);
//! if let Some(output) = queue.wait_for(&id, None).await {
//!     println!("{:?}", output.as_command().map(|o| o.records.len()));
//! }
//! queue.shutdown().await;
//! ```

mod operation;
mod queue;

pub use operation::{
    OperationError, OperationEvent, OperationId, OperationOutput, OperationRequest,
    OperationSnapshot, OperationStatus,
};
pub use queue::QueuedP4Client;
