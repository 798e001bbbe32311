use crate::operation::{
    OperationError, OperationEvent, OperationId, OperationOutput, OperationRequest,
    OperationSnapshot, OperationStatus,
};
use chrono::Utc;
use p4_cli_ops::{ChangelistRef, P4Client, P4Result, RunOptions, SyncOptions};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the lifecycle event channel. Slow subscribers lag rather
/// than block the worker.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct QueueState {
    next_sequence: u64,
    order: Vec<OperationId>,
    operations: HashMap<OperationId, OperationSnapshot>,
}

/// Bookkeeping shared between the handle and the worker task.
struct Shared {
    state: Mutex<QueueState>,
    events: broadcast::Sender<OperationEvent>,
    /// Bumped every time an operation reaches a terminal status.
    finished: watch::Sender<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: OperationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn mark_finished(&self) {
        self.finished.send_modify(|generation| *generation += 1);
    }

    /// Flip a pending operation to running. `None` when it was cancelled
    /// while waiting in the channel.
    fn start(&self, id: &OperationId) -> Option<OperationSnapshot> {
        let mut state = self.state();
        let snapshot = state.operations.get_mut(id)?;
        if snapshot.status != OperationStatus::Pending {
            return None;
        }
        snapshot.status = OperationStatus::Running;
        snapshot.started_at = Some(Utc::now());
        Some(snapshot.clone())
    }

    fn finish(&self, id: &OperationId, result: P4Result<OperationOutput>) -> Option<OperationEvent> {
        let event = {
            let mut state = self.state();
            let snapshot = state.operations.get_mut(id)?;
            snapshot.finished_at = Some(Utc::now());
            match result {
                Ok(output) => {
                    snapshot.status = OperationStatus::Completed;
                    snapshot.output = Some(output);
                    snapshot.progress = 100.0;
                    OperationEvent::Completed(snapshot.clone())
                }
                Err(err) => {
                    warn!(operation = %id, method = %snapshot.method, error = %err, "Operation failed");
                    snapshot.status = OperationStatus::Failed;
                    snapshot.error = Some(OperationError::from(&err));
                    OperationEvent::Failed(snapshot.clone())
                }
            }
        };
        self.mark_finished();
        Some(event)
    }

    fn cancel(&self, id: &OperationId) -> bool {
        let snapshot = {
            let mut state = self.state();
            let Some(snapshot) = state.operations.get_mut(id) else {
                return false;
            };
            if snapshot.status != OperationStatus::Pending {
                return false;
            }
            snapshot.status = OperationStatus::Cancelled;
            snapshot.finished_at = Some(Utc::now());
            snapshot.clone()
        };
        self.mark_finished();
        self.emit(OperationEvent::Cancelled(snapshot));
        true
    }
}

/// Runs [`P4Client`] operations one at a time on a background task.
///
/// Callers enqueue requests and get an [`OperationId`] back immediately.
/// Progress can be followed by polling [`QueuedP4Client::operation`], by
/// awaiting [`QueuedP4Client::wait_for`], or by subscribing to lifecycle
/// events. The wrapped client stays reachable through
/// [`QueuedP4Client::client`] for direct calls.
pub struct QueuedP4Client {
    client: Arc<P4Client>,
    shared: Arc<Shared>,
    /// Dropped on shutdown so the worker drains and exits.
    sender: Mutex<Option<mpsc::UnboundedSender<OperationId>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueuedP4Client {
    /// Wrap `client` and spawn the worker task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(client: P4Client) -> Self {
        let client = Arc::new(client);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (finished, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            events,
            finished,
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(client.clone(), shared.clone(), receiver));

        Self {
            client,
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// The wrapped client, for calls that should not wait in the queue.
    pub fn client(&self) -> &P4Client {
        &self.client
    }

    /// Queue a request. Requests run in the order they were enqueued.
    ///
    /// After [`QueuedP4Client::shutdown`] the request is recorded as
    /// cancelled straight away.
    pub fn enqueue(&self, request: OperationRequest) -> OperationId {
        let id = {
            let mut state = self.shared.state();
            state.next_sequence += 1;
            let id = OperationId::from_sequence(state.next_sequence);
            state.order.push(id.clone());
            state
                .operations
                .insert(id.clone(), OperationSnapshot::pending(id.clone(), request));
            id
        };
        debug!(operation = %id, "Operation queued");

        let sent = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|sender| sender.send(id.clone()).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!(operation = %id, "Queue is shut down, cancelling operation");
            self.shared.cancel(&id);
        }
        id
    }

    pub fn queue_run_cmd(
        &self,
        cmd: &str,
        flags: &[String],
        args: &[String],
        options: RunOptions,
    ) -> OperationId {
        self.enqueue(OperationRequest::RunCommand {
            cmd: cmd.to_string(),
            flags: flags.to_vec(),
            args: args.to_vec(),
            options,
        })
    }

    pub fn queue_sync_files(&self, files: &[impl AsRef<str>], options: SyncOptions) -> OperationId {
        self.enqueue(OperationRequest::SyncFiles {
            files: owned(files),
            options,
        })
    }

    pub fn queue_sync_folders(&self, folders: &[impl AsRef<str>]) -> OperationId {
        self.enqueue(OperationRequest::SyncFolders {
            folders: owned(folders),
        })
    }

    pub fn queue_submit_changelist(&self, changelist: ChangelistRef) -> OperationId {
        self.enqueue(OperationRequest::SubmitChangelist { changelist })
    }

    pub fn queue_files_to_p4files(
        &self,
        files: &[impl AsRef<str>],
        allow_invalid: bool,
    ) -> OperationId {
        self.enqueue(OperationRequest::FilesToP4Files {
            files: owned(files),
            allow_invalid,
        })
    }

    pub fn queue_folder_to_p4files(
        &self,
        folder: &str,
        include_subfolders: bool,
        allow_invalid: bool,
    ) -> OperationId {
        self.enqueue(OperationRequest::FolderToP4Files {
            folder: folder.to_string(),
            include_subfolders,
            allow_invalid,
        })
    }

    pub fn queue_make_new_changelist(&self, description: &str) -> OperationId {
        self.enqueue(OperationRequest::MakeNewChangelist {
            description: description.to_string(),
        })
    }

    pub fn queue_move_files_to_changelist(
        &self,
        files: &[impl AsRef<str>],
        changelist: ChangelistRef,
    ) -> OperationId {
        self.enqueue(OperationRequest::MoveFilesToChangelist {
            files: owned(files),
            changelist,
        })
    }

    pub fn queue_revert_files(&self, files: &[impl AsRef<str>], unchanged_only: bool) -> OperationId {
        self.enqueue(OperationRequest::RevertFiles {
            files: owned(files),
            unchanged_only,
        })
    }

    /// Cancel a pending operation. Running or finished operations are left
    /// alone and `false` is returned.
    pub fn cancel(&self, id: &OperationId) -> bool {
        let cancelled = self.shared.cancel(id);
        if cancelled {
            info!(operation = %id, "Operation cancelled");
        }
        cancelled
    }

    pub fn operation(&self, id: &OperationId) -> Option<OperationSnapshot> {
        self.shared.state().operations.get(id).cloned()
    }

    /// All operations in enqueue order.
    pub fn operations(&self) -> Vec<OperationSnapshot> {
        let state = self.shared.state();
        state
            .order
            .iter()
            .filter_map(|id| state.operations.get(id).cloned())
            .collect()
    }

    /// Forget completed, failed and cancelled operations. Returns how many
    /// snapshots were dropped. Pending and running operations are kept.
    pub fn clear_finished(&self) -> usize {
        let mut state = self.shared.state();
        let QueueState {
            order, operations, ..
        } = &mut *state;
        let before = operations.len();
        operations.retain(|_, snapshot| !snapshot.status.is_terminal());
        order.retain(|id| operations.contains_key(id));
        let cleared = before - operations.len();
        if cleared > 0 {
            debug!(cleared, "Cleared finished operations");
        }
        cleared
    }

    /// Receive lifecycle events for operations that change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.shared.events.subscribe()
    }

    /// Wait until `id` finishes and return its output.
    ///
    /// `None` when the operation failed, was cancelled, is unknown, or did
    /// not finish within `timeout`.
    pub async fn wait_for(
        &self,
        id: &OperationId,
        timeout: Option<Duration>,
    ) -> Option<OperationOutput> {
        let mut finished = self.shared.finished.subscribe();
        let wait = async {
            loop {
                {
                    let state = self.shared.state();
                    let snapshot = state.operations.get(id)?;
                    if snapshot.status.is_terminal() {
                        return snapshot.output.clone();
                    }
                }
                finished.changed().await.ok()?;
            }
        };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.ok().flatten(),
            None => wait.await,
        }
    }

    /// Wait until every queued operation has finished. Returns `false` when
    /// `timeout` ran out first.
    pub async fn wait_for_all(&self, timeout: Option<Duration>) -> bool {
        let mut finished = self.shared.finished.subscribe();
        let wait = async {
            loop {
                let all_done = self
                    .shared
                    .state()
                    .operations
                    .values()
                    .all(|snapshot| snapshot.status.is_terminal());
                if all_done {
                    return true;
                }
                if finished.changed().await.is_err() {
                    return false;
                }
            }
        };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.unwrap_or(false),
            None => wait.await,
        }
    }

    /// Cancel everything still pending, let the running operation finish
    /// and stop the worker. Later enqueues are cancelled immediately.
    pub async fn shutdown(&self) {
        let pending: Vec<OperationId> = {
            let state = self.shared.state();
            state
                .order
                .iter()
                .filter(|id| {
                    state
                        .operations
                        .get(*id)
                        .is_some_and(|snapshot| snapshot.status == OperationStatus::Pending)
                })
                .cloned()
                .collect()
        };
        for id in &pending {
            self.shared.cancel(id);
        }

        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Operation worker ended abnormally");
            }
        }
        info!(cancelled = pending.len(), "Operation queue shut down");
    }
}

impl Drop for QueuedP4Client {
    fn drop(&mut self) {
        if let Some(worker) = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.abort();
        }
    }
}

async fn run_worker(
    client: Arc<P4Client>,
    shared: Arc<Shared>,
    mut receiver: mpsc::UnboundedReceiver<OperationId>,
) {
    while let Some(id) = receiver.recv().await {
        let Some(snapshot) = shared.start(&id) else {
            debug!(operation = %id, "Skipping cancelled operation");
            continue;
        };
        debug!(operation = %id, method = %snapshot.method, "Operation started");
        let request = snapshot.request.clone();
        shared.emit(OperationEvent::Started(snapshot));

        let result = execute(&client, request).await;
        if let Some(event) = shared.finish(&id, result) {
            shared.emit(event);
        }
    }
    debug!("Operation worker stopped");
}

async fn execute(client: &P4Client, request: OperationRequest) -> P4Result<OperationOutput> {
    match request {
        OperationRequest::RunCommand {
            cmd,
            flags,
            args,
            options,
        } => client
            .run_cmd(&cmd, &flags, &args, options)
            .await
            .map(OperationOutput::Command),
        OperationRequest::SyncFiles { files, options } => client
            .sync_files(&files, &options)
            .await
            .map(OperationOutput::Command),
        OperationRequest::SyncFolders { folders } => client
            .sync_folders(&folders)
            .await
            .map(OperationOutput::Command),
        OperationRequest::SubmitChangelist { changelist } => client
            .submit_changelist(&changelist)
            .await
            .map(OperationOutput::Command),
        OperationRequest::FilesToP4Files {
            files,
            allow_invalid,
        } => client
            .files_to_p4files(&files, allow_invalid)
            .await
            .map(OperationOutput::Files),
        OperationRequest::FolderToP4Files {
            folder,
            include_subfolders,
            allow_invalid,
        } => client
            .folder_to_p4files(&folder, include_subfolders, allow_invalid)
            .await
            .map(OperationOutput::Files),
        OperationRequest::MakeNewChangelist { description } => client
            .make_new_changelist(&description)
            .await
            .map(OperationOutput::Changelist),
        OperationRequest::MoveFilesToChangelist { files, changelist } => client
            .move_files_to_changelist(&files, &changelist)
            .await
            .map(OperationOutput::Command),
        OperationRequest::RevertFiles {
            files,
            unchanged_only,
        } => client
            .revert_files(&files, unchanged_only)
            .await
            .map(OperationOutput::Command),
    }
}

fn owned(values: &[impl AsRef<str>]) -> Vec<String> {
    values.iter().map(|value| value.as_ref().to_string()).collect()
}
