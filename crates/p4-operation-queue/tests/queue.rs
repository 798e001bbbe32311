#![cfg(unix)]

mod common;

use common::FakeP4;
use p4_cli_ops::{ChangelistRef, ClientConfig, P4Client, SyncOptions};
use p4_operation_queue::{OperationEvent, OperationId, OperationStatus, QueuedP4Client};
use std::time::Duration;

const FSTAT_A: &str = "... depotFile //depot/a.txt\n... clientFile /ws/a.txt\n... headAction edit\n... headRev 3\n... haveRev 3\n\n";

#[tokio::test]
async fn test_operations_run_in_enqueue_order() {
    let fake = FakeP4::new();
    fake.respond("fstat", FSTAT_A);
    fake.respond("sync", "... depotFile //depot/Game/x.uasset\n... rev 2\n\n");
    let queue = QueuedP4Client::new(fake.client().await);

    let sync = queue.queue_sync_folders(&["//depot/Game"]);
    let fstat = queue.queue_files_to_p4files(&["//depot/a.txt"], false);
    let revert = queue.queue_revert_files(&["//depot/a.txt"], true);
    assert_eq!(sync.as_str(), "op_000001");
    assert_eq!(revert.as_str(), "op_000003");

    assert!(queue.wait_for_all(Some(Duration::from_secs(10))).await);

    assert_eq!(
        fake.commands(),
        vec!["sync //depot/Game/...", "fstat //depot/a.txt", "revert -a //depot/a.txt"]
    );

    let files = queue.wait_for(&fstat, None).await.expect("fstat output");
    let files = files.as_files().expect("descriptors");
    assert_eq!(files[0].depot_path.as_deref(), Some("//depot/a.txt"));

    let snapshots = queue.operations();
    assert_eq!(snapshots.len(), 3);
    for snapshot in &snapshots {
        assert_eq!(snapshot.status, OperationStatus::Completed);
        assert_eq!(snapshot.progress, 100.0);
        assert!(snapshot.duration().is_some());
    }
    assert_eq!(snapshots[0].method, "sync_folders");
    assert_eq!(snapshots[2].method, "revert_files");
}

#[tokio::test]
async fn test_failed_operation_records_error() {
    let fake = FakeP4::new();
    let client = P4Client::connect(
        fake.client_config()
            .with_p4_executable(fake.workspace().join("no-such-p4")),
    )
    .await
    .expect("connect");
    let queue = QueuedP4Client::new(client);

    let id = queue.queue_sync_files(&["//depot/a.txt"], SyncOptions::at_revision(2));
    assert!(queue.wait_for(&id, Some(Duration::from_secs(10))).await.is_none());

    let snapshot = queue.operation(&id).expect("snapshot");
    assert_eq!(snapshot.status, OperationStatus::Failed);
    let error = snapshot.error.expect("error");
    assert_eq!(error.code, "p4_not_installed");
    assert!(snapshot.output.is_none());
}

#[tokio::test]
async fn test_make_new_changelist_offline_fails() {
    let fake = FakeP4::new();
    let config: ClientConfig = fake.client_config().with_server("127.0.0.1:1");
    let queue = QueuedP4Client::new(P4Client::connect(config).await.expect("connect"));

    let id = queue.queue_make_new_changelist("Offline work");
    assert!(queue.wait_for(&id, None).await.is_none());
    assert_eq!(
        queue.operation(&id).and_then(|s| s.error).map(|e| e.code),
        Some("server_offline".to_string())
    );
}

#[tokio::test]
async fn test_cancel_only_pending_operations() {
    let fake = FakeP4::new();
    fake.delay("sync", 1);
    let queue = QueuedP4Client::new(fake.client().await);
    let mut events = queue.subscribe();

    let running = queue.queue_sync_folders(&["//depot/Game"]);
    let pending = queue.queue_submit_changelist(ChangelistRef::Number(12));

    // Wait until the sync is actually running.
    match events.recv().await.expect("event") {
        OperationEvent::Started(snapshot) => assert_eq!(snapshot.id, running),
        other => panic!("unexpected event {other:?}"),
    }

    assert!(!queue.cancel(&running));
    assert!(queue.cancel(&pending));
    assert!(!queue.cancel(&pending));
    assert!(!queue.cancel(&OperationId::from("op_999999")));

    match events.recv().await.expect("event") {
        OperationEvent::Cancelled(snapshot) => {
            assert_eq!(snapshot.id, pending);
            assert_eq!(snapshot.status, OperationStatus::Cancelled);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(queue.wait_for_all(Some(Duration::from_secs(10))).await);
    assert!(queue.wait_for(&pending, None).await.is_none());
    assert_eq!(
        queue.operation(&running).map(|s| s.status),
        Some(OperationStatus::Completed)
    );
    assert!(fake.commands().iter().all(|cmd| !cmd.starts_with("submit")));
}

#[tokio::test]
async fn test_clear_finished_keeps_running_operations() {
    let fake = FakeP4::new();
    fake.respond("fstat", FSTAT_A);
    fake.delay("sync", 1);
    let queue = QueuedP4Client::new(fake.client().await);
    let mut events = queue.subscribe();

    let done = queue.queue_files_to_p4files(&["//depot/a.txt"], false);
    assert!(queue.wait_for(&done, Some(Duration::from_secs(10))).await.is_some());

    let running = queue.queue_sync_folders(&["//depot/Game"]);
    let cancelled = queue.queue_submit_changelist(ChangelistRef::Number(12));
    loop {
        match events.recv().await.expect("event") {
            OperationEvent::Started(snapshot) if snapshot.id == running => break,
            _ => continue,
        }
    }
    assert!(queue.cancel(&cancelled));

    assert_eq!(queue.clear_finished(), 2);
    assert!(queue.operation(&done).is_none());
    assert!(queue.operation(&cancelled).is_none());
    let remaining: Vec<OperationId> = queue.operations().into_iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec![running.clone()]);

    assert!(queue.wait_for(&running, Some(Duration::from_secs(10))).await.is_some());
    assert_eq!(queue.clear_finished(), 1);
    assert!(queue.operations().is_empty());
    assert_eq!(queue.clear_finished(), 0);
}

#[tokio::test]
async fn test_wait_for_times_out() {
    let fake = FakeP4::new();
    fake.delay("sync", 2);
    let queue = QueuedP4Client::new(fake.client().await);

    let id = queue.queue_sync_folders(&["//depot/Game"]);
    assert!(queue
        .wait_for(&id, Some(Duration::from_millis(100)))
        .await
        .is_none());
    assert!(!queue.wait_for_all(Some(Duration::from_millis(100))).await);
    assert!(queue.wait_for(&OperationId::from("op_000042"), None).await.is_none());
}

#[tokio::test]
async fn test_events_follow_lifecycle() {
    let fake = FakeP4::new();
    fake.respond("reopen", "... depotFile //depot/a.txt\n... action edit\n\n");
    fake.respond_stderr("edit", "Perforce password (P4PASSWD) invalid or unset.\n", 1);
    let queue = QueuedP4Client::new(fake.client().await);
    let mut events = queue.subscribe();

    let moved = queue.queue_move_files_to_changelist(&["//depot/a.txt"], ChangelistRef::Number(7));
    let failed = queue.queue_run_cmd(
        "edit",
        &[],
        &["//depot/a.txt".to_string()],
        Default::default(),
    );

    let mut seen = Vec::new();
    for _ in 0..4 {
        let event = events.recv().await.expect("event");
        let kind = match &event {
            OperationEvent::Started(_) => "started",
            OperationEvent::Completed(_) => "completed",
            OperationEvent::Failed(_) => "failed",
            OperationEvent::Cancelled(_) => "cancelled",
        };
        seen.push((event.snapshot().id.clone(), kind));
    }

    assert_eq!(
        seen,
        vec![
            (moved.clone(), "started"),
            (moved, "completed"),
            (failed.clone(), "started"),
            (failed, "failed"),
        ]
    );
    assert_eq!(fake.commands()[0], "reopen -c 7 //depot/a.txt");
}

#[tokio::test]
async fn test_shutdown_cancels_pending_work() {
    let fake = FakeP4::new();
    fake.delay("sync", 1);
    let queue = QueuedP4Client::new(fake.client().await);
    let mut events = queue.subscribe();

    let running = queue.queue_sync_folders(&["//depot/Game"]);
    let pending = queue.queue_folder_to_p4files("//depot/Game", true, false);
    assert!(matches!(
        events.recv().await.expect("event"),
        OperationEvent::Started(_)
    ));

    queue.shutdown().await;

    assert_eq!(
        queue.operation(&running).map(|s| s.status),
        Some(OperationStatus::Completed)
    );
    assert_eq!(
        queue.operation(&pending).map(|s| s.status),
        Some(OperationStatus::Cancelled)
    );

    let late = queue.queue_sync_folders(&["//depot/Other"]);
    assert_eq!(
        queue.operation(&late).map(|s| s.status),
        Some(OperationStatus::Cancelled)
    );
    assert_eq!(fake.commands(), vec!["sync //depot/Game/..."]);
}

#[tokio::test]
async fn test_client_stays_available() {
    let fake = FakeP4::new();
    let queue = QueuedP4Client::new(fake.client().await);
    assert_eq!(queue.client().user(), "alice");
    assert_eq!(queue.client().workspace(), "alice-ws");
}
