#![cfg(unix)]

mod common;

use common::FakeP4;
use p4_cli_ops::{ClientConfig, P4CliOpsError, P4Client, RunOptions};
use std::time::Duration;

#[tokio::test]
async fn test_connect_resolves_settings_with_p4_set() {
    let fake = FakeP4::new();
    fake.respond_nth("set", 1, "P4USER=alice (set)\n");
    fake.respond_nth("set", 2, &format!("P4PORT={} (config)\n", fake.server()));
    fake.respond_nth("set", 3, "");
    fake.respond(
        "clients",
        "... client alice-ws\n... Owner alice\n\n... client alice-laptop\n... Owner alice\n\n",
    );

    let config = ClientConfig::new(fake.workspace()).with_p4_executable(fake.executable());
    let client = P4Client::connect(config).await.expect("connect");

    assert_eq!(client.user(), "alice");
    assert_eq!(client.server(), fake.server());
    assert_eq!(client.workspace(), "alice-ws");
    assert_eq!(
        fake.commands(),
        vec!["set P4USER", "set P4PORT", "set P4CLIENT", "clients -u alice"]
    );
    // `p4 set` runs without tagged output or global options.
    assert_eq!(fake.invocations()[0], vec!["set", "P4USER"]);
}

#[tokio::test]
async fn test_connect_fails_without_user() {
    let fake = FakeP4::new();
    fake.respond("set", "");

    let config = ClientConfig::new(fake.workspace()).with_p4_executable(fake.executable());
    let err = P4Client::connect(config).await.expect_err("should fail");

    assert_eq!(err.code(), "workspace_error");
    assert!(err.to_string().contains("P4USER"));
}

#[tokio::test]
async fn test_connect_uses_p4config_folder_as_root() {
    let fake = FakeP4::new();
    let nested = fake.workspace().join("Game").join("Content");
    std::fs::create_dir_all(&nested).expect("mkdir");

    let mut config = fake.client_config();
    config.perforce_root = nested.clone();
    let client = P4Client::connect(config).await.expect("connect");

    assert_eq!(client.perforce_root(), fake.workspace());
    assert!(fake.invocations().is_empty());
}

#[tokio::test]
async fn test_get_p4_setting_none_is_unset() {
    let fake = FakeP4::new();
    fake.respond("set", "P4CLIENT=none\n");
    let client = fake.client().await;

    assert_eq!(client.get_p4_setting("P4CLIENT").await.expect("setting"), None);
}

#[tokio::test]
async fn test_set_workspace_must_belong_to_user() {
    let fake = FakeP4::new();
    fake.respond(
        "clients",
        "... client alice-ws\n\n... client alice-laptop\n\n",
    );
    let mut client = fake.client().await;

    let err = client
        .set_workspace("bob-ws")
        .await
        .expect_err("unknown workspace");
    assert!(matches!(err, P4CliOpsError::Workspace { .. }));
    assert_eq!(client.workspace(), "alice-ws");

    client.set_workspace("alice-laptop").await.expect("switch");
    assert_eq!(client.workspace(), "alice-laptop");
}

#[tokio::test]
async fn test_host_online_checks_p4port() {
    let fake = FakeP4::new();
    let online = fake.client().await;
    assert!(online.host_online().await);

    let offline = P4Client::connect(fake.client_config().with_server("127.0.0.1:1"))
        .await
        .expect("connect");
    assert!(!offline.host_online().await);

    let unparsable = P4Client::connect(fake.client_config().with_server("perforce"))
        .await
        .expect("connect");
    assert!(!unparsable.host_online().await);
}

#[tokio::test]
async fn test_run_cmd_batches_long_file_lists() {
    let fake = FakeP4::new();
    let client = fake.client().await;

    let files: Vec<String> = (0..400)
        .map(|i| format!("//depot/Game/Content/Characters/hero_{i:04}.uasset"))
        .collect();
    client
        .run_cmd(
            "edit",
            &["-c".to_string(), "default".to_string()],
            &files,
            RunOptions::default(),
        )
        .await
        .expect("run");

    let invocations = fake.invocations();
    assert!(invocations.len() > 1, "expected several batches");

    let mut seen = Vec::new();
    for argv in &invocations {
        assert_eq!(
            &argv[..7],
            &["-ztag", "-u", "alice", "-c", "alice-ws", "edit", "-c"]
        );
        assert_eq!(argv[7], "default");
        let batch = &argv[8..];
        assert!(batch.join(" ").len() <= p4_cli_ops::MAX_ARG_LEN);
        seen.extend(batch.iter().cloned());
    }
    assert_eq!(seen, files);
}

#[tokio::test]
async fn test_run_cmd_keeps_per_file_messages() {
    let fake = FakeP4::new();
    fake.respond("edit", "... depotFile //depot/a.txt\n... action edit\n\n");
    fake.respond_stderr("edit", "//depot/b.txt - file(s) not on client.\n", 1);
    let client = fake.client().await;

    let output = client
        .run_cmd(
            "edit",
            &[],
            &["//depot/a.txt".to_string(), "//depot/b.txt".to_string()],
            RunOptions::default(),
        )
        .await
        .expect("partial success");

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.messages, vec!["//depot/b.txt - file(s) not on client."]);
    assert!(!output.succeeded());
}

#[tokio::test]
async fn test_run_cmd_fails_on_authentication_error() {
    let fake = FakeP4::new();
    fake.respond_stderr("fstat", "Perforce password (P4PASSWD) invalid or unset.\n", 1);
    let client = fake.client().await;

    let err = client
        .files_to_p4files(&["//depot/a.txt"], false)
        .await
        .expect_err("auth failure");
    assert_eq!(err.code(), "not_authenticated");
}

#[tokio::test]
async fn test_command_timeout() {
    let fake = FakeP4::new();
    fake.delay("sync", 5);
    let client = P4Client::connect(
        fake.client_config()
            .with_command_timeout(Duration::from_millis(200)),
    )
    .await
    .expect("connect");

    let err = client
        .sync_folders(&["//depot/Game"])
        .await
        .expect_err("timeout");
    assert!(matches!(err, P4CliOpsError::Timeout { .. }));
}

#[tokio::test]
async fn test_missing_executable() {
    let fake = FakeP4::new();
    let client = P4Client::connect(
        fake.client_config()
            .with_p4_executable(fake.workspace().join("no-such-p4")),
    )
    .await
    .expect("connect");

    let err = client
        .get_all_workspaces()
        .await
        .expect_err("missing p4");
    assert_eq!(err.code(), "p4_not_installed");
}
