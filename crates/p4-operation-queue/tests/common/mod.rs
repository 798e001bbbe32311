#![allow(dead_code)]

use p4_cli_ops::{ClientConfig, P4Client};
use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

/// Minimal p4 stand-in: logs the command after global options and answers
/// from `responses/<cmd>.{delay,stdout,stderr,exit}`.
const FAKE_P4_SCRIPT: &str = r#"#!/bin/sh
dir=$(cd "$(dirname "$0")" && pwd)
while [ $# -gt 0 ]; do
  case "$1" in
    -ztag|-s|-q) shift ;;
    -u|-c|-p|--field) shift 2 ;;
    *) break ;;
  esac
done
echo "$*" >> "$dir/commands.log"
base="$dir/responses/$1"
if [ -f "$base.delay" ]; then sleep "$(cat "$base.delay")"; fi
if [ -f "$base.stdout" ]; then cat "$base.stdout"; fi
if [ -f "$base.stderr" ]; then cat "$base.stderr" >&2; fi
code=0
if [ -f "$base.exit" ]; then code=$(cat "$base.exit"); fi
exit "$code"
"#;

pub struct FakeP4 {
    dir: TempDir,
    server: String,
}

impl FakeP4 {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let bin = dir.path().join("bin");
        fs::create_dir_all(bin.join("responses")).expect("failed to create bin dir");

        let script = bin.join("p4");
        fs::write(&script, FAKE_P4_SCRIPT).expect("failed to write fake p4");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod fake p4");
        fs::create_dir_all(dir.path().join("ws")).expect("failed to create workspace");

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
        let server = format!(
            "127.0.0.1:{}",
            listener.local_addr().expect("listener address").port()
        );
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                drop(stream);
            }
        });

        Self { dir, server }
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.workspace())
            .with_user("alice")
            .with_client("alice-ws")
            .with_server(self.server.clone())
            .with_p4_executable(self.dir.path().join("bin").join("p4"))
    }

    pub async fn client(&self) -> P4Client {
        P4Client::connect(self.client_config())
            .await
            .expect("failed to connect fake client")
    }

    pub fn respond(&self, cmd: &str, stdout: &str) {
        self.write_response(cmd, "stdout", stdout);
    }

    pub fn respond_stderr(&self, cmd: &str, stderr: &str, exit_code: i32) {
        self.write_response(cmd, "stderr", stderr);
        self.write_response(cmd, "exit", &exit_code.to_string());
    }

    pub fn delay(&self, cmd: &str, seconds: u32) {
        self.write_response(cmd, "delay", &seconds.to_string());
    }

    /// Commands in the order p4 saw them, without global options.
    pub fn commands(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("bin").join("commands.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn write_response(&self, cmd: &str, kind: &str, content: &str) {
        let path = self
            .dir
            .path()
            .join("bin")
            .join("responses")
            .join(format!("{cmd}.{kind}"));
        fs::write(path, content).expect("failed to write response");
    }
}
