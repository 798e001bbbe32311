#![allow(dead_code)]

use p4_cli_ops::{ClientConfig, P4Client};
use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in for the p4 executable.
///
/// Logs every invocation (tab separated argv), skips global options, then
/// answers from `responses/<cmd>.<n>.{delay,stdout,stderr,exit}` for the n-th
/// call of `<cmd>`, falling back to `responses/<cmd>.{delay,stdout,stderr,exit}`.
/// Stdin of commands run with `-i` is saved as `stdin-<cmd>-<n>.txt`.
const FAKE_P4_SCRIPT: &str = r#"#!/bin/sh
dir=$(cd "$(dirname "$0")" && pwd)
{ for arg in "$@"; do printf '%s\t' "$arg"; done; printf '\n'; } >> "$dir/invocations.log"
while [ $# -gt 0 ]; do
  case "$1" in
    -ztag|-s|-q) shift ;;
    -u|-c|-p|-d|-C|-P|-H|--field) shift 2 ;;
    *) break ;;
  esac
done
cmd="$1"
counter="$dir/count-$cmd"
n=$(( $(cat "$counter" 2>/dev/null || echo 0) + 1 ))
echo "$n" > "$counter"
for arg in "$@"; do
  if [ "$arg" = "-i" ]; then cat > "$dir/stdin-$cmd-$n.txt"; fi
done
base="$dir/responses/$cmd"
if [ -e "$base.$n.stdout" ] || [ -e "$base.$n.stderr" ] || [ -e "$base.$n.exit" ]; then
  base="$base.$n"
fi
if [ -f "$base.delay" ]; then sleep "$(cat "$base.delay")"; fi
if [ -f "$base.stdout" ]; then cat "$base.stdout"; fi
if [ -f "$base.stderr" ]; then cat "$base.stderr" >&2; fi
code=0
if [ -f "$base.exit" ]; then code=$(cat "$base.exit"); fi
exit "$code"
"#;

const GLOBAL_FLAGS: &[&str] = &["-ztag", "-s", "-q"];
const GLOBAL_OPTIONS: &[&str] = &["-u", "-c", "-p", "-d", "-C", "-P", "-H", "--field"];

pub struct FakeP4 {
    dir: TempDir,
    server: String,
}

impl FakeP4 {
    /// Fake p4 plus a workspace folder holding a `.p4config`, and a local
    /// TCP listener standing in for the server.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let bin = dir.path().join("bin");
        fs::create_dir_all(bin.join("responses")).expect("failed to create bin dir");

        let script = bin.join("p4");
        fs::write(&script, FAKE_P4_SCRIPT).expect("failed to write fake p4");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod fake p4");

        let workspace = dir.path().join("ws");
        fs::create_dir_all(&workspace).expect("failed to create workspace");
        fs::write(workspace.join(".p4config"), "P4CLIENT=alice-ws\n")
            .expect("failed to write .p4config");

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

    pub fn executable(&self) -> PathBuf {
        self.dir.path().join("bin").join("p4")
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    /// Absolute path of `name` inside the workspace, as a string.
    pub fn ws_path(&self, name: &str) -> String {
        self.workspace().join(name).to_string_lossy().into_owned()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Config with user, client and server preset so connecting runs no p4.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.workspace())
            .with_user("alice")
            .with_client("alice-ws")
            .with_server(self.server.clone())
            .with_p4_executable(self.executable())
    }

    pub async fn client(&self) -> P4Client {
        P4Client::connect(self.client_config())
            .await
            .expect("failed to connect fake client")
    }

    /// Default stdout for every call of `cmd`.
    pub fn respond(&self, cmd: &str, stdout: &str) {
        self.write_response(cmd, None, "stdout", stdout);
    }

    /// Stdout for the `n`-th call (1-based) of `cmd`.
    pub fn respond_nth(&self, cmd: &str, n: usize, stdout: &str) {
        self.write_response(cmd, Some(n), "stdout", stdout);
    }

    pub fn respond_stderr(&self, cmd: &str, stderr: &str, exit_code: i32) {
        self.write_response(cmd, None, "stderr", stderr);
        self.write_response(cmd, None, "exit", &exit_code.to_string());
    }

    pub fn respond_nth_stderr(&self, cmd: &str, n: usize, stderr: &str, exit_code: i32) {
        self.write_response(cmd, Some(n), "stderr", stderr);
        self.write_response(cmd, Some(n), "exit", &exit_code.to_string());
    }

    /// Make every call of `cmd` sleep before answering.
    pub fn delay(&self, cmd: &str, seconds: u32) {
        self.write_response(cmd, None, "delay", &seconds.to_string());
    }

    /// Every invocation as its argv.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        let log = fs::read_to_string(self.dir.path().join("bin").join("invocations.log"))
            .unwrap_or_default();
        log.lines()
            .map(|line| {
                line.split('\t')
                    .filter(|arg| !arg.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    }

    /// Invocations with global options removed, joined with spaces
    /// (e.g. `"fstat /ws/a.txt"`).
    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|argv| strip_global_options(argv).join(" "))
            .collect()
    }

    /// Commands whose p4 command name is `cmd`.
    pub fn commands_of(&self, cmd: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|line| line.split(' ').next() == Some(cmd))
            .collect()
    }

    pub fn stdin_of(&self, cmd: &str, n: usize) -> String {
        fs::read_to_string(
            self.dir
                .path()
                .join("bin")
                .join(format!("stdin-{cmd}-{n}.txt")),
        )
        .unwrap_or_default()
    }

    fn write_response(&self, cmd: &str, n: Option<usize>, kind: &str, content: &str) {
        let name = match n {
            Some(n) => format!("{cmd}.{n}.{kind}"),
            None => format!("{cmd}.{kind}"),
        };
        let path = self.dir.path().join("bin").join("responses").join(name);
        fs::write(path, content).expect("failed to write response");
    }
}

fn strip_global_options(argv: &[String]) -> Vec<String> {
    let mut idx = 0;
    while idx < argv.len() {
        let arg = argv[idx].as_str();
        if GLOBAL_FLAGS.contains(&arg) {
            idx += 1;
        } else if GLOBAL_OPTIONS.contains(&arg) {
            idx += 2;
        } else {
            break;
        }
    }
    argv.get(idx..).map(<[String]>::to_vec).unwrap_or_default()
}

/// Create a file (and parents) with some content.
pub fn create_file(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    fs::write(&path, "content\n").expect("failed to write file");
    path
}

/// Tagged `fstat` record for a tracked file.
pub fn fstat_record(depot: &str, local: &str, have: u32, head: u32, action: Option<&str>) -> String {
    let mut record = format!(
        "... depotFile {depot}\n... clientFile {local}\n... isMapped \n... headAction edit\n... headType text\n... headTime 1700000000\n... headRev {head}\n... haveRev {have}\n"
    );
    if let Some(action) = action {
        record.push_str(&format!("... action {action}\n... change default\n"));
    }
    record.push('\n');
    record
}

/// Tagged `changes` record.
pub fn change_record(change: u32, desc: &str, status: &str) -> String {
    format!(
        "... change {change}\n... time 1700000000\n... user alice\n... client alice-ws\n... status {status}\n... changeType public\n... desc {desc}\n\n"
    )
}
