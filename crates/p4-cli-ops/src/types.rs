use crate::command_runner::{classify_failed_command, CommandRunOutput};
use crate::ztag::{parse_ztag_output, ZtagRecord};
use crate::P4CliOpsError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Changelist as supplied by a caller: the default changelist, a number, or
/// a pending changelist description (created on demand where noted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangelistRef {
    Default,
    Number(u32),
    Description(String),
}

impl Default for ChangelistRef {
    fn default() -> Self {
        Self::Default
    }
}

impl From<u32> for ChangelistRef {
    fn from(number: u32) -> Self {
        Self::Number(number)
    }
}

impl From<Changelist> for ChangelistRef {
    fn from(changelist: Changelist) -> Self {
        match changelist {
            Changelist::Default => Self::Default,
            Changelist::Numbered(number) => Self::Number(number),
        }
    }
}

impl From<&str> for ChangelistRef {
    /// `"default"` and numeric strings are recognized; anything else is a
    /// description.
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed == "default" {
            Self::Default
        } else if let Ok(number) = trimmed.parse::<u32>() {
            Self::Number(number)
        } else {
            Self::Description(value.to_string())
        }
    }
}

impl From<String> for ChangelistRef {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// A changelist p4 can address directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Changelist {
    Default,
    Numbered(u32),
}

impl Changelist {
    pub fn as_arg(&self) -> String {
        match self {
            Self::Default => "default".to_string(),
            Self::Numbered(number) => number.to_string(),
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Default => None,
            Self::Numbered(number) => Some(*number),
        }
    }
}

impl fmt::Display for Changelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_arg())
    }
}

/// Description filter for pending changelist queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangelistFilter {
    /// Empty matches every changelist.
    #[serde(default)]
    pub description: String,
    /// Require the whole description to match instead of a substring.
    #[serde(default)]
    pub perfect_match_only: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ChangelistFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn exact(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            perfect_match_only: true,
            case_sensitive: true,
        }
    }

    pub fn containing(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            perfect_match_only: false,
            case_sensitive: false,
        }
    }

    /// Trailing newlines are ignored on both sides.
    pub fn matches(&self, description: &str) -> bool {
        let wanted = self.description.trim_end_matches('\n');
        if wanted.is_empty() {
            return true;
        }
        let actual = description.trim_end_matches('\n');

        let (wanted, actual) = if self.case_sensitive {
            (wanted.to_string(), actual.to_string())
        } else {
            (wanted.to_lowercase(), actual.to_lowercase())
        };

        if self.perfect_match_only {
            wanted == actual
        } else {
            actual.contains(&wanted)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChangelist {
    pub number: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelvedFile {
    pub depot_path: String,
    pub changelist: u32,
}

/// One entry of `p4 changes -l`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct P4ChangeEntry {
    pub change: String,
    pub user: Option<String>,
    pub client: Option<String>,
    pub status: Option<String>,
    pub time: Option<String>,
    pub desc: Option<String>,
}

impl P4ChangeEntry {
    pub(crate) fn into_record(self) -> Option<ChangeRecord> {
        Some(ChangeRecord {
            change: self.change.trim().parse().ok()?,
            user: self.user,
            client: self.client,
            status: self.status,
            time: self.time.as_deref().and_then(parse_epoch_seconds),
            description: self
                .desc
                .unwrap_or_default()
                .trim_end_matches('\n')
                .to_string(),
        })
    }
}

/// Perforce reports times as seconds since the Unix epoch.
pub(crate) fn parse_epoch_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let seconds = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Specific revision to sync to; `None` syncs to head.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
    /// Warn about files missing on disk after the sync. Ignored when a
    /// revision is given.
    #[serde(default = "default_verify")]
    pub verify: bool,
    #[serde(default)]
    pub force: bool,
}

const fn default_verify() -> bool {
    true
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::head()
    }
}

impl SyncOptions {
    pub fn head() -> Self {
        Self {
            revision: None,
            verify: true,
            force: false,
        }
    }

    pub fn at_revision(revision: u32) -> Self {
        Self {
            revision: Some(revision),
            verify: false,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// How a raw command is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Request tagged output (`-ztag`) and parse it into records.
    pub tagged: bool,
    /// Pass `-u <user> -c <client>`.
    pub use_global_options: bool,
    /// Check server reachability first (only logs when unreachable).
    pub online_check: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tagged: true,
            use_global_options: true,
            online_check: true,
        }
    }
}

impl RunOptions {
    /// Untagged, no global options, no online check: used for `p4 set`.
    pub fn local() -> Self {
        Self {
            tagged: false,
            use_global_options: false,
            online_check: false,
        }
    }
}

/// Parsed result of one (possibly batched) p4 command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub records: Vec<ZtagRecord>,
    /// Untagged stdout lines.
    pub info: Vec<String>,
    /// Diagnostics p4 printed on stderr (per-file warnings and errors).
    pub messages: Vec<String>,
    /// Exit code of the last failing batch, otherwise of the last batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip)]
    pub(crate) raw_stdout: String,
}

impl CommandOutput {
    pub(crate) fn from_run(run: CommandRunOutput, tagged: bool) -> Self {
        let (records, info) = if tagged {
            let parsed = parse_ztag_output(&run.stdout);
            (parsed.records, parsed.info)
        } else {
            let info = run
                .stdout
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            (Vec::new(), info)
        };

        let messages = run
            .stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            records,
            info,
            messages,
            exit_code: run.exit_code,
            raw_stdout: run.stdout,
        }
    }

    /// Output of a skipped command (e.g. empty file list).
    pub fn empty() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Append the output of another batch of the same command.
    pub fn merge(&mut self, other: CommandOutput) {
        let keep_failure = self.exit_code.is_some_and(|code| code != 0);
        self.records.extend(other.records);
        self.info.extend(other.info);
        self.messages.extend(other.messages);
        if !keep_failure {
            self.exit_code = other.exit_code;
        }
        self.raw_stdout.push_str(&other.raw_stdout);
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.info.is_empty() && self.messages.is_empty()
    }

    /// Raw stdout, concatenated across batches.
    pub fn stdout(&self) -> &str {
        &self.raw_stdout
    }

    /// Classified error when p4 exited non-zero and printed nothing usable
    /// on stdout.
    pub fn failure(&self) -> Option<P4CliOpsError> {
        if self.succeeded() || !self.records.is_empty() || !self.info.is_empty() {
            return None;
        }
        Some(classify_failed_command(
            self.exit_code,
            &self.raw_stdout,
            &self.messages.join("\n"),
        ))
    }

    pub fn ensure_success(self) -> Result<Self, P4CliOpsError> {
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Host and port of a `P4PORT` value such as `ssl:perforce.example.com:1666`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P4Port {
    pub host: String,
    pub port: u16,
}

impl P4Port {
    /// Accepts `[protocol:]host:port` and a bare `port` (meaning localhost).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.rsplit(':');
        let port = parts.next()?.trim().parse::<u16>().ok()?;
        let host = match parts.next() {
            Some(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => "localhost".to_string(),
        };
        Some(Self { host, port })
    }
}

impl fmt::Display for P4Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
