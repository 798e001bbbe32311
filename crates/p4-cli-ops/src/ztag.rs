//! Parser for Perforce tagged output (`p4 -ztag`).
//!
//! Tagged output prints one field per line as `... key value`. Records are
//! separated by blank lines. Field values may span several lines (changelist
//! descriptions do), in which case the extra lines carry no `... ` prefix.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const FIELD_PREFIX: &str = "... ";

/// One tagged record: the fields Perforce printed for a single file, change,
/// client, etc.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZtagRecord {
    fields: BTreeMap<String, String>,
}

impl ZtagRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Field parsed as an unsigned number; `None` when absent or not numeric.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values of the numbered fields `prefix0`, `prefix1`, ... in index order.
    ///
    /// Perforce uses numbered keys for per-record lists such as `otherOpen0`
    /// in `fstat` or `depotFile0` in `describe`. A key equal to the bare
    /// prefix (e.g. `otherOpen`, which holds a count) is not included.
    pub fn indexed(&self, prefix: &str) -> Vec<&str> {
        let mut numbered: Vec<(usize, &str)> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let suffix = key.strip_prefix(prefix)?;
                if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                suffix.parse::<usize>().ok().map(|idx| (idx, value.as_str()))
            })
            .collect();
        numbered.sort_by_key(|(idx, _)| *idx);
        numbered.into_iter().map(|(_, value)| value).collect()
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }

    /// Decode the record into a typed struct whose fields are all strings
    /// (or `Option<String>`).
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json_value())
    }
}

/// Parsed stdout of a tagged command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZtagOutput {
    pub records: Vec<ZtagRecord>,
    /// Untagged lines printed outside of any record.
    pub info: Vec<String>,
}

/// Parse `p4 -ztag` stdout into records and untagged info lines.
pub fn parse_ztag_output(text: &str) -> ZtagOutput {
    let mut output = ZtagOutput::default();
    let mut current: Option<ZtagRecord> = None;
    let mut last_key: Option<String> = None;
    let mut pending_blank = 0usize;

    for raw_line in text.lines() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(field) = line.strip_prefix(FIELD_PREFIX) {
            let (key, value) = field.split_once(' ').unwrap_or((field, ""));

            let starts_new_record = pending_blank > 0
                || current.as_ref().is_some_and(|record| record.contains(key));
            if starts_new_record {
                if let Some(record) = current.take() {
                    output.records.push(record);
                }
            }
            pending_blank = 0;

            current
                .get_or_insert_with(ZtagRecord::new)
                .insert(key, value);
            last_key = Some(key.to_string());
            continue;
        }

        if line.trim().is_empty() {
            if current.is_some() {
                pending_blank += 1;
            }
            continue;
        }

        match (current.as_mut(), last_key.as_deref()) {
            (Some(record), Some(key)) => {
                let value = record.fields.entry(key.to_string()).or_default();
                for _ in 0..pending_blank {
                    value.push('\n');
                }
                value.push('\n');
                value.push_str(line);
                pending_blank = 0;
            }
            _ => output.info.push(line.to_string()),
        }
    }

    if let Some(record) = current.take() {
        output.records.push(record);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_separated_by_blank_lines() {
        let text = "... depotFile //depot/a.txt\n... headRev 3\n\n... depotFile //depot/b.txt\n... headRev 1\n\n";
        let parsed = parse_ztag_output(text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].get("depotFile"), Some("//depot/a.txt"));
        assert_eq!(parsed.records[1].get_u32("headRev"), Some(1));
        assert!(parsed.info.is_empty());
    }

    #[test]
    fn field_without_value_is_empty_string() {
        let parsed = parse_ztag_output("... depotFile //depot/a.txt\n... isMapped \n... shelved\n");
        let record = &parsed.records[0];
        assert_eq!(record.get("isMapped"), Some(""));
        assert_eq!(record.get("shelved"), Some(""));
    }

    #[test]
    fn multi_line_description_is_joined() {
        let text = "... change 12\n... desc Fix the build\nand the tests\n\n... change 13\n... desc One liner\n\n";
        let parsed = parse_ztag_output(text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(
            parsed.records[0].get("desc"),
            Some("Fix the build\nand the tests")
        );
        assert_eq!(parsed.records[1].get("desc"), Some("One liner"));
    }

    #[test]
    fn blank_line_inside_description_is_kept() {
        let text = "... change 7\n... desc Title\n\nBody text\n\n";
        let parsed = parse_ztag_output(text);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].get("desc"), Some("Title\n\nBody text"));
    }

    #[test]
    fn untagged_lines_outside_records_are_info() {
        let parsed = parse_ztag_output("Change 42 created.\n");
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.info, vec!["Change 42 created.".to_string()]);
    }

    #[test]
    fn repeated_key_without_separator_starts_new_record() {
        let parsed = parse_ztag_output("... client ws-a\n... client ws-b\n");
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].get("client"), Some("ws-b"));
    }

    #[test]
    fn handles_crlf_line_endings() {
        let parsed = parse_ztag_output("... depotFile //depot/a.txt\r\n... headRev 2\r\n\r\n");
        assert_eq!(parsed.records[0].get("depotFile"), Some("//depot/a.txt"));
        assert_eq!(parsed.records[0].get_u32("headRev"), Some(2));
    }

    #[test]
    fn indexed_fields_are_ordered_by_number() {
        let mut record = ZtagRecord::new();
        record.insert("otherOpen", "11");
        record.insert("otherOpen10", "k@ws");
        record.insert("otherOpen2", "c@ws");
        record.insert("otherOpen0", "a@ws");
        record.insert("otherOpen1", "b@ws");
        record.insert("otherOpenX", "ignored");

        assert_eq!(record.indexed("otherOpen"), vec!["a@ws", "b@ws", "c@ws", "k@ws"]);
    }

    #[test]
    fn deserializes_into_typed_struct() {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Where {
            depot_file: String,
            path: Option<String>,
        }

        let parsed = parse_ztag_output("... depotFile //depot/a.txt\n... path /ws/a.txt\n");
        let typed: Where = parsed.records[0].deserialize().expect("deserialize");
        assert_eq!(typed.depot_file, "//depot/a.txt");
        assert_eq!(typed.path.as_deref(), Some("/ws/a.txt"));
    }
}
