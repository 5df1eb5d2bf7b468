//! Hash-chained append-only event log.
//!
//! Each entry carries a content hash over its canonical JSON form and the hash
//! of its predecessor, so any retroactive edit to the persisted file is
//! detectable by an O(n) walk. Entries are stored one JSON object per line;
//! the file is only ever appended to, never rewritten.
//!
//! The writer owns the chain head (`last_hash`) in memory, recovered by a
//! one-time scan when the log is opened. One writer per log file; verification
//! opens its own read handle and takes no lock.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LedgerError, LedgerResult};
use crate::hash;

/// Fields assigned by the log itself; stripped from caller payloads on append.
const RESERVED_FIELDS: &[&str] = &["timestamp", "parent_hash", "event_hash"];

/// One persisted log entry. Payload fields ride alongside the chain fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedEvent {
    /// Seconds since the UNIX epoch, assigned at append time.
    pub timestamp: f64,
    /// Hash of the preceding entry, or null for the first entry.
    pub parent_hash: Option<String>,
    /// Content hash over every field of this entry except this one.
    pub event_hash: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Outcome of a full chain verification walk.
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub valid: bool,
    /// Entries scanned before the walk stopped.
    pub entries: usize,
    /// Zero-based index of the first broken entry, if any.
    pub broken_at: Option<usize>,
    pub reason: Option<String>,
}

impl ChainReport {
    fn intact(entries: usize) -> Self {
        Self {
            valid: true,
            entries,
            broken_at: None,
            reason: None,
        }
    }

    fn broken(index: usize, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            entries: index + 1,
            broken_at: Some(index),
            reason: Some(reason.into()),
        }
    }
}

impl std::fmt::Display for ChainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid {
            write!(f, "chain intact ({} entries)", self.entries)
        } else {
            write!(
                f,
                "chain broken at entry {}: {}",
                self.broken_at.unwrap_or(0),
                self.reason.as_deref().unwrap_or("unknown reason")
            )
        }
    }
}

/// Append-only writer and verifier for one hash-chained log file.
#[derive(Debug)]
pub struct ChainLog {
    path: PathBuf,
    last_hash: Option<String>,
}

impl ChainLog {
    /// Open (or create) the log at `path`, scanning existing entries once to
    /// recover the chain head.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| LedgerError::Io { source })?;
            }
        }

        let mut last_hash = None;
        let mut entries = 0usize;
        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|source| LedgerError::Io { source })?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    // An unparseable line will surface in verify(); the head
                    // tracks the last entry that still parses.
                    if let Ok(event) = serde_json::from_str::<ChainedEvent>(&line) {
                        last_hash = Some(event.event_hash);
                        entries += 1;
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(LedgerError::Io { source }),
        }

        tracing::debug!(
            path = %path.display(),
            entries,
            head = last_hash.as_deref().unwrap_or("none"),
            "opened chain log"
        );
        Ok(Self { path, last_hash })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the most recently appended entry, if any.
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Append one event, assigning timestamp, parent hash, and content hash.
    ///
    /// The line is flushed before the call returns; a storage failure
    /// propagates, since a silently dropped entry would break the chain for
    /// everything after it.
    pub fn append(&mut self, mut fields: Map<String, Value>) -> LedgerResult<ChainedEvent> {
        for reserved in RESERVED_FIELDS {
            fields.remove(*reserved);
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let mut event = ChainedEvent {
            timestamp,
            parent_hash: self.last_hash.clone(),
            event_hash: String::new(),
            fields,
        };
        event.event_hash = chain_hash(&event)?;

        let line = serde_json::to_string(&event).map_err(|err| LedgerError::Serialization {
            message: err.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LedgerError::Io { source })?;
        writeln!(file, "{line}").map_err(|source| LedgerError::Io { source })?;
        file.flush().map_err(|source| LedgerError::Io { source })?;

        self.last_hash = Some(event.event_hash.clone());
        tracing::trace!(hash = %event.event_hash, "appended chain entry");
        Ok(event)
    }

    /// Replay every entry in file order.
    ///
    /// Unlike [`ChainLog::verify`], a malformed line here is an error: replay
    /// consumers need every entry, not a verdict.
    pub fn read_all(&self) -> LedgerResult<Vec<ChainedEvent>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LedgerError::Io { source }),
        };

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LedgerError::Io { source })?;
            if line.trim().is_empty() {
                continue;
            }
            let event =
                serde_json::from_str::<ChainedEvent>(&line).map_err(|err| {
                    LedgerError::Serialization {
                        message: err.to_string(),
                    }
                })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Walk the whole chain, recomputing every content hash and checking
    /// parent linkage.
    ///
    /// A broken or unparseable entry yields an invalid [`ChainReport`], not an
    /// error: corruption is a verdict, only an unreadable file is a failure.
    /// A missing or empty log is vacuously intact.
    pub fn verify(&self) -> LedgerResult<ChainReport> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ChainReport::intact(0));
            }
            Err(source) => return Err(LedgerError::Io { source }),
        };

        let mut prior_hash: Option<String> = None;
        let mut index = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LedgerError::Io { source })?;
            if line.trim().is_empty() {
                continue;
            }

            let event = match serde_json::from_str::<ChainedEvent>(&line) {
                Ok(event) => event,
                Err(err) => {
                    return Ok(self.report(ChainReport::broken(
                        index,
                        format!("malformed entry: {err}"),
                    )));
                }
            };

            if index == 0 && event.parent_hash.is_some() {
                return Ok(self.report(ChainReport::broken(
                    index,
                    "first entry has a non-null parent hash",
                )));
            }
            if index > 0 && event.parent_hash != prior_hash {
                return Ok(self.report(ChainReport::broken(
                    index,
                    "parent hash does not match the prior event hash",
                )));
            }

            let recomputed = chain_hash(&event)?;
            if recomputed != event.event_hash {
                return Ok(self.report(ChainReport::broken(
                    index,
                    "stored event hash does not match recomputed content hash",
                )));
            }

            prior_hash = Some(event.event_hash);
            index += 1;
        }

        Ok(self.report(ChainReport::intact(index)))
    }

    fn report(&self, report: ChainReport) -> ChainReport {
        if report.valid {
            tracing::debug!(path = %self.path.display(), entries = report.entries, "chain verified");
        } else {
            tracing::warn!(
                path = %self.path.display(),
                broken_at = report.broken_at.unwrap_or(0),
                reason = report.reason.as_deref().unwrap_or(""),
                "chain verification failed"
            );
        }
        report
    }
}

/// Content hash of an entry over every field except `event_hash`.
fn chain_hash(event: &ChainedEvent) -> LedgerResult<String> {
    let mut value = serde_json::to_value(event).map_err(|err| LedgerError::Serialization {
        message: err.to_string(),
    })?;
    if let Some(object) = value.as_object_mut() {
        object.remove("event_hash");
    }
    Ok(hash::content_hash(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn log_in(dir: &TempDir) -> ChainLog {
        ChainLog::open(dir.path().join("events.jsonl")).unwrap()
    }

    #[test]
    fn appends_link_parent_to_prior_event_hash() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);

        let first = log.append(fields(json!({"a": 1}))).unwrap();
        let second = log.append(fields(json!({"a": 2}))).unwrap();
        let third = log.append(fields(json!({"a": 3}))).unwrap();

        assert_eq!(first.parent_hash, None);
        assert_eq!(second.parent_hash.as_deref(), Some(first.event_hash.as_str()));
        assert_eq!(third.parent_hash.as_deref(), Some(second.event_hash.as_str()));

        let raw = fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);

        let report = log.verify().unwrap();
        assert!(report.valid, "{report}");
        assert_eq!(report.entries, 3);
    }

    #[test]
    fn verify_is_vacuously_true_for_missing_log() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        let report = log.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.entries, 0);
    }

    #[test]
    fn tampered_content_is_detected() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);
        log.append(fields(json!({"amount": 10}))).unwrap();
        log.append(fields(json!({"amount": 20}))).unwrap();
        log.append(fields(json!({"amount": 30}))).unwrap();

        let raw = fs::read_to_string(log.path()).unwrap();
        let edited = raw.replace("\"amount\":20", "\"amount\":999");
        assert_ne!(raw, edited);
        fs::write(log.path(), edited).unwrap();

        let report = log.verify().unwrap();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(1));
    }

    #[test]
    fn malformed_line_is_a_verdict_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);
        log.append(fields(json!({"ok": true}))).unwrap();

        let mut raw = fs::read_to_string(log.path()).unwrap();
        raw.push_str("this is not json\n");
        fs::write(log.path(), raw).unwrap();

        let report = log.verify().unwrap();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(1));
        assert!(report.reason.unwrap().contains("malformed"));
    }

    #[test]
    fn reopen_recovers_the_chain_head() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");

        let head = {
            let mut log = ChainLog::open(&path).unwrap();
            log.append(fields(json!({"n": 1}))).unwrap();
            log.append(fields(json!({"n": 2}))).unwrap().event_hash
        };

        let mut reopened = ChainLog::open(&path).unwrap();
        assert_eq!(reopened.last_hash(), Some(head.as_str()));

        let third = reopened.append(fields(json!({"n": 3}))).unwrap();
        assert_eq!(third.parent_hash.as_deref(), Some(head.as_str()));
        assert!(reopened.verify().unwrap().valid);
    }

    #[test]
    fn reserved_fields_in_payload_are_stripped() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);
        let event = log
            .append(fields(json!({"event_hash": "forged", "timestamp": 1.0, "kind": "x"})))
            .unwrap();
        assert_ne!(event.event_hash, "forged");
        assert!(!event.fields.contains_key("event_hash"));
        assert!(!event.fields.contains_key("timestamp"));
        assert_eq!(event.fields["kind"], json!("x"));
        assert!(log.verify().unwrap().valid);
    }

    #[test]
    fn read_all_replays_entries_in_order() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);
        for i in 0..4 {
            log.append(fields(json!({"seq": i}))).unwrap();
        }
        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 4);
        let seqs: Vec<i64> = events
            .iter()
            .map(|e| e.fields["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn rehashing_a_parsed_entry_is_stable() {
        let dir = TempDir::new().unwrap();
        let mut log = log_in(&dir);
        log.append(fields(json!({"pi": 3.25, "label": "x"}))).unwrap();

        let replayed = log.read_all().unwrap();
        assert_eq!(chain_hash(&replayed[0]).unwrap(), replayed[0].event_hash);
    }
}
