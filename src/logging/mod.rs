//! Structured JSONL request log (`~/.nginxpulse/request-log.jsonl`).
//!
//! One line per completed backend call: endpoint, HTTP status, latency and
//! the normalized error message if the call failed. Query values and access
//! keys are never written. All writes are best-effort; a log failure never
//! fails the request that produced it.

pub mod report;

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single entry in the request log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// RFC 3339 completion time.
    pub timestamp: String,
    /// Request path without the query string, e.g. `/api/stats/url`.
    pub endpoint: String,
    /// HTTP status, absent when the backend was never reached.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RequestLogEntry {
    pub fn new(
        endpoint: &str,
        status: Option<u16>,
        latency_ms: u64,
        error: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            endpoint: endpoint.to_string(),
            status,
            success: error.is_none(),
            latency_ms,
            error: error.map(str::to_string),
        }
    }
}

/// Append-only JSONL log at a fixed path.
#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log at `~/.nginxpulse/request-log.jsonl`.
    pub fn default_location() -> Option<Self> {
        default_log_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry, ignoring I/O errors.
    pub fn record(&self, entry: &RequestLogEntry) {
        let _ = self.append(entry);
    }

    fn append(&self, entry: &RequestLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;

        Ok(())
    }

    /// All entries. Malformed lines are skipped; a missing file is empty.
    pub fn read_all(&self) -> Vec<RequestLogEntry> {
        let Ok(file) = fs::File::open(&self.path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<RequestLogEntry>(&line).ok())
            .collect()
    }

    /// Entries from the last `days` days, or all of them when `None`.
    pub fn read_since_days(&self, days: Option<u32>) -> Vec<RequestLogEntry> {
        let entries = self.read_all();

        let Some(days) = days else {
            return entries;
        };

        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
        entries
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect()
    }
}

/// `~/.nginxpulse/request-log.jsonl`.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".nginxpulse").join("request-log.jsonl"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_log(name: &str) -> RequestLog {
        let dir = std::env::temp_dir().join(format!("pulse-log-test-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        RequestLog::new(dir.join("request-log.jsonl"))
    }

    #[test]
    fn entries_round_trip_through_the_file() {
        let log = scratch_log("roundtrip");
        log.record(&RequestLogEntry::new("/api/websites", Some(200), 12, None));
        log.record(&RequestLogEntry::new(
            "/api/stats/url",
            Some(401),
            3,
            Some("unauthorized"),
        ));

        let entries = log.read_all();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].success);
        assert_eq!(entries[1].status, Some(401));
        assert_eq!(entries[1].error.as_deref(), Some("unauthorized"));

        let _ = fs::remove_dir_all(log.path().parent().unwrap());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let log = scratch_log("malformed");
        log.record(&RequestLogEntry::new("/api/status", Some(200), 1, None));
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(log.read_all().len(), 1);
        let _ = fs::remove_dir_all(log.path().parent().unwrap());
    }

    #[test]
    fn missing_file_reads_empty() {
        let log = scratch_log("missing");
        assert!(log.read_all().is_empty());
        assert!(log.read_since_days(Some(1)).is_empty());
    }

    #[test]
    fn transport_failure_has_no_status() {
        let json = serde_json::to_string(&RequestLogEntry::new(
            "/api/status",
            None,
            15000,
            Some("timed out"),
        ))
        .unwrap();
        assert!(!json.contains("\"status\""));
        assert!(json.contains("\"success\":false"));
    }
}
