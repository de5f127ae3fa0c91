//! Sinks for messages that need a human look.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Receives (message id, error detail, raw content) triples.
pub trait TriageSink: Send + Sync {
    fn record(&self, message_id: &str, detail: &str, raw: &str);
}

/// Writes triage entries to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TriageSink for LogSink {
    fn record(&self, message_id: &str, detail: &str, raw: &str) {
        log::error!("{}: {}\n{}", message_id, detail, raw);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageEntry {
    pub message_id: String,
    pub detail: String,
    pub raw: String,
    pub recorded_at: DateTime<Utc>,
}

/// Appends one JSON object per entry to a file.
///
/// An entry whose (message id, detail) pair is already in the file is
/// not written again, so re-extracting a period does not grow the file.
pub struct JsonlSink {
    state: Mutex<JsonlState>,
}

struct JsonlState {
    file: File,
    seen: HashSet<(String, String)>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut seen = HashSet::new();
        if path.exists() {
            for line in BufReader::new(File::open(path)?).lines() {
                match serde_json::from_str::<TriageEntry>(&line?) {
                    Ok(entry) => {
                        seen.insert((entry.message_id, entry.detail));
                    }
                    Err(e) => log::warn!("Skipping unreadable line in {}: {}", path.display(), e),
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            state: Mutex::new(JsonlState { file, seen }),
        })
    }

    /// Returns false when the entry was already recorded.
    fn append(&self, entry: &TriageEntry) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let key = (entry.message_id.clone(), entry.detail.clone());
        if state.seen.contains(&key) {
            return Ok(false);
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        state.file.write_all(line.as_bytes())?;
        state.seen.insert(key);
        Ok(true)
    }
}

impl TriageSink for JsonlSink {
    fn record(&self, message_id: &str, detail: &str, raw: &str) {
        let entry = TriageEntry {
            message_id: message_id.to_string(),
            detail: detail.to_string(),
            raw: raw.to_string(),
            recorded_at: Utc::now(),
        };
        match self.append(&entry) {
            Ok(true) => log::warn!("Triage {}: {}", message_id, detail),
            Ok(false) => log::debug!("Triage {} already recorded: {}", message_id, detail),
            Err(e) => {
                log::error!("Failed to write triage entry for {}: {}", message_id, e);
                LogSink.record(message_id, detail, raw);
            }
        }
    }
}
