//! Cached artifacts and extracted upload records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Period;

/// A fetched archive page, keyed by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub url: String,
    pub period: Period,
    pub contents: Vec<u8>,
}

/// A message id and the literal body text of that message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub message_id: String,
    pub period: Period,
    pub body: String,
}

/// One upload announcement, as stored in `upload_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub message_id: String,

    /// Upload time, normalized to UTC
    pub date: NaiveDateTime,

    pub source: String,
    pub version: String,

    /// Raw `Changed-By` value with newlines folded
    pub changed_by: Option<String>,
    pub changed_by_name: Option<String>,
    pub changed_by_email: Option<String>,

    /// Raw `Maintainer` value with newlines folded
    pub maintainer: String,
    pub maintainer_name: String,
    pub maintainer_email: String,

    /// Non-maintainer upload (heuristic)
    pub nmu: bool,

    pub changes: String,
}

/// Why a message was not treated as an upload notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No `Source:` field; not an upload announcement
    NoSource,
    /// No `Date:` field, common in the earliest periods
    NoDate,
}

/// Why a message that looked like an upload could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("unparseable date {0:?}")]
    InvalidDate(String),

    #[error("no address found in {0}")]
    MalformedAddress(&'static str),
}

/// Result of parsing one message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(UploadRecord),
    Skipped(SkipReason),
    Failed(ParseError),
}
