//! SQLite persistence.
//!
//! Two databases are kept apart: the Raw Store caches what the archive
//! served (freshness markers, message pages, extracted bodies) and the
//! Output Store holds the structured upload history. Either can be
//! rebuilt from the one before it.

mod output;
mod raw;
mod triage;

pub use output::{DATE_FORMAT, OutputStore};
pub use raw::{RawStore, RawStoreStats};
pub use triage::{JsonlSink, LogSink, TriageEntry, TriageSink};

use std::path::Path;

use crate::error::Result;

/// The configured sink: a JSON lines file when a path is given, the log
/// otherwise.
pub fn triage_sink(path: Option<&Path>) -> Result<Box<dyn TriageSink>> {
    Ok(match path {
        Some(path) => Box::new(JsonlSink::open(path)?),
        None => Box::new(LogSink),
    })
}
