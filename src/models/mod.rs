// src/models/mod.rs

//! Domain models for the history extractor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod period;
mod record;

// Re-export all public types
pub use config::{ArchiveConfig, Config, CrawlerConfig, LoggingConfig, StorageConfig};
pub use period::{Period, PeriodRange};
pub use record::{
    MessageRecord, ParseError, ParseOutcome, RawPage, SkipReason, UploadRecord,
};
