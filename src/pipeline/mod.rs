//! Pipeline entry points.
//!
//! - `run_crawler`: refresh stale periods in the Raw Store
//! - `run_extraction`: cached pages to message bodies to upload records
//! - `run_pipeline`: both, in order

pub mod crawl;
pub mod extract;
mod pipeline;

pub use crawl::{CrawlOrchestrator, CrawlSummary, run_crawler};
pub use extract::{ExtractSummary, Extractor, run_extraction};
pub use pipeline::run_pipeline;
