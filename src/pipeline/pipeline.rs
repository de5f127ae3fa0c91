// src/pipeline/pipeline.rs

use crate::error::Result;
use crate::models::{Config, PeriodRange};
use crate::services::Fetch;
use crate::storage::{OutputStore, RawStore, TriageSink};

use super::crawl::{CrawlSummary, run_crawler};
use super::extract::{ExtractSummary, run_extraction};

/// Crawl, then extract, over the same periods.
pub async fn run_pipeline(
    config: &Config,
    fetcher: &dyn Fetch,
    raw: &mut RawStore,
    output: &mut OutputStore,
    triage: &dyn TriageSink,
    range: PeriodRange,
) -> Result<(CrawlSummary, ExtractSummary)> {
    log::info!("[1/2] Crawl - refreshing the archive cache");
    let crawl = run_crawler(config, fetcher, raw, range).await?;

    log::info!("[2/2] Extract - computing upload history");
    let extract = run_extraction(config, raw, output, triage, range)?;

    Ok((crawl, extract))
}
