// src/pipeline/extract.rs

//! Body and metadata extraction over cached periods.

use crate::error::Result;
use crate::models::{Config, MessageRecord, ParseOutcome, Period, PeriodRange};
use crate::services::{BodyExtractor, ExtractMiss, parse_upload};
use crate::storage::{OutputStore, RawStore, TriageSink};

/// Counts for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub periods: usize,
    pub bodies_extracted: usize,
    pub pages_missed: usize,
    pub uploads_stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs both extraction phases for one period at a time.
pub struct Extractor<'a> {
    bodies: BodyExtractor,
    triage: &'a dyn TriageSink,
}

impl<'a> Extractor<'a> {
    pub fn new(triage: &'a dyn TriageSink) -> Self {
        Self {
            bodies: BodyExtractor::default(),
            triage,
        }
    }

    /// Turn the period's cached pages into message records.
    ///
    /// Skipped when the period already has records. Pages without an id
    /// or body are reported to triage and left out.
    pub fn extract_bodies(
        &self,
        raw: &mut RawStore,
        period: Period,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        if raw.has_message_records(period)? {
            log::debug!("Bodies for {} already extracted", period);
            return Ok(());
        }

        let mut records = Vec::new();
        for page in raw.raw_pages(period)? {
            let html = String::from_utf8_lossy(&page.contents);
            match self.bodies.extract(&html) {
                Ok(message) => records.push(MessageRecord {
                    message_id: message.message_id,
                    period,
                    body: message.body,
                }),
                Err(miss) => {
                    log::warn!("No message in {}: {}", page.url, miss);
                    let id = match &miss {
                        ExtractMiss::NoBody { message_id } => message_id.as_str(),
                        _ => page.url.as_str(),
                    };
                    self.triage.record(id, &miss.to_string(), &html);
                    summary.pages_missed += 1;
                }
            }
        }

        let inserted = raw.insert_message_records(&records)?;
        log::info!("Extracted {} message bodies for {}", inserted, period);
        summary.bodies_extracted += inserted;
        Ok(())
    }

    /// Parse the period's message bodies into upload records.
    pub fn extract_uploads(
        &self,
        raw: &RawStore,
        output: &mut OutputStore,
        period: Period,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        let mut uploads = Vec::new();
        let (mut skipped, mut failed) = (0, 0);

        for message in raw.message_records(period)? {
            match parse_upload(&message.message_id, &message.body) {
                ParseOutcome::Parsed(record) => uploads.push(record),
                ParseOutcome::Skipped(reason) => {
                    log::info!("Skipping {}: {:?}", message.message_id, reason);
                    skipped += 1;
                }
                ParseOutcome::Failed(error) => {
                    self.triage
                        .record(&message.message_id, &error.to_string(), &message.body);
                    failed += 1;
                }
            }
        }

        let stored = output.insert_records(&uploads)?;
        log::info!(
            "Computed upload history for {} ({} uploads, {} new, {} skipped, {} failed)",
            period,
            uploads.len(),
            stored,
            skipped,
            failed
        );
        summary.uploads_stored += stored;
        summary.skipped += skipped;
        summary.failed += failed;
        Ok(())
    }

    pub fn run(
        &self,
        raw: &mut RawStore,
        output: &mut OutputStore,
        periods: &[Period],
    ) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();
        for &period in periods {
            self.extract_bodies(raw, period, &mut summary)?;
            self.extract_uploads(raw, output, period, &mut summary)?;
            summary.periods += 1;
        }
        Ok(summary)
    }
}

/// Extract bodies and upload records for the selected periods.
pub fn run_extraction(
    config: &Config,
    raw: &mut RawStore,
    output: &mut OutputStore,
    triage: &dyn TriageSink,
    range: PeriodRange,
) -> Result<ExtractSummary> {
    let periods = range.periods(config.archive.first_period()?, Period::current());
    let summary = Extractor::new(triage).run(raw, output, &periods)?;
    log::info!(
        "Extraction finished: {} bodies, {} uploads stored, {} skipped, {} failed",
        summary.bodies_extracted,
        summary.uploads_stored,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}
