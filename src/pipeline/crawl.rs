// src/pipeline/crawl.rs

//! Crawl Orchestrator.
//!
//! Each period is checked against its cached freshness marker. Stale
//! periods are re-walked and every message page is fetched before
//! anything is written; the pages and the new marker then land in a
//! single transaction, so an aborted period keeps its previous state.

use std::sync::LazyLock;

use futures::{StreamExt, TryStreamExt, stream};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{Config, Period, PeriodRange};
use crate::services::{Fetch, IndexWalker};
use crate::storage::RawStore;

static FRESHNESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"The last update was on [^.]*[.]").expect("static regex"));

/// The "last updated" sentence of an index page, compared verbatim.
pub fn freshness_marker(html: &str) -> Option<&str> {
    FRESHNESS_MARKER.find(html).map(|m| m.as_str())
}

/// Counts for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub periods_checked: usize,
    pub periods_fresh: usize,
    pub periods_committed: usize,
    pub periods_failed: usize,
    pub pages_stored: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Stale(String),
}

/// Drives freshness checks and per-period re-crawls.
pub struct CrawlOrchestrator<'a> {
    fetcher: &'a dyn Fetch,
    base_url: &'a str,
    concurrency: usize,
}

impl<'a> CrawlOrchestrator<'a> {
    pub fn new(fetcher: &'a dyn Fetch, config: &'a Config) -> Self {
        Self {
            fetcher,
            base_url: &config.archive.base_url,
            concurrency: config.crawler.max_concurrent.max(1),
        }
    }

    /// Check every period, then re-crawl the stale ones in order.
    ///
    /// A period whose check or crawl fails is logged and left as it was;
    /// store errors abort the run.
    pub async fn run(&self, store: &mut RawStore, periods: &[Period]) -> Result<CrawlSummary> {
        let cached = store.freshness_markers()?;
        let mut summary = CrawlSummary {
            periods_checked: periods.len(),
            ..CrawlSummary::default()
        };

        let checks: Vec<(Period, Result<Freshness>)> = stream::iter(periods.iter().copied())
            .map(|period| {
                let cached = cached.get(&period).map(String::as_str);
                async move { (period, self.check_freshness(period, cached).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut stale = Vec::new();
        for (period, result) in checks {
            match result {
                Ok(Freshness::Fresh) => {
                    log::debug!("{} is up to date", period);
                    summary.periods_fresh += 1;
                }
                Ok(Freshness::Stale(marker)) => stale.push((period, marker)),
                Err(error) => {
                    log::warn!("Freshness check failed for {}: {}", period, error);
                    summary.periods_failed += 1;
                }
            }
        }
        stale.sort_by_key(|(period, _)| *period);

        for (period, marker) in stale {
            match self.crawl_period(period).await {
                Ok(pages) => {
                    store.commit_period(period, &marker, &pages)?;
                    log::info!("Stored {} pages for {}", pages.len(), period);
                    summary.periods_committed += 1;
                    summary.pages_stored += pages.len();
                }
                Err(error) => {
                    log::warn!("Crawl of {} aborted, keeping previous state: {}", period, error);
                    summary.periods_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn check_freshness(&self, period: Period, cached: Option<&str>) -> Result<Freshness> {
        log::info!("Checking cache freshness for {}", period);
        let bytes = self.fetcher.fetch(&period.index_url(self.base_url)).await?;
        let html = String::from_utf8_lossy(&bytes);
        let marker = freshness_marker(&html)
            .ok_or_else(|| AppError::crawl(period.to_string(), "no freshness marker on index page"))?;

        if cached == Some(marker) {
            Ok(Freshness::Fresh)
        } else {
            Ok(Freshness::Stale(marker.to_string()))
        }
    }

    /// Every message page of the period, or the first failure.
    ///
    /// The first failed fetch drops the stream, which cancels the fetches
    /// still in flight.
    async fn crawl_period(&self, period: Period) -> Result<Vec<(String, Vec<u8>)>> {
        log::info!("Downloading messages for {}", period);
        let urls = IndexWalker::new(self.fetcher, self.base_url)
            .message_urls(period)
            .await?;
        log::debug!("{} message URLs for {}", urls.len(), period);

        stream::iter(urls)
            .map(|url| async move {
                let bytes = self.fetcher.fetch(&url).await?;
                Ok::<_, AppError>((url, bytes))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }
}

/// Crawl the configured periods selected by `range`.
pub async fn run_crawler(
    config: &Config,
    fetcher: &dyn Fetch,
    store: &mut RawStore,
    range: PeriodRange,
) -> Result<CrawlSummary> {
    let periods = range.periods(config.archive.first_period()?, Period::current());
    if periods.is_empty() {
        log::warn!("No periods selected");
    }

    let summary = CrawlOrchestrator::new(fetcher, config)
        .run(store, &periods)
        .await?;
    log::info!(
        "Crawl finished: {} checked, {} fresh, {} committed, {} failed",
        summary.periods_checked,
        summary.periods_fresh,
        summary.periods_committed,
        summary.periods_failed
    );
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::Period;
    use crate::services::testing::FakeArchive;

    pub const BASE: &str = "https://lists.example.org/ddc";

    pub fn marker(stamp: &str) -> String {
        format!("The last update was on {stamp}.")
    }

    /// Publish a single-page index for `period` listing `messages`, each
    /// served with the page produced by `page`.
    pub fn publish(
        archive: &FakeArchive,
        period: Period,
        stamp: &str,
        messages: &[&str],
        page: impl Fn(&str) -> String,
    ) -> Vec<String> {
        let index_url = period.index_url(BASE);
        let dir = index_url.trim_end_matches("maillist.html");

        let mut html = String::from("<html><body><ul>");
        let mut urls = Vec::new();
        for (i, id) in messages.iter().enumerate() {
            let href = format!("msg{i:05}.html");
            html.push_str(&format!("<li><a href=\"{href}\">Accepted {id}</a></li>"));
            let url = format!("{dir}{href}");
            archive.insert(url.clone(), page(id));
            urls.push(url);
        }
        html.push_str(&format!("</ul><p>{} GMT</p></body></html>", marker(stamp)));
        archive.insert(index_url, html);
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{BASE, marker, publish};
    use super::*;
    use crate::services::testing::FakeArchive;

    fn config() -> Config {
        let mut config = Config::default();
        config.archive.base_url = BASE.to_string();
        config.crawler.max_concurrent = 4;
        config
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn page(id: &str) -> String {
        format!("<html><!--X-Message-Id: {id} --></html>")
    }

    #[test]
    fn test_freshness_marker() {
        let html = "<p>The last update was on 06:12 GMT Tue Jun 02 2020. There are 312 messages.</p>";
        assert_eq!(
            freshness_marker(html),
            Some("The last update was on 06:12 GMT Tue Jun 02 2020.")
        );
        assert_eq!(freshness_marker("<p>No such list</p>"), None);
    }

    #[tokio::test]
    async fn test_stale_period_is_committed() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        publish(&archive, june, "Mon Jun 01 2020", &["a", "b", "c"], page);

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let summary = CrawlOrchestrator::new(&archive, &config)
            .run(&mut store, &[june])
            .await
            .unwrap();

        assert_eq!(summary.periods_committed, 1);
        assert_eq!(summary.pages_stored, 3);
        assert_eq!(store.raw_pages(june).unwrap().len(), 3);
        assert_eq!(
            store.freshness_marker(june).unwrap(),
            Some(marker("Mon Jun 01 2020"))
        );
    }

    #[tokio::test]
    async fn test_unchanged_remote_is_not_refetched() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        let july = period("2020-07");
        publish(&archive, june, "Jun 30", &["a", "b"], page);
        publish(&archive, july, "Jul 31", &["c"], page);

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let orchestrator = CrawlOrchestrator::new(&archive, &config);
        orchestrator.run(&mut store, &[june, july]).await.unwrap();
        let message_fetches = archive.fetches_matching("/msg");
        assert_eq!(message_fetches, 3);

        let summary = orchestrator.run(&mut store, &[june, july]).await.unwrap();
        assert_eq!(summary.periods_fresh, 2);
        assert_eq!(summary.periods_committed, 0);
        assert_eq!(archive.fetches_matching("/msg"), message_fetches);
    }

    #[tokio::test]
    async fn test_only_changed_period_is_recrawled() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        let july = period("2020-07");
        publish(&archive, june, "Jun 30", &["a", "b"], page);
        publish(&archive, july, "Jul 05", &["c"], page);

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let orchestrator = CrawlOrchestrator::new(&archive, &config);
        orchestrator.run(&mut store, &[june, july]).await.unwrap();

        publish(&archive, july, "Jul 31", &["c", "d"], page);
        let before = archive.fetches_matching("/2020/06/msg");
        let summary = orchestrator.run(&mut store, &[june, july]).await.unwrap();

        assert_eq!(summary.periods_fresh, 1);
        assert_eq!(summary.periods_committed, 1);
        assert_eq!(archive.fetches_matching("/2020/06/msg"), before);
        assert_eq!(store.raw_pages(july).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_period_untouched() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        publish(&archive, june, "Jun 10", &["a", "b"], page);

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let orchestrator = CrawlOrchestrator::new(&archive, &config);
        orchestrator.run(&mut store, &[june]).await.unwrap();
        let pages_before = store.raw_pages(june).unwrap();

        let urls = publish(&archive, june, "Jun 30", &["a", "b", "c", "d"], page);
        archive.fail(urls[2].clone());
        let summary = orchestrator.run(&mut store, &[june]).await.unwrap();

        assert_eq!(summary.periods_failed, 1);
        assert_eq!(summary.periods_committed, 0);
        assert_eq!(store.freshness_marker(june).unwrap(), Some(marker("Jun 10")));
        assert_eq!(store.raw_pages(june).unwrap(), pages_before);

        // Retried in full once the remote recovers.
        archive.heal(&urls[2]);
        let summary = orchestrator.run(&mut store, &[june]).await.unwrap();
        assert_eq!(summary.periods_committed, 1);
        assert_eq!(store.raw_pages(june).unwrap().len(), 4);
        assert_eq!(store.freshness_marker(june).unwrap(), Some(marker("Jun 30")));
    }

    #[tokio::test]
    async fn test_failed_check_skips_only_that_period() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        let july = period("2020-07");
        publish(&archive, june, "Jun 30", &["a"], page);
        archive.insert(july.index_url(BASE), "<html>maintenance</html>");

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let summary = CrawlOrchestrator::new(&archive, &config)
            .run(&mut store, &[june, july])
            .await
            .unwrap();

        assert_eq!(summary.periods_committed, 1);
        assert_eq!(summary.periods_failed, 1);
        assert_eq!(store.freshness_marker(july).unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_failure_cancels_remaining_fetches() {
        let archive = FakeArchive::new();
        let june = period("2020-06");
        let ids: Vec<String> = (0..40).map(|i| format!("m{i}@host")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let urls = publish(&archive, june, "Jun 30", &ids, page);
        archive.fail(urls[0].clone());

        let config = config();
        let mut store = RawStore::open_in_memory().unwrap();
        let summary = CrawlOrchestrator::new(&archive, &config)
            .run(&mut store, &[june])
            .await
            .unwrap();

        assert_eq!(summary.periods_failed, 1);
        let fetched = archive.fetches_matching("/msg");
        assert!(fetched >= 1);
        assert!(fetched < urls.len(), "{fetched} of {} pages fetched", urls.len());
        assert!(store.raw_pages(june).unwrap().is_empty());
        assert_eq!(store.freshness_marker(june).unwrap(), None);
    }
}
