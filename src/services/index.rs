// src/services/index.rs

//! Date index walker.
//!
//! Follows "next page" links through a period's paginated `maillist.html`
//! index and harvests every message link along the way.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::Period;
use crate::services::Fetch;
use crate::utils::resolve_url;

const NEXT_PAGE_TEXT: &str = "next page";

/// Links found on one index page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub next_page: Option<String>,
    pub message_urls: Vec<String>,
}

impl IndexPage {
    /// Scan every anchor on the page.
    ///
    /// Link text is not stable across decades of archive software, so any
    /// href containing `msg` counts as a message. The HTML parser recovers
    /// from malformed markup on its own.
    pub fn parse(page_url: &Url, html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut page = IndexPage::default();

        for anchor in document.select(anchor_selector()) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let text: String = anchor.text().collect();

            if text == NEXT_PAGE_TEXT {
                page.next_page = Some(resolve_url(page_url, href));
            } else if href.contains("msg") {
                page.message_urls.push(resolve_url(page_url, href));
            }
        }
        page
    }
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
    &SELECTOR
}

/// Walks a period's paginated index.
pub struct IndexWalker<'a> {
    fetcher: &'a dyn Fetch,
    base_url: &'a str,
}

impl<'a> IndexWalker<'a> {
    pub fn new(fetcher: &'a dyn Fetch, base_url: &'a str) -> Self {
        Self { fetcher, base_url }
    }

    /// Every distinct message URL reachable from the period's index, in
    /// page order.
    pub async fn message_urls(&self, period: Period) -> Result<Vec<String>> {
        let mut next = Some(period.index_url(self.base_url));
        let mut visited = HashSet::new();
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        while let Some(index_url) = next.take() {
            if !visited.insert(index_url.clone()) {
                log::warn!("Index page {} links back to itself, stopping", index_url);
                break;
            }
            log::info!("...getting messages from {}", index_url);

            let base = Url::parse(&index_url)?;
            let bytes = self.fetcher.fetch(&index_url).await?;
            let page = IndexPage::parse(&base, &String::from_utf8_lossy(&bytes));

            for url in page.message_urls {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
            next = page.next_page;
        }
        Ok(urls)
    }
}
