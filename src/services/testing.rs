//! In-memory archive used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::services::Fetch;

/// A `Fetch` backed by a URL map that records every request.
#[derive(Default)]
pub struct FakeArchive {
    pages: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl AsRef<[u8]>) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.into(), body.as_ref().to_vec());
    }

    /// Make every fetch of `url` fail.
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.lock().unwrap().insert(url.into());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    pub fn fetch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests whose URL contains `needle`.
    pub fn fetches_matching(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

#[async_trait]
impl Fetch for FakeArchive {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        tokio::task::yield_now().await;

        if self.failing.lock().unwrap().contains(url) {
            return Err(AppError::crawl(url, "connection refused"));
        }
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::crawl(url, "not found"))
    }
}
