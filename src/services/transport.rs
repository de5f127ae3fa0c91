// src/services/transport.rs

//! Connection-reusing HTTP transport.
//!
//! One `Transport` is constructed at startup and shared by every fetch in
//! the run. A dropped connection is retried exactly once after a short
//! pause; any other failure, or a second failure, goes back to the caller.
//! A 5xx response counts as a failure. Other statuses return the body.

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

/// Anything that can fetch the raw bytes behind a URL.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP transport with single-retry-on-disconnect semantics.
pub struct Transport {
    client: Client,
    retry_delay: Duration,
}

impl Transport {
    /// Build the transport and its long-lived client.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Release pooled connections.
    pub fn close(self) {
        drop(self.client);
        log::debug!("HTTP transport closed");
    }

    async fn fetch_once(&self, url: &str) -> reqwest::Result<(StatusCode, Vec<u8>)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        Ok((status, response.bytes().await?.to_vec()))
    }
}

#[async_trait]
impl Fetch for Transport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let (status, bytes) = match self.fetch_once(url).await {
            Ok(fetched) => fetched,
            Err(error) if is_disconnect(&error) => {
                log::debug!("Connection dropped fetching {}: {}; retrying once", url, error);
                tokio::time::sleep(self.retry_delay).await;
                self.fetch_once(url).await?
            }
            Err(error) => return Err(error.into()),
        };

        // A server error page must not be cached in place of the message.
        if status.is_server_error() {
            return Err(AppError::crawl(url, format!("HTTP {status}")));
        }
        if !status.is_success() {
            log::warn!("{} returned HTTP {}", url, status);
        }
        Ok(bytes)
    }
}

/// Whether the failure, or anything in its source chain, is the server
/// dropping the connection.
fn is_disconnect(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if err.to_string().contains("connection closed") {
            return true;
        }
        current = err.source();
    }
    false
}
