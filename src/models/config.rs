//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::Period;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Location and extent of the mailing-list archive
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Database and triage file locations
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file if it exists; `None` when there is no file.
    ///
    /// An unreadable or malformed file is an error, never a silent
    /// fallback to defaults.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        url::Url::parse(&self.archive.base_url)
            .map_err(|e| AppError::validation(format!("archive.base_url: {e}")))?;
        self.archive.first_period()?;
        if self.storage.cache_db == self.storage.output_db {
            return Err(AppError::validation(
                "storage.cache_db and storage.output_db must differ",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Pause before the single retry after a dropped connection
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Archive location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// List root; period indexes live at `{base_url}/YYYY/MM/maillist.html`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Earliest archived period
    #[serde(default = "defaults::first_year")]
    pub first_year: i32,

    #[serde(default = "defaults::first_month")]
    pub first_month: u32,
}

impl ArchiveConfig {
    pub fn first_period(&self) -> Result<Period> {
        Period::new(self.first_year, self.first_month)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            first_year: defaults::first_year(),
            first_month: defaults::first_month(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Raw page and message body cache
    #[serde(default = "defaults::cache_db")]
    pub cache_db: PathBuf,

    /// Structured upload history
    #[serde(default = "defaults::output_db")]
    pub output_db: PathBuf,

    /// JSON-lines file receiving unparseable messages; log only when unset
    #[serde(default)]
    pub triage_log: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_db: defaults::cache_db(),
            output_db: defaults::output_db(),
            triage_log: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; ddc-history/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn retry_delay() -> u64 {
        1000
    }

    // Archive defaults
    pub fn base_url() -> String {
        "https://lists.debian.org/debian-devel-changes".into()
    }
    pub fn first_year() -> i32 {
        1997
    }
    pub fn first_month() -> u32 {
        8
    }

    // Storage defaults
    pub fn cache_db() -> PathBuf {
        PathBuf::from("ddc-cache.sqlite")
    }
    pub fn output_db() -> PathBuf {
        PathBuf::from("ddc-history.sqlite")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
