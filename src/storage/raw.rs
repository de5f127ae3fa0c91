//! Raw archive cache.
//!
//! ## Tables
//!
//! ```text
//! freshness        (period PK, marker)
//! raw_pages        (url PK, period, gzip_contents)
//! message_records  (message_id PK, period, gzip_body)
//! ```
//!
//! Periods are stored as `YYYY-MM` text so range scans sort correctly.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{MessageRecord, Period, RawPage};
use crate::utils::gzip;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS freshness (
        period TEXT PRIMARY KEY,
        marker TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS raw_pages (
        url TEXT PRIMARY KEY,
        period TEXT NOT NULL,
        gzip_contents BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS raw_pages_period ON raw_pages (period);

    CREATE TABLE IF NOT EXISTS message_records (
        message_id TEXT PRIMARY KEY,
        period TEXT NOT NULL,
        gzip_body BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS message_records_period ON message_records (period);
";

/// Row counts, for `info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStoreStats {
    pub periods: usize,
    pub raw_pages: usize,
    pub message_records: usize,
}

/// SQLite cache of freshness markers, raw pages and message bodies.
pub struct RawStore {
    conn: Connection,
}

impl RawStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Every stored freshness marker.
    pub fn freshness_markers(&self) -> Result<HashMap<Period, String>> {
        let mut stmt = self.conn.prepare("SELECT period, marker FROM freshness")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut markers = HashMap::new();
        for row in rows {
            let (period, marker) = row?;
            match period.parse::<Period>() {
                Ok(period) => {
                    markers.insert(period, marker);
                }
                Err(e) => log::warn!("Ignoring freshness row {:?}: {}", period, e),
            }
        }
        Ok(markers)
    }

    pub fn freshness_marker(&self, period: Period) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT marker FROM freshness WHERE period = ?1",
                params![period.key()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Replace the period's pages and marker in one transaction.
    ///
    /// Rows previously stored for the period are deleted first so a
    /// re-crawl never accumulates stale pages.
    pub fn commit_period(
        &mut self,
        period: Period,
        marker: &str,
        pages: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let key = period.key();
        let compressed = pages
            .iter()
            .map(|(url, bytes)| Ok((url.as_str(), gzip::compress(bytes)?)))
            .collect::<Result<Vec<_>>>()?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM raw_pages WHERE period = ?1", params![key])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO raw_pages (url, period, gzip_contents) VALUES (?1, ?2, ?3)",
            )?;
            for (url, blob) in &compressed {
                stmt.execute(params![url, key, blob])?;
            }
        }
        tx.execute(
            "INSERT INTO freshness (period, marker) VALUES (?1, ?2)
             ON CONFLICT(period) DO UPDATE SET marker = excluded.marker",
            params![key, marker],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Decompressed pages cached for the period, ordered by URL.
    pub fn raw_pages(&self, period: Period) -> Result<Vec<RawPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, gzip_contents FROM raw_pages WHERE period = ?1 ORDER BY url",
        )?;
        let rows = stmt.query_map(params![period.key()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut pages = Vec::new();
        for row in rows {
            let (url, blob) = row?;
            pages.push(RawPage {
                url,
                period,
                contents: gzip::decompress(&blob)?,
            });
        }
        Ok(pages)
    }

    pub fn has_message_records(&self, period: Period) -> Result<bool> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM message_records WHERE period = ?1 LIMIT 1",
                params![period.key()],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    /// Insert message records in one transaction, ignoring ids already
    /// stored. Returns the number of new rows.
    pub fn insert_message_records(&mut self, records: &[MessageRecord]) -> Result<usize> {
        let compressed = records
            .iter()
            .map(|r| Ok((r, gzip::compress(r.body.as_bytes())?)))
            .collect::<Result<Vec<_>>>()?;

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO message_records (message_id, period, gzip_body) VALUES (?1, ?2, ?3)",
            )?;
            for (record, blob) in &compressed {
                inserted += stmt.execute(params![record.message_id, record.period.key(), blob])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn message_records(&self, period: Period) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT message_id, gzip_body FROM message_records WHERE period = ?1 ORDER BY message_id",
        )?;
        let rows = stmt.query_map(params![period.key()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (message_id, blob) = row?;
            let body = String::from_utf8_lossy(&gzip::decompress(&blob)?).into_owned();
            records.push(MessageRecord {
                message_id,
                period,
                body,
            });
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<RawStoreStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(RawStoreStats {
            periods: count("freshness")?,
            raw_pages: count("raw_pages")?,
            message_records: count("message_records")?,
        })
    }
}
