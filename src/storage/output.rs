//! `upload_history`: the table downstream reports read.

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::UploadRecord;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS upload_history (
        message_id TEXT PRIMARY KEY,
        date TEXT NOT NULL,
        source TEXT NOT NULL,
        version TEXT NOT NULL,
        changed_by TEXT,
        changed_by_name TEXT,
        changed_by_email TEXT,
        maintainer TEXT NOT NULL,
        maintainer_name TEXT NOT NULL,
        maintainer_email TEXT NOT NULL,
        nmu INTEGER NOT NULL,
        changes TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS upload_history_source ON upload_history (source);
    CREATE INDEX IF NOT EXISTS upload_history_date ON upload_history (date);
";

const COLUMNS: &str = "message_id, date, source, version, changed_by, changed_by_name, \
     changed_by_email, maintainer, maintainer_name, maintainer_email, nmu, changes";

pub struct OutputStore {
    conn: Connection,
}

impl OutputStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a period's records in one transaction. Ids already present
    /// are left alone; returns the number of rows added.
    pub fn insert_records(&mut self, records: &[UploadRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO upload_history ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for r in records {
                inserted += stmt.execute(params![
                    r.message_id,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.source,
                    r.version,
                    r.changed_by,
                    r.changed_by_name,
                    r.changed_by_email,
                    r.maintainer,
                    r.maintainer_name,
                    r.maintainer_email,
                    r.nmu,
                    r.changes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn get(&self, message_id: &str) -> Result<Option<UploadRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM upload_history WHERE message_id = ?1"),
                params![message_id],
                from_row,
            )
            .optional()?)
    }

    /// All records, oldest first.
    pub fn records(&self) -> Result<Vec<UploadRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM upload_history ORDER BY date, message_id"
        ))?;
        let records = stmt
            .query_map([], from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM upload_history", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<UploadRecord> {
    let date: String = row.get(1)?;
    let date = NaiveDateTime::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(UploadRecord {
        message_id: row.get(0)?,
        date,
        source: row.get(2)?,
        version: row.get(3)?,
        changed_by: row.get(4)?,
        changed_by_name: row.get(5)?,
        changed_by_email: row.get(6)?,
        maintainer: row.get(7)?,
        maintainer_name: row.get(8)?,
        maintainer_email: row.get(9)?,
        nmu: row.get(10)?,
        changes: row.get(11)?,
    })
}
