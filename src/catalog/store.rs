//! SQLite-backed catalog of discovered media.
//!
//! One row per record. `media_id` is expected to be unique but the schema
//! does not enforce it: callers check [`CatalogStore::has`] before
//! [`CatalogStore::put`], with the face detection call in between.
//!
//! Every operation holds a single store-wide lock for its whole duration.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::domain::{CatalogRecord, MediaItem, State};

/// Errors that can occur with the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("No available media with at least {min_faces} face(s)")]
    NoQualifyingRecord { min_faces: u32 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog lock poisoned")]
    LockPoisoned,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS media (
        media_id      TEXT,
        media_url     TEXT,
        account_id    TEXT,
        account_name  TEXT,
        like_count    INTEGER,
        face_count    INTEGER,
        posted_at     INTEGER,
        state         INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_media_id ON media (media_id);
    CREATE INDEX IF NOT EXISTS idx_media_state_faces ON media (state, face_count);
";

/// Column list shared by every query that maps rows to records
pub(super) const RECORD_COLUMNS: &str =
    "media_id, media_url, account_id, account_name, like_count, face_count, posted_at, state";

/// Durable media catalog
pub struct CatalogStore {
    conn: Mutex<Connection>,

    /// Number of top-ranked rows a ranked search draws from
    top_k: usize,
}

impl CatalogStore {
    /// Open or create a catalog database at the given path
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory catalog (for testing)
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            top_k: 1,
        })
    }

    /// Rank searches pick uniformly among the best `top_k` rows (minimum 1)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::LockPoisoned)
    }

    /// Insert a new record. The caller must have checked `has` first.
    pub fn put(&self, record: &CatalogRecord) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        insert_record(&conn, record)?;
        Ok(())
    }

    /// Check whether a record with this id exists
    pub fn has(&self, id: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        Ok(contains(&conn, id)?)
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<CatalogRecord, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM media WHERE media_id = ?1 LIMIT 1"),
            params![id],
            record_from_row,
        )
        .optional()?
        .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Overwrite the state of one record. Any state may replace any other.
    pub fn set_state(&self, id: &str, state: State) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE media SET state = ?1 WHERE media_id = ?2",
            params![state, id],
        )?;
        if affected == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Number of records per face count, for records in `state`
    pub fn stats(&self, state: State) -> Result<BTreeMap<u32, u64>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT face_count, COUNT(1) FROM media WHERE state = ?1 GROUP BY face_count",
        )?;
        let rows = stmt.query_map(params![state], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (faces, count) = row?;
            stats.insert(faces, count.max(0) as u64);
        }
        Ok(stats)
    }

    /// Put every record back to available. Returns the number of rows touched.
    pub fn reset_all(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;
        let affected = conn.execute("UPDATE media SET state = ?1", params![State::Available])?;
        Ok(affected)
    }

    /// Total number of records
    pub fn count(&self) -> Result<u64, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM media", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

pub(super) fn insert_record(conn: &Connection, record: &CatalogRecord) -> rusqlite::Result<()> {
    let media = &record.media;
    conn.execute(
        &format!("INSERT INTO media ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            media.id,
            media.url,
            media.account_id,
            media.account_name,
            media.like_count,
            record.face_count,
            media.posted_at.timestamp(),
            record.state,
        ],
    )?;
    Ok(())
}

pub(super) fn contains(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM media WHERE media_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Map a row selected with [`RECORD_COLUMNS`] to a record
pub(super) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    let posted_at: i64 = row.get(6)?;
    Ok(CatalogRecord {
        media: MediaItem {
            id: row.get(0)?,
            url: row.get(1)?,
            account_id: row.get(2)?,
            account_name: row.get(3)?,
            like_count: row.get(4)?,
            posted_at: DateTime::from_timestamp(posted_at, 0).unwrap_or_default(),
        },
        face_count: row.get(5)?,
        state: row.get(7)?,
    })
}
