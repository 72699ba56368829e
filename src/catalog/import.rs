//! Import from the legacy single-table media database.
//!
//! The legacy table had untyped columns
//! `(user_id, user_name, media_id, media_url, face_count)` and no state:
//! everything in it had already been posted, so imported rows are marked
//! used. Rows whose id is already cataloged are skipped.

use std::path::Path;

use chrono::DateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};

use crate::domain::{CatalogRecord, MediaItem, State};

use super::store::{contains, insert_record, CatalogError, CatalogStore};

/// Outcome of a legacy import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// A row of the legacy `media` table
struct LegacyMedia {
    user_id: String,
    user_name: String,
    media_id: String,
    media_url: String,
    face_count: u32,
}

impl LegacyMedia {
    fn into_record(self) -> CatalogRecord {
        CatalogRecord {
            media: MediaItem {
                id: self.media_id,
                url: self.media_url,
                account_id: self.user_id,
                account_name: self.user_name,
                like_count: 0,
                posted_at: DateTime::default(),
            },
            face_count: self.face_count,
            state: State::Used,
        }
    }
}

/// Legacy ids were sometimes stored as integers
fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
    }
}

fn read_legacy(path: &Path) -> Result<Vec<LegacyMedia>, CatalogError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt =
        conn.prepare("SELECT user_id, user_name, media_id, media_url, face_count FROM media")?;
    let rows = stmt
        .query_map([], |row| {
            let face_count: i64 = row.get(4)?;
            Ok(LegacyMedia {
                user_id: value_to_string(row.get(0)?),
                user_name: value_to_string(row.get(1)?),
                media_id: value_to_string(row.get(2)?),
                media_url: value_to_string(row.get(3)?),
                face_count: face_count.clamp(0, u32::MAX as i64) as u32,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl CatalogStore {
    /// Copy every row of a legacy database into this catalog
    pub fn import_legacy(&self, path: &Path) -> Result<ImportReport, CatalogError> {
        let legacy = read_legacy(path)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut report = ImportReport::default();
        for media in legacy {
            if contains(&tx, &media.media_id)? {
                report.skipped += 1;
                continue;
            }
            insert_record(&tx, &media.into_record())?;
            report.imported += 1;
        }
        tx.commit()?;

        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            "Imported legacy media from {}",
            path.display()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn legacy_db(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("legacy.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE media (user_id, user_name, media_id, media_url, face_count);
             INSERT INTO media VALUES (42, 'alice', 'm1', 'https://cdn.example.com/m1.jpg', 3);
             INSERT INTO media VALUES ('u2', 'bob', 'm2', 'https://cdn.example.com/m2.jpg', 1);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_import_marks_rows_used() {
        let temp = TempDir::new().unwrap();
        let path = legacy_db(&temp);
        let store = CatalogStore::open_in_memory().unwrap();

        let report = store.import_legacy(&path).unwrap();
        assert_eq!(report, ImportReport { imported: 2, skipped: 0 });

        let rec = store.get("m1").unwrap();
        assert_eq!(rec.state, State::Used);
        assert_eq!(rec.media.account_id, "42");
        assert_eq!(rec.media.like_count, 0);
        assert_eq!(rec.face_count, 3);
    }

    #[test]
    fn test_import_twice_skips_existing() {
        let temp = TempDir::new().unwrap();
        let path = legacy_db(&temp);
        let store = CatalogStore::open_in_memory().unwrap();

        store.import_legacy(&path).unwrap();
        let report = store.import_legacy(&path).unwrap();
        assert_eq!(report, ImportReport { imported: 0, skipped: 2 });
        assert_eq!(store.count().unwrap(), 2);
    }
}
