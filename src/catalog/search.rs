//! Strategy-driven record selection.
//!
//! Global strategies rank every available record above the face threshold.
//! Account strategies first draw one account uniformly among those with a
//! qualifying record, then rank inside that account. Ranked searches return
//! a uniform pick among the best `top_k` rows.

use rand::seq::IndexedRandom;
use rand::Rng;
use rusqlite::{params, Connection};

use crate::core::strategy::{Ranking, Scope, Strategy};
use crate::domain::{CatalogRecord, State};

use super::store::{record_from_row, CatalogError, CatalogStore, RECORD_COLUMNS};

fn order_clause(ranking: Ranking) -> &'static str {
    match ranking {
        Ranking::Faces => "face_count DESC, like_count DESC",
        Ranking::Likes => "like_count DESC, face_count DESC",
        Ranking::Score => "face_count * like_count DESC, face_count DESC",
        Ranking::Random => "RANDOM()",
    }
}

impl CatalogStore {
    /// Select one available record with at least `min_faces` faces
    pub fn search(&self, min_faces: u32, strategy: Strategy) -> Result<CatalogRecord, CatalogError> {
        self.search_with(min_faces, strategy, &mut rand::rng())
    }

    /// Same as [`CatalogStore::search`] with an explicit RNG for the
    /// account and top-k draws
    pub fn search_with<R: Rng>(
        &self,
        min_faces: u32,
        strategy: Strategy,
        rng: &mut R,
    ) -> Result<CatalogRecord, CatalogError> {
        let conn = self.lock()?;

        let account = match strategy.scope() {
            Scope::Global => None,
            Scope::Account => {
                let accounts = accounts_with_media(&conn, min_faces)?;
                let account = accounts
                    .choose(rng)
                    .cloned()
                    .ok_or(CatalogError::NoQualifyingRecord { min_faces })?;
                Some(account)
            }
        };

        let limit = match strategy.ranking() {
            Ranking::Random => 1,
            _ => self.top_k() as i64,
        };

        let candidates = ranked(&conn, min_faces, account.as_deref(), strategy.ranking(), limit)?;
        candidates
            .choose(rng)
            .cloned()
            .ok_or(CatalogError::NoQualifyingRecord { min_faces })
    }
}

/// Distinct accounts owning at least one qualifying record
fn accounts_with_media(conn: &Connection, min_faces: u32) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT account_id FROM media
         WHERE state = ?1 AND face_count >= ?2
         ORDER BY account_id",
    )?;
    let accounts = stmt
        .query_map(params![State::Available, min_faces], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(accounts)
}

fn ranked(
    conn: &Connection,
    min_faces: u32,
    account: Option<&str>,
    ranking: Ranking,
    limit: i64,
) -> rusqlite::Result<Vec<CatalogRecord>> {
    let order = order_clause(ranking);
    match account {
        Some(account_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM media
                 WHERE state = ?1 AND face_count >= ?2 AND account_id = ?3
                 ORDER BY {order} LIMIT ?4"
            ))?;
            let records = stmt
                .query_map(
                    params![State::Available, min_faces, account_id, limit],
                    record_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM media
                 WHERE state = ?1 AND face_count >= ?2
                 ORDER BY {order} LIMIT ?3"
            ))?;
            let records = stmt
                .query_map(params![State::Available, min_faces, limit], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaItem;
    use chrono::{DateTime, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn put(store: &CatalogStore, id: &str, account: &str, faces: u32, likes: i64) {
        store
            .put(&CatalogRecord::available(
                MediaItem {
                    id: id.to_string(),
                    url: format!("https://cdn.example.com/{id}.jpg"),
                    account_id: account.to_string(),
                    account_name: account.to_string(),
                    like_count: likes,
                    posted_at: DateTime::<Utc>::default(),
                },
                faces,
            ))
            .unwrap();
    }

    #[test]
    fn test_score_ranking_uses_product() {
        let store = CatalogStore::open_in_memory().unwrap();
        put(&store, "a", "u1", 2, 10); // 20
        put(&store, "b", "u1", 5, 5); // 25
        put(&store, "c", "u2", 9, 1); // 9

        let rec = store.search(0, Strategy::ScoreGlobal).unwrap();
        assert_eq!(rec.media.id, "b");
    }

    #[test]
    fn test_ties_broken_by_other_metric() {
        let store = CatalogStore::open_in_memory().unwrap();
        put(&store, "a", "u1", 3, 1);
        put(&store, "b", "u1", 3, 7);

        let rec = store.search(0, Strategy::FacesGlobal).unwrap();
        assert_eq!(rec.media.id, "b");
    }

    #[test]
    fn test_top_k_draws_from_best_rows_only() {
        let store = CatalogStore::open_in_memory().unwrap().with_top_k(2);
        put(&store, "best", "u1", 9, 0);
        put(&store, "second", "u1", 8, 0);
        put(&store, "worst", "u1", 1, 0);

        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let rec = store.search_with(0, Strategy::FacesGlobal, &mut rng).unwrap();
            seen.insert(rec.media.id);
        }
        assert!(seen.contains("best"));
        assert!(seen.contains("second"));
        assert!(!seen.contains("worst"));
    }

    #[test]
    fn test_account_scope_ignores_accounts_below_threshold() {
        let store = CatalogStore::open_in_memory().unwrap();
        put(&store, "a", "u1", 1, 100);
        put(&store, "b", "u2", 4, 1);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let rec = store.search_with(3, Strategy::LikesAccount, &mut rng).unwrap();
            assert_eq!(rec.media.id, "b");
        }
    }

    #[test]
    fn test_random_respects_threshold() {
        let store = CatalogStore::open_in_memory().unwrap();
        put(&store, "a", "u1", 0, 0);
        put(&store, "b", "u1", 2, 0);

        for _ in 0..50 {
            assert_eq!(store.search(1, Strategy::Random).unwrap().media.id, "b");
        }
    }
}
