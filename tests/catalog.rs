//! Catalog Integration Tests
//!
//! Storage fidelity, state transitions and strategy-driven search.

mod common;

use chrono::{TimeZone, Utc};
use common::{media, record, store_with};
use facebot::catalog::{CatalogError, CatalogStore};
use facebot::core::Strategy;
use facebot::domain::{CatalogRecord, State};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn abc_store() -> CatalogStore {
    store_with(&[
        record("A", "U1", 5, 10),
        record("B", "U1", 8, 2),
        record("C", "U2", 3, 20),
    ])
}

#[test]
fn test_put_then_get_returns_same_record() {
    let store = CatalogStore::open_in_memory().unwrap();
    let original = record("m1", "U1", 4, 42);

    assert!(!store.has("m1").unwrap());
    store.put(&original).unwrap();
    assert!(store.has("m1").unwrap());

    let loaded = store.get("m1").unwrap();
    assert_eq!(loaded, original);
    assert_eq!(loaded.state, State::Available);
}

#[test]
fn test_millisecond_timestamp_round_trips() {
    let store = CatalogStore::open_in_memory().unwrap();
    let mut item = media("x", "U1", 9);
    item.posted_at = Utc.timestamp_millis_opt(1_714_564_800_123).unwrap();
    let original = CatalogRecord::available(item, 2);

    store.put(&original).unwrap();
    assert_eq!(store.get("x").unwrap(), original);
    assert_eq!(original.media.posted_at.timestamp_subsec_nanos(), 0);
}

#[test]
fn test_set_state_missing_id_leaves_store_unchanged() {
    let store = abc_store();

    let err = store.set_state("missing", State::Used).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(ref id) if id == "missing"));

    for id in ["A", "B", "C"] {
        assert_eq!(store.get(id).unwrap().state, State::Available);
    }
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_reset_all_makes_everything_available() {
    let store = abc_store();
    store.set_state("A", State::Used).unwrap();
    store.set_state("C", State::Rejected).unwrap();

    assert_eq!(store.reset_all().unwrap(), 3);
    for id in ["A", "B", "C"] {
        assert_eq!(store.get(id).unwrap().state, State::Available);
    }
}

#[test]
fn test_search_respects_threshold() {
    let store = abc_store();

    for strategy in Strategy::ALL {
        for _ in 0..10 {
            let found = store.search(5, strategy).unwrap();
            assert!(found.face_count >= 5, "{} returned {}", strategy, found);
        }
    }

    let err = store.search(9, Strategy::FacesGlobal).unwrap_err();
    assert!(matches!(err, CatalogError::NoQualifyingRecord { min_faces: 9 }));
}

#[test]
fn test_global_rankings_pick_expected_record() {
    let store = abc_store();

    assert_eq!(store.search(0, Strategy::FacesGlobal).unwrap().id(), "B");
    assert_eq!(store.search(0, Strategy::LikesGlobal).unwrap().id(), "C");
}

#[test]
fn test_account_ranking_stays_within_drawn_account() {
    let store = abc_store();
    let mut seen_u1 = false;
    let mut seen_u2 = false;

    for seed in 0..64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let found = store
            .search_with(0, Strategy::FacesAccount, &mut rng)
            .unwrap();
        match found.media.account_id.as_str() {
            "U1" => {
                assert_eq!(found.id(), "B");
                seen_u1 = true;
            }
            "U2" => {
                assert_eq!(found.id(), "C");
                seen_u2 = true;
            }
            other => panic!("unexpected account {}", other),
        }
    }

    assert!(seen_u1 && seen_u2);
}

#[test]
fn test_used_and_rejected_records_are_not_searched() {
    let store = abc_store();
    store.set_state("B", State::Used).unwrap();
    store.set_state("C", State::Rejected).unwrap();

    for strategy in Strategy::ALL {
        assert_eq!(store.search(0, strategy).unwrap().id(), "A");
    }

    store.set_state("A", State::Used).unwrap();
    assert!(matches!(
        store.search(0, Strategy::Random),
        Err(CatalogError::NoQualifyingRecord { .. })
    ));
}

#[test]
fn test_stats_group_by_face_count() {
    let store = store_with(&[
        record("a", "U1", 2, 1),
        record("b", "U1", 2, 1),
        record("c", "U2", 5, 1),
    ]);
    store.set_state("c", State::Used).unwrap();

    let available = store.stats(State::Available).unwrap();
    assert_eq!(available.get(&2), Some(&2));
    assert_eq!(available.get(&5), None);

    let used = store.stats(State::Used).unwrap();
    assert_eq!(used.get(&5), Some(&1));
}

#[test]
fn test_file_backed_store_persists() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state").join("catalog.db");

    {
        let store = CatalogStore::open(&path).unwrap();
        store.put(&record("m1", "U1", 3, 7)).unwrap();
        store.set_state("m1", State::Used).unwrap();
    }

    let reopened = CatalogStore::open(&path).unwrap();
    let loaded = reopened.get("m1").unwrap();
    assert_eq!(loaded.face_count, 3);
    assert_eq!(loaded.state, State::Used);
}
