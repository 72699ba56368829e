//! Strategy Table Integration Tests
//!
//! Weight validation and draw frequencies.

use std::collections::HashMap;

use facebot::core::{Strategy, StrategyError, StrategyTable, StrategyWeight};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn table(weights: &[(Strategy, u32)]) -> Result<StrategyTable, StrategyError> {
    StrategyTable::new(
        weights
            .iter()
            .map(|&(strategy, weight)| StrategyWeight::new(strategy, weight))
            .collect(),
    )
}

#[test]
fn test_draw_frequencies_match_weights() {
    let table = table(&[
        (Strategy::FacesGlobal, 10),
        (Strategy::LikesGlobal, 40),
        (Strategy::ScoreGlobal, 50),
    ])
    .unwrap();

    let draws = 20_000;
    let mut rng = StdRng::seed_from_u64(0xface);
    let mut counts: HashMap<Strategy, usize> = HashMap::new();
    for _ in 0..draws {
        *counts.entry(table.choose_with(&mut rng)).or_default() += 1;
    }

    for (strategy, expected) in [
        (Strategy::FacesGlobal, 0.10),
        (Strategy::LikesGlobal, 0.40),
        (Strategy::ScoreGlobal, 0.50),
    ] {
        let observed = counts.get(&strategy).copied().unwrap_or(0) as f64 / draws as f64;
        assert!(
            (observed - expected).abs() <= 0.02,
            "{}: observed {:.3}, expected {:.2}",
            strategy,
            observed,
            expected
        );
    }
}

#[test]
fn test_thread_rng_draws_only_listed_strategies() {
    let table = table(&[(Strategy::Random, 70), (Strategy::ScoreAccount, 30)]).unwrap();
    for _ in 0..1_000 {
        let drawn = table.choose();
        assert!(drawn == Strategy::Random || drawn == Strategy::ScoreAccount);
    }
}

#[test]
fn test_weights_must_total_100() {
    assert_eq!(
        table(&[(Strategy::FacesGlobal, 50), (Strategy::LikesGlobal, 40)]).unwrap_err(),
        StrategyError::WeightSum { total: 90 }
    );
    assert_eq!(
        table(&[(Strategy::FacesGlobal, 60), (Strategy::LikesGlobal, 50)]).unwrap_err(),
        StrategyError::WeightSum { total: 110 }
    );
}

#[test]
fn test_default_table_is_valid() {
    let default = StrategyTable::default();
    assert!(StrategyTable::new(default.entries().to_vec()).is_ok());
}
