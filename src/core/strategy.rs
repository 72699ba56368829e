//! Weighted-random search strategy selection.
//!
//! A [`StrategyTable`] is built once at startup from the configured weights
//! and validated before use: weights are percentage points and must total
//! exactly 100. [`StrategyTable::choose`] performs a roulette-wheel draw over
//! the table.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Total every strategy table must add up to
pub const WEIGHT_TOTAL: u32 = 100;

/// Errors raised while building a strategy table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Strategy weights must total 100, got {total}")]
    WeightSum { total: u32 },

    #[error("Strategy listed more than once: {0}")]
    Duplicate(Strategy),
}

/// Which records a strategy ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every qualifying record
    Global,

    /// Records of one account drawn uniformly at random
    Account,
}

/// How qualifying records are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// face_count DESC, like_count DESC
    Faces,

    /// like_count DESC, face_count DESC
    Likes,

    /// face_count * like_count DESC, face_count DESC
    Score,

    /// Uniformly random
    Random,
}

/// A named search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    FacesGlobal,
    LikesGlobal,
    ScoreGlobal,
    FacesAccount,
    LikesAccount,
    ScoreAccount,
    Random,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::FacesGlobal,
        Strategy::LikesGlobal,
        Strategy::ScoreGlobal,
        Strategy::FacesAccount,
        Strategy::LikesAccount,
        Strategy::ScoreAccount,
        Strategy::Random,
    ];

    pub fn scope(self) -> Scope {
        match self {
            Strategy::FacesGlobal
            | Strategy::LikesGlobal
            | Strategy::ScoreGlobal
            | Strategy::Random => Scope::Global,
            Strategy::FacesAccount | Strategy::LikesAccount | Strategy::ScoreAccount => {
                Scope::Account
            }
        }
    }

    pub fn ranking(self) -> Ranking {
        match self {
            Strategy::FacesGlobal | Strategy::FacesAccount => Ranking::Faces,
            Strategy::LikesGlobal | Strategy::LikesAccount => Ranking::Likes,
            Strategy::ScoreGlobal | Strategy::ScoreAccount => Ranking::Score,
            Strategy::Random => Ranking::Random,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::FacesGlobal => "faces_global",
            Strategy::LikesGlobal => "likes_global",
            Strategy::ScoreGlobal => "score_global",
            Strategy::FacesAccount => "faces_account",
            Strategy::LikesAccount => "likes_account",
            Strategy::ScoreAccount => "score_account",
            Strategy::Random => "random",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the strategy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyWeight {
    pub strategy: Strategy,
    pub weight: u32,
}

impl StrategyWeight {
    pub fn new(strategy: Strategy, weight: u32) -> Self {
        Self { strategy, weight }
    }
}

/// Default weights: account-scoped strategies get twice the share of global
/// ones so low-engagement accounts still get posted.
pub fn default_weights() -> Vec<StrategyWeight> {
    vec![
        StrategyWeight::new(Strategy::FacesGlobal, 10),
        StrategyWeight::new(Strategy::LikesGlobal, 10),
        StrategyWeight::new(Strategy::ScoreGlobal, 10),
        StrategyWeight::new(Strategy::FacesAccount, 20),
        StrategyWeight::new(Strategy::LikesAccount, 20),
        StrategyWeight::new(Strategy::ScoreAccount, 20),
        StrategyWeight::new(Strategy::Random, 10),
    ]
}

/// Validated, immutable strategy table
#[derive(Debug, Clone)]
pub struct StrategyTable {
    entries: Vec<StrategyWeight>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self {
            entries: default_weights(),
        }
    }
}

impl StrategyTable {
    /// Build a table, rejecting duplicates and weights that don't total 100
    pub fn new(entries: Vec<StrategyWeight>) -> Result<Self, StrategyError> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.strategy == entry.strategy) {
                return Err(StrategyError::Duplicate(entry.strategy));
            }
        }

        let total: u32 = entries.iter().map(|e| e.weight).sum();
        if total != WEIGHT_TOTAL {
            return Err(StrategyError::WeightSum { total });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[StrategyWeight] {
        &self.entries
    }

    /// Draw a strategy using the thread-local RNG
    pub fn choose(&self) -> Strategy {
        self.choose_with(&mut rand::rng())
    }

    /// Draw a strategy with the given RNG.
    ///
    /// The draw is uniform in `[0, 100)`; the first entry whose cumulative
    /// weight exceeds it wins, so each entry owns exactly `weight` outcomes.
    pub fn choose_with<R: Rng>(&self, rng: &mut R) -> Strategy {
        let draw = rng.random_range(0..WEIGHT_TOTAL);
        let mut cumulative = 0;
        for entry in &self.entries {
            cumulative += entry.weight;
            if cumulative > draw {
                return entry.strategy;
            }
        }
        // Unreachable for a validated table; the last entry owns the tail
        self.entries
            .last()
            .map(|e| e.strategy)
            .unwrap_or(Strategy::Random)
    }
}
