//! Core bot logic.
//!
//! This module contains:
//! - Strategy: weighted random choice of a selection strategy
//! - Crawler: background walk over followed accounts
//! - Captions: caption rotation and attribution
//! - Orchestrator: ingestion and posting loops

pub mod captions;
pub mod crawler;
pub mod orchestrator;
pub mod strategy;

// Re-export commonly used types
pub use captions::{attribution, Captions};
pub use crawler::{CrawlError, Crawler, CrawlerConfig};
pub use orchestrator::{
    Collaborators, FollowSettings, IngestOutcome, Orchestrator, PostOutcome, PostSettings,
};
pub use strategy::{
    default_weights, Ranking, Scope, Strategy, StrategyError, StrategyTable, StrategyWeight,
};
