//! facebot - Face-swapping media reposter
//!
//! Crawls the accounts a remote account follows, catalogs their media by
//! face count, and periodically reposts a selected image with faces
//! composited in.
//!
//! # Architecture
//!
//! Three activities share one durable catalog:
//! - the crawler streams media from followed accounts
//! - ingestion counts faces and stores new media as available records
//! - the posting loop picks a record with a weighted-random strategy,
//!   composes and publishes it, then marks it used or rejected
//!
//! # Modules
//!
//! - `adapters`: External system integrations (remote API, face detector, images)
//! - `catalog`: SQLite-backed media catalog and search
//! - `core`: Strategy table, crawler, captions, orchestrator
//! - `domain`: Data structures (MediaItem, CatalogRecord, State)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! FACEBOT_USERNAME=me FACEBOT_PASSWORD=secret facebot run
//!
//! # Post once now
//! facebot post
//!
//! # Inspect the catalog
//! facebot stats --state used
//! ```

pub mod adapters;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use catalog::{CatalogError, CatalogStore};
pub use config::Settings;
pub use core::{Crawler, CrawlerConfig, Orchestrator, Strategy, StrategyTable};
pub use domain::{Account, CatalogRecord, MediaItem, State};
