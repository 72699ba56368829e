//! Durable media catalog.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.facebot/
//! ├── catalog.db      # SQLite catalog (table `media`)
//! └── output/
//!     └── <media_id>.jpeg
//! ```
//!
//! Records are never deleted. State only moves through
//! [`CatalogStore::set_state`] and [`CatalogStore::reset_all`].

pub mod import;
pub mod search;
pub mod store;

pub use import::ImportReport;
pub use store::{CatalogError, CatalogStore};
