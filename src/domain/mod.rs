//! Domain types for facebot.
//!
//! - Account / MediaItem: what the crawler discovers
//! - CatalogRecord / State: what the catalog persists
//! - Rect / Image: what flows through the face module

pub mod media;

// Re-export commonly used types
pub use media::{whole_seconds, Account, CatalogRecord, Image, MediaItem, Rect, State};
