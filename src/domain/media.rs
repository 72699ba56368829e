//! Media, account and catalog record types.
//!
//! Accounts and media items come from the remote API and are never mutated.
//! A [`CatalogRecord`] is the persisted unit: a media item plus its face
//! count and lifecycle [`State`].

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};

/// A remote account the bot follows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque remote identifier
    pub id: String,

    /// Handle used for attribution
    pub display_name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.display_name)
    }
}

/// A media item discovered by the crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Opaque remote identifier (catalog key)
    pub id: String,

    /// URL of the largest available rendition
    pub url: String,

    /// Owning account id
    pub account_id: String,

    /// Owning account handle
    pub account_name: String,

    /// Like count at discovery time
    pub like_count: i64,

    /// When the media was posted, in whole seconds
    #[serde(deserialize_with = "deserialize_whole_seconds")]
    pub posted_at: DateTime<Utc>,
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Media: [{} likes] @{} {}",
            self.like_count, self.account_name, self.url
        )
    }
}

/// Drop sub-second precision; the catalog keeps whole seconds
pub fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

fn deserialize_whole_seconds<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(whole_seconds)
}

/// Processing state of a catalog record.
///
/// Stored as an integer: 0 = available, 1 = rejected, 2 = used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Eligible for selection
    Available,

    /// Composition or publishing failed
    Rejected,

    /// Successfully posted
    Used,
}

impl State {
    pub fn as_i64(self) -> i64 {
        match self {
            State::Available => 0,
            State::Rejected => 1,
            State::Used => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(State::Available),
            1 => Some(State::Rejected),
            2 => Some(State::Used),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Available => "available",
            State::Rejected => "rejected",
            State::Used => "used",
        };
        f.write_str(s)
    }
}

impl ToSql for State {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for State {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        State::from_i64(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub media: MediaItem,

    /// Faces detected at ingestion time
    pub face_count: u32,

    pub state: State,
}

impl CatalogRecord {
    /// Create a fresh record; new records always start out available
    pub fn available(mut media: MediaItem, face_count: u32) -> Self {
        media.posted_at = whole_seconds(media.posted_at);
        Self {
            media,
            face_count,
            state: State::Available,
        }
    }

    pub fn id(&self) -> &str {
        &self.media.id
    }
}

impl fmt::Display for CatalogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record: [{} face(s)] [{} like(s)] @{} {}",
            self.face_count, self.media.like_count, self.media.account_name, self.media.url
        )
    }
}

/// Face bounding box reported by the face module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Encoded image bytes.
///
/// Pixel decoding is left to the face module.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image").field("len", &self.bytes.len()).finish()
    }
}

impl From<Vec<u8>> for Image {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
