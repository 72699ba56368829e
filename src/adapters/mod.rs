//! Adapter interfaces for external systems.
//!
//! The bot talks to three collaborators:
//! - a remote account API ([`RemoteClient`] / [`RemoteSession`])
//! - a face module that detects and composes faces ([`FaceModule`])
//! - image fetch / write ([`ImageIo`])
//!
//! Each trait has one shipped implementation; tests plug in stubs.

pub mod faces;
pub mod http;
pub mod images;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Account, Image, MediaItem, Rect};

pub use faces::CommandFaceModule;
pub use http::{HttpRemote, HttpRemoteConfig};
pub use images::HttpImageIo;

/// Errors from the remote account API
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The call went through but the remote reported a non-ok status
    #[error("Invalid response status: {0}")]
    InvalidStatus(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entry point to the remote account API
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Establish a fresh session
    async fn login(&self) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An authenticated remote session
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Accounts followed by the logged-in user
    async fn list_followed_accounts(&self) -> Result<Vec<Account>, RemoteError>;

    /// Most recent media posted by an account
    async fn list_recent_media(&self, account: &Account) -> Result<Vec<MediaItem>, RemoteError>;

    /// Followers of an account
    async fn list_followers(&self, account: &Account) -> Result<Vec<Account>, RemoteError>;

    /// Follow an account
    async fn follow(&self, account_id: &str) -> Result<(), RemoteError>;

    /// Publish an image file with a caption
    async fn publish(&self, image_path: &Path, caption: &str) -> Result<(), RemoteError>;

    /// End the session
    async fn logout(&self) -> Result<(), RemoteError>;
}

/// Face detection and composition
#[async_trait]
pub trait FaceModule: Send + Sync {
    /// Human-readable module name
    fn name(&self) -> &str;

    /// Locate faces in an image
    async fn detect(&self, image: &Image) -> Result<Vec<Rect>>;

    /// Produce a new image with the given faces replaced
    async fn compose(&self, image: &Image, faces: &[Rect]) -> Result<Image>;
}

/// Image fetch and persistence
#[async_trait]
pub trait ImageIo: Send + Sync {
    /// Download an image by URL
    async fn fetch(&self, url: &str) -> Result<Image>;

    /// Write an image to disk, creating parent directories
    async fn write(&self, path: &Path, image: &Image) -> Result<()>;
}
