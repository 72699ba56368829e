//! Shared stubs for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use facebot::adapters::{FaceModule, ImageIo, RemoteClient, RemoteError, RemoteSession};
use facebot::catalog::CatalogStore;
use facebot::domain::{Account, CatalogRecord, Image, MediaItem, Rect};

pub fn media(id: &str, account_id: &str, likes: i64) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        url: format!("https://cdn.example.com/{}.jpg", id),
        account_id: account_id.to_string(),
        account_name: format!("user_{}", account_id),
        like_count: likes,
        posted_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

pub fn record(id: &str, account_id: &str, faces: u32, likes: i64) -> CatalogRecord {
    CatalogRecord::available(media(id, account_id, likes), faces)
}

pub fn store_with(records: &[CatalogRecord]) -> CatalogStore {
    let store = CatalogStore::open_in_memory().unwrap();
    for record in records {
        store.put(record).unwrap();
    }
    store
}

/// Shared state behind the stub remote and its sessions
#[derive(Default)]
pub struct RemoteState {
    pub accounts: Mutex<Vec<Account>>,
    pub media: Mutex<HashMap<String, Vec<MediaItem>>>,
    pub followers: Mutex<Vec<Account>>,

    /// Number of upcoming logins that fail
    pub failing_logins: AtomicUsize,
    pub fail_publish: Mutex<bool>,

    /// Bumped on every account list fetch
    pub generation: AtomicUsize,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub published: Mutex<Vec<(PathBuf, String)>>,
    pub followed: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct StubRemote {
    pub state: Arc<RemoteState>,
}

impl StubRemote {
    pub fn with_accounts(accounts: Vec<(Account, Vec<MediaItem>)>) -> Self {
        let remote = Self::default();
        {
            let mut list = remote.state.accounts.lock().unwrap();
            let mut media = remote.state.media.lock().unwrap();
            for (account, items) in accounts {
                media.insert(account.id.clone(), items);
                list.push(account);
            }
        }
        remote
    }

    pub fn generation(&self) -> usize {
        self.state.generation.load(Ordering::SeqCst)
    }
}

/// Item ids are tagged `g<generation>:<id>` so tests can tell list
/// generations apart.
pub fn split_generation(id: &str) -> (usize, &str) {
    let (tag, rest) = id.split_once(':').unwrap();
    (tag.trim_start_matches('g').parse().unwrap(), rest)
}

#[async_trait]
impl RemoteClient for StubRemote {
    async fn login(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        self.state.logins.fetch_add(1, Ordering::SeqCst);
        let failing = self.state.failing_logins.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_logins.store(failing - 1, Ordering::SeqCst);
            return Err(RemoteError::InvalidStatus("login refused".into()));
        }
        Ok(Box::new(StubSession {
            state: self.state.clone(),
        }))
    }
}

struct StubSession {
    state: Arc<RemoteState>,
}

#[async_trait]
impl RemoteSession for StubSession {
    async fn list_followed_accounts(&self) -> Result<Vec<Account>, RemoteError> {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.accounts.lock().unwrap().clone())
    }

    async fn list_recent_media(&self, account: &Account) -> Result<Vec<MediaItem>, RemoteError> {
        let generation = self.state.generation.load(Ordering::SeqCst);
        let items = self
            .state
            .media
            .lock()
            .unwrap()
            .get(&account.id)
            .cloned()
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|mut item| {
                item.id = format!("g{}:{}", generation, item.id);
                item
            })
            .collect())
    }

    async fn list_followers(&self, _account: &Account) -> Result<Vec<Account>, RemoteError> {
        Ok(self.state.followers.lock().unwrap().clone())
    }

    async fn follow(&self, account_id: &str) -> Result<(), RemoteError> {
        self.state.followed.lock().unwrap().push(account_id.to_string());
        Ok(())
    }

    async fn publish(&self, image_path: &Path, caption: &str) -> Result<(), RemoteError> {
        if *self.state.fail_publish.lock().unwrap() {
            return Err(RemoteError::InvalidStatus("upload rejected".into()));
        }
        self.state
            .published
            .lock()
            .unwrap()
            .push((image_path.to_path_buf(), caption.to_string()));
        Ok(())
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.state.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Face module reporting a fixed number of faces
pub struct StubFaces {
    pub faces: usize,
    pub fail_compose: bool,
    pub detect_calls: AtomicUsize,
}

impl StubFaces {
    pub fn new(faces: usize) -> Self {
        Self {
            faces,
            fail_compose: false,
            detect_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_compose(faces: usize) -> Self {
        Self {
            fail_compose: true,
            ..Self::new(faces)
        }
    }
}

#[async_trait]
impl FaceModule for StubFaces {
    fn name(&self) -> &str {
        "stub"
    }

    async fn detect(&self, _image: &Image) -> Result<Vec<Rect>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.faces as u32)
            .map(|i| Rect {
                x: i * 10,
                y: 0,
                width: 10,
                height: 10,
            })
            .collect())
    }

    async fn compose(&self, image: &Image, _faces: &[Rect]) -> Result<Image> {
        if self.fail_compose {
            anyhow::bail!("compose failed");
        }
        let mut bytes = image.as_bytes().to_vec();
        bytes.reverse();
        Ok(Image::new(bytes))
    }
}

/// In-memory image source and sink
#[derive(Default)]
pub struct StubImages {
    pub fetched: Mutex<Vec<String>>,
    pub written: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ImageIo for StubImages {
    async fn fetch(&self, url: &str) -> Result<Image> {
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(Image::new(url.as_bytes().to_vec()))
    }

    async fn write(&self, path: &Path, _image: &Image) -> Result<()> {
        self.written.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
