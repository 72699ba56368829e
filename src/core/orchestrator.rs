//! Main orchestrator for ingestion and posting.
//!
//! Two long-running activities share the catalog:
//! - ingestion drains the crawler stream, counts faces and stores new media
//! - the posting cycle selects a record, composes and publishes it, then
//!   marks it used or rejected
//!
//! Failures inside either loop are logged and the loop carries on.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{FaceModule, ImageIo, RemoteClient, RemoteSession};
use crate::catalog::{CatalogError, CatalogStore};
use crate::domain::{Account, CatalogRecord, MediaItem, State};

use super::captions::Captions;
use super::crawler::{Crawler, CrawlerConfig};
use super::strategy::{Strategy, StrategyTable};

/// Hard cap on follows after one post
pub const MAX_FOLLOWS: usize = 10;

/// Follow-back side effect settings
#[derive(Debug, Clone)]
pub struct FollowSettings {
    pub enabled: bool,

    /// Upper bound on follows per post (1..=10)
    pub max_follows: usize,

    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FollowSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_follows: MAX_FOLLOWS,
            min_delay: Duration::from_secs(20),
            max_delay: Duration::from_secs(90),
        }
    }
}

impl FollowSettings {
    fn delay<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let ms = rng.random_range(self.min_delay.as_millis()..=self.max_delay.as_millis());
        Duration::from_millis(ms as u64)
    }
}

/// Posting settings
#[derive(Debug, Clone)]
pub struct PostSettings {
    /// Minimum faces a record needs to be posted (at least 1)
    pub min_faces: u32,

    /// Where composed images are written
    pub output_dir: PathBuf,

    /// Publish composed images to the remote account
    pub upload: bool,

    /// Pause between posting cycles
    pub interval: Duration,

    /// Pause after each ingested item
    pub ingest_pause: Duration,

    pub follow: FollowSettings,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            min_faces: 1,
            output_dir: PathBuf::from("output"),
            upload: false,
            interval: Duration::from_secs(30 * 60),
            ingest_pause: Duration::from_secs(10),
            follow: FollowSettings::default(),
        }
    }
}

/// External collaborators used by the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub remote: Arc<dyn RemoteClient>,
    pub faces: Arc<dyn FaceModule>,
    pub images: Arc<dyn ImageIo>,
}

/// Result of ingesting one crawled item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already cataloged
    Skipped,

    /// Stored as a new available record
    Stored { faces: u32 },
}

/// Result of one posting attempt on a selected record
#[derive(Debug, Clone)]
pub enum PostOutcome {
    /// Composed (and published if enabled); record marked used
    Used(CatalogRecord),

    /// Something failed; record marked rejected
    Rejected { record: CatalogRecord, error: String },
}

impl PostOutcome {
    pub fn record(&self) -> &CatalogRecord {
        match self {
            PostOutcome::Used(record) | PostOutcome::Rejected { record, .. } => record,
        }
    }
}

/// Drives ingestion and posting
pub struct Orchestrator {
    store: Arc<CatalogStore>,
    collaborators: Collaborators,
    strategies: StrategyTable,
    captions: Mutex<Captions>,
    settings: PostSettings,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        store: Arc<CatalogStore>,
        collaborators: Collaborators,
        strategies: StrategyTable,
        mut settings: PostSettings,
    ) -> Self {
        settings.min_faces = settings.min_faces.max(1);
        settings.follow.max_follows = settings.follow.max_follows.clamp(1, MAX_FOLLOWS);
        Self {
            store,
            collaborators,
            strategies,
            captions: Mutex::new(Captions::default()),
            settings,
        }
    }

    /// Use this caption rotation for published posts
    pub fn with_captions(mut self, captions: Captions) -> Self {
        self.captions = Mutex::new(captions);
        self
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn settings(&self) -> &PostSettings {
        &self.settings
    }

    /// Run crawler, ingestion and posting until `token` is cancelled
    pub async fn run(self: Arc<Self>, crawler_config: CrawlerConfig, token: CancellationToken) -> Result<()> {
        let (crawler, media) = Crawler::spawn(
            self.collaborators.remote.clone(),
            crawler_config,
            &token,
        );

        let ingest = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.ingest(media).await })
        };

        self.run_posting(token).await;

        crawler.stop();
        crawler.join().await?;
        ingest.await?;
        info!("Orchestrator stopped");
        Ok(())
    }

    /// Drain the crawler stream until it closes
    pub async fn ingest(&self, mut media: mpsc::Receiver<MediaItem>) {
        while let Some(item) = media.recv().await {
            match self.ingest_one(&item).await {
                Ok(IngestOutcome::Skipped) => debug!(media_id = %item.id, "Already cataloged"),
                Ok(IngestOutcome::Stored { .. }) => {}
                Err(e) => warn!(media_id = %item.id, error = %format!("{:#}", e), "Ingest failed"),
            }
            if !self.settings.ingest_pause.is_zero() {
                tokio::time::sleep(self.settings.ingest_pause).await;
            }
        }
        info!("Media stream closed, ingestion finished");
    }

    /// Catalog one crawled item unless it is already known
    #[instrument(skip(self, item), fields(media_id = %item.id))]
    pub async fn ingest_one(&self, item: &MediaItem) -> Result<IngestOutcome> {
        if self.store.has(&item.id)? {
            return Ok(IngestOutcome::Skipped);
        }

        let image = self.collaborators.images.fetch(&item.url).await?;
        debug!(
            bytes = image.len(),
            module = self.collaborators.faces.name(),
            "Detecting faces"
        );
        let faces = self.collaborators.faces.detect(&image).await?;

        let record = CatalogRecord::available(item.clone(), faces.len() as u32);
        self.store.put(&record)?;
        info!(faces = record.face_count, "Cataloged {}", item);

        Ok(IngestOutcome::Stored {
            faces: record.face_count,
        })
    }

    /// Post on a fixed cadence until `token` is cancelled
    pub async fn run_posting(&self, token: CancellationToken) {
        info!(interval = ?self.settings.interval, "Posting loop started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }

            match self.post().await {
                Ok(PostOutcome::Used(record)) => info!(media_id = record.id(), "Posted"),
                Ok(PostOutcome::Rejected { record, error }) => {
                    warn!(media_id = record.id(), %error, "Post rejected")
                }
                Err(e) => match e.downcast_ref::<CatalogError>() {
                    Some(CatalogError::NoQualifyingRecord { .. }) => {
                        info!("{}; skipping this cycle", e)
                    }
                    _ => warn!(error = %format!("{:#}", e), "Posting cycle failed"),
                },
            }
        }
        info!("Posting loop stopped");
    }

    /// One posting cycle with a randomly chosen strategy
    pub async fn post(&self) -> Result<PostOutcome> {
        let strategy = self.strategies.choose();
        self.post_with(strategy).await
    }

    /// One posting cycle with a fixed strategy
    #[instrument(skip(self))]
    pub async fn post_with(&self, strategy: Strategy) -> Result<PostOutcome> {
        let record = self.store.search(self.settings.min_faces, strategy)?;
        info!("Posting {}", record);

        match self.publish_record(&record).await {
            Ok(()) => {
                self.store.set_state(record.id(), State::Used)?;
                if self.settings.upload && self.settings.follow.enabled {
                    self.follow_followers(&record).await;
                }
                Ok(PostOutcome::Used(record))
            }
            Err(e) => {
                self.store.set_state(record.id(), State::Rejected)?;
                Ok(PostOutcome::Rejected {
                    record,
                    error: format!("{:#}", e),
                })
            }
        }
    }

    /// Output path for a composed record image
    pub fn output_path(&self, media_id: &str) -> PathBuf {
        let file_stem: String = media_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.settings.output_dir.join(format!("{}.jpeg", file_stem))
    }

    async fn publish_record(&self, record: &CatalogRecord) -> Result<()> {
        let image = self.collaborators.images.fetch(&record.media.url).await?;
        let faces = self.collaborators.faces.detect(&image).await?;
        let composed = self.collaborators.faces.compose(&image, &faces).await?;

        let path = self.output_path(record.id());
        self.collaborators.images.write(&path, &composed).await?;
        info!(path = %path.display(), "Wrote composed image");

        if !self.settings.upload {
            return Ok(());
        }

        let caption = self.next_caption(&record.media.account_name)?;
        let session = self.collaborators.remote.login().await?;
        let published = session.publish(&path, &caption).await;
        if let Err(e) = session.logout().await {
            debug!(error = %e, "Logout failed");
        }
        published?;
        info!("Published {}", record.id());
        Ok(())
    }

    fn next_caption(&self, account_name: &str) -> Result<String> {
        let mut captions = self
            .captions
            .lock()
            .map_err(|_| anyhow!("Caption lock poisoned"))?;
        Ok(captions.compose(account_name))
    }

    async fn follow_followers(&self, record: &CatalogRecord) {
        match self.try_follow(record).await {
            Ok(count) => info!(count, "Followed followers of @{}", record.media.account_name),
            Err(e) => warn!(error = %format!("{:#}", e), "Follow step failed"),
        }
    }

    async fn try_follow(&self, record: &CatalogRecord) -> Result<usize> {
        let account = Account::new(
            record.media.account_id.clone(),
            record.media.account_name.clone(),
        );
        let session = self.collaborators.remote.login().await?;
        let result = match session.list_followers(&account).await {
            Ok(followers) => Ok(self.follow_subset(session.as_ref(), followers).await),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = session.logout().await {
            debug!(error = %e, "Logout failed");
        }
        result
    }

    async fn follow_subset(&self, session: &dyn RemoteSession, followers: Vec<Account>) -> usize {
        let targets = pick_follow_targets(followers, self.settings.follow.max_follows, &mut rand::rng());

        let mut followed = 0;
        for (i, target) in targets.iter().enumerate() {
            if i > 0 {
                let delay = self.settings.follow.delay(&mut rand::rng());
                tokio::time::sleep(delay).await;
            }
            match session.follow(&target.id).await {
                Ok(()) => {
                    debug!(account = %target, "Followed");
                    followed += 1;
                }
                Err(e) => warn!(account = %target, error = %e, "Follow failed"),
            }
        }
        followed
    }
}

/// Random subset of `followers` with size uniform in `1..=min(max, len)`
pub fn pick_follow_targets<R: Rng>(mut followers: Vec<Account>, max: usize, rng: &mut R) -> Vec<Account> {
    if followers.is_empty() || max == 0 {
        return Vec::new();
    }
    let upper = max.min(followers.len());
    let count = rng.random_range(1..=upper);
    followers.shuffle(rng);
    followers.truncate(count);
    followers
}
