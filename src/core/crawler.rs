//! Background media crawler.
//!
//! The crawler walks a shuffled list of followed accounts, one account per
//! cycle, and streams every media item it finds to a single consumer. The
//! list is re-fetched and reshuffled once every account has had a turn, or
//! when it is older than the configured TTL.
//!
//! ```text
//! Idle → FetchAccounts? → EmitMedia → Sleep(interval ± jitter) → ...
//!   any state ──stop()──> Stopped (stream closed)
//! ```
//!
//! The output channel holds a single item, so a slow consumer throttles the
//! crawl directly. That one buffered item is still delivered after
//! [`Crawler::stop`]; nothing is sent once the stop is observed. Cycle errors
//! are logged and the next cycle runs as usual.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{RemoteClient, RemoteError, RemoteSession};
use crate::domain::{Account, MediaItem};

/// Errors that end a single crawl cycle
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("No followed accounts found")]
    NoAccounts,
}

/// Crawler timing
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Base pause between cycles
    pub interval: Duration,

    /// Maximum deviation applied to each pause, in both directions
    pub jitter: Duration,

    /// Maximum age of the cached account list
    pub account_ttl: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            jitter: Duration::from_secs(120),
            account_ttl: Duration::from_secs(3600),
        }
    }
}

impl CrawlerConfig {
    /// Pick the next pause: `interval ± jitter`, never negative
    pub fn next_pause<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as i64;
        if jitter_ms == 0 {
            return self.interval;
        }
        let offset = rng.random_range(-jitter_ms..=jitter_ms);
        let pause_ms = (self.interval.as_millis() as i64 + offset).max(0);
        Duration::from_millis(pause_ms as u64)
    }
}

/// Handle to a running crawler
pub struct Crawler {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Crawler {
    /// Start crawling in a background task.
    ///
    /// Returns the handle and the media stream. The stream ends once the
    /// crawler stops, either through [`Crawler::stop`] or by cancellation of
    /// `parent`. Stopping the crawler never cancels `parent`.
    pub fn spawn(
        remote: Arc<dyn RemoteClient>,
        config: CrawlerConfig,
        parent: &CancellationToken,
    ) -> (Self, mpsc::Receiver<MediaItem>) {
        let token = parent.child_token();
        let (tx, rx) = mpsc::channel(1);
        let crawl = CrawlLoop {
            remote,
            config,
            tx,
            token: token.clone(),
            rotation: Rotation::default(),
        };
        let task = tokio::spawn(crawl.run());
        (Self { token, task }, rx)
    }

    /// Stop crawling. Safe to call more than once.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the crawl task to exit
    pub async fn join(self) -> Result<()> {
        self.task.await?;
        Ok(())
    }
}

/// Shuffled account list with a cursor
#[derive(Debug, Default)]
struct Rotation {
    accounts: Vec<Account>,
    index: usize,
    fetched_at: Option<Instant>,
}

impl Rotation {
    fn needs_refresh(&self, ttl: Duration) -> bool {
        match self.fetched_at {
            None => true,
            Some(at) => self.index >= self.accounts.len() || at.elapsed() > ttl,
        }
    }

    fn refresh(&mut self, mut accounts: Vec<Account>) {
        accounts.shuffle(&mut rand::rng());
        self.accounts = accounts;
        self.index = 0;
        self.fetched_at = Some(Instant::now());
    }

    fn next(&mut self) -> Option<Account> {
        let account = self.accounts.get(self.index).cloned();
        if account.is_some() {
            self.index += 1;
        }
        account
    }
}

enum Cycle {
    Emitted(usize),
    Stopped,
}

struct CrawlLoop {
    remote: Arc<dyn RemoteClient>,
    config: CrawlerConfig,
    tx: mpsc::Sender<MediaItem>,
    token: CancellationToken,
    rotation: Rotation,
}

impl CrawlLoop {
    async fn run(mut self) {
        info!("Crawler started");

        loop {
            if self.token.is_cancelled() {
                break;
            }

            match self.crawl_once().await {
                Ok(Cycle::Stopped) => break,
                Ok(Cycle::Emitted(count)) => debug!(count, "Crawl cycle complete"),
                Err(e) => warn!(error = %e, "Crawl cycle failed"),
            }

            let pause = self.config.next_pause(&mut rand::rng());
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Crawler stopped");
        // Dropping self.tx closes the stream
    }

    async fn crawl_once(&mut self) -> Result<Cycle, CrawlError> {
        let session = self.remote.login().await?;
        let result = self.crawl_session(session.as_ref()).await;
        if let Err(e) = session.logout().await {
            debug!(error = %e, "Logout failed");
        }
        result
    }

    async fn crawl_session(&mut self, session: &dyn RemoteSession) -> Result<Cycle, CrawlError> {
        if self.rotation.needs_refresh(self.config.account_ttl) {
            if self.token.is_cancelled() {
                return Ok(Cycle::Stopped);
            }
            let accounts = session.list_followed_accounts().await?;
            if accounts.is_empty() {
                return Err(CrawlError::NoAccounts);
            }
            info!(count = accounts.len(), "Refreshed followed accounts");
            self.rotation.refresh(accounts);
        }

        let account = self.rotation.next().ok_or(CrawlError::NoAccounts)?;
        if self.token.is_cancelled() {
            return Ok(Cycle::Stopped);
        }

        let media = session.list_recent_media(&account).await?;
        debug!(account = %account, count = media.len(), "Fetched recent media");

        let mut emitted = 0;
        for item in media {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(Cycle::Stopped),
                sent = self.tx.send(item) => {
                    if sent.is_err() {
                        // Consumer hung up
                        return Ok(Cycle::Stopped);
                    }
                    emitted += 1;
                }
            }
        }
        Ok(Cycle::Emitted(emitted))
    }
}
