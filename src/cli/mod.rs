//! Command-line interface for facebot.
//!
//! Provides commands for running the bot, posting on demand, and
//! inspecting or maintaining the catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::{CommandFaceModule, HttpImageIo, HttpRemote, HttpRemoteConfig};
use crate::catalog::{CatalogError, CatalogStore};
use crate::config::Settings;
use crate::core::{Captions, Collaborators, Orchestrator, PostOutcome};
use crate::domain::State;

/// facebot - Face-swapping media reposter
#[derive(Parser, Debug)]
#[command(name = "facebot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .facebot/config.yaml in this or a parent directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote account username
    #[arg(long, env = "FACEBOT_USERNAME", global = true)]
    pub username: Option<String>,

    /// Remote account password
    #[arg(long, env = "FACEBOT_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl, ingest and post until interrupted
    Run,

    /// Run one posting cycle now
    Post,

    /// Mark every record available again
    Reset,

    /// Import records from a legacy catalog database
    Import {
        /// Path to the legacy database
        path: PathBuf,
    },

    /// Show record counts grouped by face count
    Stats {
        /// Record state to count
        #[arg(short, long, value_enum, default_value = "available")]
        state: StateArg,
    },

    /// Draw strategies from the configured table
    Choose {
        /// Number of draws
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Record state for CLI (maps to State)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Available,
    Rejected,
    Used,
}

impl From<StateArg> for State {
    fn from(s: StateArg) -> Self {
        match s {
            StateArg::Available => State::Available,
            StateArg::Rejected => State::Rejected,
            StateArg::Used => State::Used,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;

        match self.command {
            Commands::Run => {
                let credentials = Credentials::require(self.username, self.password)?;
                run_bot(&settings, credentials).await
            }
            Commands::Post => {
                let credentials = Credentials::optional(self.username, self.password);
                post_once(&settings, credentials).await
            }
            Commands::Reset => reset_catalog(&settings),
            Commands::Import { path } => import_legacy(&settings, &path),
            Commands::Stats { state } => show_stats(&settings, state.into()),
            Commands::Choose { count } => choose_strategies(&settings, count),
            Commands::Config => show_config(&settings),
        }
    }
}

/// Remote account credentials
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn require(username: Option<String>, password: Option<String>) -> Result<Self> {
        Ok(Self {
            username: username.context("Missing --username (or FACEBOT_USERNAME)")?,
            password: password.context("Missing --password (or FACEBOT_PASSWORD)")?,
        })
    }

    fn optional(username: Option<String>, password: Option<String>) -> Self {
        Self {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        }
    }
}

fn open_store(settings: &Settings) -> Result<CatalogStore> {
    let store = CatalogStore::open(&settings.database)
        .with_context(|| format!("Failed to open catalog: {}", settings.database.display()))?;
    Ok(store.with_top_k(settings.top_k))
}

async fn build_orchestrator(settings: &Settings, credentials: Credentials) -> Result<Orchestrator> {
    let store = Arc::new(open_store(settings)?);

    let remote = HttpRemote::new(HttpRemoteConfig {
        base_url: settings.remote.base_url.clone(),
        username: credentials.username,
        password: credentials.password,
        timeout_secs: settings.remote.timeout.as_secs(),
    })
    .context("Failed to build remote client")?;

    let collaborators = Collaborators {
        remote: Arc::new(remote),
        faces: Arc::new(
            CommandFaceModule::new(settings.faces.command.clone())
                .with_timeout(settings.faces.timeout),
        ),
        images: Arc::new(HttpImageIo::new(settings.remote.timeout)?),
    };

    let captions = match settings.captions {
        Some(ref path) => Captions::load(path).await?,
        None => Captions::default(),
    };
    if captions.is_empty() {
        info!("No captions loaded, posts carry attribution only");
    } else {
        info!(count = captions.len(), "Loaded captions");
    }

    Ok(Orchestrator::new(
        store,
        collaborators,
        settings.strategies.clone(),
        settings.posting.clone(),
    )
    .with_captions(captions))
}

/// Run the bot until Ctrl-C
async fn run_bot(settings: &Settings, credentials: Credentials) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(settings, credentials).await?);
    let token = CancellationToken::new();

    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    eprintln!("[facebot running, catalog: {}]", settings.database.display());
    orchestrator.run(settings.crawler.clone(), token).await
}

/// Run one posting cycle
async fn post_once(settings: &Settings, credentials: Credentials) -> Result<()> {
    if settings.posting.upload && credentials.username.is_empty() {
        anyhow::bail!("Uploading is enabled: --username and --password are required");
    }
    let orchestrator = build_orchestrator(settings, credentials).await?;

    match orchestrator.post().await {
        Ok(PostOutcome::Used(record)) => {
            println!("{}", record);
            eprintln!(
                "\n[Posted {} -> {}]",
                record.id(),
                orchestrator.output_path(record.id()).display()
            );
            Ok(())
        }
        Ok(PostOutcome::Rejected { record, error }) => {
            eprintln!("\n[Rejected {}: {}]", record.id(), error);
            std::process::exit(1);
        }
        Err(e) => match e.downcast_ref::<CatalogError>() {
            Some(CatalogError::NoQualifyingRecord { .. }) => {
                eprintln!("[{}]", e);
                Ok(())
            }
            _ => Err(e),
        },
    }
}

fn reset_catalog(settings: &Settings) -> Result<()> {
    let store = open_store(settings)?;
    let count = store.reset_all()?;
    println!("Reset {} record(s) to available", count);
    Ok(())
}

fn import_legacy(settings: &Settings, path: &Path) -> Result<()> {
    let store = open_store(settings)?;
    let report = store
        .import_legacy(path)
        .with_context(|| format!("Failed to import legacy catalog: {}", path.display()))?;
    println!(
        "Imported {} record(s), skipped {} already cataloged",
        report.imported, report.skipped
    );
    Ok(())
}

fn show_stats(settings: &Settings, state: State) -> Result<()> {
    let store = open_store(settings)?;
    let stats = store.stats(state)?;

    if stats.is_empty() {
        println!("No {} records", state);
        return Ok(());
    }

    println!("{:<8} {:<10}", "FACES", "RECORDS");
    println!("{}", "-".repeat(19));
    for (faces, count) in &stats {
        println!("{:<8} {:<10}", faces, count);
    }
    println!("\nTotal: {}", stats.values().sum::<u64>());

    Ok(())
}

fn choose_strategies(settings: &Settings, count: usize) -> Result<()> {
    for _ in 0..count.max(1) {
        println!("{}", settings.strategies.choose());
    }
    Ok(())
}

/// Show resolved configuration
fn show_config(settings: &Settings) -> Result<()> {
    println!("facebot configuration");
    println!("{}", "=".repeat(40));

    match settings.config_file {
        Some(ref path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!();
    println!("Home:       {}", settings.home.display());
    println!("Database:   {}", settings.database.display());
    println!("Output:     {}", settings.posting.output_dir.display());
    match settings.captions {
        Some(ref path) => println!("Captions:   {}", path.display()),
        None => println!("Captions:   (none)"),
    }
    println!();
    println!("Remote:     {}", settings.remote.base_url);
    println!("Faces:      {} (timeout {:?})", settings.faces.command, settings.faces.timeout);
    println!();
    println!("Crawl:      every {:?} ± {:?}", settings.crawler.interval, settings.crawler.jitter);
    println!("Post:       every {:?}", settings.posting.interval);
    println!("Min faces:  {}", settings.posting.min_faces);
    println!("Top K:      {}", settings.top_k);
    println!("Upload:     {}", settings.posting.upload);
    println!(
        "Follow:     {} (max {})",
        settings.posting.follow.enabled, settings.posting.follow.max_follows
    );
    println!();
    println!("Strategies:");
    for entry in settings.strategies.entries() {
        println!("  {:<14} {:>3}", entry.strategy.name(), entry.weight);
    }

    Ok(())
}
