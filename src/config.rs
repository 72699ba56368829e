//! Configuration for facebot.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FACEBOT_HOME, FACEBOT_DATABASE)
//! 2. Config file (`--config <path>` or .facebot/config.yaml)
//! 3. Defaults (~/.facebot)
//!
//! Config file discovery:
//! - Searches current directory and parents for .facebot/config.yaml
//! - `home` is relative to the .facebot/ directory, other paths are relative
//!   to the project root (the parent of .facebot/)
//!
//! The result is an immutable [`Settings`] value handed to each component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{CrawlerConfig, FollowSettings, PostSettings, StrategyTable, StrategyWeight};

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".facebot";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub version: Option<String>,
    pub paths: PathsConfig,
    pub remote: RemoteConfig,
    pub faces: FacesConfig,
    pub crawler: CrawlerSection,
    pub posting: PostingSection,
    pub follow: FollowSection,

    /// Strategy weights, must total 100
    pub strategies: Option<Vec<StrategyWeight>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Engine state directory (relative to .facebot/)
    pub home: Option<String>,
    /// Catalog database file
    pub database: Option<String>,
    /// Composed image output directory
    pub output: Option<String>,
    /// Caption file, one caption per line
    pub captions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FacesConfig {
    pub command: String,
    pub timeout_seconds: u64,
}

impl Default for FacesConfig {
    fn default() -> Self {
        Self {
            command: "facefinder".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerSection {
    pub interval_seconds: u64,
    pub jitter_seconds: u64,
    pub account_ttl_seconds: u64,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            interval_seconds: 600,
            jitter_seconds: 120,
            account_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostingSection {
    pub interval_seconds: u64,
    pub min_faces: u32,
    pub upload: bool,
    /// Size of the ranked pool a record is drawn from
    pub top_k: usize,
    pub ingest_pause_seconds: u64,
}

impl Default for PostingSection {
    fn default() -> Self {
        Self {
            interval_seconds: 30 * 60,
            min_faces: 1,
            upload: false,
            top_k: 5,
            ingest_pause_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FollowSection {
    pub enabled: bool,
    pub max_follows: usize,
    pub min_delay_seconds: u64,
    pub max_delay_seconds: u64,
}

impl Default for FollowSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_follows: 10,
            min_delay_seconds: 20,
            max_delay_seconds: 90,
        }
    }
}

/// Remote API settings
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub timeout: Duration,
}

/// Face detector settings
#[derive(Debug, Clone)]
pub struct FaceSettings {
    pub command: String,
    pub timeout: Duration,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Settings {
    /// Engine state directory
    pub home: PathBuf,
    /// Catalog database file
    pub database: PathBuf,
    /// Caption file, if any
    pub captions: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,

    pub remote: RemoteSettings,
    pub faces: FaceSettings,
    pub crawler: CrawlerConfig,
    pub posting: PostSettings,
    pub top_k: usize,
    pub strategies: StrategyTable,
}

impl Settings {
    /// Load settings from an explicit config path, or discover one
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_file = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => find_config_file(),
        };

        let parsed = match config_file {
            Some(ref path) => Some((path.as_path(), load_config_file(path)?)),
            None => None,
        };

        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR);

        resolve(parsed, default_home, |key| std::env::var(key).ok())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge config file, environment and defaults
fn resolve<F>(file: Option<(&Path, ConfigFile)>, default_home: PathBuf, env: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let (config_file, config, config_dir, base_dir) = match file {
        Some((path, config)) => {
            // .facebot/
            let config_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            // project root
            let base_dir = config_dir.parent().unwrap_or(Path::new(".")).to_path_buf();
            (Some(path.to_path_buf()), config, Some(config_dir), Some(base_dir))
        }
        None => (None, ConfigFile::default(), None, None),
    };

    let relative = |dir: &Option<PathBuf>, value: &str| match dir {
        Some(dir) => resolve_path(dir, value),
        None => PathBuf::from(value),
    };

    let home = if let Some(env_home) = env("FACEBOT_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = config.paths.home {
        relative(&config_dir, home_path)
    } else {
        default_home
    };

    let database = if let Some(env_db) = env("FACEBOT_DATABASE") {
        PathBuf::from(env_db)
    } else if let Some(ref db_path) = config.paths.database {
        relative(&base_dir, db_path)
    } else {
        home.join("catalog.db")
    };

    let output_dir = match config.paths.output {
        Some(ref output) => relative(&base_dir, output),
        None => home.join("output"),
    };

    let captions = config
        .paths
        .captions
        .as_ref()
        .map(|captions| relative(&base_dir, captions));

    let strategies = match config.strategies {
        Some(weights) => StrategyTable::new(weights).context("Invalid strategy table")?,
        None => StrategyTable::default(),
    };

    let posting = PostSettings {
        min_faces: config.posting.min_faces.max(1),
        output_dir,
        upload: config.posting.upload,
        interval: Duration::from_secs(config.posting.interval_seconds),
        ingest_pause: Duration::from_secs(config.posting.ingest_pause_seconds),
        follow: FollowSettings {
            enabled: config.follow.enabled,
            max_follows: config.follow.max_follows,
            min_delay: Duration::from_secs(config.follow.min_delay_seconds),
            max_delay: Duration::from_secs(config.follow.max_delay_seconds),
        },
    };

    Ok(Settings {
        home,
        database,
        captions,
        config_file,
        remote: RemoteSettings {
            base_url: config.remote.base_url,
            timeout: Duration::from_secs(config.remote.timeout_seconds),
        },
        faces: FaceSettings {
            command: config.faces.command,
            timeout: Duration::from_secs(config.faces.timeout_seconds),
        },
        crawler: CrawlerConfig {
            interval: Duration::from_secs(config.crawler.interval_seconds),
            jitter: Duration::from_secs(config.crawler.jitter_seconds),
            account_ttl: Duration::from_secs(config.crawler.account_ttl_seconds),
        },
        posting,
        top_k: config.posting.top_k.max(1),
        strategies,
    })
}
