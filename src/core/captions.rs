//! Caption rotation for published posts.
//!
//! Captions are shuffled once when loaded and then handed out round-robin.
//! Every caption ends with an attribution line for the source account.

use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;

/// Round-robin caption source
#[derive(Debug, Clone, Default)]
pub struct Captions {
    lines: Vec<String>,
    index: usize,
}

impl Captions {
    /// Use captions in the given order
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines, index: 0 }
    }

    /// Shuffle captions once up front
    pub fn shuffled(mut lines: Vec<String>) -> Self {
        lines.shuffle(&mut rand::rng());
        Self::new(lines)
    }

    /// Load one caption per non-empty line
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read captions file: {}", path.display()))?;
        let lines = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Ok(Self::shuffled(lines))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Next caption, wrapping to the start when exhausted
    pub fn next_caption(&mut self) -> Option<&str> {
        if self.lines.is_empty() {
            return None;
        }
        if self.index >= self.lines.len() {
            self.index = 0;
        }
        let caption = &self.lines[self.index];
        self.index += 1;
        Some(caption)
    }

    /// Full post text: next caption plus attribution
    pub fn compose(&mut self, account_name: &str) -> String {
        let credit = attribution(account_name);
        match self.next_caption() {
            Some(caption) => format!("{}\n\n{}", caption, credit),
            None => credit,
        }
    }
}

/// Attribution line crediting the source account
pub fn attribution(account_name: &str) -> String {
    format!("photocred goes to: @{}", account_name)
}
