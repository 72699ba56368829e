//! Face module backed by an external detector binary.
//!
//! Subprocess protocol:
//! - `<bin> detect <image>` prints a JSON array of rects on stdout
//! - `<bin> compose <in> <out>` reads the rect JSON on stdin and writes the
//!   composed image to `<out>`
//!
//! Images are handed over through temporary files.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::FaceModule;
use crate::domain::{Image, Rect};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Face module using subprocess mode
pub struct CommandFaceModule {
    /// Path to the detector binary
    binary_path: String,

    call_timeout: Duration,
}

impl CommandFaceModule {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            call_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run the detector with the given args, optionally feeding stdin
    async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary_path)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn face detector '{}'", self.binary_path))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .await
                .context("Failed to write to face detector stdin")?;
            // Drop stdin to signal EOF
        }

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Face detector '{}' timed out after {:?}",
                    args.first().unwrap_or(&""),
                    self.call_timeout
                )
            })?
            .context("Failed to wait for face detector")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Face detector exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(output.stdout)
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Non UTF-8 temp path: {}", path.display()))
}

fn parse_rects(stdout: &[u8]) -> Result<Vec<Rect>> {
    serde_json::from_slice(stdout).context("Face detector returned invalid rect JSON")
}

#[async_trait]
impl FaceModule for CommandFaceModule {
    fn name(&self) -> &str {
        "command"
    }

    async fn detect(&self, image: &Image) -> Result<Vec<Rect>> {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let input = dir.path().join("input");
        tokio::fs::write(&input, image.as_bytes()).await?;

        let stdout = self.run(&["detect", path_arg(&input)?], None).await?;
        parse_rects(&stdout)
    }

    async fn compose(&self, image: &Image, faces: &[Rect]) -> Result<Image> {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let input = dir.path().join("input");
        let output = dir.path().join("output.jpeg");
        tokio::fs::write(&input, image.as_bytes()).await?;

        let rects = serde_json::to_vec(faces)?;
        self.run(
            &["compose", path_arg(&input)?, path_arg(&output)?],
            Some(&rects),
        )
        .await?;

        let bytes = tokio::fs::read(&output)
            .await
            .context("Face detector did not write a composed image")?;
        Ok(Image::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rects() {
        let rects =
            parse_rects(br#"[{"x":1,"y":2,"width":30,"height":40}]"#).unwrap();
        assert_eq!(
            rects,
            vec![Rect {
                x: 1,
                y: 2,
                width: 30,
                height: 40
            }]
        );
        assert!(parse_rects(b"[]").unwrap().is_empty());
        assert!(parse_rects(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let module = CommandFaceModule::new("/nonexistent/facefinder");
        let result = module.detect(&Image::new(vec![1, 2, 3])).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_timeout() {
        let module = CommandFaceModule::new("facefinder").with_timeout(Duration::from_secs(5));
        assert_eq!(module.call_timeout, Duration::from_secs(5));
        assert_eq!(module.name(), "command");
    }
}
