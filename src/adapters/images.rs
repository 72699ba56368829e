//! Image download and on-disk output.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::ImageIo;
use crate::domain::Image;

/// Fetches images over HTTP and writes them with tokio::fs
pub struct HttpImageIo {
    client: reqwest::Client,
}

impl HttpImageIo {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageIo for HttpImageIo {
    async fn fetch(&self, url: &str) -> Result<Image> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch image: {}", url))?
            .error_for_status()
            .with_context(|| format!("Image request failed: {}", url))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read image body: {}", url))?;

        let image = Image::new(bytes.to_vec());
        if image.is_empty() {
            anyhow::bail!("Empty image body: {}", url);
        }
        Ok(image)
    }

    async fn write(&self, path: &Path, image: &Image) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, image.as_bytes())
            .await
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output").join("m1.jpeg");
        let io = HttpImageIo::new(Duration::from_secs(5)).unwrap();

        io.write(&path, &Image::new(vec![0xff, 0xd8, 0xff]))
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![0xff, 0xd8, 0xff]);
    }
}
