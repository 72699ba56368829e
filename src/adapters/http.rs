//! JSON-over-HTTP remote account client.
//!
//! Every response is wrapped in an envelope whose `status` must be `"ok"`;
//! anything else maps to [`RemoteError::InvalidStatus`] even when the HTTP
//! exchange itself succeeded.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{RemoteClient, RemoteError, RemoteSession};
use crate::domain::{Account, MediaItem};

/// Response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<Option<T>, RemoteError> {
        if self.status != "ok" {
            let detail = match self.message {
                Some(message) => format!("{} ({})", self.status, message),
                None => self.status,
            };
            return Err(RemoteError::InvalidStatus(detail));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    token: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Configuration for the HTTP remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoteConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Remote account API client
pub struct HttpRemote {
    config: HttpRemoteConfig,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(config: HttpRemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }
}

/// Build API URL
fn api_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>, RemoteError> {
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
    envelope.into_result()
}

#[async_trait]
impl RemoteClient for HttpRemote {
    async fn login(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let response = self
            .client
            .post(api_url(&self.config.base_url, "login"))
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;

        let login: LoginResult = decode(response)
            .await?
            .ok_or_else(|| RemoteError::Decode("login response without token".to_string()))?;

        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            base_url: self.config.base_url.clone(),
            token: login.token,
        }))
    }
}

/// A logged-in HTTP session
struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpSession {
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(api_url(&self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(response)
            .await?
            .ok_or_else(|| RemoteError::Decode(format!("empty response from {}", path)))
    }

    async fn post_empty(&self, path: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(api_url(&self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode::<serde_json::Value>(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for HttpSession {
    async fn list_followed_accounts(&self) -> Result<Vec<Account>, RemoteError> {
        self.get("following").await
    }

    async fn list_recent_media(&self, account: &Account) -> Result<Vec<MediaItem>, RemoteError> {
        self.get(&format!("accounts/{}/media", account.id)).await
    }

    async fn list_followers(&self, account: &Account) -> Result<Vec<Account>, RemoteError> {
        self.get(&format!("accounts/{}/followers", account.id)).await
    }

    async fn follow(&self, account_id: &str) -> Result<(), RemoteError> {
        self.post_empty(&format!("accounts/{}/follow", account_id))
            .await
    }

    async fn publish(&self, image_path: &Path, caption: &str) -> Result<(), RemoteError> {
        let file_name = image_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let bytes = tokio::fs::read(image_path).await?;

        let photo = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(api_url(&self.base_url, "media"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        decode::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.post_empty("logout").await
    }
}
