//! Remote screenshot rendering.
//!
//! The service takes a page URL and returns PNG bytes. Requests are
//! authenticated with a bearer key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Longest response body excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Rendering endpoint. Unset means captures fail with a configuration error.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default)]
    pub full_page: bool,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    720
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            full_page: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("Screenshot service is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("Screenshot request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Screenshot service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Screenshot service returned an empty image")]
    EmptyBody,
}

#[async_trait]
pub trait ScreenshotService: Send + Sync {
    /// Render `url` and return the PNG bytes.
    async fn capture(&self, url: &str) -> Result<Vec<u8>, ScreenshotError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureOptions {
    full_page: bool,
    #[serde(rename = "type")]
    image_type: &'static str,
    viewport: Viewport,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct CaptureRequest<'a> {
    url: &'a str,
    options: CaptureOptions,
}

/// reqwest client for the screenshot HTTP API.
pub struct HttpScreenshotClient {
    client: Client,
    config: ScreenshotConfig,
}

impl HttpScreenshotClient {
    pub fn new(config: ScreenshotConfig) -> Result<Self, ScreenshotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScreenshotConfig {
        &self.config
    }

    fn request_body<'a>(&self, url: &'a str) -> CaptureRequest<'a> {
        CaptureRequest {
            url,
            options: CaptureOptions {
                full_page: self.config.full_page,
                image_type: "png",
                viewport: Viewport {
                    width: self.config.viewport_width,
                    height: self.config.viewport_height,
                },
            },
        }
    }
}

#[async_trait]
impl ScreenshotService for HttpScreenshotClient {
    async fn capture(&self, url: &str) -> Result<Vec<u8>, ScreenshotError> {
        let endpoint = self
            .config
            .api_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ScreenshotError::NotConfigured("screenshot API URL"))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ScreenshotError::NotConfigured("screenshot API key"))?;

        debug!("Requesting screenshot of {}", url);
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(url))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ScreenshotError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(ScreenshotError::EmptyBody);
        }
        Ok(bytes.to_vec())
    }
}
