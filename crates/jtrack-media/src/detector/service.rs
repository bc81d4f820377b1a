//! HTTP pose-service client.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use jtrack_models::NormalizedPose;

use super::PoseDetector;
use crate::error::{MediaError, MediaResult};
use crate::video::Frame;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum PoseServiceError {
    #[error("Pose service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl PoseServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PoseServiceError::ServiceUnavailable(_) | PoseServiceError::Network(_)
        )
    }
}

impl From<PoseServiceError> for MediaError {
    fn from(e: PoseServiceError) -> Self {
        MediaError::detector_failed(e.to_string())
    }
}

/// Configuration for the pose service.
#[derive(Debug, Clone)]
pub struct PoseServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// First retry delay; doubles per attempt
    pub retry_base_delay: Duration,
}

impl Default for PoseServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl PoseServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("POSE_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("POSE_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("POSE_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: defaults.retry_base_delay,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PoseResponse {
    landmarks: Option<NormalizedPose>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Pose detector backed by a remote inference service.
///
/// Each frame is JPEG-encoded and posted to `{base_url}/v1/pose`; the
/// service answers `{"landmarks": [...]}` or `{"landmarks": null}`.
pub struct PoseServiceClient {
    http: Client,
    config: PoseServiceConfig,
}

impl PoseServiceClient {
    pub fn new(config: PoseServiceConfig) -> Result<Self, PoseServiceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PoseServiceError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, PoseServiceError> {
        Self::new(PoseServiceConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the pose service is healthy.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HealthResponse>()
                .await
                .map(|h| h.status == "healthy" || h.status == "ok")
                .unwrap_or(false),
            Ok(response) => {
                warn!("Pose service health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Pose service health check error: {}", e);
                false
            }
        }
    }

    async fn detect_jpeg(&self, jpeg: Vec<u8>) -> Result<Option<NormalizedPose>, PoseServiceError> {
        let url = format!("{}/v1/pose", self.config.base_url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
                    .body(jpeg.clone())
                    .send()
                    .await?;

                match response.status() {
                    s if s.is_success() => Ok(response),
                    StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::TOO_MANY_REQUESTS => {
                        Err(PoseServiceError::ServiceUnavailable(error_text(response).await))
                    }
                    _ => Err(PoseServiceError::RequestFailed(error_text(response).await)),
                }
            })
            .await?;

        let body: PoseResponse = response
            .json()
            .await
            .map_err(|e| PoseServiceError::InvalidResponse(e.to_string()))?;
        Ok(body.landmarks)
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, PoseServiceError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, PoseServiceError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        "Pose request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn error_text(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("pose service returned {}: {}", status, body)
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, PoseServiceError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&frame.image)?;
    Ok(buf.into_inner())
}

#[async_trait]
impl PoseDetector for PoseServiceClient {
    async fn detect(&self, frame: &Frame) -> MediaResult<Option<NormalizedPose>> {
        let jpeg = encode_jpeg(frame)?;
        debug!(frame = frame.index, bytes = jpeg.len(), "Requesting pose");
        Ok(self.detect_jpeg(jpeg).await?)
    }
}
