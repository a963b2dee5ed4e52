//! EC2 Instance Metadata Service (IMDS) client
//!
//! Supports both IMDSv2 (preferred) and IMDSv1.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{IdentityDocument, MetadataSource};
use crate::BootstrapError;

/// EC2 metadata service base URL (link-local address)
pub const IMDS_BASE_URL: &str = "http://169.254.169.254";

/// IMDSv2 token TTL in seconds
const TOKEN_TTL_SECONDS: u32 = 300;

const TOKEN_PATH: &str = "/latest/api/token";
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

/// IMDS-backed metadata source
pub struct Imds {
    client: Client,
    base_url: String,
}

impl Imds {
    /// Client for the link-local metadata endpoint
    pub fn new() -> Result<Self, BootstrapError> {
        Self::with_base_url(IMDS_BASE_URL)
    }

    /// Client for a custom endpoint (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, BootstrapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| BootstrapError::Metadata(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get IMDSv2 token for authenticated requests
    async fn get_imdsv2_token(&self) -> Option<String> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let response = self
            .client
            .put(&url)
            .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS.to_string())
            .send()
            .await
            .ok()?;

        if response.status().is_success() {
            response.text().await.ok()
        } else {
            None
        }
    }

    /// Fetch a path, trying IMDSv2 first then falling back to IMDSv1
    async fn fetch(&self, path: &str) -> Result<String, BootstrapError> {
        let url = format!("{}{}", self.base_url, path);

        // Try IMDSv2 first (more secure)
        if let Some(token) = self.get_imdsv2_token().await {
            debug!("Using IMDSv2 for {}", path);
            let response = self
                .client
                .get(&url)
                .header("X-aws-ec2-metadata-token", &token)
                .send()
                .await?;

            if response.status().is_success() {
                return Ok(response.text().await?);
            }
        }

        // Fall back to IMDSv1
        debug!("Falling back to IMDSv1 for {}", path);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(BootstrapError::Metadata(format!(
                "Failed to fetch {}: {}",
                path,
                response.status()
            )))
        }
    }

    async fn fetch_metadata_path(&self, path: &str) -> Result<String, BootstrapError> {
        let value = self.fetch(&format!("/latest/meta-data/{}", path)).await?;
        Ok(value.trim().to_string())
    }
}

#[async_trait]
impl MetadataSource for Imds {
    async fn availability_zone(&self) -> Result<String, BootstrapError> {
        self.fetch_metadata_path("placement/availability-zone").await
    }

    async fn instance_id(&self) -> Result<String, BootstrapError> {
        self.fetch_metadata_path("instance-id").await
    }

    async fn identity_document(&self) -> Result<IdentityDocument, BootstrapError> {
        let body = self.fetch(IDENTITY_DOCUMENT_PATH).await?;
        serde_json::from_str(&body).map_err(|e| {
            BootstrapError::Metadata(format!("Invalid instance identity document: {}", e))
        })
    }
}
