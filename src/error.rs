//! Error types for node-bootstrap

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for node-bootstrap operations
///
/// Every variant is terminal: the orchestrator stops at the first error and
/// leaves already completed stages in place.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Instance metadata unavailable: {0}")]
    Metadata(String),

    #[error("No volume tagged '{name}' found in {zone}")]
    VolumeNotFound { name: String, zone: String },

    #[error("Volume name '{name}' is ambiguous in {zone}: {}", .volume_ids.join(", "))]
    VolumeAmbiguous {
        name: String,
        zone: String,
        volume_ids: Vec<String>,
    },

    #[error("Attach of {volume_id} rejected: {message}")]
    AttachRejected { volume_id: String, message: String },

    #[error("Timed out after {waited:?} waiting for {volume_id} to attach")]
    AttachTimeout { volume_id: String, waited: Duration },

    #[error("Timed out after {waited:?} waiting for block device {}", .device.display())]
    DeviceTimeout { device: PathBuf, waited: Duration },

    #[error("Cloud API error: {0}")]
    Cloud(String),

    #[error("Filesystem error: {0}")]
    Format(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Write check failed on {}: {message}", .path.display())]
    WriteCheck { path: PathBuf, message: String },

    #[error("Incomplete arguments: domain: '{domain}', target: '{target}', zone-id: '{zone_id}'")]
    DnsIncompleteArguments {
        domain: String,
        target: String,
        zone_id: String,
    },

    #[error("DNS update failed: {0}")]
    Dns(String),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BootstrapError {
    /// Create a write check error
    pub fn write_check(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::WriteCheck {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}
