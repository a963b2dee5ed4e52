//! Instance context resolution
//!
//! The instance metadata service tells us where we run (availability zone),
//! who we are (instance id) and which private IP to advertise.

pub mod imds;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::BootstrapError;

/// Trait for instance metadata sources
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Availability zone the instance runs in (e.g., "eu-west-1a")
    async fn availability_zone(&self) -> Result<String, BootstrapError>;

    /// Instance identifier (e.g., "i-0123456789abcdef0")
    async fn instance_id(&self) -> Result<String, BootstrapError>;

    /// Instance identity document
    async fn identity_document(&self) -> Result<IdentityDocument, BootstrapError>;
}

/// Instance identity document as served by IMDS
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentityDocument {
    pub private_ip: String,
    pub instance_id: String,
    pub availability_zone: String,
    pub region: String,
    pub account_id: String,
    pub instance_type: String,
    pub image_id: String,
}

/// Where this process runs, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceContext {
    pub availability_zone: String,
    pub instance_id: String,
    pub private_ip: String,
}

/// Query the metadata source for the instance context
///
/// Any failed lookup aborts; there is no retry.
pub async fn resolve_context(
    source: &dyn MetadataSource,
) -> Result<InstanceContext, BootstrapError> {
    let availability_zone = non_empty("availability zone", source.availability_zone().await?)?;
    let instance_id = non_empty("instance id", source.instance_id().await?)?;
    let document = source.identity_document().await?;

    let context = InstanceContext {
        availability_zone,
        instance_id,
        private_ip: document.private_ip.trim().to_string(),
    };

    info!(
        "Instance {} in {} (private ip: {})",
        context.instance_id, context.availability_zone, context.private_ip
    );
    Ok(context)
}

fn non_empty(what: &str, value: String) -> Result<String, BootstrapError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BootstrapError::Metadata(format!("empty {}", what)));
    }
    Ok(value.to_string())
}
