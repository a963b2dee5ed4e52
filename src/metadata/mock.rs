//! Mock metadata source for testing

use async_trait::async_trait;

use super::{IdentityDocument, MetadataSource};
use crate::BootstrapError;

/// Mock metadata source
///
/// # Example
/// ```
/// use node_bootstrap::metadata::mock::MockMetadata;
///
/// let mock = MockMetadata::new("eu-west-1a", "i-0abc", "10.0.1.5");
/// ```
#[derive(Debug, Clone)]
pub struct MockMetadata {
    availability_zone: String,
    instance_id: String,
    document: IdentityDocument,
    error: Option<String>,
}

impl MockMetadata {
    pub fn new(availability_zone: &str, instance_id: &str, private_ip: &str) -> Self {
        Self {
            availability_zone: availability_zone.to_string(),
            instance_id: instance_id.to_string(),
            document: IdentityDocument {
                private_ip: private_ip.to_string(),
                instance_id: instance_id.trim().to_string(),
                availability_zone: availability_zone.trim().to_string(),
                ..Default::default()
            },
            error: None,
        }
    }

    /// Fail every lookup with this message
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    fn check(&self) -> Result<(), BootstrapError> {
        match &self.error {
            Some(error) => Err(BootstrapError::Metadata(error.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataSource for MockMetadata {
    async fn availability_zone(&self) -> Result<String, BootstrapError> {
        self.check()?;
        Ok(self.availability_zone.clone())
    }

    async fn instance_id(&self) -> Result<String, BootstrapError> {
        self.check()?;
        Ok(self.instance_id.clone())
    }

    async fn identity_document(&self) -> Result<IdentityDocument, BootstrapError> {
        self.check()?;
        Ok(self.document.clone())
    }
}
