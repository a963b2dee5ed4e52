//! Cloud provider APIs used during bootstrap
//!
//! The compute API (volume lookup, attach) and the DNS API (record changes) sit
//! behind small traits so the bootstrap sequence can run against mocks.

pub mod ec2;
pub mod mock;
pub mod route53;

use async_trait::async_trait;
use std::fmt;

use crate::BootstrapError;

/// Tag holding a volume's logical name
pub const NAME_TAG: &str = "Name";

/// State of a volume attachment as reported by the compute API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentState {
    Attaching,
    Attached,
    Detaching,
    Detached,
    Busy,
    Unknown(String),
}

impl AttachmentState {
    pub fn from_api(value: &str) -> Self {
        match value {
            "attaching" => Self::Attaching,
            "attached" => Self::Attached,
            "detaching" => Self::Detaching,
            "detached" => Self::Detached,
            "busy" => Self::Busy,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attaching => write!(f, "attaching"),
            Self::Attached => write!(f, "attached"),
            Self::Detaching => write!(f, "detaching"),
            Self::Detached => write!(f, "detached"),
            Self::Busy => write!(f, "busy"),
            Self::Unknown(other) => write!(f, "{}", other),
        }
    }
}

/// One attachment of a volume to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub instance_id: String,
    pub device: String,
    pub state: AttachmentState,
}

/// Block-storage volume as seen through the compute API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeDescriptor {
    pub volume_id: String,
    /// Volume state ("available", "in-use", ...)
    pub state: String,
    pub availability_zone: String,
    /// Value of the `Name` tag
    pub name: Option<String>,
    pub attachments: Vec<VolumeAttachment>,
}

impl VolumeDescriptor {
    /// Attachment to the given instance, if any
    pub fn attachment_to(&self, instance_id: &str) -> Option<&VolumeAttachment> {
        self.attachments
            .iter()
            .find(|a| a.instance_id == instance_id)
    }

    /// Whether the volume is attached to the given instance
    pub fn is_attached_to(&self, instance_id: &str) -> bool {
        self.attachment_to(instance_id)
            .is_some_and(|a| a.state == AttachmentState::Attached)
    }

    /// Instance currently holding the volume, other than `instance_id`
    pub fn held_by_other(&self, instance_id: &str) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.instance_id != instance_id && a.state != AttachmentState::Detached)
            .map(|a| a.instance_id.as_str())
    }
}

/// Compute API operations on block-storage volumes
#[async_trait]
pub trait VolumeApi: Send + Sync {
    /// Volumes whose `Name` tag equals `name` in availability zone `zone`
    async fn find_volumes(
        &self,
        name: &str,
        zone: &str,
    ) -> Result<Vec<VolumeDescriptor>, BootstrapError>;

    /// Current state of one volume
    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescriptor, BootstrapError>;

    /// Request attachment of a volume to an instance at `device`
    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> Result<(), BootstrapError>;
}

/// A single-value record upsert submitted to a hosted zone
///
/// Creates the record or replaces its value, whichever applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub zone_id: String,
    pub name: String,
    /// Record type ("A")
    pub record_type: String,
    pub value: String,
    pub ttl: i64,
    pub comment: String,
}

/// DNS provider API
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Submit a change; returns once the provider accepted it
    async fn submit_change(&self, change: &RecordChange) -> Result<(), BootstrapError>;
}
