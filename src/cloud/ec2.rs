//! EC2 (EBS) volume API

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, Volume};
use tracing::debug;

use super::{AttachmentState, NAME_TAG, VolumeApi, VolumeAttachment, VolumeDescriptor};
use crate::BootstrapError;

/// EBS volumes through the EC2 API
pub struct Ec2Volumes {
    client: Client,
}

impl Ec2Volumes {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn descriptor_from(volume: &Volume) -> VolumeDescriptor {
    VolumeDescriptor {
        volume_id: volume.volume_id().unwrap_or_default().to_string(),
        state: volume
            .state()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        availability_zone: volume.availability_zone().unwrap_or_default().to_string(),
        name: volume
            .tags()
            .iter()
            .find(|t| t.key() == Some(NAME_TAG))
            .and_then(|t| t.value())
            .map(str::to_string),
        attachments: volume
            .attachments()
            .iter()
            .map(|a| VolumeAttachment {
                instance_id: a.instance_id().unwrap_or_default().to_string(),
                device: a.device().unwrap_or_default().to_string(),
                state: a
                    .state()
                    .map(|s| AttachmentState::from_api(s.as_str()))
                    .unwrap_or_else(|| AttachmentState::Unknown(String::new())),
            })
            .collect(),
    }
}

#[async_trait]
impl VolumeApi for Ec2Volumes {
    async fn find_volumes(
        &self,
        name: &str,
        zone: &str,
    ) -> Result<Vec<VolumeDescriptor>, BootstrapError> {
        debug!("DescribeVolumes tag:{}={} availability-zone={}", NAME_TAG, name, zone);

        let output = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name(format!("tag:{}", NAME_TAG))
                    .values(name)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("availability-zone")
                    .values(zone)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                BootstrapError::Cloud(format!("DescribeVolumes failed: {}", DisplayErrorContext(&e)))
            })?;

        Ok(output.volumes().iter().map(descriptor_from).collect())
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescriptor, BootstrapError> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .map_err(|e| {
                BootstrapError::Cloud(format!(
                    "DescribeVolumes {} failed: {}",
                    volume_id,
                    DisplayErrorContext(&e)
                ))
            })?;

        output
            .volumes()
            .first()
            .map(descriptor_from)
            .ok_or_else(|| BootstrapError::Cloud(format!("Volume {} disappeared", volume_id)))
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> Result<(), BootstrapError> {
        let output = self
            .client
            .attach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device)
            .send()
            .await
            .map_err(|e| BootstrapError::AttachRejected {
                volume_id: volume_id.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(
            "AttachVolume accepted, state: {}",
            output.state().map(|s| s.as_str()).unwrap_or("unknown")
        );
        Ok(())
    }
}
