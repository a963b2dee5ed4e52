//! Route 53 DNS API

use async_trait::async_trait;
use aws_sdk_route53::Client;
use aws_sdk_route53::error::{BuildError, DisplayErrorContext};
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use tracing::debug;

use super::{DnsApi, RecordChange};
use crate::BootstrapError;

/// Route 53 hosted zones
pub struct Route53Dns {
    client: Client,
}

impl Route53Dns {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn build_error(err: BuildError) -> BootstrapError {
    BootstrapError::Dns(format!("Invalid change request: {}", err))
}

fn change_batch(change: &RecordChange) -> Result<ChangeBatch, BootstrapError> {
    let record = ResourceRecord::builder()
        .value(change.value.as_str())
        .build()
        .map_err(build_error)?;

    let record_set = ResourceRecordSet::builder()
        .name(change.name.as_str())
        .r#type(RrType::from(change.record_type.as_str()))
        .ttl(change.ttl)
        .resource_records(record)
        .build()
        .map_err(build_error)?;

    let change_item = Change::builder()
        .action(ChangeAction::Upsert)
        .resource_record_set(record_set)
        .build()
        .map_err(build_error)?;

    ChangeBatch::builder()
        .changes(change_item)
        .comment(change.comment.as_str())
        .build()
        .map_err(build_error)
}

#[async_trait]
impl DnsApi for Route53Dns {
    async fn submit_change(&self, change: &RecordChange) -> Result<(), BootstrapError> {
        let batch = change_batch(change)?;

        self.client
            .change_resource_record_sets()
            .hosted_zone_id(change.zone_id.as_str())
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| {
                BootstrapError::Dns(format!(
                    "ChangeResourceRecordSets in {} failed: {}",
                    change.zone_id,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!("Route 53 accepted UPSERT {} {}", change.record_type, change.name);
        Ok(())
    }
}
