//! node-bootstrap library
//!
//! Prepares an EC2 instance to run a clustered storage node such as etcd:
//! attach the node's EBS volume, make sure it is formatted, mounted and
//! writable, then point a DNS name at the instance.
//!
//! # Design Principles
//!
//! - **Fail fast**: the first failing stage aborts the run, nothing is rolled back
//! - **Idempotent**: re-running on a prepared node attaches, formats and mounts nothing
//! - **Never destroy data**: a device is only formatted when it carries no signature

pub mod cloud;
pub mod config;
pub mod dns;
pub mod metadata;
pub mod storage;
pub mod volume;

mod error;

pub use config::BootstrapConfig;
pub use error::BootstrapError;

use tracing::{error, info};

use cloud::{DnsApi, VolumeApi};
use metadata::{InstanceContext, MetadataSource};
use storage::{FormatOutcome, HostOps, MountOutcome};
use volume::AttachOutcome;

/// Bootstrap stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Availability zone, instance id and private IP from instance metadata
    ResolveContext,
    /// Find the tagged volume in our availability zone
    LocateVolume,
    /// Attach it and wait for the device node
    AttachVolume,
    /// Create a filesystem on a blank device
    InitFilesystem,
    /// Mount the device
    Mount,
    /// Prove the mount point is writable
    VerifyWritable,
    /// Upsert the A record
    UpdateDns,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ResolveContext => write!(f, "resolve-context"),
            Stage::LocateVolume => write!(f, "locate-volume"),
            Stage::AttachVolume => write!(f, "attach-volume"),
            Stage::InitFilesystem => write!(f, "init-filesystem"),
            Stage::Mount => write!(f, "mount"),
            Stage::VerifyWritable => write!(f, "verify-writable"),
            Stage::UpdateDns => write!(f, "update-dns"),
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub context: InstanceContext,
    /// Volume that was located (and attached), when EBS is in use
    pub volume_id: Option<String>,
    pub attach: Option<AttachOutcome>,
    pub format: FormatOutcome,
    pub mount: MountOutcome,
    pub dns_updated: bool,
    /// Stages that ran, in order
    pub stages: Vec<Stage>,
}

/// The external collaborators a run talks to
pub struct Bootstrap<'a> {
    metadata: &'a dyn MetadataSource,
    volumes: &'a dyn VolumeApi,
    dns: &'a dyn DnsApi,
    host: &'a dyn HostOps,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        metadata: &'a dyn MetadataSource,
        volumes: &'a dyn VolumeApi,
        dns: &'a dyn DnsApi,
        host: &'a dyn HostOps,
    ) -> Self {
        Self {
            metadata,
            volumes,
            dns,
            host,
        }
    }

    /// Run every configured stage in order, stopping at the first error
    pub async fn run(&self, config: &BootstrapConfig) -> Result<BootstrapReport, BootstrapError> {
        let mut stages = Vec::new();

        let context = run_stage(
            &mut stages,
            Stage::ResolveContext,
            metadata::resolve_context(self.metadata),
        )
        .await?;

        let mut volume_id = None;
        let mut attach = None;
        if config.use_ebs {
            let descriptor = run_stage(
                &mut stages,
                Stage::LocateVolume,
                volume::locate_volume(
                    self.volumes,
                    &config.ebs_volume_name,
                    &context.availability_zone,
                ),
            )
            .await?;

            let outcome = run_stage(
                &mut stages,
                Stage::AttachVolume,
                attach_and_wait(self.volumes, &context, &descriptor, config),
            )
            .await?;

            volume_id = Some(descriptor.volume_id);
            attach = Some(outcome);
        } else {
            info!("EBS disabled, using {} as is", config.block_device.display());
        }

        let mount_config = config.mount_config();
        let format = run_stage(
            &mut stages,
            Stage::InitFilesystem,
            storage::ensure_filesystem(self.host, &mount_config),
        )
        .await?;

        let mount = run_stage(
            &mut stages,
            Stage::Mount,
            storage::ensure_mounted(self.host, &mount_config),
        )
        .await?;

        run_stage(
            &mut stages,
            Stage::VerifyWritable,
            storage::ensure_writable(&mount_config.mount_point),
        )
        .await?;

        let mut dns_updated = false;
        if config.dns_requested() {
            let request = config.dns_request(&context.private_ip);
            run_stage(
                &mut stages,
                Stage::UpdateDns,
                dns::ensure_dns_record(self.dns, &request),
            )
            .await?;
            dns_updated = true;
        } else {
            info!("No domain configured, skipping DNS update");
        }

        Ok(BootstrapReport {
            context,
            volume_id,
            attach,
            format,
            mount,
            dns_updated,
            stages,
        })
    }
}

/// Run one stage, recording it as completed on success
async fn run_stage<T>(
    completed: &mut Vec<Stage>,
    stage: Stage,
    work: impl std::future::Future<Output = Result<T, BootstrapError>>,
) -> Result<T, BootstrapError> {
    info!("Starting stage: {}", stage);
    match work.await {
        Ok(value) => {
            completed.push(stage);
            info!("Completed stage: {}", stage);
            Ok(value)
        }
        Err(e) => {
            error!("Stage {} failed: {}", stage, e);
            Err(e)
        }
    }
}

/// Attach the volume, then wait for its block device node
async fn attach_and_wait(
    volumes: &dyn VolumeApi,
    context: &InstanceContext,
    descriptor: &cloud::VolumeDescriptor,
    config: &BootstrapConfig,
) -> Result<AttachOutcome, BootstrapError> {
    let policy = config.attach_policy();
    let outcome = volume::attach_volume(
        volumes,
        &context.instance_id,
        descriptor,
        &config.attach_device,
        policy,
    )
    .await?;
    volume::wait_for_device(&config.block_device, policy).await?;
    Ok(outcome)
}
