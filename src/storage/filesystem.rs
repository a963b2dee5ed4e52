//! Filesystem initialization

use tracing::{info, warn};

use super::{FsProbe, HostOps};
use crate::BootstrapError;
use crate::config::MountConfig;

/// What the filesystem stage did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// A filesystem was already present (its type is carried along)
    AlreadyFormatted(String),
    /// The device was blank and has been formatted
    Formatted,
}

/// Make sure the block device carries a filesystem
///
/// Only a device with no signature at all is formatted. Partition tables and
/// anything the probe cannot classify are left alone and reported as errors.
pub async fn ensure_filesystem(
    host: &dyn HostOps,
    config: &MountConfig,
) -> Result<FormatOutcome, BootstrapError> {
    let device = &config.block_device;

    match host.probe_filesystem(device).await? {
        FsProbe::Filesystem(found) => {
            if found != config.filesystem_type {
                warn!(
                    "{} already carries {} (configured {}), leaving it as is",
                    device.display(),
                    found,
                    config.filesystem_type
                );
            } else {
                info!("{} already formatted as {}", device.display(), found);
            }
            Ok(FormatOutcome::AlreadyFormatted(found))
        }
        FsProbe::Empty => {
            host.format(device, &config.filesystem_type, &config.filesystem_arguments)
                .await?;
            info!("Created {} filesystem on {}", config.filesystem_type, device.display());
            Ok(FormatOutcome::Formatted)
        }
        FsProbe::PartitionTable(table) => Err(BootstrapError::Format(format!(
            "{} has a {} partition table, refusing to format",
            device.display(),
            table
        ))),
        FsProbe::Unrecognized(details) => Err(BootstrapError::Format(format!(
            "cannot tell whether {} holds data ({}), refusing to format",
            device.display(),
            details
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock::MockHost;
    use std::path::PathBuf;

    fn mount_config() -> MountConfig {
        MountConfig {
            block_device: PathBuf::from("/dev/nvme1n1"),
            mount_point: PathBuf::from("/var/lib/etcd"),
            filesystem_type: "ext4".to_string(),
            filesystem_arguments: vec!["-L".to_string(), "etcd".to_string()],
        }
    }

    #[tokio::test]
    async fn test_formats_blank_device_once() {
        let host = MockHost::new().with_probe(FsProbe::Empty);

        let first = ensure_filesystem(&host, &mount_config()).await.unwrap();
        let second = ensure_filesystem(&host, &mount_config()).await.unwrap();

        assert_eq!(first, FormatOutcome::Formatted);
        assert_eq!(second, FormatOutcome::AlreadyFormatted("ext4".to_string()));
        assert_eq!(
            host.format_calls(),
            vec![(
                PathBuf::from("/dev/nvme1n1"),
                "ext4".to_string(),
                vec!["-L".to_string(), "etcd".to_string()]
            )]
        );
    }

    #[tokio::test]
    async fn test_other_filesystem_is_kept() {
        let host = MockHost::new().with_probe(FsProbe::Filesystem("xfs".to_string()));

        let outcome = ensure_filesystem(&host, &mount_config()).await.unwrap();

        assert_eq!(outcome, FormatOutcome::AlreadyFormatted("xfs".to_string()));
        assert!(host.format_calls().is_empty());
    }

    #[tokio::test]
    async fn test_partitioned_device_is_refused() {
        let host = MockHost::new().with_probe(FsProbe::PartitionTable("gpt".to_string()));

        let result = ensure_filesystem(&host, &mount_config()).await;

        assert!(matches!(result, Err(BootstrapError::Format(_))));
        assert!(host.format_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_device_is_refused() {
        let host = MockHost::new().with_probe(FsProbe::Unrecognized("DEVNAME=/dev/x".to_string()));

        let result = ensure_filesystem(&host, &mount_config()).await;

        assert!(matches!(result, Err(BootstrapError::Format(_))));
        assert!(host.format_calls().is_empty());
    }

    #[tokio::test]
    async fn test_format_failure_is_fatal() {
        let host = MockHost::new()
            .with_probe(FsProbe::Empty)
            .with_format_error("mkfs.ext4: Device or resource busy");

        let result = ensure_filesystem(&host, &mount_config()).await;
        assert!(matches!(result, Err(BootstrapError::Format(_))));
    }
}
