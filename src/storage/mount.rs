//! Mount management

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::HostOps;
use crate::BootstrapError;
use crate::config::MountConfig;

/// What the mount stage did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    AlreadyMounted,
    Mounted,
}

/// Resolve symlinks such as `/dev/xvdf -> nvme1n1`; unresolvable paths compare as given
async fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Make sure the block device is mounted at the mount point
///
/// Never mounts over a mount point that another device already occupies.
pub async fn ensure_mounted(
    host: &dyn HostOps,
    config: &MountConfig,
) -> Result<MountOutcome, BootstrapError> {
    let device = &config.block_device;
    let mount_point = &config.mount_point;

    let table = host.mount_table().await?;
    // Later entries shadow earlier ones on the same mount point.
    if let Some(entry) = table.iter().rev().find(|e| &e.mount_point == mount_point) {
        if canonical(&entry.device).await == canonical(device).await {
            info!("{} already mounted on {}", device.display(), mount_point.display());
            return Ok(MountOutcome::AlreadyMounted);
        }
        return Err(BootstrapError::Mount(format!(
            "{} is occupied by {}, expected {}",
            mount_point.display(),
            entry.device.display(),
            device.display()
        )));
    }

    let prepare = |e: std::io::Error| {
        BootstrapError::Mount(format!("cannot prepare {}: {}", mount_point.display(), e))
    };
    if !fs::try_exists(mount_point).await.map_err(prepare)? {
        debug!("Creating mount point {}", mount_point.display());
        fs::create_dir_all(mount_point).await.map_err(prepare)?;
    }

    host.mount(device, mount_point, &config.filesystem_type).await?;
    info!("Mounted {} on {}", device.display(), mount_point.display());
    Ok(MountOutcome::Mounted)
}
