//! Local storage preparation
//!
//! Formatting, mounting and the write check for the data device. OS primitives
//! (`blkid`, `mkfs`, `mount`, the mount table) sit behind [`HostOps`].

pub mod filesystem;
pub mod host;
pub mod mock;
pub mod mount;
pub mod writable;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::BootstrapError;

pub use filesystem::{FormatOutcome, ensure_filesystem};
pub use host::SystemHost;
pub use mount::{MountOutcome, ensure_mounted};
pub use writable::ensure_writable;

/// What a signature probe found on a block device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsProbe {
    /// A filesystem signature of the given type
    Filesystem(String),
    /// A partition table of the given type, no filesystem on the whole device
    PartitionTable(String),
    /// No signature at all
    Empty,
    /// The probe succeeded but reported nothing we can classify
    Unrecognized(String),
}

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// OS-level block device and mount primitives
#[async_trait]
pub trait HostOps: Send + Sync {
    /// Inspect the device for filesystem/partition signatures
    async fn probe_filesystem(&self, device: &Path) -> Result<FsProbe, BootstrapError>;

    /// Create a filesystem on the device
    async fn format(
        &self,
        device: &Path,
        fs_type: &str,
        args: &[String],
    ) -> Result<(), BootstrapError>;

    /// Current mount table
    async fn mount_table(&self) -> Result<Vec<MountEntry>, BootstrapError>;

    /// Mount the device; the mount point directory already exists
    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        fs_type: &str,
    ) -> Result<(), BootstrapError>;
}
