//! Mock host for testing
//!
//! Formatting flips the probe result to the new filesystem and mounting adds a
//! mount table entry, so repeated stages observe their own effects.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{FsProbe, HostOps, MountEntry};
use crate::BootstrapError;

#[derive(Debug)]
pub struct MockHost {
    probe: Mutex<FsProbe>,
    mounts: Mutex<Vec<MountEntry>>,
    format_error: Option<String>,
    mount_error: Option<String>,
    format_calls: Mutex<Vec<(PathBuf, String, Vec<String>)>>,
    mount_calls: Mutex<Vec<(PathBuf, PathBuf, String)>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// Host with a blank device and an empty mount table
    pub fn new() -> Self {
        Self {
            probe: Mutex::new(FsProbe::Empty),
            mounts: Mutex::new(Vec::new()),
            format_error: None,
            mount_error: None,
            format_calls: Mutex::new(Vec::new()),
            mount_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_probe(self, probe: FsProbe) -> Self {
        *self.probe.lock().unwrap() = probe;
        self
    }

    pub fn with_mount(self, entry: MountEntry) -> Self {
        self.mounts.lock().unwrap().push(entry);
        self
    }

    pub fn with_format_error(mut self, error: &str) -> Self {
        self.format_error = Some(error.to_string());
        self
    }

    pub fn with_mount_error(mut self, error: &str) -> Self {
        self.mount_error = Some(error.to_string());
        self
    }

    /// `(device, fs_type, args)` of every format
    pub fn format_calls(&self) -> Vec<(PathBuf, String, Vec<String>)> {
        self.format_calls.lock().unwrap().clone()
    }

    /// `(device, mount_point, fs_type)` of every mount
    pub fn mount_calls(&self) -> Vec<(PathBuf, PathBuf, String)> {
        self.mount_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostOps for MockHost {
    async fn probe_filesystem(&self, _device: &Path) -> Result<FsProbe, BootstrapError> {
        Ok(self.probe.lock().unwrap().clone())
    }

    async fn format(
        &self,
        device: &Path,
        fs_type: &str,
        args: &[String],
    ) -> Result<(), BootstrapError> {
        self.format_calls.lock().unwrap().push((
            device.to_path_buf(),
            fs_type.to_string(),
            args.to_vec(),
        ));

        if let Some(error) = &self.format_error {
            return Err(BootstrapError::Format(error.clone()));
        }
        *self.probe.lock().unwrap() = FsProbe::Filesystem(fs_type.to_string());
        Ok(())
    }

    async fn mount_table(&self) -> Result<Vec<MountEntry>, BootstrapError> {
        Ok(self.mounts.lock().unwrap().clone())
    }

    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        fs_type: &str,
    ) -> Result<(), BootstrapError> {
        self.mount_calls.lock().unwrap().push((
            device.to_path_buf(),
            mount_point.to_path_buf(),
            fs_type.to_string(),
        ));

        if let Some(error) = &self.mount_error {
            return Err(BootstrapError::Mount(error.clone()));
        }
        self.mounts.lock().unwrap().push(MountEntry {
            device: device.to_path_buf(),
            mount_point: mount_point.to_path_buf(),
            fs_type: fs_type.to_string(),
        });
        Ok(())
    }
}
