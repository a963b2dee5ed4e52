//! Host implementation of [`HostOps`] using system tools

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::{FsProbe, HostOps, MountEntry};
use crate::BootstrapError;

const MOUNT_TABLE: &str = "/proc/self/mounts";

/// `blkid` exit status when no signature was found
const BLKID_NOTHING_FOUND: i32 = 2;

/// `blkid -p` exit status for an ambivalent probe result
const BLKID_AMBIVALENT: i32 = 8;

/// The running system
#[derive(Debug, Clone)]
pub struct SystemHost {
    mount_table: PathBuf,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            mount_table: PathBuf::from(MOUNT_TABLE),
        }
    }

    /// Read the mount table from another file (useful for testing)
    pub fn with_mount_table(path: impl Into<PathBuf>) -> Self {
        Self {
            mount_table: path.into(),
        }
    }
}

/// Classify `blkid -p -o export` output
pub fn parse_blkid_export(output: &str) -> FsProbe {
    let mut fs_type = None;
    let mut pt_type = None;

    for line in output.lines() {
        if let Some((key, value)) = line.trim().split_once('=') {
            match key {
                "TYPE" => fs_type = Some(value.to_string()),
                "PTTYPE" => pt_type = Some(value.to_string()),
                _ => {}
            }
        }
    }

    match (fs_type, pt_type) {
        (Some(fs_type), _) => FsProbe::Filesystem(fs_type),
        (None, Some(pt_type)) => FsProbe::PartitionTable(pt_type),
        (None, None) => FsProbe::Unrecognized(output.trim().to_string()),
    }
}

/// Parse `/proc/mounts` format
pub fn parse_mount_table(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: PathBuf::from(unescape_mount_field(device)),
                mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the `\ooo` octal escapes the kernel uses for whitespace and backslashes
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

async fn run(program: &str, args: &[&str]) -> Result<std::process::Output, BootstrapError> {
    debug!("Running {} {:?}", program, args);
    Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| BootstrapError::Command(format!("{}: {}", program, e)))
}

#[async_trait]
impl HostOps for SystemHost {
    async fn probe_filesystem(&self, device: &Path) -> Result<FsProbe, BootstrapError> {
        let exists = fs::try_exists(device).await.map_err(|e| {
            BootstrapError::Format(format!("cannot stat {}: {}", device.display(), e))
        })?;
        if !exists {
            return Err(BootstrapError::Format(format!(
                "block device {} does not exist",
                device.display()
            )));
        }

        let device_arg = device.to_string_lossy();
        let output = run("blkid", &["-p", "-o", "export", &device_arg]).await?;

        match output.status.code() {
            Some(0) => Ok(parse_blkid_export(&String::from_utf8_lossy(&output.stdout))),
            Some(BLKID_NOTHING_FOUND) => Ok(FsProbe::Empty),
            Some(BLKID_AMBIVALENT) => Err(BootstrapError::Format(format!(
                "ambivalent signatures on {}, refusing to touch it",
                device.display()
            ))),
            code => Err(BootstrapError::Format(format!(
                "blkid on {} failed (status {:?}): {}",
                device.display(),
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn format(
        &self,
        device: &Path,
        fs_type: &str,
        args: &[String],
    ) -> Result<(), BootstrapError> {
        let program = format!("mkfs.{}", fs_type);
        let device_arg = device.to_string_lossy();
        let mut argv: Vec<&str> = args.iter().map(String::as_str).collect();
        argv.push(&device_arg);

        info!("Formatting {} as {}", device.display(), fs_type);
        let output = run(&program, &argv).await?;

        if !output.status.success() {
            return Err(BootstrapError::Format(format!(
                "{} failed: {}",
                program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn mount_table(&self) -> Result<Vec<MountEntry>, BootstrapError> {
        let content = fs::read_to_string(&self.mount_table).await.map_err(|e| {
            BootstrapError::Mount(format!("Failed to read {}: {}", self.mount_table.display(), e))
        })?;
        Ok(parse_mount_table(&content))
    }

    async fn mount(
        &self,
        device: &Path,
        mount_point: &Path,
        fs_type: &str,
    ) -> Result<(), BootstrapError> {
        let device_arg = device.to_string_lossy();
        let mount_point_arg = mount_point.to_string_lossy();
        let output = run("mount", &["-t", fs_type, &device_arg, &mount_point_arg]).await?;

        if !output.status.success() {
            return Err(BootstrapError::Mount(format!(
                "mount {} on {} failed: {}",
                device.display(),
                mount_point.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
