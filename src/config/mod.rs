//! Bootstrap configuration
//!
//! One explicit [`BootstrapConfig`] value is built at startup (defaults, then the
//! optional YAML file, then command line flags) and handed to every stage.

pub mod loader;

use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::BootstrapError;
use crate::dns::DnsRecordRequest;
use crate::volume::poll::PollPolicy;

/// Complete configuration of one bootstrap run
///
/// Field names double as the YAML keys (kebab-case), matching the CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Region for the compute client
    pub aws_region: String,

    /// Value of the `Name` tag identifying the data volume
    pub ebs_volume_name: String,

    /// Where the data volume is mounted
    pub mount_point: PathBuf,

    /// Block device node the attached volume shows up as
    pub block_device: PathBuf,

    /// Filesystem created on an empty device
    pub filesystem_type: String,

    /// Extra `mkfs` arguments, whitespace separated
    pub filesystem_arguments: String,

    /// Locate and attach an EBS volume before formatting/mounting
    pub use_ebs: bool,

    /// DNS name to point at this instance
    pub domain: String,

    /// Hosted zone holding `domain`
    pub zone_id: String,

    /// TTL of the A record, in seconds
    pub ttl: u32,

    /// Device name passed to the attach API
    pub attach_device: String,

    /// Seconds to wait for the attachment and the device node
    pub attach_timeout: u64,

    /// Seconds between attachment polls
    pub attach_poll_interval: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            aws_region: "eu-west-1".to_string(),
            ebs_volume_name: String::new(),
            mount_point: PathBuf::from("/var/lib/etcd"),
            block_device: PathBuf::from("/dev/nvme1n1"),
            filesystem_type: "ext4".to_string(),
            filesystem_arguments: String::new(),
            use_ebs: true,
            domain: String::new(),
            zone_id: String::new(),
            ttl: 60,
            attach_device: "/dev/xvdf".to_string(),
            attach_timeout: 300,
            attach_poll_interval: 5,
        }
    }
}

/// Format and mount settings for the data device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub block_device: PathBuf,
    pub mount_point: PathBuf,
    pub filesystem_type: String,
    pub filesystem_arguments: Vec<String>,
}

impl BootstrapConfig {
    /// Parse a config from YAML
    pub fn from_yaml(content: &str) -> Result<Self, BootstrapError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check the invariants the stages rely on
    pub fn validate(&self) -> Result<(), BootstrapError> {
        check_absolute("block-device", &self.block_device)?;
        check_absolute("mount-point", &self.mount_point)?;

        if self.filesystem_type.trim().is_empty() {
            return Err(BootstrapError::Config(
                "filesystem-type must not be empty".to_string(),
            ));
        }

        if self.use_ebs {
            if self.ebs_volume_name.trim().is_empty() {
                return Err(BootstrapError::Config(
                    "ebs-volume-name is required when use-ebs is set".to_string(),
                ));
            }
            if self.attach_device.trim().is_empty() {
                return Err(BootstrapError::Config(
                    "attach-device must not be empty".to_string(),
                ));
            }
            if self.attach_poll_interval == 0 {
                return Err(BootstrapError::Config(
                    "attach-poll-interval must be at least 1 second".to_string(),
                ));
            }
            if self.attach_timeout < self.attach_poll_interval {
                return Err(BootstrapError::Config(format!(
                    "attach-timeout ({}s) is shorter than attach-poll-interval ({}s)",
                    self.attach_timeout, self.attach_poll_interval
                )));
            }
        }

        Ok(())
    }

    /// Format/mount settings for the storage stages
    pub fn mount_config(&self) -> MountConfig {
        MountConfig {
            block_device: self.block_device.clone(),
            mount_point: self.mount_point.clone(),
            filesystem_type: self.filesystem_type.clone(),
            filesystem_arguments: self
                .filesystem_arguments
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Poll bounds for the attach stage
    pub fn attach_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.attach_poll_interval),
            Duration::from_secs(self.attach_timeout),
        )
    }

    /// Whether any DNS setting was supplied
    ///
    /// A half-configured record still runs the DNS stage so that it fails loudly
    /// instead of being skipped.
    pub fn dns_requested(&self) -> bool {
        !self.domain.is_empty() || !self.zone_id.is_empty()
    }

    /// DNS record request pointing `domain` at `target`
    pub fn dns_request(&self, target: &str) -> DnsRecordRequest {
        DnsRecordRequest {
            domain: self.domain.clone(),
            zone_id: self.zone_id.clone(),
            target: target.to_string(),
            ttl: i64::from(self.ttl),
        }
    }

    /// Apply flags given on the command line on top of this config
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(v) = &overrides.aws_region {
            self.aws_region = v.clone();
        }
        if let Some(v) = &overrides.ebs_volume_name {
            self.ebs_volume_name = v.clone();
        }
        if let Some(v) = &overrides.mount_point {
            self.mount_point = v.clone();
        }
        if let Some(v) = &overrides.block_device {
            self.block_device = v.clone();
        }
        if let Some(v) = &overrides.filesystem_type {
            self.filesystem_type = v.clone();
        }
        if let Some(v) = &overrides.filesystem_arguments {
            self.filesystem_arguments = v.clone();
        }
        if let Some(v) = overrides.use_ebs {
            self.use_ebs = v;
        }
        if let Some(v) = &overrides.domain {
            self.domain = v.clone();
        }
        if let Some(v) = &overrides.zone_id {
            self.zone_id = v.clone();
        }
        if let Some(v) = overrides.ttl {
            self.ttl = v;
        }
        if let Some(v) = &overrides.attach_device {
            self.attach_device = v.clone();
        }
        if let Some(v) = overrides.attach_timeout {
            self.attach_timeout = v;
        }
        if let Some(v) = overrides.attach_poll_interval {
            self.attach_poll_interval = v;
        }
    }
}

fn check_absolute(flag: &str, path: &Path) -> Result<(), BootstrapError> {
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(BootstrapError::Config(format!(
            "{} must be an absolute path, got '{}'",
            flag,
            path.display()
        )));
    }
    Ok(())
}

/// Command line flags
///
/// Every flag is optional so that an unset flag does not mask the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// AWS region this instance is on [default: eu-west-1]
    #[arg(long)]
    pub aws_region: Option<String>,

    /// EBS volume (Name tag) to attach to this node
    #[arg(long)]
    pub ebs_volume_name: Option<String>,

    /// EBS volume mount point [default: /var/lib/etcd]
    #[arg(long)]
    pub mount_point: Option<PathBuf>,

    /// Block device the volume appears as [default: /dev/nvme1n1]
    #[arg(long)]
    pub block_device: Option<PathBuf>,

    /// Linux filesystem format type [default: ext4]
    #[arg(long)]
    pub filesystem_type: Option<String>,

    /// Linux filesystem format arguments
    #[arg(long, allow_hyphen_values = true)]
    pub filesystem_arguments: Option<String>,

    /// Use EBS instead of instance store [default: true]
    #[arg(long, action = ArgAction::Set)]
    pub use_ebs: Option<bool>,

    /// Domain name to point at this instance
    #[arg(long)]
    pub domain: Option<String>,

    /// Route 53 hosted zone id for the domain
    #[arg(long)]
    pub zone_id: Option<String>,

    /// TTL for the DNS record, in seconds [default: 60]
    #[arg(long)]
    pub ttl: Option<u32>,

    /// Device name requested when attaching the volume [default: /dev/xvdf]
    #[arg(long)]
    pub attach_device: Option<String>,

    /// Seconds to wait for the volume to attach [default: 300]
    #[arg(long)]
    pub attach_timeout: Option<u64>,

    /// Seconds between attachment polls [default: 5]
    #[arg(long)]
    pub attach_poll_interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BootstrapConfig::default();
        assert_eq!(config.aws_region, "eu-west-1");
        assert_eq!(config.mount_point, PathBuf::from("/var/lib/etcd"));
        assert_eq!(config.block_device, PathBuf::from("/dev/nvme1n1"));
        assert_eq!(config.filesystem_type, "ext4");
        assert!(config.use_ebs);
        assert_eq!(config.ttl, 60);
        assert!(!config.dns_requested());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
ebs-volume-name: etcd-data-1
domain: node1.etcd.example.com
zone-id: Z123
ttl: 30
"#;
        let config = BootstrapConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.ebs_volume_name, "etcd-data-1");
        assert_eq!(config.ttl, 30);
        // untouched keys keep their defaults
        assert_eq!(config.filesystem_type, "ext4");
        assert!(config.dns_requested());
    }

    #[test]
    fn test_from_yaml_rejects_unknown_keys() {
        let result = BootstrapConfig::from_yaml("mount_pont: /data\n");
        assert!(matches!(result, Err(BootstrapError::Yaml(_))));
    }

    #[test]
    fn test_validate_requires_volume_name_with_ebs() {
        let config = BootstrapConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ebs-volume-name"));

        let config = BootstrapConfig {
            use_ebs: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_relative_mount_point() {
        let config = BootstrapConfig {
            use_ebs: false,
            mount_point: PathBuf::from("data/etcd"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BootstrapError::Config(_))));
    }

    #[test]
    fn test_validate_poll_bounds() {
        let config = BootstrapConfig {
            ebs_volume_name: "etcd-data-1".to_string(),
            attach_timeout: 2,
            attach_poll_interval: 5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BootstrapError::Config(_))));
    }

    #[test]
    fn test_mount_config_splits_arguments() {
        let config = BootstrapConfig {
            filesystem_arguments: "  -L etcd   -m 0 ".to_string(),
            ..Default::default()
        };
        let mount = config.mount_config();
        assert_eq!(mount.filesystem_arguments, vec!["-L", "etcd", "-m", "0"]);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = BootstrapConfig::from_yaml("ttl: 30\ndomain: a.example.com\n").unwrap();
        config.apply_overrides(&ConfigOverrides {
            ttl: Some(120),
            use_ebs: Some(false),
            ..Default::default()
        });
        assert_eq!(config.ttl, 120);
        assert!(!config.use_ebs);
        assert_eq!(config.domain, "a.example.com");
    }

    #[test]
    fn test_dns_request() {
        let config = BootstrapConfig {
            domain: "node1.etcd.example.com".to_string(),
            zone_id: "Z123".to_string(),
            ..Default::default()
        };
        let request = config.dns_request("10.0.1.5");
        assert_eq!(request.domain, "node1.etcd.example.com");
        assert_eq!(request.zone_id, "Z123");
        assert_eq!(request.target, "10.0.1.5");
        assert_eq!(request.ttl, 60);
    }
}
