//! Volume attachment

use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use super::poll::{PollOutcome, PollPolicy, poll_until};
use crate::BootstrapError;
use crate::cloud::{AttachmentState, VolumeApi, VolumeDescriptor};

/// What the attach stage did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The volume was already attached to this instance
    AlreadyAttached,
    /// An attach request was issued and completed
    Attached,
}

/// Attach `volume` to `instance_id` as `device` and wait for `attached`
///
/// On timeout the attachment is left in whatever state the provider reports.
pub async fn attach_volume(
    api: &dyn VolumeApi,
    instance_id: &str,
    volume: &VolumeDescriptor,
    device: &str,
    policy: PollPolicy,
) -> Result<AttachOutcome, BootstrapError> {
    if volume.is_attached_to(instance_id) {
        info!("Volume {} already attached to {}", volume.volume_id, instance_id);
        return Ok(AttachOutcome::AlreadyAttached);
    }

    if let Some(holder) = volume.held_by_other(instance_id) {
        return Err(BootstrapError::AttachRejected {
            volume_id: volume.volume_id.clone(),
            message: format!("volume is attached to {}", holder),
        });
    }

    match volume.attachment_to(instance_id).map(|a| &a.state) {
        None | Some(AttachmentState::Detached) => {
            info!("Attaching {} to {} as {}", volume.volume_id, instance_id, device);
            api.attach_volume(&volume.volume_id, instance_id, device).await?;
        }
        // A reboot can catch our own attachment mid-flight; only poll in that case.
        Some(AttachmentState::Attaching) => {
            info!("Volume {} is already attaching to {}", volume.volume_id, instance_id);
        }
        // Any other state never turns into `attached` on its own.
        Some(state) => {
            return Err(BootstrapError::AttachRejected {
                volume_id: volume.volume_id.clone(),
                message: format!("attachment to {} is {}", instance_id, state),
            });
        }
    }

    let volume_id = volume.volume_id.as_str();
    let outcome = poll_until(policy, move || attachment_ready(api, volume_id, instance_id)).await?;

    match outcome {
        PollOutcome::Ready(()) => {
            info!("Volume {} attached", volume.volume_id);
            Ok(AttachOutcome::Attached)
        }
        PollOutcome::Elapsed(waited) => Err(BootstrapError::AttachTimeout {
            volume_id: volume.volume_id.clone(),
            waited,
        }),
    }
}

async fn attachment_ready(
    api: &dyn VolumeApi,
    volume_id: &str,
    instance_id: &str,
) -> Result<Option<()>, BootstrapError> {
    let current = api.describe_volume(volume_id).await?;
    match current.attachment_to(instance_id) {
        Some(attachment) => debug!("Volume {} is {}", volume_id, attachment.state),
        None => debug!("Volume {} has no attachment yet", volume_id),
    }
    Ok(current.is_attached_to(instance_id).then_some(()))
}

async fn device_present(device: &Path) -> Result<Option<()>, BootstrapError> {
    Ok(fs::try_exists(device).await?.then_some(()))
}

/// Wait for the block device node of an attached volume to show up
pub async fn wait_for_device(device: &Path, policy: PollPolicy) -> Result<(), BootstrapError> {
    let outcome = poll_until(policy, move || device_present(device)).await?;

    match outcome {
        PollOutcome::Ready(()) => {
            debug!("Block device {} present", device.display());
            Ok(())
        }
        PollOutcome::Elapsed(waited) => Err(BootstrapError::DeviceTimeout {
            device: device.to_path_buf(),
            waited,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::VolumeAttachment;
    use crate::cloud::mock::MockVolumes;
    use std::time::Duration;

    fn fast_policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(2), Duration::from_millis(200))
    }

    fn volume() -> VolumeDescriptor {
        MockVolumes::available_volume("vol-1", "etcd-data-1", "eu-west-1a")
    }

    fn attached_to(instance_id: &str, state: AttachmentState) -> VolumeDescriptor {
        VolumeDescriptor {
            state: "in-use".to_string(),
            attachments: vec![VolumeAttachment {
                instance_id: instance_id.to_string(),
                device: "/dev/xvdf".to_string(),
                state,
            }],
            ..volume()
        }
    }

    #[tokio::test]
    async fn test_attach_polls_until_attached() {
        let api = MockVolumes::new().with_volume(volume()).with_attach_states(vec![
            AttachmentState::Attaching,
            AttachmentState::Attaching,
            AttachmentState::Attached,
        ]);

        let outcome = attach_volume(&api, "i-self", &volume(), "/dev/xvdf", fast_policy())
            .await
            .unwrap();

        assert_eq!(outcome, AttachOutcome::Attached);
        assert_eq!(
            api.attach_calls(),
            vec![("vol-1".to_string(), "i-self".to_string(), "/dev/xvdf".to_string())]
        );
        assert_eq!(api.describe_calls(), 3);
    }

    #[tokio::test]
    async fn test_attach_timeout() {
        let api = MockVolumes::new()
            .with_volume(volume())
            .with_attach_states(vec![AttachmentState::Attaching]);

        let policy = PollPolicy::new(Duration::from_millis(2), Duration::from_millis(20));
        let result = attach_volume(&api, "i-self", &volume(), "/dev/xvdf", policy).await;

        assert!(matches!(result, Err(BootstrapError::AttachTimeout { .. })));
        assert!(api.describe_calls() >= 2);
    }

    #[tokio::test]
    async fn test_attach_rejected_by_api() {
        let api = MockVolumes::new()
            .with_volume(volume())
            .with_attach_error("VolumeInUse");

        let result = attach_volume(&api, "i-self", &volume(), "/dev/xvdf", fast_policy()).await;

        assert!(matches!(result, Err(BootstrapError::AttachRejected { .. })));
        assert_eq!(api.describe_calls(), 0);
    }

    #[tokio::test]
    async fn test_attached_elsewhere_is_rejected_without_api_call() {
        let held = attached_to("i-other", AttachmentState::Attached);
        let api = MockVolumes::new().with_volume(held.clone());

        let result = attach_volume(&api, "i-self", &held, "/dev/xvdf", fast_policy()).await;

        match result {
            Err(BootstrapError::AttachRejected { message, .. }) => {
                assert!(message.contains("i-other"));
            }
            other => panic!("Expected AttachRejected, got {:?}", other),
        }
        assert!(api.attach_calls().is_empty());
    }

    #[tokio::test]
    async fn test_already_attached_is_noop() {
        let ours = attached_to("i-self", AttachmentState::Attached);
        let api = MockVolumes::new().with_volume(ours.clone());

        let outcome = attach_volume(&api, "i-self", &ours, "/dev/xvdf", fast_policy())
            .await
            .unwrap();

        assert_eq!(outcome, AttachOutcome::AlreadyAttached);
        assert!(api.attach_calls().is_empty());
        assert_eq!(api.describe_calls(), 0);
    }

    #[tokio::test]
    async fn test_own_attachment_in_flight_is_polled() {
        let ours = attached_to("i-self", AttachmentState::Attaching);
        let api = MockVolumes::new().with_volume(attached_to("i-self", AttachmentState::Attached));

        let outcome = attach_volume(&api, "i-self", &ours, "/dev/xvdf", fast_policy())
            .await
            .unwrap();

        assert_eq!(outcome, AttachOutcome::Attached);
        assert!(api.attach_calls().is_empty());
    }

    #[tokio::test]
    async fn test_own_detached_attachment_is_reattached() {
        let stale = attached_to("i-self", AttachmentState::Detached);
        let api = MockVolumes::new().with_volume(stale.clone());

        let outcome = attach_volume(&api, "i-self", &stale, "/dev/xvdf", fast_policy())
            .await
            .unwrap();

        assert_eq!(outcome, AttachOutcome::Attached);
        assert_eq!(
            api.attach_calls(),
            vec![("vol-1".to_string(), "i-self".to_string(), "/dev/xvdf".to_string())]
        );
    }

    #[tokio::test]
    async fn test_own_detaching_attachment_is_rejected() {
        let leaving = attached_to("i-self", AttachmentState::Detaching);
        let api = MockVolumes::new().with_volume(leaving.clone());

        let result = attach_volume(&api, "i-self", &leaving, "/dev/xvdf", fast_policy()).await;

        match result {
            Err(BootstrapError::AttachRejected { message, .. }) => {
                assert!(message.contains("detaching"));
            }
            other => panic!("Expected AttachRejected, got {:?}", other),
        }
        assert!(api.attach_calls().is_empty());
        assert_eq!(api.describe_calls(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_device_present() {
        let file = tempfile::NamedTempFile::new().unwrap();
        wait_for_device(file.path(), fast_policy()).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_device_timeout() {
        let policy = PollPolicy::new(Duration::from_millis(2), Duration::from_millis(10));
        let result = wait_for_device(Path::new("/dev/does-not-exist-nb"), policy).await;
        assert!(matches!(result, Err(BootstrapError::DeviceTimeout { .. })));
    }

    #[tokio::test]
    async fn test_wait_for_device_stat_error_is_not_a_timeout() {
        // a regular file as parent makes the lookup fail with ENOTDIR
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = file.path().join("nvme1n1");
        let policy = PollPolicy::new(Duration::from_millis(2), Duration::from_secs(30));

        let result = wait_for_device(&device, policy).await;
        assert!(matches!(result, Err(BootstrapError::Io(_))));
    }
}
