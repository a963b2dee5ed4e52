//! Mock cloud APIs for testing
//!
//! Both mocks record every call so tests can assert on what reached the "API".

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    AttachmentState, DnsApi, RecordChange, VolumeApi, VolumeAttachment, VolumeDescriptor,
};
use crate::BootstrapError;

/// Mock compute API
///
/// After an accepted attach, `describe_volume` reports the attachment in the
/// configured sequence of states; the last state repeats forever. Lookups
/// through `find_volumes` see the most recently reported state.
#[derive(Debug, Default)]
pub struct MockVolumes {
    volumes: Vec<VolumeDescriptor>,
    attach_error: Option<String>,
    attach_states: Mutex<VecDeque<AttachmentState>>,
    /// Volume id and attachment created by the last accepted attach
    attached: Mutex<Option<(String, VolumeAttachment)>>,
    find_calls: Mutex<usize>,
    attach_calls: Mutex<Vec<(String, String, String)>>,
    describe_calls: Mutex<usize>,
}

impl MockVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume to the inventory
    pub fn with_volume(mut self, volume: VolumeDescriptor) -> Self {
        self.volumes.push(volume);
        self
    }

    /// Reject attach requests with this message
    pub fn with_attach_error(mut self, error: &str) -> Self {
        self.attach_error = Some(error.to_string());
        self
    }

    /// States reported by successive polls after attach
    pub fn with_attach_states(self, states: Vec<AttachmentState>) -> Self {
        *self.attach_states.lock().unwrap() = states.into();
        self
    }

    /// Tagged volume in a zone, not attached anywhere
    pub fn available_volume(volume_id: &str, name: &str, zone: &str) -> VolumeDescriptor {
        VolumeDescriptor {
            volume_id: volume_id.to_string(),
            state: "available".to_string(),
            availability_zone: zone.to_string(),
            name: Some(name.to_string()),
            attachments: Vec::new(),
        }
    }

    pub fn find_calls(&self) -> usize {
        *self.find_calls.lock().unwrap()
    }

    /// `(volume_id, instance_id, device)` of every attach request
    pub fn attach_calls(&self) -> Vec<(String, String, String)> {
        self.attach_calls.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        *self.describe_calls.lock().unwrap()
    }

    fn next_attach_state(&self) -> AttachmentState {
        let mut states = self.attach_states.lock().unwrap();
        match states.len() {
            0 => AttachmentState::Attached,
            1 => states[0].clone(),
            _ => states.pop_front().unwrap_or(AttachmentState::Attached),
        }
    }
}

#[async_trait]
impl VolumeApi for MockVolumes {
    async fn find_volumes(
        &self,
        name: &str,
        zone: &str,
    ) -> Result<Vec<VolumeDescriptor>, BootstrapError> {
        *self.find_calls.lock().unwrap() += 1;
        let attached = self.attached.lock().unwrap().clone();
        Ok(self
            .volumes
            .iter()
            .filter(|v| v.name.as_deref() == Some(name) && v.availability_zone == zone)
            .map(|v| overlay(v.clone(), attached.as_ref()))
            .collect())
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescriptor, BootstrapError> {
        *self.describe_calls.lock().unwrap() += 1;

        let volume = self
            .volumes
            .iter()
            .find(|v| v.volume_id == volume_id)
            .cloned()
            .ok_or_else(|| BootstrapError::Cloud(format!("Volume {} disappeared", volume_id)))?;

        let mut attached = self.attached.lock().unwrap();
        if let Some((id, attachment)) = attached.as_mut() {
            if *id == volume_id {
                attachment.state = self.next_attach_state();
            }
        }
        Ok(overlay(volume, attached.as_ref()))
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> Result<(), BootstrapError> {
        self.attach_calls.lock().unwrap().push((
            volume_id.to_string(),
            instance_id.to_string(),
            device.to_string(),
        ));

        if let Some(error) = &self.attach_error {
            return Err(BootstrapError::AttachRejected {
                volume_id: volume_id.to_string(),
                message: error.clone(),
            });
        }

        *self.attached.lock().unwrap() = Some((
            volume_id.to_string(),
            VolumeAttachment {
                instance_id: instance_id.to_string(),
                device: device.to_string(),
                state: AttachmentState::Attaching,
            },
        ));
        Ok(())
    }
}

fn overlay(
    mut volume: VolumeDescriptor,
    attached: Option<&(String, VolumeAttachment)>,
) -> VolumeDescriptor {
    if let Some((id, attachment)) = attached {
        if *id == volume.volume_id {
            volume.state = "in-use".to_string();
            volume.attachments = vec![attachment.clone()];
        }
    }
    volume
}

/// Mock DNS API
#[derive(Debug, Default)]
pub struct MockDns {
    error: Option<String>,
    changes: Mutex<Vec<RecordChange>>,
}

impl MockDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every submission with this message
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Every change submitted so far
    pub fn changes(&self) -> Vec<RecordChange> {
        self.changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsApi for MockDns {
    async fn submit_change(&self, change: &RecordChange) -> Result<(), BootstrapError> {
        self.changes.lock().unwrap().push(change.clone());
        match &self.error {
            Some(error) => Err(BootstrapError::Dns(error.clone())),
            None => Ok(()),
        }
    }
}
