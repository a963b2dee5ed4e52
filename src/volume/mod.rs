//! Data volume lookup and attachment

pub mod attach;
pub mod poll;

use tracing::{debug, info};

use crate::BootstrapError;
use crate::cloud::{VolumeApi, VolumeDescriptor};

pub use attach::{AttachOutcome, attach_volume, wait_for_device};

/// Find the one volume tagged `name` in `zone`
///
/// Zero and multiple matches are distinct errors; an ambiguous name is never
/// resolved by picking one of the candidates.
pub async fn locate_volume(
    api: &dyn VolumeApi,
    name: &str,
    zone: &str,
) -> Result<VolumeDescriptor, BootstrapError> {
    if name.trim().is_empty() {
        return Err(BootstrapError::Config(
            "volume name must not be empty".to_string(),
        ));
    }

    let mut volumes = api.find_volumes(name, zone).await?;
    debug!("Found {} candidate volumes for '{}' in {}", volumes.len(), name, zone);

    match volumes.len() {
        0 => Err(BootstrapError::VolumeNotFound {
            name: name.to_string(),
            zone: zone.to_string(),
        }),
        1 => {
            let volume = volumes.remove(0);
            info!("Located volume {} ({}) for '{}'", volume.volume_id, volume.state, name);
            Ok(volume)
        }
        _ => Err(BootstrapError::VolumeAmbiguous {
            name: name.to_string(),
            zone: zone.to_string(),
            volume_ids: volumes.into_iter().map(|v| v.volume_id).collect(),
        }),
    }
}
