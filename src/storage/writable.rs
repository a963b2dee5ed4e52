//! Write check for the mounted volume

use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::BootstrapError;

const PROBE_PAYLOAD: &[u8] = b"node-bootstrap write check\n";

/// Prove the mount point accepts writes
///
/// Writes, syncs, reads back and removes a uniquely named hidden file.
pub async fn ensure_writable(mount_point: &Path) -> Result<(), BootstrapError> {
    let probe = mount_point.join(format!(".node-bootstrap-{}", Uuid::new_v4()));
    let fail = |step: &str, e: std::io::Error| {
        BootstrapError::write_check(&probe, format!("{}: {}", step, e))
    };

    debug!("Write check using {}", probe.display());

    let mut file = fs::File::create(&probe)
        .await
        .map_err(|e| fail("create", e))?;
    file.write_all(PROBE_PAYLOAD)
        .await
        .map_err(|e| fail("write", e))?;
    file.sync_all().await.map_err(|e| fail("sync", e))?;
    drop(file);

    let contents = fs::read(&probe).await.map_err(|e| fail("read back", e))?;
    if contents != PROBE_PAYLOAD {
        // best effort; the mismatch is the error worth reporting
        let _ = fs::remove_file(&probe).await;
        return Err(BootstrapError::write_check(&probe, "read back different contents"));
    }

    fs::remove_file(&probe).await.map_err(|e| fail("remove", e))?;
    if fs::try_exists(&probe).await.map_err(|e| fail("stat", e))? {
        return Err(BootstrapError::write_check(&probe, "file still present after removal"));
    }

    Ok(())
}
