//! Config loader
//!
//! Builds the effective config: defaults, then the YAML file (if any), then flags.

use super::{BootstrapConfig, ConfigOverrides};
use crate::BootstrapError;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Load, merge and validate the configuration for this run
pub async fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<BootstrapConfig, BootstrapError> {
    let mut config = match path {
        Some(path) => load_config_file(path).await?,
        None => {
            debug!("No config file given, starting from defaults");
            BootstrapConfig::default()
        }
    };

    config.apply_overrides(overrides);
    config.validate()?;

    debug!("Effective config: {:?}", config);
    Ok(config)
}

/// Load a config file
///
/// Unlike optional drop-ins, an explicitly named file must exist and parse.
async fn load_config_file(path: &Path) -> Result<BootstrapConfig, BootstrapError> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        BootstrapError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let config = BootstrapConfig::from_yaml(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
