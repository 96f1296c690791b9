//! Settings and volume files.
//!
//! Settings (`--config`) deserialize straight into [`MounterSettings`]. A
//! volume file describes one bucket the way a provisioner would hand it
//! over:
//!
//! ```toml
//! mount_flags = ["ro"]
//!
//! [attributes]
//! mounter = "rclone"
//!
//! [secrets]
//! bucketName = "logs"
//! cosEndpoint = "https://s3.us-south.cloud-object-storage.appdomain.cloud"
//! apiKey = "..."
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use bucketmount::{MounterSettings, SecretMap};

/// One volume: attributes, secret bundle and per-call mount flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeSpec {
    pub attributes: SecretMap,
    pub secrets: SecretMap,
    pub mount_flags: Vec<String>,
}

/// Load settings from `path`, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<MounterSettings> {
    let Some(path) = path else {
        return Ok(MounterSettings::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    let settings = toml::from_str(&content)
        .with_context(|| format!("Invalid settings file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?settings, "loaded settings");
    Ok(settings)
}

/// Load a volume file.
pub fn load_volume(path: &Path) -> Result<VolumeSpec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read volume file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid volume file: {}", path.display()))
}
