//! Node-level settings shared by every mounter the factory creates.
//!
//! Settings are loaded once by the caller (the CLI reads them from TOML) and
//! handed to [`MounterFactory`](crate::MounterFactory). Durations use
//! humantime syntax (`"10s"`, `"500ms"`).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::readiness::{DEFAULT_MOUNT_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Default root for per-target metadata (credential files).
pub const DEFAULT_META_ROOT: &str = "/var/lib/bucketmount";

/// Default s3fs options, applied before per-call mount flags.
pub const DEFAULT_S3FS_OPTIONS: &[&str] = &[
    "multipart_size=62",
    "max_dirty_data=51200",
    "parallel_count=8",
    "max_stat_cache_size=100000",
    "retries=5",
    "kernel_cache",
];

/// Default rclone options, applied before per-call mount flags.
pub const DEFAULT_RCLONE_OPTIONS: &[&str] = &[
    "vfs-cache-mode=writes",
    "dir-cache-time=5m",
    "low-level-retries=5",
];

fn owned(options: &[&str]) -> Vec<String> {
    options.iter().map(ToString::to_string).collect()
}

/// Settings for mount helpers and lifecycle timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MounterSettings {
    /// Directory holding one metadata directory per mount target.
    pub meta_root: PathBuf,

    /// s3fs executable (name resolved through `PATH`, or absolute).
    pub s3fs_command: String,

    /// rclone executable (name resolved through `PATH`, or absolute).
    pub rclone_command: String,

    /// How long to wait for the target to show up in the mount table.
    ///
    /// Default: 10 seconds.
    #[serde(with = "humantime_serde")]
    pub mount_timeout: Duration,

    /// Delay between readiness probes.
    ///
    /// Default: 500ms.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Options every s3fs mount starts from.
    pub s3fs_default_options: Vec<String>,

    /// Options every rclone mount starts from.
    pub rclone_default_options: Vec<String>,
}

impl Default for MounterSettings {
    fn default() -> Self {
        Self {
            meta_root: PathBuf::from(DEFAULT_META_ROOT),
            s3fs_command: "s3fs".to_string(),
            rclone_command: "rclone".to_string(),
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            s3fs_default_options: owned(DEFAULT_S3FS_OPTIONS),
            rclone_default_options: owned(DEFAULT_RCLONE_OPTIONS),
        }
    }
}

impl MounterSettings {
    /// Sets the metadata root directory.
    #[must_use]
    pub fn meta_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.meta_root = root.into();
        self
    }

    /// Sets the s3fs executable.
    #[must_use]
    pub fn s3fs_command(mut self, command: impl Into<String>) -> Self {
        self.s3fs_command = command.into();
        self
    }

    /// Sets the rclone executable.
    #[must_use]
    pub fn rclone_command(mut self, command: impl Into<String>) -> Self {
        self.rclone_command = command.into();
        self
    }

    /// Sets the readiness deadline.
    #[must_use]
    pub fn mount_timeout(mut self, timeout: Duration) -> Self {
        self.mount_timeout = timeout;
        self
    }

    /// Sets the delay between readiness probes.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MounterSettings::default();
        assert_eq!(settings.meta_root, PathBuf::from("/var/lib/bucketmount"));
        assert_eq!(settings.s3fs_command, "s3fs");
        assert_eq!(settings.rclone_command, "rclone");
        assert_eq!(settings.mount_timeout, Duration::from_secs(10));
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert!(settings.s3fs_default_options.contains(&"kernel_cache".to_string()));
    }

    #[test]
    fn test_builder_pattern() {
        let settings = MounterSettings::default()
            .meta_root("/tmp/meta")
            .s3fs_command("/usr/local/bin/s3fs")
            .mount_timeout(Duration::from_secs(30))
            .poll_interval(Duration::from_millis(100));
        assert_eq!(settings.meta_root, PathBuf::from("/tmp/meta"));
        assert_eq!(settings.s3fs_command, "/usr/local/bin/s3fs");
        assert_eq!(settings.mount_timeout, Duration::from_secs(30));
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: MounterSettings = toml::from_str(
            r#"
            meta_root = "/srv/meta"
            mount_timeout = "30s"
            poll_interval = "250ms"
            s3fs_default_options = ["retries=3"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.meta_root, PathBuf::from("/srv/meta"));
        assert_eq!(settings.mount_timeout, Duration::from_secs(30));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.s3fs_default_options, vec!["retries=3".to_string()]);
        assert_eq!(settings.rclone_command, "rclone");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: Result<MounterSettings, _> = toml::from_str("mount_timeot = \"1s\"");
        assert!(result.is_err());
    }
}
