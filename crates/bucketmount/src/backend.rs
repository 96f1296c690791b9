//! Backend selection and the mounter capability.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{MountError, OptionsWarning};
use crate::keys::{self, SecretMap};
use crate::lifecycle::MountRuntime;
use crate::rclone::RcloneMounter;
use crate::s3fs::S3fsMounter;
use crate::settings::MounterSettings;

/// FUSE helper used to mount a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// s3fs-fuse
    #[default]
    S3fs,
    /// `rclone mount`
    Rclone,
}

impl BackendType {
    /// All backends, in preference order.
    pub const ALL: [BackendType; 2] = [BackendType::S3fs, BackendType::Rclone];

    /// Selector value as written in attributes and secrets.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendType::S3fs => "s3fs",
            BackendType::Rclone => "rclone",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            BackendType::S3fs => "s3fs-fuse",
            BackendType::Rclone => "rclone mount",
        }
    }

    /// Map a selector value onto a backend; unrecognized values fall back
    /// to s3fs.
    pub fn from_selector(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::debug!(value, "unrecognized mounter, using s3fs");
            BackendType::S3fs
        })
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a selector value that names no backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mounter: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendType {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3fs" => Ok(BackendType::S3fs),
            "rclone" => Ok(BackendType::Rclone),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

/// Pick the backend for a volume.
///
/// A `mounter` key in `attributes` wins whenever it is present, even if
/// its value is unrecognized; otherwise the secret's `mounter` is used.
/// Absent and unrecognized values select s3fs.
pub fn select_backend(attributes: &SecretMap, secrets: &SecretMap) -> BackendType {
    attributes
        .get(keys::MOUNTER)
        .or_else(|| secrets.get(keys::MOUNTER))
        .map_or(BackendType::S3fs, |value| BackendType::from_selector(value))
}

/// Mounts and unmounts one volume with one backend.
///
/// Implementations are built per volume with an already resolved
/// configuration and hold no state between calls.
pub trait Mounter: Send + Sync {
    /// Backend this mounter drives.
    fn backend(&self) -> BackendType;

    /// Mount the bucket at `target`.
    ///
    /// `source` is the caller's staging path; helpers mount the bucket
    /// directly, so backends only log it.
    fn mount(&self, source: &str, target: &Path) -> Result<(), MountError>;

    /// Unmount `target` and remove it. Succeeds if nothing is mounted.
    fn unmount(&self, target: &Path) -> Result<(), MountError>;

    /// Problem found in the `mountOptions` override while resolving.
    fn options_warning(&self) -> Option<&OptionsWarning> {
        None
    }
}

/// Builds a [`Mounter`] for a volume.
pub trait NewMounter: Send + Sync {
    /// Build a mounter from the volume's attributes, secrets and mount flags.
    fn new_mounter(
        &self,
        attributes: &SecretMap,
        secrets: &SecretMap,
        mount_flags: &[String],
    ) -> Result<Box<dyn Mounter>, MountError>;
}

/// The production factory: s3fs or rclone mounters over a shared runtime.
#[derive(Debug, Clone)]
pub struct MounterFactory {
    runtime: MountRuntime,
}

impl MounterFactory {
    /// Factory over an explicit runtime.
    pub fn new(runtime: MountRuntime) -> Self {
        Self { runtime }
    }

    /// Factory spawning real helpers on the real host.
    pub fn system(settings: MounterSettings) -> Self {
        Self::new(MountRuntime::system(settings))
    }

    /// Runtime handed to every mounter.
    pub fn runtime(&self) -> &MountRuntime {
        &self.runtime
    }
}

impl NewMounter for MounterFactory {
    fn new_mounter(
        &self,
        attributes: &SecretMap,
        secrets: &SecretMap,
        mount_flags: &[String],
    ) -> Result<Box<dyn Mounter>, MountError> {
        let backend = select_backend(attributes, secrets);
        tracing::info!(%backend, "creating mounter");

        let mounter: Box<dyn Mounter> = match backend {
            BackendType::S3fs => Box::new(S3fsMounter::new(
                secrets,
                mount_flags,
                self.runtime.clone(),
            )),
            BackendType::Rclone => Box::new(RcloneMounter::new(
                secrets,
                mount_flags,
                self.runtime.clone(),
            )),
        };
        Ok(mounter)
    }
}
