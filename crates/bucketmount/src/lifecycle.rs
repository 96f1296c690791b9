//! Mount and unmount steps shared by every backend.
//!
//! A backend only decides *what* to run (argv and credential file); the
//! steps around it live here:
//!
//! - [`prepare_target`]: create the target, force away a dead mount, or
//!   report a healthy existing mount for reuse
//! - [`run_helper`]: invoke the helper, then wait for the mount table
//! - [`teardown`]: idempotent unmount plus target directory removal
//!
//! Mount point state is always re-derived from the host, never cached.

use std::fmt;
use std::fs;
use std::io;
use std::path::{self, Component, Path, PathBuf};
use std::sync::Arc;

use nix::errno::Errno;
use sha2::{Digest, Sha256};

use crate::error::MountError;
use crate::health::{classify_stat, is_corrupted_mount, PathState};
use crate::host::{MountHost, SystemHost, UnmountMode};
use crate::process::{HelperInvoker, ProcessSpawner, SystemSpawner};
use crate::readiness::wait_for_mount;
use crate::settings::MounterSettings;

/// Capabilities and settings a mounter runs with.
///
/// Cloning is cheap; every mounter built by a factory holds its own clone.
#[derive(Clone)]
pub struct MountRuntime {
    settings: MounterSettings,
    invoker: HelperInvoker,
    host: Arc<dyn MountHost>,
}

impl fmt::Debug for MountRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountRuntime")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MountRuntime {
    /// Build a runtime from explicit capabilities.
    pub fn new(
        settings: MounterSettings,
        spawner: Arc<dyn ProcessSpawner>,
        host: Arc<dyn MountHost>,
    ) -> Self {
        Self {
            settings,
            invoker: HelperInvoker::new(spawner),
            host,
        }
    }

    /// Runtime that spawns real processes and talks to the real host.
    pub fn system(settings: MounterSettings) -> Self {
        Self::new(settings, Arc::new(SystemSpawner), Arc::new(SystemHost::new()))
    }

    /// Settings this runtime was built with.
    pub fn settings(&self) -> &MounterSettings {
        &self.settings
    }

    /// Host primitives.
    pub fn host(&self) -> &dyn MountHost {
        self.host.as_ref()
    }

    /// Metadata directory for `target`: `<meta_root>/<sha256(target)>`.
    pub fn meta_dir(&self, target: &Path) -> PathBuf {
        meta_dir(&self.settings.meta_root, target)
    }
}

/// `<root>/<hex sha256 of the target path>`.
pub fn meta_dir(root: &Path, target: &Path) -> PathBuf {
    let digest = Sha256::digest(target.as_os_str().as_encoded_bytes());
    root.join(format!("{digest:x}"))
}

/// `target` as the kernel spells it in the mount table.
///
/// Relative paths are made absolute against the working directory. The
/// parent is canonicalized when it exists, which also resolves `..` and
/// symlinks; otherwise `.` and `..` are resolved lexically. The target
/// itself is never stat-ed, so a dead mount cannot block this.
pub fn absolute_target(target: &Path) -> Result<PathBuf, MountError> {
    let absolute = path::absolute(target).map_err(|source| MountError::Target {
        path: target.to_path_buf(),
        source,
    })?;

    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name())
        && let Ok(parent) = fs::canonicalize(parent)
    {
        return Ok(parent.join(name));
    }
    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// What [`prepare_target`] found at the mount target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// The target is an empty slot ready for a new mount.
    Ready,
    /// A healthy mount is already in place.
    AlreadyMounted,
}

/// Make `target` ready to receive a mount.
///
/// A missing target is created. A corrupted one gets a forced unmount
/// first. A healthy existing mount is left alone and reported.
pub fn prepare_target(host: &dyn MountHost, target: &Path) -> Result<TargetState, MountError> {
    let target_error = |source| MountError::Target {
        path: target.to_path_buf(),
        source,
    };

    match classify_stat(host.stat(target)).map_err(target_error)? {
        PathState::Missing => {
            host.create_dir_all(target).map_err(target_error)?;
            tracing::debug!(target = %target.display(), "created mount target");
            Ok(TargetState::Ready)
        }
        PathState::Corrupted(err) => {
            tracing::warn!(
                target = %target.display(),
                error = %err,
                "stale mount found at target, forcing unmount before remount"
            );
            force_unmount(host, target)?;
            Ok(TargetState::Ready)
        }
        PathState::Present => {
            if host.is_mount_point(target).map_err(target_error)? {
                Ok(TargetState::AlreadyMounted)
            } else {
                Ok(TargetState::Ready)
            }
        }
    }
}

/// Create the metadata directory holding the credential file.
pub fn prepare_meta_dir(host: &dyn MountHost, dir: &Path) -> Result<(), MountError> {
    host.create_dir_all(dir).map_err(|source| MountError::MetadataDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Run the helper and wait for `target` to be mounted.
///
/// If the helper itself fails, the credentials in `meta_dir` are removed;
/// nothing will ever read them. On a readiness timeout they stay, since a
/// slow helper may still be starting up.
pub fn run_helper(
    runtime: &MountRuntime,
    target: &Path,
    command: &str,
    args: &[String],
    meta_dir: &Path,
) -> Result<(), MountError> {
    if let Err(err) = runtime.invoker.invoke_mount(target, command, args) {
        remove_meta_dir(runtime.host(), meta_dir);
        return Err(err);
    }

    let settings = runtime.settings();
    wait_for_mount(
        runtime.host(),
        target,
        settings.mount_timeout,
        settings.poll_interval,
    )?;

    tracing::info!(target = %target.display(), command, "mounted");
    Ok(())
}

/// Unmount `target` and remove its directory.
///
/// - missing target: nothing to do
/// - corrupted target: forced unmount
/// - mounted target: normal unmount, escalated to forced if it reports a
///   stale mount
/// - plain directory: no unmount
///
/// `EINVAL` from the kernel means "not a mount point" and counts as success.
/// Failing to remove the directory afterwards is logged, not returned.
pub fn teardown(host: &dyn MountHost, target: &Path) -> Result<(), MountError> {
    match classify_stat(host.stat(target)) {
        Ok(PathState::Missing) => {
            tracing::debug!(target = %target.display(), "target already gone");
            return Ok(());
        }
        Ok(PathState::Corrupted(err)) => {
            tracing::warn!(target = %target.display(), error = %err, "unmounting stale mount");
            force_unmount(host, target)?;
        }
        // A FUSE mount without allow_other answers EACCES even to root,
        // so a failed stat still goes through the mount table check.
        Ok(PathState::Present) | Err(_) => {
            let mounted = host.is_mount_point(target).unwrap_or_else(|e| {
                tracing::warn!(target = %target.display(), error = %e, "mount table probe failed, attempting unmount");
                true
            });
            if mounted {
                unmount_with_escalation(host, target)?;
            } else {
                tracing::debug!(target = %target.display(), "target is not mounted");
            }
        }
    }

    match host.remove_dir(target) {
        Ok(()) => tracing::debug!(target = %target.display(), "removed mount target"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            target = %target.display(),
            error = %e,
            "unmounted but could not remove target directory"
        ),
    }
    Ok(())
}

fn unmount_with_escalation(host: &dyn MountHost, target: &Path) -> Result<(), MountError> {
    match host.unmount(target, UnmountMode::Normal) {
        Ok(()) => {
            tracing::info!(target = %target.display(), "unmounted");
            Ok(())
        }
        Err(e) if is_not_mounted(&e) => {
            tracing::debug!(target = %target.display(), "already unmounted");
            Ok(())
        }
        Err(e) if is_corrupted_mount(Some(&e)) => {
            tracing::warn!(target = %target.display(), error = %e, "mount is stale, forcing unmount");
            force_unmount(host, target)
        }
        Err(source) => Err(MountError::Unmount {
            path: target.to_path_buf(),
            forced: false,
            source,
        }),
    }
}

fn force_unmount(host: &dyn MountHost, target: &Path) -> Result<(), MountError> {
    match host.unmount(target, UnmountMode::Forced) {
        Ok(()) => {
            tracing::info!(target = %target.display(), "force unmounted");
            Ok(())
        }
        Err(e) if is_not_mounted(&e) => Ok(()),
        Err(source) => Err(MountError::Unmount {
            path: target.to_path_buf(),
            forced: true,
            source,
        }),
    }
}

fn is_not_mounted(err: &io::Error) -> bool {
    err.raw_os_error().map(Errno::from_raw) == Some(Errno::EINVAL)
}

/// Remove a metadata directory, logging rather than failing.
pub fn remove_meta_dir(host: &dyn MountHost, dir: &Path) {
    match host.remove_dir_all(dir) {
        Ok(()) => tracing::debug!(dir = %dir.display(), "removed metadata directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "failed to remove metadata directory"),
    }
}
