//! Operating system seam for mount lifecycle operations.
//!
//! Everything a mounter does to the host besides spawning the helper goes
//! through [`MountHost`]: probing the mount table, stat-ing targets,
//! unmounting and managing directories. [`SystemHost`] is the real
//! implementation; tests substitute `testing::FakeHost`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::errno::Errno;
use nix::mount::{umount2, MntFlags};

use crate::mount_table::{find_mount, read_mount_table, PROC_MOUNTS};

/// How hard to try when unmounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountMode {
    /// Plain unmount; fails if the filesystem is busy.
    Normal,
    /// Lazy detach: the mount leaves the namespace immediately even if the
    /// helper is gone or files are still open.
    Forced,
}

/// Host primitives used by mounters.
pub trait MountHost: Send + Sync {
    /// Whether `path` is currently a mount point.
    fn is_mount_point(&self, path: &Path) -> io::Result<bool>;

    /// `stat` the path; the error carries the raw OS code.
    fn stat(&self, path: &Path) -> io::Result<()>;

    /// Unmount `path`.
    fn unmount(&self, path: &Path, mode: UnmountMode) -> io::Result<()>;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove the empty directory at `path`.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove `path` and everything under it.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real host: `/proc/self/mounts`, `umount2(2)` and `std::fs`.
#[derive(Debug, Clone)]
pub struct SystemHost {
    mount_table: PathBuf,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS),
        }
    }
}

impl SystemHost {
    /// Create a host reading the current mount namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read mount state from another table (e.g. a host's `/proc/1/mounts`).
    #[must_use]
    pub fn with_mount_table(mut self, table: impl Into<PathBuf>) -> Self {
        self.mount_table = table.into();
        self
    }
}

impl MountHost for SystemHost {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let mounts = read_mount_table(&self.mount_table)?;
        Ok(find_mount(&mounts, path).is_some())
    }

    fn stat(&self, path: &Path) -> io::Result<()> {
        fs::metadata(path).map(|_| ())
    }

    fn unmount(&self, path: &Path, mode: UnmountMode) -> io::Result<()> {
        let flags = match mode {
            UnmountMode::Normal => MntFlags::empty(),
            UnmountMode::Forced => MntFlags::MNT_DETACH,
        };
        match umount2(path, flags) {
            Ok(()) => Ok(()),
            // Without CAP_SYS_ADMIN only the setuid fusermount may unmount.
            Err(Errno::EPERM) => fusermount_unmount(path, mode).map_err(|e| {
                tracing::debug!(path = %path.display(), error = %e, "fusermount fallback failed");
                io::Error::from(Errno::EPERM)
            }),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

fn fusermount_unmount(path: &Path, mode: UnmountMode) -> io::Result<()> {
    let mut cmd = Command::new("fusermount");
    cmd.arg("-u");
    if mode == UnmountMode::Forced {
        cmd.arg("-z");
    }
    let output = cmd.arg(path).output()?;

    if output.status.success() {
        tracing::debug!(path = %path.display(), ?mode, "unmounted via fusermount");
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(io::Error::other(stderr.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plain_directory_is_not_a_mount_point() {
        let temp = TempDir::new().unwrap();
        assert!(!SystemHost::new().is_mount_point(temp.path()).unwrap());
    }

    #[test]
    fn test_root_is_a_mount_point() {
        assert!(SystemHost::new().is_mount_point(Path::new("/")).unwrap());
    }

    #[test]
    fn test_custom_mount_table() {
        let temp = TempDir::new().unwrap();
        let table = temp.path().join("mounts");
        fs::write(&table, "s3fs /mnt/cos fuse.s3fs rw 0 0\n").unwrap();

        let host = SystemHost::new().with_mount_table(&table);
        assert!(host.is_mount_point(Path::new("/mnt/cos")).unwrap());
        assert!(!host.is_mount_point(Path::new("/")).unwrap());
    }

    #[test]
    fn test_missing_mount_table_is_an_error() {
        let host = SystemHost::new().with_mount_table("/nonexistent/mounts-12345");
        assert!(host.is_mount_point(Path::new("/")).is_err());
    }

    #[test]
    fn test_unmount_of_plain_directory_fails() {
        let temp = TempDir::new().unwrap();
        assert!(SystemHost::new()
            .unmount(temp.path(), UnmountMode::Normal)
            .is_err());
    }
}
