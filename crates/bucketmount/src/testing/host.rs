//! In-memory mount table over the real filesystem.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::errno::Errno;
use parking_lot::Mutex;

use crate::host::{MountHost, UnmountMode};

type ProbeError = Box<dyn Fn() -> io::Error + Send + Sync>;

/// A host call worth asserting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// `unmount(path, mode)` was attempted.
    Unmount(PathBuf, UnmountMode),
}

#[derive(Default)]
struct State {
    mounted: HashSet<PathBuf>,
    corrupted: HashMap<PathBuf, i32>,
    probes: u32,
    failing_probes: u32,
    probe_error: Option<ProbeError>,
    unmount_failures: Vec<(UnmountMode, i32)>,
    calls: Vec<HostCall>,
}

/// [`MountHost`] double.
///
/// Directories are created and removed on the real filesystem (use a
/// `TempDir`); the mount table is simulated. A corrupted path fails `stat`
/// with its errno until a forced unmount clears it. Unmounting a path that
/// is neither mounted nor corrupted fails with `EINVAL`, like the kernel.
///
/// Clones share state, so a clone can be handed to a [`ScriptedSpawner`]
/// hook to "mount" the target when the helper exits.
///
/// [`ScriptedSpawner`]: super::ScriptedSpawner
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    /// Empty mount table, no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as a healthy mount point.
    pub fn set_mounted(&self, path: impl AsRef<Path>) {
        self.state.lock().mounted.insert(path.as_ref().to_path_buf());
    }

    /// Mark `path` as a dead mount whose `stat` fails with `errno`.
    pub fn set_corrupted(&self, path: impl AsRef<Path>, errno: i32) {
        self.state
            .lock()
            .corrupted
            .insert(path.as_ref().to_path_buf(), errno);
    }

    /// Fail the next `count` mount point probes with errors from `make`.
    pub fn fail_probes(&self, count: u32, make: impl Fn() -> io::Error + Send + Sync + 'static) {
        let mut state = self.state.lock();
        state.failing_probes = count;
        state.probe_error = Some(Box::new(make));
    }

    /// Make every unmount in `mode` fail with `errno`.
    pub fn fail_unmount(&self, mode: UnmountMode, errno: i32) {
        self.state.lock().unmount_failures.push((mode, errno));
    }

    /// Whether `path` is currently in the simulated mount table.
    pub fn is_mounted(&self, path: impl AsRef<Path>) -> bool {
        let state = self.state.lock();
        let path = path.as_ref();
        state.mounted.contains(path) || state.corrupted.contains_key(path)
    }

    /// Number of mount point probes so far.
    pub fn probe_count(&self) -> u32 {
        self.state.lock().probes
    }

    /// Unmount attempts, in order.
    pub fn unmount_calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }
}

impl MountHost for FakeHost {
    fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        let mut state = self.state.lock();
        state.probes += 1;
        if state.failing_probes > 0 {
            state.failing_probes -= 1;
            if let Some(make) = &state.probe_error {
                return Err(make());
            }
        }
        Ok(state.mounted.contains(path) || state.corrupted.contains_key(path))
    }

    fn stat(&self, path: &Path) -> io::Result<()> {
        if let Some(errno) = self.state.lock().corrupted.get(path) {
            return Err(io::Error::from_raw_os_error(*errno));
        }
        fs::metadata(path).map(|_| ())
    }

    fn unmount(&self, path: &Path, mode: UnmountMode) -> io::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::Unmount(path.to_path_buf(), mode));

        if let Some((_, errno)) = state.unmount_failures.iter().find(|(m, _)| *m == mode) {
            return Err(io::Error::from_raw_os_error(*errno));
        }
        let was_mounted = state.mounted.remove(path);
        let was_corrupted = state.corrupted.remove(path).is_some();
        if was_mounted || was_corrupted {
            Ok(())
        } else {
            Err(io::Error::from(Errno::EINVAL))
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        if self.is_mounted(path) {
            return Err(io::Error::from(Errno::EBUSY));
        }
        fs::remove_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}
