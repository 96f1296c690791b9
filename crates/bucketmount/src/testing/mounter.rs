//! Mounter and factory doubles for callers of the crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendType, Mounter, NewMounter};
use crate::error::MountError;
use crate::keys::SecretMap;

type MountFn = Arc<dyn Fn(&str, &Path) -> Result<(), MountError> + Send + Sync>;
type UnmountFn = Arc<dyn Fn(&Path) -> Result<(), MountError> + Send + Sync>;

/// A call received by a [`FakeMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MounterCall {
    /// `mount(source, target)`
    #[allow(missing_docs)]
    Mount { source: String, target: PathBuf },
    /// `unmount(target)`
    #[allow(missing_docs)]
    Unmount { target: PathBuf },
}

/// [`Mounter`] whose behavior is supplied by closures.
///
/// By default both operations succeed. Clones share the call log.
#[derive(Clone)]
pub struct FakeMounter {
    backend: BackendType,
    on_mount: MountFn,
    on_unmount: UnmountFn,
    calls: Arc<Mutex<Vec<MounterCall>>>,
}

impl Default for FakeMounter {
    fn default() -> Self {
        Self::new(BackendType::S3fs)
    }
}

impl FakeMounter {
    /// A mounter for `backend` whose operations succeed.
    pub fn new(backend: BackendType) -> Self {
        Self {
            backend,
            on_mount: Arc::new(|_, _| Ok(())),
            on_unmount: Arc::new(|_| Ok(())),
            calls: Arc::default(),
        }
    }

    /// Answer `mount` calls with `f`.
    #[must_use]
    pub fn on_mount(
        mut self,
        f: impl Fn(&str, &Path) -> Result<(), MountError> + Send + Sync + 'static,
    ) -> Self {
        self.on_mount = Arc::new(f);
        self
    }

    /// Answer `unmount` calls with `f`.
    #[must_use]
    pub fn on_unmount(
        mut self,
        f: impl Fn(&Path) -> Result<(), MountError> + Send + Sync + 'static,
    ) -> Self {
        self.on_unmount = Arc::new(f);
        self
    }

    /// Calls received by this mounter and its clones.
    pub fn calls(&self) -> Vec<MounterCall> {
        self.calls.lock().clone()
    }
}

impl Mounter for FakeMounter {
    fn backend(&self) -> BackendType {
        self.backend
    }

    fn mount(&self, source: &str, target: &Path) -> Result<(), MountError> {
        self.calls.lock().push(MounterCall::Mount {
            source: source.to_string(),
            target: target.to_path_buf(),
        });
        (self.on_mount)(source, target)
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        self.calls.lock().push(MounterCall::Unmount {
            target: target.to_path_buf(),
        });
        (self.on_unmount)(target)
    }
}

/// One `new_mounter` request seen by a [`FakeMounterFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MounterRequest {
    /// Volume attributes
    pub attributes: SecretMap,
    /// Secret bundle
    pub secrets: SecretMap,
    /// Per-call mount flags
    pub mount_flags: Vec<String>,
}

/// [`NewMounter`] handing out clones of one [`FakeMounter`].
#[derive(Clone, Default)]
pub struct FakeMounterFactory {
    mounter: FakeMounter,
    requests: Arc<Mutex<Vec<MounterRequest>>>,
}

impl FakeMounterFactory {
    /// Factory handing out clones of `mounter`.
    pub fn new(mounter: FakeMounter) -> Self {
        Self {
            mounter,
            requests: Arc::default(),
        }
    }

    /// The mounter every request receives a clone of.
    pub fn mounter(&self) -> &FakeMounter {
        &self.mounter
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<MounterRequest> {
        self.requests.lock().clone()
    }
}

impl NewMounter for FakeMounterFactory {
    fn new_mounter(
        &self,
        attributes: &SecretMap,
        secrets: &SecretMap,
        mount_flags: &[String],
    ) -> Result<Box<dyn Mounter>, MountError> {
        self.requests.lock().push(MounterRequest {
            attributes: attributes.clone(),
            secrets: secrets.clone(),
            mount_flags: mount_flags.to_vec(),
        });
        Ok(Box::new(self.mounter.clone()))
    }
}
