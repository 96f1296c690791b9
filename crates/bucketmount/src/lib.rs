//! Mount lifecycle orchestration for FUSE object-storage helpers.
//!
//! This crate turns a volume's attributes and secret bundle into a running
//! s3fs or rclone mount, and tears it down again. It does not implement a
//! filesystem; it drives the external helper and watches the kernel mount
//! table.
//!
//! # Components
//!
//! ## Entry Points
//!
//! - [`NewMounter`] - Builds a [`Mounter`] for a volume ([`MounterFactory`]
//!   is the production implementation)
//! - [`Mounter`] - `mount` / `unmount` for one volume with one backend
//! - [`BackendType`] - s3fs or rclone, chosen by [`select_backend`]
//! - [`MountError`] - Error type for every lifecycle stage
//!
//! ## Lifecycle Stages
//!
//! - [`options`] - Secret bundle to [`MountConfig`] and helper options
//! - [`credentials`] - Owner-only credential files for the helper
//! - [`HelperInvoker`] - Runs the helper through a [`ProcessSpawner`]
//! - [`wait_for_mount`] - Bounded polling of the mount table
//! - [`is_corrupted_mount`] - Dead FUSE mount detection
//! - [`MountHost`] - Mount table, stat, unmount and directory primitives
//!
//! # Mount Flow
//!
//! 1. Probe the target: create it, force away a dead mount, or reuse a
//!    healthy one
//! 2. Write credentials into `<meta_root>/<sha256(target)>`
//! 3. Run the helper and wait for it to exit
//! 4. Poll the mount table until the target appears or the timeout expires
//!
//! Unmount is idempotent: a target that is already gone or not mounted is
//! a success, and the target directory is removed afterwards.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//! use bucketmount::{MounterFactory, MounterSettings, NewMounter};
//!
//! let factory = MounterFactory::system(MounterSettings::default());
//! let attributes = HashMap::from([("mounter".to_string(), "s3fs".to_string())]);
//! let secrets = HashMap::from([
//!     ("bucketName".to_string(), "logs".to_string()),
//!     ("cosEndpoint".to_string(), "https://s3.example.com".to_string()),
//!     ("apiKey".to_string(), "api-key".to_string()),
//! ]);
//!
//! let mounter = factory.new_mounter(&attributes, &secrets, &[]).unwrap();
//! mounter.mount("/staging", Path::new("/mnt/logs")).unwrap();
//! mounter.unmount(Path::new("/mnt/logs")).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backend;
pub mod credentials;
mod error;
mod health;
mod host;
pub mod keys;
pub mod lifecycle;
pub mod mount_table;
pub mod options;
mod process;
mod rclone;
mod readiness;
mod s3fs;
mod settings;

pub use backend::{
    select_backend, BackendType, Mounter, MounterFactory, NewMounter, UnknownBackend,
};
pub use error::{CredentialStage, MountError, OptionsWarning, WaitFailure};
pub use health::{check_path, classify_stat, is_corrupted_errno, is_corrupted_mount, PathState};
pub use host::{MountHost, SystemHost, UnmountMode};
pub use keys::SecretMap;
pub use lifecycle::MountRuntime;
pub use options::{AuthType, MountConfig, Resolution};
pub use process::{
    redact_args, HelperExit, HelperInvoker, HelperProcess, ProcessSpawner, SystemSpawner,
};
pub use rclone::RcloneMounter;
pub use readiness::{wait_for_mount, DEFAULT_MOUNT_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use s3fs::S3fsMounter;
pub use settings::{MounterSettings, DEFAULT_META_ROOT};

/// Test doubles for the mount lifecycle.
///
/// Fakes for the host, helper processes and mounters, plus argv and
/// credential file assertions.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
