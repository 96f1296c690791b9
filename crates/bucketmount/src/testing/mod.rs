//! Test doubles for the mount lifecycle.
//!
//! Enabled for this crate's own tests and, behind the `testing` feature,
//! for downstream callers. It includes:
//!
//! - **Host**: [`FakeHost`], a simulated mount table over real directories
//! - **Processes**: [`ScriptedSpawner`], helpers that exit as scripted
//! - **Mounters**: [`FakeMounter`] and [`FakeMounterFactory`] for callers
//!   of the [`Mounter`](crate::Mounter) capability
//! - **Assertions**: argv and credential file checks
//!
//! # Usage
//!
//! ```ignore
//! use bucketmount::testing::{FakeHost, ScriptedSpawner};
//!
//! let host = FakeHost::new();
//! let mounted = host.clone();
//! let spawner = ScriptedSpawner::succeeding()
//!     .after_success(move || mounted.set_mounted("/mnt/vol"));
//! ```

pub mod assertions;
mod host;
mod mounter;
mod spawner;

pub use assertions::{assert_file_mode, assert_has_option, assert_no_arg_containing, read_file};
pub use host::{FakeHost, HostCall};
pub use mounter::{FakeMounter, FakeMounterFactory, MounterCall, MounterRequest};
pub use spawner::{ScriptedSpawner, SpawnCall};
