//! Waiting for a freshly started helper to finish mounting.
//!
//! Neither helper signals completion, so readiness is a bounded polling loop
//! over the mount table. A failing probe is treated as "not mounted yet".

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::MountError;
use crate::host::MountHost;

/// Default deadline for a mount to appear.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `host` until `path` is a mount point or `timeout` elapses.
///
/// The first probe runs immediately. Sleeps never overshoot the deadline,
/// so a zero timeout probes exactly once.
pub fn wait_for_mount(
    host: &dyn MountHost,
    path: &Path,
    timeout: Duration,
    interval: Duration,
) -> Result<(), MountError> {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_probe_error = match host.is_mount_point(path) {
            Ok(true) => {
                tracing::debug!(
                    path = %path.display(),
                    attempts,
                    elapsed = ?start.elapsed(),
                    "mount point is ready"
                );
                return Ok(());
            }
            Ok(false) => None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "mount probe failed");
                Some(e.to_string())
            }
        };

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(path = %path.display(), attempts, ?timeout, "timed out waiting for mount");
            return Err(MountError::ReadinessTimeout {
                path: path.to_path_buf(),
                timeout,
                last_probe_error,
            });
        }
        thread::sleep(interval.min(deadline - now));
    }
}
