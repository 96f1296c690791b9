//! Mount health classification.
//!
//! A FUSE mount whose helper died keeps its entry in the mount table, but
//! every operation on it fails with `ENOTCONN` ("transport endpoint is not
//! connected") or, for network-backed mounts, `ESTALE`. Those two codes are
//! the only signal that a target needs a forced unmount before it can be
//! mounted again.

use std::io;
use std::path::Path;

use nix::errno::Errno;

/// Whether `errno` is one of the FUSE disconnection codes.
pub fn is_corrupted_errno(errno: Errno) -> bool {
    matches!(errno, Errno::ENOTCONN | Errno::ESTALE)
}

/// Whether `err` reports a disconnected or stale mount.
///
/// Path, link and syscall failures all surface as [`io::Error`] carrying a
/// raw OS code; the code is looked for on the error itself and then along
/// its source chain, so wrapped errors classify the same way. `None` and
/// errors without an OS code are never corrupted.
pub fn is_corrupted_mount(err: Option<&io::Error>) -> bool {
    let Some(err) = err else {
        return false;
    };
    if let Some(code) = err.raw_os_error() {
        return is_corrupted_errno(Errno::from_raw(code));
    }

    let mut next = payload(err);
    while let Some(inner) = next {
        if let Some(errno) = inner.downcast_ref::<Errno>() {
            return is_corrupted_errno(*errno);
        }
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if let Some(code) = io_err.raw_os_error() {
                return is_corrupted_errno(Errno::from_raw(code));
            }
            next = payload(io_err);
            continue;
        }
        next = inner.source();
    }
    false
}

fn payload(err: &io::Error) -> Option<&(dyn std::error::Error + 'static)> {
    err.get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static))
}

/// What a `stat` of a prospective mount target found.
#[derive(Debug)]
pub enum PathState {
    /// Nothing at the path.
    Missing,
    /// The path exists and answered `stat`.
    Present,
    /// The path is a dead mount; holds the error that revealed it.
    Corrupted(io::Error),
}

/// Probe `path` with `stat`.
///
/// Missing and corrupted paths are ordinary states; any other failure is
/// returned as an error.
pub fn check_path(path: &Path) -> io::Result<PathState> {
    classify_stat(std::fs::metadata(path).map(|_| ()))
}

/// Map the result of a `stat` call onto a [`PathState`].
pub fn classify_stat(result: io::Result<()>) -> io::Result<PathState> {
    match result {
        Ok(()) => Ok(PathState::Present),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PathState::Missing),
        Err(e) if is_corrupted_mount(Some(&e)) => Ok(PathState::Corrupted(e)),
        Err(e) => Err(e),
    }
}
