//! Error types for mount lifecycle operations.
//!
//! Every failure a [`Mounter`](crate::Mounter) can hit maps to exactly one
//! [`MountError`] variant so callers can tell a credential problem from a
//! helper crash from a readiness timeout without parsing strings.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Stage of the credential file write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStage {
    /// Creating or opening the file.
    Open,
    /// Writing the secret content.
    Write,
    /// Flushing the content to disk and closing the handle.
    Flush,
}

impl fmt::Display for CredentialStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Write => "write",
            Self::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// Why waiting on a started helper process failed.
#[derive(Debug, Error)]
pub enum WaitFailure {
    /// The OS refused to reap the child.
    #[error("{0}")]
    Reap(#[source] io::Error),

    /// The helper ran to completion but reported failure.
    #[error("exited with {}{}", describe_code(*.code), describe_stderr(.stderr))]
    NonZeroExit {
        /// Exit code, `None` when the helper was killed by a signal
        code: Option<i32>,
        /// Trimmed stderr captured from the helper
        stderr: String,
    },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Errors returned by mount and unmount operations.
#[derive(Debug, Error)]
pub enum MountError {
    /// The credential file consumed by the helper could not be written.
    #[error("failed to {stage} credential file {}: {source}", path.display())]
    Credential {
        /// Which step failed
        stage: CredentialStage,
        /// Credential file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The per-target metadata directory could not be prepared or removed.
    #[error("metadata directory {}: {source}", path.display())]
    MetadataDir {
        /// Metadata directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The target directory could not be inspected or created.
    #[error("cannot prepare mount target {}: {source}", path.display())]
    Target {
        /// Target mount point
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The helper process could not be created at all.
    #[error(
        "mount helper start failed: <{command}>\nargs: <{}>\ntarget: <{}>\nerror: <{source}>",
        args.join(" "),
        path.display()
    )]
    Start {
        /// Helper executable
        command: String,
        /// Argument vector (credential-bearing options elided)
        args: Vec<String>,
        /// Target mount point
        path: PathBuf,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },

    /// The helper process started but did not finish successfully.
    #[error(
        "mount helper wait failed: <{command}>\nargs: <{}>\ntarget: <{}>\nerror: <{reason}>",
        args.join(" "),
        path.display()
    )]
    Wait {
        /// Helper executable
        command: String,
        /// Argument vector (credential-bearing options elided)
        args: Vec<String>,
        /// Target mount point
        path: PathBuf,
        /// What went wrong after the process started
        #[source]
        reason: WaitFailure,
    },

    /// The target never became a mount point within the deadline.
    #[error(
        "timeout waiting for mount at {} after {timeout:?}{}",
        path.display(),
        last_probe_error.as_deref().map(|e| format!(" (last probe error: {e})")).unwrap_or_default()
    )]
    ReadinessTimeout {
        /// Target mount point
        path: PathBuf,
        /// Deadline that was exceeded
        timeout: Duration,
        /// Error reported by the final probe, if it failed
        last_probe_error: Option<String>,
    },

    /// Unmounting the target failed, including after a forced attempt.
    #[error("failed to unmount {}{}: {source}", path.display(), .forced.then_some(" (forced)").unwrap_or_default())]
    Unmount {
        /// Target mount point
        path: PathBuf,
        /// Whether the failing attempt was the forced variant
        forced: bool,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
}

impl MountError {
    /// Whether this is a readiness timeout rather than a helper failure.
    ///
    /// Callers use this to decide between retrying the whole mount and
    /// treating the helper as misconfigured.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadinessTimeout { .. })
    }
}

/// Non-fatal problem found while merging a `mountOptions` override.
///
/// Resolution keeps going with the options merged so far; the override is
/// dropped as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ignoring mountOptions override: entry {entry:?} is malformed ({reason})")]
pub struct OptionsWarning {
    /// The offending entry
    pub entry: String,
    /// What is wrong with it
    pub reason: &'static str,
}
