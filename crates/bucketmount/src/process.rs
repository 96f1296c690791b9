//! Mount helper process invocation.
//!
//! Spawning goes through the [`ProcessSpawner`] trait so the invoker can be
//! driven by a scripted double in tests. A spawned [`HelperProcess`] is
//! consumed by [`HelperProcess::wait`]: not started, started and exited are
//! the only states a handle can be in, and it is never shared.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use crate::error::{MountError, WaitFailure};

/// How a helper process finished.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelperExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Trimmed stderr output
    pub stderr: String,
}

impl HelperExit {
    /// A clean zero exit.
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    /// Whether the helper reported success.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A started helper process.
pub trait HelperProcess: Send {
    /// Block until the process exits and reap it.
    fn wait(self: Box<Self>) -> io::Result<HelperExit>;
}

/// Capability to start helper processes.
pub trait ProcessSpawner: Send + Sync {
    /// Start `command` with `args`, without waiting for it.
    fn start(&self, command: &str, args: &[String]) -> io::Result<Box<dyn HelperProcess>>;
}

/// Spawns real processes with `std::process::Command`.
///
/// stdin is closed and stderr captured for diagnostics. stdout is discarded;
/// both helpers daemonize once the mount is up.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

struct SystemProcess(Child);

impl HelperProcess for SystemProcess {
    fn wait(self: Box<Self>) -> io::Result<HelperExit> {
        let output = self.0.wait_with_output()?;
        Ok(HelperExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl ProcessSpawner for SystemSpawner {
    fn start(&self, command: &str, args: &[String]) -> io::Result<Box<dyn HelperProcess>> {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Box::new(SystemProcess(child)))
    }
}

/// Runs a mount helper to completion and classifies the outcome.
#[derive(Clone)]
pub struct HelperInvoker {
    spawner: Arc<dyn ProcessSpawner>,
}

impl fmt::Debug for HelperInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperInvoker").finish_non_exhaustive()
    }
}

impl HelperInvoker {
    /// Create an invoker backed by `spawner`.
    pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self { spawner }
    }

    /// Run `command args…` for a mount at `path`.
    ///
    /// Blocks until the helper exits. A process that cannot be created is a
    /// [`MountError::Start`]; one that cannot be reaped or exits non-zero is
    /// a [`MountError::Wait`].
    pub fn invoke_mount(
        &self,
        path: &Path,
        command: &str,
        args: &[String],
    ) -> Result<(), MountError> {
        let shown = redact_args(args);
        tracing::info!(command, args = ?shown, target = %path.display(), "starting mount helper");

        let process = self
            .spawner
            .start(command, args)
            .map_err(|source| MountError::Start {
                command: command.to_string(),
                args: shown.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        let wait_error = |reason| MountError::Wait {
            command: command.to_string(),
            args: shown.clone(),
            path: path.to_path_buf(),
            reason,
        };

        let exit = process.wait().map_err(|e| wait_error(WaitFailure::Reap(e)))?;
        if !exit.is_success() {
            return Err(wait_error(WaitFailure::NonZeroExit {
                code: exit.code,
                stderr: exit.stderr,
            }));
        }

        tracing::debug!(command, target = %path.display(), "mount helper exited cleanly");
        Ok(())
    }
}

/// Option names whose values are secrets and must not be logged.
const SECRET_OPTION_NAMES: &[&str] = &["ibm_api_key", "access_key_id", "secret_access_key"];

/// Replace the value of secret-bearing `key=value` arguments.
pub fn redact_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.trim_start_matches('-').split_once('=') {
            Some((key, _)) if SECRET_OPTION_NAMES.contains(&key) => {
                let prefix_len = arg.len() - arg.trim_start_matches('-').len();
                format!("{}{key}=<redacted>", &arg[..prefix_len])
            }
            _ => arg.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSpawner;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_successful_mount() {
        let spawner = Arc::new(ScriptedSpawner::succeeding());
        let invoker = HelperInvoker::new(spawner.clone());

        invoker
            .invoke_mount(Path::new("/mount/path"), "mount_command", &args(&["arg1", "arg2"]))
            .unwrap();

        let calls = spawner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "mount_command");
        assert_eq!(calls[0].args, args(&["arg1", "arg2"]));
    }

    #[test]
    fn test_start_failure() {
        let spawner = Arc::new(ScriptedSpawner::failing_start("start command error"));
        let invoker = HelperInvoker::new(spawner);

        let err = invoker
            .invoke_mount(Path::new("/mount/path"), "mount_command", &args(&["arg1", "arg2"]))
            .unwrap_err();

        assert!(matches!(err, MountError::Start { .. }));
        assert_eq!(
            err.to_string(),
            "mount helper start failed: <mount_command>\nargs: <arg1 arg2>\ntarget: </mount/path>\nerror: <start command error>"
        );
    }

    #[test]
    fn test_wait_failure() {
        let spawner = Arc::new(ScriptedSpawner::failing_wait("wait command error"));
        let invoker = HelperInvoker::new(spawner);

        let err = invoker
            .invoke_mount(Path::new("/mount/path"), "mount_command", &args(&["arg1", "arg2"]))
            .unwrap_err();

        assert!(matches!(
            err,
            MountError::Wait {
                reason: WaitFailure::Reap(_),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "mount helper wait failed: <mount_command>\nargs: <arg1 arg2>\ntarget: </mount/path>\nerror: <wait command error>"
        );
    }

    #[test]
    fn test_non_zero_exit_is_wait_failure() {
        let spawner = Arc::new(ScriptedSpawner::exiting(
            Some(2),
            "s3fs: invalid credentials",
        ));
        let invoker = HelperInvoker::new(spawner);

        let err = invoker
            .invoke_mount(Path::new("/mnt/b"), "s3fs", &args(&["bucket", "/mnt/b"]))
            .unwrap_err();

        match err {
            MountError::Wait {
                reason: WaitFailure::NonZeroExit { code, stderr },
                ..
            } => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "s3fs: invalid credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_system_spawner_missing_binary_is_start_failure() {
        let invoker = HelperInvoker::new(Arc::new(SystemSpawner));
        let err = invoker
            .invoke_mount(
                Path::new("/mnt/b"),
                "/nonexistent/bin/mount-helper-12345",
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, MountError::Start { .. }));
    }

    #[test]
    fn test_system_spawner_reports_exit_code() {
        let invoker = HelperInvoker::new(Arc::new(SystemSpawner));
        let err = invoker
            .invoke_mount(Path::new("/mnt/b"), "false", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            MountError::Wait {
                reason: WaitFailure::NonZeroExit { code: Some(1), .. },
                ..
            }
        ));

        invoker.invoke_mount(Path::new("/mnt/b"), "true", &[]).unwrap();
    }

    #[test]
    fn test_redact_args_hides_secret_values() {
        let redacted = redact_args(&args(&[
            "-o",
            "passwd_file=/var/lib/x/passwd",
            "--secret_access_key=SK",
            "ibm_api_key=KEY",
        ]));
        assert_eq!(
            redacted,
            args(&[
                "-o",
                "passwd_file=/var/lib/x/passwd",
                "--secret_access_key=<redacted>",
                "ibm_api_key=<redacted>",
            ])
        );
    }
}
