//! Scripted helper processes.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::process::{HelperExit, HelperProcess, ProcessSpawner};

type ExitHook = Arc<dyn Fn() + Send + Sync>;

/// One recorded `start` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    /// Program name
    pub command: String,
    /// Arguments, unredacted
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
enum Script {
    Exit(HelperExit),
    FailStart(String),
    FailWait(String),
}

/// [`ProcessSpawner`] that never runs anything.
///
/// Every start is recorded and answered from the same script. A hook set
/// with [`after_success`](Self::after_success) runs when a helper exits
/// cleanly, which is how tests make a target show up as mounted.
pub struct ScriptedSpawner {
    script: Script,
    after_success: Option<ExitHook>,
    calls: Mutex<Vec<SpawnCall>>,
}

impl ScriptedSpawner {
    fn scripted(script: Script) -> Self {
        Self {
            script,
            after_success: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Helpers start and exit 0.
    pub fn succeeding() -> Self {
        Self::scripted(Script::Exit(HelperExit::success()))
    }

    /// Helpers cannot be started.
    pub fn failing_start(message: &str) -> Self {
        Self::scripted(Script::FailStart(message.to_string()))
    }

    /// Helpers start but cannot be reaped.
    pub fn failing_wait(message: &str) -> Self {
        Self::scripted(Script::FailWait(message.to_string()))
    }

    /// Helpers exit with `code` and `stderr`.
    pub fn exiting(code: Option<i32>, stderr: &str) -> Self {
        Self::scripted(Script::Exit(HelperExit {
            code,
            stderr: stderr.to_string(),
        }))
    }

    /// Run `hook` each time a helper exits successfully.
    #[must_use]
    pub fn after_success(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_success = Some(Arc::new(hook));
        self
    }

    /// Recorded calls, in order.
    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().clone()
    }
}

struct ScriptedProcess {
    script: Script,
    after_success: Option<ExitHook>,
}

impl HelperProcess for ScriptedProcess {
    fn wait(self: Box<Self>) -> io::Result<HelperExit> {
        match self.script {
            Script::Exit(exit) => {
                if exit.is_success()
                    && let Some(hook) = &self.after_success
                {
                    hook();
                }
                Ok(exit)
            }
            Script::FailWait(message) | Script::FailStart(message) => {
                Err(io::Error::other(message))
            }
        }
    }
}

impl ProcessSpawner for ScriptedSpawner {
    fn start(&self, command: &str, args: &[String]) -> io::Result<Box<dyn HelperProcess>> {
        self.calls.lock().push(SpawnCall {
            command: command.to_string(),
            args: args.to_vec(),
        });
        if let Script::FailStart(message) = &self.script {
            return Err(io::Error::other(message.clone()));
        }
        Ok(Box::new(ScriptedProcess {
            script: self.script.clone(),
            after_success: self.after_success.clone(),
        }))
    }
}
