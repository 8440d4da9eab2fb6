//! Supervision of interactive engine sessions.
//!
//! Handing the terminal to `docker run -it` or `docker attach` leaves the
//! orchestrator blind until the child exits. The supervisor keeps the three
//! endings apart: the engine binary never started, it exited with a code, or
//! it was killed by a signal.

use std::path::Path;
use std::io;
use std::process::{Child, ExitStatus, Stdio};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use super::process::configured_command;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    FailedToStart { reason: String },
    Exited { code: i32 },
    Terminated { signal: Option<i32> },
}

impl SessionOutcome {
    /// Exit code the orchestrator mirrors; `None` when the session never ran.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::FailedToStart { .. } => None,
            Self::Exited { code } => Some(*code),
            Self::Terminated { signal } => Some(signal.map_or(1, |signal| 128 + signal)),
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited { code },
            None => Self::Terminated {
                signal: termination_signal(status),
            },
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// A started interactive child with inherited stdio.
struct SupervisedSession {
    label: String,
    child: Child,
}

impl SupervisedSession {
    /// Spawns the program with the terminal attached. With
    /// `stdout_to_stderr` the child writes both streams to our stderr.
    fn start(
        program: &Path,
        args: &[String],
        envs: &[(String, String)],
        cwd: &Path,
        stdout_to_stderr: bool,
    ) -> io::Result<Self> {
        let mut command = configured_command(program, args, envs, cwd);
        command.stdin(Stdio::inherit());
        if stdout_to_stderr {
            command.stdout(Stdio::from(io::stderr()));
        } else {
            command.stdout(Stdio::inherit());
        }
        command.stderr(Stdio::inherit());
        let child = command.spawn()?;
        debug!(program = %program.display(), pid = child.id(), "session started");
        Ok(Self {
            label: program.display().to_string(),
            child,
        })
    }

    fn wait(mut self) -> Result<SessionOutcome> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.label))?;
        let outcome = SessionOutcome::from_status(status);
        debug!(?outcome, "session finished");
        Ok(outcome)
    }
}

/// Starts and waits for an interactive session, folding spawn failures into
/// [`SessionOutcome::FailedToStart`]. `stdout_to_stderr` keeps our stdout
/// free for machine-readable output.
///
/// # Errors
///
/// Returns an error only when a started child cannot be waited on.
pub fn run_supervised(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    cwd: &Path,
    stdout_to_stderr: bool,
) -> Result<SessionOutcome> {
    match SupervisedSession::start(program, args, envs, cwd, stdout_to_stderr) {
        Ok(session) => session.wait(),
        Err(err) => Ok(SessionOutcome::FailedToStart {
            reason: format!("failed to start {}: {err}", program.display()),
        }),
    }
}
