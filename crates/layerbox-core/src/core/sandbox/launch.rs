use anyhow::Result;
use layerbox_domain::{
    assemble_launch_spec, credentials_dir, LaunchSpec, ProjectContext, ResolvedImage,
};
use serde_json::json;
use tracing::{debug, info};

use crate::context::CommandContext;
use crate::session::SessionOutcome;
use crate::{sandbox_error, ContainerEngine, ErrorKind, Notice, Reporter, SessionOptions};

/// Launch parameters for `project` from the invocation's environment
/// snapshot. The credentials directory is mounted only when it exists.
#[must_use]
pub fn assemble_launch(
    ctx: &CommandContext<'_>,
    project: &ProjectContext,
    image: &ResolvedImage,
) -> LaunchSpec {
    let credentials = ctx
        .config()
        .home()
        .map(|home| credentials_dir(home))
        .filter(|dir| dir.is_dir());
    debug!(credentials = ?credentials, "credentials directory");
    assemble_launch_spec(
        project,
        credentials.as_deref(),
        |name| ctx.env().var(name).map(ToOwned::to_owned),
        image,
    )
}

/// Runs a new session to completion.
///
/// # Errors
///
/// Returns a session-start error when the engine process cannot be spawned.
pub fn launch_session(
    engine: &dyn ContainerEngine,
    spec: &LaunchSpec,
    options: SessionOptions,
    reporter: &dyn Reporter,
) -> Result<SessionOutcome> {
    reporter.notice(&Notice::StartingSession {
        name: spec.container_name.clone(),
    });
    let outcome = engine.run_interactive(spec, options)?;
    if let SessionOutcome::FailedToStart { reason } = &outcome {
        return Err(sandbox_error(
            ErrorKind::SessionStartFailed,
            "failed to start the sandbox session",
            json!({
                "engine": engine.name(),
                "container": spec.container_name,
                "error": reason,
                "hint": "check that the container engine is installed and on PATH",
            }),
        )
        .into());
    }
    info!(container = %spec.container_name, ?outcome, "session ended");
    Ok(outcome)
}
