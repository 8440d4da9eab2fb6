use anyhow::Result;
use layerbox_domain::{
    ImageOrigin, ImageSourceChoice, ProjectContext, ResolvedImage, RunningSession,
    TargetPlatform, LOCAL_BUILD_TAG, RUN_PLATFORM,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::descriptor::{ensure_descriptor, DescriptorMode};
use super::detect::{detect_session, SessionProbe};
use super::launch::{assemble_launch, launch_session};
use super::prompt::Prompter;
use super::resolve::{build_local_image, pull_reference, resolve_pull, select_source};
use crate::context::CommandContext;
use crate::session::SessionOutcome;
use crate::{
    sandbox_error, ContainerEngine, ErrorKind, ExecutionOutcome, Notice, Reporter,
    SessionOptions,
};

#[derive(Clone, Debug)]
pub struct SandboxRequest {
    pub source: ImageSourceChoice,
    /// Ask the operator for the source instead of trusting `source`.
    pub choose: bool,
    pub image: Option<String>,
    pub platform: Option<TargetPlatform>,
    pub dry_run: bool,
    pub no_input: bool,
}

/// Opens the sandbox session for the working directory's project.
///
/// # Errors
///
/// Returns a [`crate::SandboxError`] for every failure the operator can act
/// on: engine unavailable, unsupported host runtime, build or pull failures,
/// and sessions that cannot be started.
pub fn open_sandbox(
    ctx: &CommandContext<'_>,
    request: &SandboxRequest,
    prompter: &dyn Prompter,
    reporter: &dyn Reporter,
) -> Result<ExecutionOutcome> {
    let project = ctx.project().map_err(|err| {
        sandbox_error(
            ErrorKind::InvalidInput,
            "cannot open a sandbox for this directory",
            json!({
                "path": ctx.working_dir().display().to_string(),
                "error": err.to_string(),
                "hint": "run layerbox from inside a project directory",
            }),
        )
    })?;
    let key = project.session_key();
    let engine = ctx.engine();
    let options = SessionOptions {
        tty: ctx.host().stdin_is_terminal(),
        stdout_to_stderr: ctx.global.json,
    };

    if let SessionProbe::Reattach(session) = detect_session(engine, &key)? {
        return reattach(engine, &project, &session, options, request.dry_run, reporter);
    }

    let interactive = !request.no_input && ctx.host().stdin_is_terminal();
    let source = select_source(request, interactive, prompter)?;
    let reference = match source {
        ImageSourceChoice::Build => None,
        ImageSourceChoice::PullNamed | ImageSourceChoice::PullDefault => Some(pull_reference(
            source,
            request.image.as_deref(),
            interactive,
            prompter,
        )?),
    };
    debug!(source = source.as_str(), reference = ?reference, "image source selected");
    reporter.notice(&Notice::ImageSummary {
        source: source.as_str().to_string(),
        reference: reference.as_ref().map(ToString::to_string),
        platform: request.platform.map(|platform| platform.as_str().to_string()),
    });
    if let Some(requested) = request.platform.filter(|platform| *platform != RUN_PLATFORM) {
        warn!(
            requested = requested.as_str(),
            run = RUN_PLATFORM.as_str(),
            "sessions always run as {}",
            RUN_PLATFORM
        );
        reporter.notice(&Notice::PlatformPinned {
            requested: requested.as_str().to_string(),
            run: RUN_PLATFORM.as_str().to_string(),
        });
    }

    let (image, descriptor) = match &reference {
        None => {
            let mode = if request.dry_run {
                DescriptorMode::Plan
            } else {
                DescriptorMode::Write
            };
            let descriptor =
                ensure_descriptor(&project.working_directory, ctx.host(), mode, reporter)?;
            let image = if request.dry_run {
                planned_build()
            } else {
                build_local_image(
                    engine,
                    &descriptor.paths,
                    &project.working_directory,
                    request.platform,
                    reporter,
                )?
            };
            (image, Some(descriptor))
        }
        Some(reference) => (
            resolve_pull(engine, reference, request.platform, request.dry_run, reporter)?,
            None,
        ),
    };

    let spec = assemble_launch(ctx, &project, &image);
    let command = engine.run_command_line(&spec, options);
    reporter.notice(&Notice::CommandPreview {
        command: command.clone(),
    });

    let mut details = json!({
        "action": "launch",
        "project": project.project_name,
        "container": spec.container_name,
        "engine": engine.name(),
        "source": source.as_str(),
        "image": image,
        "descriptor": descriptor.as_ref().map(super::DescriptorOutcome::to_json),
        "platform": spec.platform.as_str(),
        "mounts": spec.mounts,
        "env": spec.env_vars.keys().collect::<Vec<_>>(),
        "command": command,
        "dry_run": request.dry_run,
    });
    if request.dry_run {
        return Ok(ExecutionOutcome::success(
            format!("would start {}", spec.container_name),
            details,
        ));
    }

    let outcome = launch_session(engine, &spec, options, reporter)?;
    details["session"] = session_details(&spec.container_name, &outcome);
    Ok(ExecutionOutcome::success(
        session_message(&spec.container_name, &outcome),
        details,
    ))
}

fn reattach(
    engine: &dyn ContainerEngine,
    project: &ProjectContext,
    session: &RunningSession,
    options: SessionOptions,
    dry_run: bool,
    reporter: &dyn Reporter,
) -> Result<ExecutionOutcome> {
    reporter.notice(&Notice::AttachingToSession {
        name: session.name.clone(),
    });
    let mut details = json!({
        "action": "reattach",
        "project": project.project_name,
        "container": session.name,
        "handle": session.handle,
        "engine": engine.name(),
        "dry_run": dry_run,
    });
    if dry_run {
        return Ok(ExecutionOutcome::success(
            format!("would attach to {}", session.name),
            details,
        ));
    }

    let outcome = engine.attach_interactive(session, options)?;
    if let SessionOutcome::FailedToStart { reason } = &outcome {
        return Err(sandbox_error(
            ErrorKind::SessionStartFailed,
            "failed to attach to the running session",
            json!({
                "engine": engine.name(),
                "container": session.name,
                "error": reason,
                "hint": "check that the container engine is installed and on PATH",
            }),
        )
        .into());
    }
    details["session"] = session_details(&session.name, &outcome);
    Ok(ExecutionOutcome::success(
        session_message(&session.name, &outcome),
        details,
    ))
}

fn planned_build() -> ResolvedImage {
    ResolvedImage {
        id: LOCAL_BUILD_TAG.to_string(),
        reference: LOCAL_BUILD_TAG.to_string(),
        origin: ImageOrigin::Built,
    }
}

fn session_details(name: &str, outcome: &SessionOutcome) -> Value {
    json!({
        "name": name,
        "code": outcome.exit_code(),
        "outcome": outcome,
    })
}

fn session_message(name: &str, outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Exited { code: 0 } => format!("session {name} ended"),
        SessionOutcome::Exited { code } => format!("session {name} exited with status {code}"),
        SessionOutcome::Terminated {
            signal: Some(signal),
        } => format!("session {name} was terminated by signal {signal}"),
        SessionOutcome::Terminated { signal: None } | SessionOutcome::FailedToStart { .. } => {
            format!("session {name} ended abnormally")
        }
    }
}
