use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;
use layerbox_domain::{
    ImageReference, LaunchSpec, LocalImage, PulledImage, RunningSession, TargetPlatform,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::process::{run_command, run_command_streaming, RunOutput};
use crate::session::{run_supervised, SessionOutcome};
use crate::{
    sandbox_error, BuildRequest, ContainerEngine, ErrorKind, SessionOptions, ENGINE_ENV,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Docker,
    Podman,
    Custom,
}

/// A docker-compatible engine driven through its command-line client.
#[derive(Clone, Debug)]
pub struct DockerCliEngine {
    program: PathBuf,
    kind: EngineKind,
}

impl DockerCliEngine {
    #[must_use]
    pub fn new(program: PathBuf, kind: EngineKind) -> Self {
        Self { program, kind }
    }

    /// Finds the engine binary: the configured override first, then `docker`,
    /// then `podman` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an engine-unavailable error when nothing usable is found.
    pub fn detect(config: &EngineConfig) -> Result<Self> {
        if let Some(raw) = config.program.as_deref() {
            if raw.eq_ignore_ascii_case("docker") {
                return Ok(Self::new(resolve_program("docker", None)?, EngineKind::Docker));
            }
            if raw.eq_ignore_ascii_case("podman") {
                return Ok(Self::new(resolve_program("podman", None)?, EngineKind::Podman));
            }
            return Ok(Self::new(resolve_program(raw, Some(raw))?, EngineKind::Custom));
        }

        for (name, kind) in [("docker", EngineKind::Docker), ("podman", EngineKind::Podman)] {
            if let Ok(path) = resolve_program(name, None) {
                return Ok(Self::new(path, kind));
            }
        }

        Err(sandbox_error(
            ErrorKind::EngineUnavailable,
            "container engine unavailable",
            json!({
                "candidates": ["docker", "podman"],
                "hint": format!(
                    "install docker or podman, or set {ENGINE_ENV} to a compatible binary"
                ),
            }),
        )
        .into())
    }

    fn label(&self) -> &'static str {
        match self.kind {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
            EngineKind::Custom => "custom",
        }
    }

    fn capture(&self, args: &[String]) -> Result<RunOutput> {
        debug!(engine = self.label(), ?args, "engine request");
        let output = run_command(&self.program, args, &[], &working_dir())
            .map_err(|err| unreachable_engine(self.label(), &err.to_string()))?;
        Ok(output)
    }

    fn checked(&self, args: &[String], kind: ErrorKind, message: &str) -> Result<RunOutput> {
        let output = self.capture(args)?;
        if output.success() {
            return Ok(output);
        }
        Err(engine_failure(self.label(), kind, message, &output).into())
    }

    fn inspect_ids(&self, reference: &str, kind: ErrorKind) -> Result<Vec<String>> {
        let output = self.checked(
            &[
                "image".to_string(),
                "inspect".to_string(),
                "--format".to_string(),
                "{{.Id}}".to_string(),
                reference.to_string(),
            ],
            kind,
            "failed to inspect image",
        )?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }
}

impl ContainerEngine for DockerCliEngine {
    fn name(&self) -> &str {
        self.label()
    }

    fn list_running_sessions(&self) -> Result<Vec<RunningSession>> {
        let output = self.checked(
            &[
                "ps".to_string(),
                "--format".to_string(),
                "{{.ID}}\t{{.Names}}".to_string(),
            ],
            ErrorKind::EngineUnavailable,
            "failed to list running containers",
        )?;
        Ok(parse_ps(&output.stdout))
    }

    fn list_local_images(&self) -> Result<Vec<LocalImage>> {
        let output = self.checked(
            &[
                "image".to_string(),
                "ls".to_string(),
                "--no-trunc".to_string(),
                "--format".to_string(),
                "{{.ID}}\t{{.Repository}}:{{.Tag}}".to_string(),
            ],
            ErrorKind::EngineUnavailable,
            "failed to list local images",
        )?;
        Ok(parse_image_ls(&output.stdout))
    }

    fn build_image(&self, request: &BuildRequest<'_>) -> Result<LocalImage> {
        let contents = fs::read(request.descriptor).map_err(|err| {
            sandbox_error(
                ErrorKind::DescriptorIo,
                "failed to read the image descriptor",
                json!({
                    "path": request.descriptor.display().to_string(),
                    "error": err.to_string(),
                }),
            )
        })?;
        let args = build_args(request.tag, request.platform);
        debug!(engine = self.label(), ?args, "building image");
        let output = run_command_streaming(
            &self.program,
            &args,
            &[],
            request.context,
            Some(contents),
        )
        .map_err(|err| unreachable_engine(self.label(), &err.to_string()))?;
        if !output.success() {
            return Err(engine_failure(
                self.label(),
                ErrorKind::BuildFailed,
                "image build failed",
                &output,
            )
            .into());
        }
        let ids = self.inspect_ids(request.tag, ErrorKind::BuildFailed)?;
        let id = ids.into_iter().next().ok_or_else(|| {
            sandbox_error(
                ErrorKind::BuildFailed,
                "image build produced no image",
                json!({ "tag": request.tag }),
            )
        })?;
        Ok(LocalImage {
            id,
            tags: vec![request.tag.to_string()],
        })
    }

    fn pull_image(
        &self,
        reference: &ImageReference,
        platform: Option<TargetPlatform>,
    ) -> Result<PulledImage> {
        let args = pull_args(reference, platform);
        debug!(engine = self.label(), ?args, "pulling image");
        let output = run_command_streaming(&self.program, &args, &[], &working_dir(), None)
            .map_err(|err| unreachable_engine(self.label(), &err.to_string()))?;
        if !output.success() {
            let err = engine_failure(
                self.label(),
                ErrorKind::PullFailed,
                "image pull failed",
                &output,
            )
            .with_detail("reference", json!(reference.as_str()));
            return Err(err.into());
        }
        let mut images: Vec<LocalImage> = self
            .inspect_ids(reference.as_str(), ErrorKind::PullFailed)?
            .into_iter()
            .map(|id| LocalImage {
                id,
                tags: vec![reference.to_string()],
            })
            .collect();
        if images.len() == 1 {
            return Ok(PulledImage::One(images.remove(0)));
        }
        Ok(PulledImage::Many(images))
    }

    fn run_command_line(&self, spec: &LaunchSpec, options: SessionOptions) -> Vec<String> {
        let mut line = vec![self.program.display().to_string()];
        line.extend(run_args(spec, options));
        line
    }

    fn run_interactive(
        &self,
        spec: &LaunchSpec,
        options: SessionOptions,
    ) -> Result<SessionOutcome> {
        let args = run_args(spec, options);
        let envs: Vec<(String, String)> = spec
            .env_vars
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        run_supervised(
            &self.program,
            &args,
            &envs,
            &working_dir(),
            options.stdout_to_stderr,
        )
    }

    fn attach_interactive(
        &self,
        session: &RunningSession,
        options: SessionOptions,
    ) -> Result<SessionOutcome> {
        let args = vec!["attach".to_string(), session.name.clone()];
        run_supervised(
            &self.program,
            &args,
            &[],
            &working_dir(),
            options.stdout_to_stderr,
        )
    }
}

fn working_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Bare names are looked up on `PATH` only; anything with a separator is
/// taken as a path to the binary.
fn resolve_program(name: &str, raw: Option<&str>) -> Result<PathBuf> {
    let found = if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        Some(PathBuf::from(name)).filter(|candidate| candidate.is_file())
    } else {
        which::which(name).ok()
    };
    found.ok_or_else(|| {
        sandbox_error(
            ErrorKind::EngineUnavailable,
            "container engine unavailable",
            json!({
                "engine": raw.unwrap_or(name),
                "hint": format!("install {name} or point {ENGINE_ENV} at a compatible binary"),
            }),
        )
        .into()
    })
}

fn unreachable_engine(engine: &str, error: &str) -> crate::SandboxError {
    sandbox_error(
        ErrorKind::EngineUnavailable,
        "container engine could not be started",
        json!({
            "engine": engine,
            "error": error,
            "hint": format!("install {engine} or set {ENGINE_ENV} to a compatible binary"),
        }),
    )
}

/// Maps a failed engine request to the error the operator sees. Daemon and
/// permission problems are reported as an unavailable engine whatever the
/// request was.
fn engine_failure(
    engine: &str,
    kind: ErrorKind,
    message: &str,
    output: &RunOutput,
) -> crate::SandboxError {
    let stderr = output.stderr.trim();
    let lowered = stderr.to_ascii_lowercase();
    let (kind, message, hint) = if lowered.contains("permission denied") {
        (
            ErrorKind::EngineUnavailable,
            "permission denied while contacting the container engine",
            format!("add your user to the {engine} group or run with sufficient privileges"),
        )
    } else if lowered.contains("cannot connect")
        || lowered.contains("is the docker daemon running")
        || lowered.contains("daemon is not running")
    {
        (
            ErrorKind::EngineUnavailable,
            "the container engine is not running",
            format!("start the {engine} daemon and retry"),
        )
    } else {
        let hint = match kind {
            ErrorKind::BuildFailed => "inspect the build output above".to_string(),
            ErrorKind::PullFailed => {
                "check the image reference and that you are logged in to its registry".to_string()
            }
            _ => format!("run `{engine} info` to check the engine"),
        };
        (kind, message, hint)
    };
    warn!(engine, code = output.code, reason = kind.reason(), "engine request failed");
    sandbox_error(
        kind,
        message,
        json!({
            "engine": engine,
            "status": output.code,
            "stderr": stderr,
            "hint": hint,
        }),
    )
}

fn build_args(tag: &str, platform: Option<TargetPlatform>) -> Vec<String> {
    let mut args = vec!["build".to_string(), "-t".to_string(), tag.to_string()];
    if let Some(platform) = platform {
        args.push("--platform".to_string());
        args.push(platform.as_str().to_string());
    }
    args.push("-".to_string());
    args
}

fn pull_args(reference: &ImageReference, platform: Option<TargetPlatform>) -> Vec<String> {
    let mut args = vec!["pull".to_string()];
    if let Some(platform) = platform {
        args.push("--platform".to_string());
        args.push(platform.as_str().to_string());
    }
    args.push(reference.to_string());
    args
}

/// Credential values travel in the engine's environment; only names appear
/// on the command line.
fn run_args(spec: &LaunchSpec, options: SessionOptions) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string(), "-i".to_string()];
    if options.tty {
        args.push("-t".to_string());
    }
    args.push("--name".to_string());
    args.push(spec.container_name.clone());
    args.push("--platform".to_string());
    args.push(spec.platform.as_str().to_string());
    for mount in &spec.mounts {
        args.push("--volume".to_string());
        let mode = if mount.read_only { ":ro" } else { "" };
        args.push(format!(
            "{}:{}{mode}",
            mount.host.display(),
            mount.container.display()
        ));
    }
    for name in spec.env_vars.keys() {
        args.push("--env".to_string());
        args.push(name.clone());
    }
    for binding in &spec.port_bindings {
        args.push("--publish".to_string());
        args.push(format!("{}:{}", binding.host, binding.container));
    }
    args.push(spec.image.id.clone());
    args
}

fn parse_ps(stdout: &str) -> Vec<RunningSession> {
    stdout
        .lines()
        .filter_map(|line| {
            let (id, names) = line.trim().split_once('\t')?;
            let name = names.split(',').next()?.trim();
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(RunningSession {
                name: name.to_string(),
                handle: id.trim().to_string(),
            })
        })
        .collect()
}

fn parse_image_ls(stdout: &str) -> Vec<LocalImage> {
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for line in stdout.lines() {
        let Some((id, tag)) = line.trim().split_once('\t') else {
            continue;
        };
        let tags = grouped.entry(id.trim().to_string()).or_default();
        let tag = short_reference(tag.trim());
        if !tag.contains("<none>") && !tags.iter().any(|known| known == tag) {
            tags.push(tag.to_string());
        }
    }
    grouped
        .into_iter()
        .map(|(id, tags)| LocalImage { id, tags })
        .collect()
}

/// Podman lists Docker Hub images fully qualified; references are typed
/// the short way.
fn short_reference(tag: &str) -> &str {
    tag.strip_prefix("docker.io/library/")
        .or_else(|| tag.strip_prefix("docker.io/"))
        .unwrap_or(tag)
}
