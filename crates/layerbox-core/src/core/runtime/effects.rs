use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use layerbox_domain::{
    HostRuntime, ImageReference, LaunchSpec, LocalImage, PulledImage, RunningSession,
    TargetPlatform,
};

use super::session::SessionOutcome;
use crate::config::Config;
use crate::engine::DockerCliEngine;
use crate::python_sys::probe_host_runtime;

/// A local image build.
#[derive(Clone, Copy, Debug)]
pub struct BuildRequest<'a> {
    pub descriptor: &'a Path,
    pub context: &'a Path,
    pub tag: &'a str,
    pub platform: Option<TargetPlatform>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Allocate a pseudo-terminal for the session.
    pub tty: bool,
    /// Send the session's stdout to our stderr.
    pub stdout_to_stderr: bool,
}

/// The container engine, reached one blocking request at a time.
///
/// Failures that the operator can act on are returned as
/// [`crate::SandboxError`] values inside the `anyhow::Error`.
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &str;
    fn list_running_sessions(&self) -> Result<Vec<RunningSession>>;
    fn list_local_images(&self) -> Result<Vec<LocalImage>>;
    fn build_image(&self, request: &BuildRequest<'_>) -> Result<LocalImage>;
    fn pull_image(
        &self,
        reference: &ImageReference,
        platform: Option<TargetPlatform>,
    ) -> Result<PulledImage>;
    /// The full command line `run_interactive` would execute.
    fn run_command_line(&self, spec: &LaunchSpec, options: SessionOptions) -> Vec<String>;
    fn run_interactive(&self, spec: &LaunchSpec, options: SessionOptions)
        -> Result<SessionOutcome>;
    fn attach_interactive(
        &self,
        session: &RunningSession,
        options: SessionOptions,
    ) -> Result<SessionOutcome>;
}

/// Facts about the machine the orchestrator runs on.
pub trait HostProbe: Send + Sync {
    fn probe_runtime(&self) -> Result<HostRuntime>;
    fn stdin_is_terminal(&self) -> bool;
}

pub trait Effects: Send + Sync {
    fn engine(&self) -> &dyn ContainerEngine;
    fn host(&self) -> &dyn HostProbe;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    engine: Arc<DockerCliEngine>,
    host: Arc<SystemHost>,
}

impl SystemEffects {
    /// Locates the container engine and the host interpreter settings.
    ///
    /// # Errors
    /// Returns an engine-unavailable error when no engine binary can be found.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(DockerCliEngine::detect(config.engine())?),
            host: Arc::new(SystemHost {
                interpreter: config.python().interpreter.clone(),
            }),
        })
    }
}

impl Effects for SystemEffects {
    fn engine(&self) -> &dyn ContainerEngine {
        self.engine.as_ref()
    }

    fn host(&self) -> &dyn HostProbe {
        self.host.as_ref()
    }
}

struct SystemHost {
    interpreter: Option<String>,
}

impl HostProbe for SystemHost {
    fn probe_runtime(&self) -> Result<HostRuntime> {
        probe_host_runtime(self.interpreter.as_deref())
    }

    fn stdin_is_terminal(&self) -> bool {
        atty::is(atty::Stream::Stdin)
    }
}
