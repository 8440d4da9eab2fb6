#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::config::context;
pub(crate) use crate::core::engine;
pub(crate) use crate::core::python::python_sys;
pub(crate) use crate::core::runtime::{effects, process, session};

pub use crate::core::config::context::CommandContext;
pub use crate::core::config::{
    Config, EngineConfig, EnvSnapshot, GlobalOptions, PythonConfig, ENGINE_ENV, PYTHON_ENV,
};
pub use crate::core::engine::{DockerCliEngine, EngineKind};
pub use crate::core::runtime::effects::{
    BuildRequest, ContainerEngine, Effects, HostProbe, SessionOptions, SharedEffects,
    SystemEffects,
};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::runtime::session::{run_supervised, SessionOutcome};
pub use crate::core::sandbox::{
    open_sandbox, DescriptorMode, DescriptorOutcome, NoPrompt, Prompter, SandboxRequest,
    SessionProbe,
};
pub use crate::core::tooling::errors::{
    outcome_from_error, sandbox_error, ErrorKind, SandboxError,
};
pub use crate::core::tooling::outcome::{to_json_response, CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::report::{Notice, RecordingReporter, Reporter, SilentReporter};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
