use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerbox_domain::ProjectContext;

use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::effects::{ContainerEngine, HostProbe, SharedEffects};

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    env: EnvSnapshot,
    config: Config,
    working_dir: PathBuf,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a context for the current process: environment, working
    /// directory and the given effects.
    ///
    /// # Errors
    /// Returns an error if the working directory cannot be determined.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects) -> Result<Self> {
        let working_dir = env::current_dir().context("unable to determine current directory")?;
        Ok(Self::from_parts(
            global,
            EnvSnapshot::capture(),
            working_dir,
            effects,
        ))
    }

    #[must_use]
    pub fn from_parts(
        global: &'a GlobalOptions,
        env: EnvSnapshot,
        working_dir: PathBuf,
        effects: SharedEffects,
    ) -> Self {
        let config = Config::from_snapshot(&env);
        Self {
            global,
            env,
            config,
            working_dir,
            effects,
        }
    }

    pub fn engine(&self) -> &dyn ContainerEngine {
        self.effects.engine()
    }

    pub fn host(&self) -> &dyn HostProbe {
        self.effects.host()
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The project the invocation works on.
    ///
    /// # Errors
    /// Returns an error if the working directory has no usable basename.
    pub fn project(&self) -> Result<ProjectContext> {
        ProjectContext::from_dir(&self.working_dir)
    }
}
