use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::session::SessionKey;

/// The directory a sandbox is being opened for.
///
/// Derived once per invocation; the basename doubles as the project name and
/// feeds the session key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    pub project_name: String,
    pub working_directory: PathBuf,
}

impl ProjectContext {
    pub fn current() -> Result<Self> {
        let cwd = env::current_dir().context("unable to determine the working directory")?;
        Self::from_dir(&cwd)
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let working_directory = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            env::current_dir()
                .context("unable to determine the working directory")?
                .join(dir)
        };
        let project_name = working_directory
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "cannot derive a project name from {}",
                    working_directory.display()
                )
            })?;
        Ok(Self {
            project_name,
            working_directory,
        })
    }

    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::for_project(&self.project_name)
    }
}
