use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const ENGINE_ENV: &str = "LAYERBOX_ENGINE";
pub const PYTHON_ENV: &str = "LAYERBOX_PYTHON";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Process environment captured once per invocation.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) engine: EngineConfig,
    pub(crate) python: PythonConfig,
    pub(crate) home: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            engine: EngineConfig {
                program: non_empty(snapshot.var(ENGINE_ENV)),
            },
            python: PythonConfig {
                interpreter: non_empty(snapshot.var(PYTHON_ENV)),
            },
            home: non_empty(snapshot.var("HOME"))
                .map(PathBuf::from)
                .or_else(dirs_next::home_dir),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    #[must_use]
    pub fn python(&self) -> &PythonConfig {
        &self.python
    }

    #[must_use]
    pub fn home(&self) -> Option<&PathBuf> {
        self.home.as_ref()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `docker`, `podman`, or a path to a compatible binary.
    pub program: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
}
