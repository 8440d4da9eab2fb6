use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use layerbox_domain::HostRuntime;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use which::which;

use crate::process::run_command;
use crate::{sandbox_error, ErrorKind, PYTHON_ENV};

const HOST_SCRIPT: &str = r#"import json, platform
print(json.dumps({
    "python_version": platform.python_version(),
    "machine": platform.machine(),
}))
"#;

#[derive(Deserialize)]
struct HostPayload {
    python_version: String,
    machine: String,
}

/// Detects the Python interpreter whose version the sandbox should match.
///
/// # Errors
///
/// Returns an error when no interpreter can be found.
pub fn detect_interpreter(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(explicit) = explicit {
        return Ok(PathBuf::from(explicit));
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which(candidate) {
            return Ok(path);
        }
    }

    Err(sandbox_error(
        ErrorKind::InterpreterProbeFailed,
        "no python interpreter found",
        json!({
            "candidates": ["python3", "python"],
            "hint": format!("install python 3.6-3.9 or set {PYTHON_ENV} to an interpreter"),
        }),
    )
    .into())
}

/// Asks the host interpreter for its version and machine architecture.
///
/// # Errors
///
/// Returns an error when the interpreter cannot be run or prints something
/// other than the expected JSON payload.
pub fn probe_host_runtime(explicit: Option<&str>) -> Result<HostRuntime> {
    let python = detect_interpreter(explicit)?;
    let cwd = env::temp_dir();
    let output = run_command(
        &python,
        &["-c".to_string(), HOST_SCRIPT.to_string()],
        &[],
        &cwd,
    )
    .map_err(|err| {
        sandbox_error(
            ErrorKind::InterpreterProbeFailed,
            "failed to run the python interpreter",
            json!({
                "python": python.display().to_string(),
                "error": err.to_string(),
            }),
        )
    })?;
    if !output.success() {
        return Err(sandbox_error(
            ErrorKind::InterpreterProbeFailed,
            "python interpreter probe failed",
            json!({
                "python": python.display().to_string(),
                "code": output.code,
                "stderr": output.stderr,
            }),
        )
        .into());
    }
    let payload: HostPayload = serde_json::from_str(output.stdout.trim())
        .with_context(|| format!("unexpected probe output from {}", python.display()))?;
    let host = HostRuntime::new(payload.python_version, payload.machine);
    debug!(
        python = %python.display(),
        version = %host.python_version,
        machine = %host.machine,
        "probed host runtime"
    );
    Ok(host)
}
