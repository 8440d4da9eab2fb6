use std::fs;
use std::io;
use std::path::Path;

use anyhow::Result;
use layerbox_domain::{
    classify_descriptor, load_record_optional, render_descriptor, select_base_image,
    write_record, DescriptorPaths, DescriptorRecord, DescriptorState, HostRuntime,
    PythonVersion, RuntimeRejection,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{sandbox_error, ErrorKind, HostProbe, Notice, Reporter, SandboxError, PYTHON_ENV};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorMode {
    Write,
    /// Work out what would be written without touching the project.
    Plan,
}

#[derive(Clone, Debug)]
pub struct DescriptorOutcome {
    pub paths: DescriptorPaths,
    pub state: DescriptorState,
    /// False only for a planned descriptor that was never written.
    pub persisted: bool,
}

impl DescriptorOutcome {
    #[must_use]
    pub fn to_json(&self) -> Value {
        let state = if self.persisted {
            self.state.as_str()
        } else {
            "planned"
        };
        json!({
            "path": self.paths.descriptor.display().to_string(),
            "record": self.paths.record.display().to_string(),
            "state": state,
            "base_image": self.state.record().map(|record| record.base_image.clone()),
        })
    }
}

/// Makes sure the project has a descriptor to build from.
///
/// A missing descriptor is generated for the host interpreter and recorded.
/// A present one is never rewritten; its record only decides which warning
/// the operator sees.
///
/// # Errors
///
/// Returns an unsupported-runtime error when the host cannot be served, in
/// which case nothing is written, and a descriptor-io error when the files
/// cannot be read or written.
pub fn ensure_descriptor(
    root: &Path,
    host: &dyn HostProbe,
    mode: DescriptorMode,
    reporter: &dyn Reporter,
) -> Result<DescriptorOutcome> {
    let paths = DescriptorPaths::in_project(root);
    if paths.descriptor.exists() {
        return reuse_descriptor(paths, host, reporter);
    }

    let runtime = host.probe_runtime()?;
    let (version, base_image) = select_base_image(&runtime)
        .map_err(|rejection| unsupported_runtime(&runtime, &rejection))?;
    let contents = render_descriptor(&base_image);
    let record = DescriptorRecord::new(
        &runtime,
        version,
        &base_image,
        &contents,
        crate::TOOL_VERSION,
    );
    if mode == DescriptorMode::Plan {
        debug!(base_image = %base_image, "descriptor planned");
        return Ok(DescriptorOutcome {
            paths,
            state: DescriptorState::Written { record },
            persisted: false,
        });
    }

    fs::write(&paths.descriptor, &contents).map_err(|err| {
        descriptor_io("failed to write the image descriptor", &paths.descriptor, &err)
    })?;
    write_record(&paths.record, &record).map_err(|err| {
        sandbox_error(
            ErrorKind::DescriptorIo,
            "failed to write the descriptor record",
            json!({
                "path": paths.record.display().to_string(),
                "error": format!("{err:#}"),
            }),
        )
    })?;
    info!(path = %paths.descriptor.display(), base_image = %base_image, "descriptor written");
    reporter.notice(&Notice::DescriptorWritten {
        path: paths.descriptor.display().to_string(),
        base_image,
    });
    Ok(DescriptorOutcome {
        paths,
        state: DescriptorState::Written { record },
        persisted: true,
    })
}

fn reuse_descriptor(
    paths: DescriptorPaths,
    host: &dyn HostProbe,
    reporter: &dyn Reporter,
) -> Result<DescriptorOutcome> {
    let contents = fs::read_to_string(&paths.descriptor).map_err(|err| {
        descriptor_io("failed to read the image descriptor", &paths.descriptor, &err)
    })?;
    let record = match load_record_optional(&paths.record) {
        Ok(record) => record,
        Err(err) => {
            warn!(
                path = %paths.record.display(),
                error = %format!("{err:#}"),
                "ignoring unreadable descriptor record"
            );
            None
        }
    };
    // Staleness is advisory; a host that cannot be probed just skips the check.
    let current = match host.probe_runtime() {
        Ok(runtime) => Some(runtime),
        Err(err) => {
            debug!(error = %err, "host probe failed, descriptor staleness not checked");
            None
        }
    };
    let state = classify_descriptor(record, &contents, current.as_ref());
    let note = match &state {
        DescriptorState::Stale { record, host } => {
            warn!(
                recorded_python = %record.python_version,
                recorded_machine = %record.machine,
                host_python = %host.python_version,
                host_machine = %host.machine,
                "descriptor was generated for a different host"
            );
            Some(format!(
                "generated for Python {} on {}, host is Python {} on {}; delete it to regenerate",
                record.python_version, record.machine, host.python_version, host.machine
            ))
        }
        DescriptorState::Modified { .. } => {
            warn!(
                path = %paths.descriptor.display(),
                "descriptor was edited after it was generated"
            );
            Some("edited since it was generated; building it as-is".to_string())
        }
        DescriptorState::Untracked => {
            Some("no record of how it was generated; building it as-is".to_string())
        }
        DescriptorState::Written { .. } | DescriptorState::Reused { .. } => None,
    };
    reporter.notice(&Notice::DescriptorReused {
        path: paths.descriptor.display().to_string(),
        state: state.as_str().to_string(),
        note,
    });
    Ok(DescriptorOutcome {
        paths,
        state,
        persisted: true,
    })
}

fn unsupported_runtime(runtime: &HostRuntime, rejection: &RuntimeRejection) -> SandboxError {
    let hint = match rejection {
        RuntimeRejection::UnsupportedVersion { .. } => {
            format!("run with Python 3.6-3.9 or point {PYTHON_ENV} at a supported interpreter")
        }
        RuntimeRejection::UnsupportedArmVersion { .. } => {
            "use Python 3.8 or 3.9 on ARM hosts, or pull a prebuilt image instead".to_string()
        }
    };
    let supported: Vec<&str> = PythonVersion::SUPPORTED
        .iter()
        .map(|version| version.as_str())
        .collect();
    sandbox_error(
        ErrorKind::UnsupportedRuntime,
        rejection.to_string(),
        json!({
            "python_version": runtime.python_version,
            "machine": runtime.machine,
            "supported": supported,
            "hint": hint,
        }),
    )
}

fn descriptor_io(message: &str, path: &Path, err: &io::Error) -> SandboxError {
    sandbox_error(
        ErrorKind::DescriptorIo,
        message,
        json!({
            "path": path.display().to_string(),
            "error": err.to_string(),
        }),
    )
}
