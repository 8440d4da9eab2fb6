//! The generated build recipe for locally built sandbox images.
//!
//! The descriptor is written once and then trusted: later invocations reuse it
//! verbatim. A versioned record stored next to it remembers the inputs it was
//! generated from, so drift between the recorded host and the current host (or
//! hand edits of the descriptor) can be reported without regenerating it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::runtime::{HostRuntime, PythonVersion};

pub const DESCRIPTOR_FILE: &str = ".sandbox-layer.Dockerfile";
pub const RECORD_FILE: &str = ".sandbox-layer.json";
pub const RECORD_VERSION: u32 = 1;

const DESCRIPTOR_TEMPLATE: &str = r#"
FROM {base_image}

WORKDIR /var/task

# Prompt marker so the sandbox shell is recognisable
RUN echo 'export PS1="\[\e[36m\]sandbox-layer>\[\e[m\] "' >> /root/.bashrc && \
    yum clean all && \
    yum install -y which clang cmake python-devel python3-devel amazon-linux-extras gcc openssl-devel bzip2-devel libffi-devel wget tar gzip make postgresql-devel && \
    echo 'virtualenv -p python3 ./layer-venv >/dev/null' >> /root/.bashrc && \
    echo 'virtualenv -p python3 ./code-venv >/dev/null' >> /root/.bashrc && \
    echo 'source ./code-venv/bin/activate >/dev/null' >> /root/.bashrc

CMD ["bash"]
"#;

#[must_use]
pub fn render_descriptor(base_image: &str) -> String {
    DESCRIPTOR_TEMPLATE.replace("{base_image}", base_image)
}

#[must_use]
pub fn descriptor_digest(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorPaths {
    pub descriptor: PathBuf,
    pub record: PathBuf,
}

impl DescriptorPaths {
    #[must_use]
    pub fn in_project(root: &Path) -> Self {
        Self {
            descriptor: root.join(DESCRIPTOR_FILE),
            record: root.join(RECORD_FILE),
        }
    }
}

/// Inputs a descriptor was generated from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub record_version: u32,
    pub base_image: String,
    pub python_version: String,
    pub machine: String,
    pub descriptor_sha256: String,
    pub created_at: String,
    pub tool_version: String,
}

impl DescriptorRecord {
    #[must_use]
    pub fn new(
        host: &HostRuntime,
        version: PythonVersion,
        base_image: &str,
        contents: &str,
        tool_version: &str,
    ) -> Self {
        Self {
            record_version: RECORD_VERSION,
            base_image: base_image.to_string(),
            python_version: version.as_str().to_string(),
            machine: host.machine.clone(),
            descriptor_sha256: descriptor_digest(contents),
            created_at: record_timestamp(),
            tool_version: tool_version.to_string(),
        }
    }

    fn matches_host(&self, host: &HostRuntime) -> bool {
        self.python_version == host.python_version && self.machine == host.machine
    }
}

fn record_timestamp() -> String {
    let ts = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Reads the record next to a descriptor; a missing file yields `None`.
pub fn load_record_optional(path: &Path) -> Result<Option<DescriptorRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let record: DescriptorRecord = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(record))
}

pub fn write_record(path: &Path, record: &DescriptorRecord) -> Result<()> {
    let mut encoded = serde_json::to_vec_pretty(record)?;
    encoded.push(b'\n');
    fs::write(path, encoded).with_context(|| format!("writing {}", path.display()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DescriptorState {
    /// Generated during this invocation.
    Written { record: DescriptorRecord },
    /// Present and consistent with its record and the current host.
    Reused { record: DescriptorRecord },
    /// Present, but generated for a different interpreter or machine.
    Stale {
        record: DescriptorRecord,
        host: HostRuntime,
    },
    /// Present, but edited since it was generated.
    Modified { record: DescriptorRecord },
    /// Present without a usable record.
    Untracked,
}

impl DescriptorState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written { .. } => "written",
            Self::Reused { .. } => "reused",
            Self::Stale { .. } => "stale",
            Self::Modified { .. } => "modified",
            Self::Untracked => "untracked",
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&DescriptorRecord> {
        match self {
            Self::Written { record }
            | Self::Reused { record }
            | Self::Stale { record, .. }
            | Self::Modified { record } => Some(record),
            Self::Untracked => None,
        }
    }
}

/// Classifies an existing descriptor against its record and, when known, the
/// current host.
#[must_use]
pub fn classify_descriptor(
    record: Option<DescriptorRecord>,
    contents: &str,
    host: Option<&HostRuntime>,
) -> DescriptorState {
    let Some(record) = record else {
        return DescriptorState::Untracked;
    };
    if record.record_version != RECORD_VERSION {
        return DescriptorState::Untracked;
    }
    if record.descriptor_sha256 != descriptor_digest(contents) {
        return DescriptorState::Modified { record };
    }
    match host {
        Some(host) if !record.matches_host(host) => DescriptorState::Stale {
            record,
            host: host.clone(),
        },
        _ => DescriptorState::Reused { record },
    }
}
