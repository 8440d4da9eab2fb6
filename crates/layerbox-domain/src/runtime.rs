use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Architecture/OS pairs an image can be built or pulled for.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum TargetPlatform {
    #[strum(serialize = "linux/amd64")]
    #[serde(rename = "linux/amd64")]
    LinuxAmd64,
    #[strum(serialize = "linux/arm64")]
    #[serde(rename = "linux/arm64")]
    LinuxArm64,
    #[strum(serialize = "linux/arm/v7")]
    #[serde(rename = "linux/arm/v7")]
    LinuxArmV7,
}

impl TargetPlatform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Interpreter versions the Lambda build images exist for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PythonVersion {
    #[serde(rename = "3.6")]
    Py36,
    #[serde(rename = "3.7")]
    Py37,
    #[serde(rename = "3.8")]
    Py38,
    #[serde(rename = "3.9")]
    Py39,
}

impl PythonVersion {
    pub const SUPPORTED: [PythonVersion; 4] = [Self::Py36, Self::Py37, Self::Py38, Self::Py39];

    /// Parses `major.minor` (extra components such as `3.9.18` are ignored).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');
        let major = parts.next()?;
        let minor = parts.next()?;
        match (major, minor) {
            ("3", "6") => Some(Self::Py36),
            ("3", "7") => Some(Self::Py37),
            ("3", "8") => Some(Self::Py38),
            ("3", "9") => Some(Self::Py39),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Py36 => "3.6",
            Self::Py37 => "3.7",
            Self::Py38 => "3.8",
            Self::Py39 => "3.9",
        }
    }

    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Py36 | Self::Py37)
    }

    /// Base image the sandbox descriptor builds from.
    #[must_use]
    pub fn base_image(self) -> String {
        if self.is_legacy() {
            format!("lambci/lambda:build-python{}", self.as_str())
        } else {
            format!("mlupin/docker-lambda:python{}-build", self.as_str())
        }
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host interpreter reported about itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRuntime {
    /// `major.minor` of the host interpreter, unvalidated.
    pub python_version: String,
    pub machine: String,
}

impl HostRuntime {
    #[must_use]
    pub fn new(python_version: impl Into<String>, machine: impl Into<String>) -> Self {
        let python_version = python_version.into();
        let short = python_version
            .trim()
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            python_version: short,
            machine: machine.into().trim().to_ascii_lowercase(),
        }
    }
}

#[must_use]
pub fn is_arm_machine(machine: &str) -> bool {
    matches!(
        machine.trim().to_ascii_lowercase().as_str(),
        "aarch64" | "arm64" | "armv7l" | "armv8l"
    )
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeRejection {
    #[error("Python version {version} is not supported. Please use 3.6, 3.7, 3.8, or 3.9.")]
    UnsupportedVersion { version: String },
    #[error("AWS Lambda does not support Python {version} on ARM64 devices ({machine}).")]
    UnsupportedArmVersion { version: String, machine: String },
}

/// Picks the descriptor's base image for the host, or says why it cannot.
pub fn select_base_image(host: &HostRuntime) -> Result<(PythonVersion, String), RuntimeRejection> {
    let version = PythonVersion::parse(&host.python_version).ok_or_else(|| {
        RuntimeRejection::UnsupportedVersion {
            version: host.python_version.clone(),
        }
    })?;
    if is_arm_machine(&host.machine) && version.is_legacy() {
        return Err(RuntimeRejection::UnsupportedArmVersion {
            version: version.as_str().to_string(),
            machine: host.machine.clone(),
        });
    }
    Ok((version, version.base_image()))
}
