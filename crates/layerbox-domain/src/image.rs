use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Known-good image used when nothing else is requested.
pub const DEFAULT_IMAGE: &str = "esc5221/zappadock-layer:python3.9-x86_64";

/// Tag applied to locally built sandbox images.
pub const LOCAL_BUILD_TAG: &str = "sandbox-layer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSourceChoice {
    Build,
    PullNamed,
    PullDefault,
}

impl ImageSourceChoice {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::PullNamed => "pull",
            Self::PullDefault => "pull_default",
        }
    }
}

/// A `repository:tag` reference as typed by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("image reference must not be empty");
        }
        if trimmed.chars().any(char::is_whitespace) {
            bail!("image reference `{trimmed}` must not contain whitespace");
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn default_image() -> Self {
        Self(DEFAULT_IMAGE.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image known to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalImage {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// What a pull produced. Multi-platform pulls may return several images.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PulledImage {
    One(LocalImage),
    Many(Vec<LocalImage>),
}

impl PulledImage {
    /// Only the first image of a list backs the session.
    #[must_use]
    pub fn into_first(self) -> Option<LocalImage> {
        match self {
            Self::One(image) => Some(image),
            Self::Many(images) => images.into_iter().next(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Built,
    Reused,
    Pulled,
}

/// The single engine-addressable image a new session starts from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedImage {
    pub id: String,
    pub reference: String,
    pub origin: ImageOrigin,
}

impl ResolvedImage {
    #[must_use]
    pub fn from_local(image: LocalImage, reference: &str, origin: ImageOrigin) -> Self {
        Self {
            id: image.id,
            reference: reference.to_string(),
            origin,
        }
    }
}

/// Finds a local image tagged exactly `reference`.
#[must_use]
pub fn find_local_image<'a>(
    images: &'a [LocalImage],
    reference: &ImageReference,
) -> Option<&'a LocalImage> {
    images
        .iter()
        .find(|image| image.tags.iter().any(|tag| tag == reference.as_str()))
}
