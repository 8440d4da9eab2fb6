use anyhow::Result;
use layerbox_domain::{ImageReference, ImageSourceChoice};

/// Operator questions asked while resolving the image.
///
/// Returning `None` keeps the non-interactive answer.
pub trait Prompter {
    /// Build locally or pull a named image.
    fn choose_source(&self) -> Result<Option<ImageSourceChoice>>;
    /// The `repository:tag` to pull, offering `default`.
    fn repository(&self, default: &ImageReference) -> Result<Option<String>>;
}

/// Never asks anything.
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn choose_source(&self) -> Result<Option<ImageSourceChoice>> {
        Ok(None)
    }

    fn repository(&self, _default: &ImageReference) -> Result<Option<String>> {
        Ok(None)
    }
}
