use std::path::Path;

use anyhow::Result;
use layerbox_domain::{
    find_local_image, DescriptorPaths, ImageOrigin, ImageReference, ImageSourceChoice,
    ResolvedImage, TargetPlatform, LOCAL_BUILD_TAG,
};
use serde_json::json;
use tracing::debug;

use super::orchestrate::SandboxRequest;
use super::prompt::Prompter;
use crate::{sandbox_error, BuildRequest, ContainerEngine, ErrorKind, Notice, Reporter};

/// Settles the image source for this invocation.
///
/// The flag decides unless the operator asked to choose and can be asked.
/// An explicit `--image` turns the default pull into a named one.
///
/// # Errors
///
/// Returns an invalid-input error when `--image` is combined with a build.
pub fn select_source(
    request: &SandboxRequest,
    interactive: bool,
    prompter: &dyn Prompter,
) -> Result<ImageSourceChoice> {
    let mut source = request.source;
    if request.choose && interactive {
        if let Some(choice) = prompter.choose_source()? {
            source = choice;
        }
    }
    match (source, request.image.as_deref()) {
        (ImageSourceChoice::Build, Some(image)) => Err(sandbox_error(
            ErrorKind::InvalidInput,
            "an image reference cannot be used with a local build",
            json!({
                "image": image,
                "hint": "drop --image, or pass --image-source pull",
            }),
        )
        .into()),
        (ImageSourceChoice::PullDefault, Some(_)) => Ok(ImageSourceChoice::PullNamed),
        (source, _) => Ok(source),
    }
}

/// The `repository:tag` a pull source resolves to.
///
/// # Errors
///
/// Returns an invalid-input error for a malformed reference.
pub fn pull_reference(
    source: ImageSourceChoice,
    explicit: Option<&str>,
    interactive: bool,
    prompter: &dyn Prompter,
) -> Result<ImageReference> {
    let default = ImageReference::default_image();
    if source != ImageSourceChoice::PullNamed {
        return Ok(default);
    }
    if let Some(raw) = explicit {
        return parse_reference(raw);
    }
    if !interactive {
        return Ok(default);
    }
    match prompter.repository(&default)? {
        Some(answer) if !answer.trim().is_empty() => parse_reference(&answer),
        _ => Ok(default),
    }
}

fn parse_reference(raw: &str) -> Result<ImageReference> {
    ImageReference::parse(raw).map_err(|err| {
        sandbox_error(
            ErrorKind::InvalidInput,
            "invalid image reference",
            json!({
                "image": raw,
                "error": err.to_string(),
                "hint": "use the form repository:tag",
            }),
        )
        .into()
    })
}

/// Builds the sandbox image from the project's descriptor.
///
/// # Errors
///
/// Returns a build-failed error when the engine rejects the build.
pub fn build_local_image(
    engine: &dyn ContainerEngine,
    paths: &DescriptorPaths,
    context: &Path,
    platform: Option<TargetPlatform>,
    reporter: &dyn Reporter,
) -> Result<ResolvedImage> {
    reporter.notice(&Notice::BuildingImage {
        tag: LOCAL_BUILD_TAG.to_string(),
    });
    let image = engine.build_image(&BuildRequest {
        descriptor: &paths.descriptor,
        context,
        tag: LOCAL_BUILD_TAG,
        platform,
    })?;
    debug!(id = %image.id, "image built");
    Ok(ResolvedImage::from_local(image, LOCAL_BUILD_TAG, ImageOrigin::Built))
}

/// Reuses a local image tagged exactly `reference`, pulling only when none
/// exists. With `dry_run` no pull happens and the reference stands in for
/// the image id.
///
/// # Errors
///
/// Returns a pull-failed error when the pull fails or yields no image.
pub fn resolve_pull(
    engine: &dyn ContainerEngine,
    reference: &ImageReference,
    platform: Option<TargetPlatform>,
    dry_run: bool,
    reporter: &dyn Reporter,
) -> Result<ResolvedImage> {
    let images = engine.list_local_images()?;
    if let Some(local) = find_local_image(&images, reference) {
        debug!(reference = %reference, id = %local.id, "local image found");
        reporter.notice(&Notice::ReusingLocalImage {
            reference: reference.to_string(),
        });
        return Ok(ResolvedImage::from_local(
            local.clone(),
            reference.as_str(),
            ImageOrigin::Reused,
        ));
    }
    if dry_run {
        return Ok(ResolvedImage {
            id: reference.to_string(),
            reference: reference.to_string(),
            origin: ImageOrigin::Pulled,
        });
    }

    reporter.notice(&Notice::PullingImage {
        reference: reference.to_string(),
    });
    let pulled = engine.pull_image(reference, platform)?;
    let image = pulled.into_first().ok_or_else(|| {
        sandbox_error(
            ErrorKind::PullFailed,
            "the pull produced no image",
            json!({
                "reference": reference.as_str(),
                "hint": "check that the image exists for the requested platform",
            }),
        )
    })?;
    debug!(reference = %reference, id = %image.id, "image pulled");
    Ok(ResolvedImage::from_local(image, reference.as_str(), ImageOrigin::Pulled))
}
