#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod descriptor;
pub mod image;
pub mod launch;
pub mod project;
pub mod runtime;
pub mod session;

pub use descriptor::{
    classify_descriptor, descriptor_digest, load_record_optional, render_descriptor,
    write_record, DescriptorPaths, DescriptorRecord, DescriptorState, DESCRIPTOR_FILE,
    RECORD_FILE, RECORD_VERSION,
};
pub use image::{
    find_local_image, ImageOrigin, ImageReference, ImageSourceChoice, LocalImage, PulledImage,
    ResolvedImage, DEFAULT_IMAGE, LOCAL_BUILD_TAG,
};
pub use launch::{
    assemble_launch_spec, credentials_dir, LaunchSpec, Mount, PortBinding,
    CREDENTIALS_CONTAINER_PATH, CREDENTIAL_ENV_VARS, RUN_PLATFORM, SANDBOX_PORT,
    WORKDIR_CONTAINER_PATH,
};
pub use project::ProjectContext;
pub use runtime::{
    is_arm_machine, select_base_image, HostRuntime, PythonVersion, RuntimeRejection,
    TargetPlatform,
};
pub use session::{RunningSession, SessionKey, SessionRegistry, SESSION_PREFIX};
