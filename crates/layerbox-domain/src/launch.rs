use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::image::ResolvedImage;
use crate::project::ProjectContext;
use crate::runtime::TargetPlatform;

/// Host variables forwarded into the session when set.
pub const CREDENTIAL_ENV_VARS: [&str; 4] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_DEFAULT_REGION",
    "AWS_PROFILE",
];

pub const CREDENTIALS_CONTAINER_PATH: &str = "/root/.aws";
pub const WORKDIR_CONTAINER_PATH: &str = "/var/task";
pub const SANDBOX_PORT: u16 = 8000;

/// Sessions always run as amd64, whatever platform the image was built or
/// pulled for.
pub const RUN_PLATFORM: TargetPlatform = TargetPlatform::LinuxAmd64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub host: PathBuf,
    pub container: PathBuf,
    pub read_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

/// Everything needed to start a new session. Built once, consumed once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    pub container_name: String,
    pub platform: TargetPlatform,
    pub mounts: Vec<Mount>,
    pub env_vars: IndexMap<String, String>,
    pub port_bindings: Vec<PortBinding>,
    pub image: ResolvedImage,
}

/// Location of the host's AWS credentials directory under `home`.
#[must_use]
pub fn credentials_dir(home: &Path) -> PathBuf {
    home.join(".aws")
}

/// Assembles the launch parameters for a new session.
///
/// `credentials` is the host credentials directory when it exists; `host_env`
/// looks up a host variable. Unset variables are left out of the mapping.
pub fn assemble_launch_spec<F>(
    project: &ProjectContext,
    credentials: Option<&Path>,
    host_env: F,
    image: &ResolvedImage,
) -> LaunchSpec
where
    F: Fn(&str) -> Option<String>,
{
    let mut mounts = Vec::new();
    if let Some(dir) = credentials {
        mounts.push(Mount {
            host: dir.to_path_buf(),
            container: PathBuf::from(CREDENTIALS_CONTAINER_PATH),
            read_only: false,
        });
    }
    mounts.push(Mount {
        host: project.working_directory.clone(),
        container: PathBuf::from(WORKDIR_CONTAINER_PATH),
        read_only: false,
    });

    let env_vars = CREDENTIAL_ENV_VARS
        .iter()
        .filter_map(|name| host_env(name).map(|value| ((*name).to_string(), value)))
        .collect();

    LaunchSpec {
        container_name: project.session_key().as_str().to_string(),
        platform: RUN_PLATFORM,
        mounts,
        env_vars,
        port_bindings: vec![PortBinding {
            host: SANDBOX_PORT,
            container: SANDBOX_PORT,
        }],
        image: image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::image::ImageOrigin;

    fn project() -> ProjectContext {
        ProjectContext::from_dir(Path::new("/work/orders")).unwrap()
    }

    fn image() -> ResolvedImage {
        ResolvedImage {
            id: "sha256:abc".into(),
            reference: "repo:tag".into(),
            origin: ImageOrigin::Reused,
        }
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn only_present_credentials_are_forwarded() {
        let spec = assemble_launch_spec(
            &project(),
            None,
            env_from(&[("AWS_PROFILE", "dev")]),
            &image(),
        );
        assert_eq!(spec.env_vars.len(), 1);
        assert_eq!(
            spec.env_vars.get("AWS_PROFILE").map(String::as_str),
            Some("dev")
        );
        assert!(!spec.env_vars.contains_key("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn unrelated_host_variables_are_ignored() {
        let spec = assemble_launch_spec(
            &project(),
            None,
            env_from(&[
                ("HOME", "/root"),
                ("AWS_SESSION_TOKEN", "t"),
                ("AWS_DEFAULT_REGION", "eu-west-1"),
            ]),
            &image(),
        );
        assert_eq!(
            spec.env_vars.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["AWS_DEFAULT_REGION"]
        );
    }

    #[test]
    fn env_passthrough_keeps_whitelist_order() {
        let spec = assemble_launch_spec(
            &project(),
            None,
            env_from(&[
                ("AWS_PROFILE", "p"),
                ("AWS_ACCESS_KEY_ID", "id"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
            ]),
            &image(),
        );
        assert_eq!(
            spec.env_vars.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_PROFILE"]
        );
    }

    #[test]
    fn missing_credentials_dir_leaves_only_workdir_mount() {
        let spec = assemble_launch_spec(&project(), None, env_from(&[]), &image());
        assert_eq!(
            spec.mounts,
            vec![Mount {
                host: PathBuf::from("/work/orders"),
                container: PathBuf::from("/var/task"),
                read_only: false,
            }]
        );
    }

    #[test]
    fn credentials_dir_is_mounted_before_workdir() {
        let creds = credentials_dir(Path::new("/home/dev"));
        let spec = assemble_launch_spec(&project(), Some(&creds), env_from(&[]), &image());
        assert_eq!(spec.mounts.len(), 2);
        assert_eq!(spec.mounts[0].host, PathBuf::from("/home/dev/.aws"));
        assert_eq!(spec.mounts[0].container, PathBuf::from("/root/.aws"));
        assert!(!spec.mounts[0].read_only);
        assert_eq!(spec.mounts[1].container, PathBuf::from("/var/task"));
    }

    #[test]
    fn run_parameters_are_fixed() {
        let spec = assemble_launch_spec(&project(), None, env_from(&[]), &image());
        assert_eq!(spec.container_name, "sandbox-layer-orders");
        assert_eq!(spec.platform, TargetPlatform::LinuxAmd64);
        assert_eq!(
            spec.port_bindings,
            vec![PortBinding {
                host: 8000,
                container: 8000
            }]
        );
        assert_eq!(spec.image.id, "sha256:abc");
    }
}
