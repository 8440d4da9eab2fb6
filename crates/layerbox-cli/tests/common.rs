#![cfg(unix)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use tempfile::TempDir;

pub const DEFAULT_IMAGE: &str = "esc5221/zappadock-layer:python3.9-x86_64";

/// Stands in for `docker`: logs every invocation and answers from the
/// `FAKE_*` variables the test sets.
const FAKE_ENGINE: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_ENGINE_LOG"
case "$1" in
  ps)
    printf '%b' "${FAKE_PS:-}"
    ;;
  image)
    case "$2" in
      ls) printf '%b' "${FAKE_IMAGES:-}" ;;
      inspect) echo "sha256:fake${FAKE_IMAGE_SUFFIX:-0001}" ;;
    esac
    ;;
  pull)
    if [ -n "${FAKE_PULL_FAIL:-}" ]; then
      echo "Error response from daemon: manifest unknown" >&2
      exit 1
    fi
    echo "Status: Downloaded newer image"
    ;;
  build)
    cat > "$FAKE_ENGINE_LOG.dockerfile"
    echo "Successfully built"
    ;;
  run)
    printf '%s' "${AWS_SECRET_ACCESS_KEY:-}" > "$FAKE_ENGINE_LOG.secret"
    echo "container output"
    exit "${FAKE_RUN_EXIT:-0}"
    ;;
  attach)
    exit 0
    ;;
esac
"#;

pub struct Sandbox {
    pub temp: TempDir,
    pub project: PathBuf,
    pub home: PathBuf,
    pub bin: PathBuf,
    pub engine: PathBuf,
    pub python: PathBuf,
    pub log: PathBuf,
}

impl Sandbox {
    /// A project folder named `proj`, a fake engine, and a fake Python 3.9
    /// on x86_64.
    pub fn new() -> Self {
        Self::with_host("3.9.18", "x86_64")
    }

    pub fn with_host(python_version: &str, machine: &str) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("proj");
        let home = temp.path().join("home");
        let bin = temp.path().join("bin");
        for dir in [&project, &home, &bin] {
            fs::create_dir_all(dir).expect("create dir");
        }
        let engine = bin.join("fake-docker");
        write_script(&engine, FAKE_ENGINE);
        let python = bin.join("python3");
        write_script(
            &python,
            &format!(
                "#!/bin/sh\necho '{{\"python_version\": \"{python_version}\", \"machine\": \"{machine}\"}}'\n"
            ),
        );
        let log = temp.path().join("engine.log");
        Self {
            temp,
            project,
            home,
            bin,
            engine,
            python,
            log,
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("layerbox");
        cmd.current_dir(&self.project)
            .env("LAYERBOX_ENGINE", &self.engine)
            .env("LAYERBOX_PYTHON", &self.python)
            .env("HOME", &self.home)
            .env("FAKE_ENGINE_LOG", &self.log)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .write_stdin("");
        for name in [
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_SESSION_TOKEN",
            "AWS_PROFILE",
        ] {
            cmd.env_remove(name);
        }
        cmd
    }

    /// Installs the fake engine as `name` in the sandbox's `bin` directory, for
    /// runs that leave the engine to `PATH` lookup.
    pub fn install_engine_as(&self, name: &str) -> PathBuf {
        let path = self.bin.join(name);
        write_script(&path, FAKE_ENGINE);
        path
    }

    /// Every engine invocation so far, one argument string per line.
    pub fn engine_calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn side_file(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}.{suffix}", self.log.display()))
    }
}

pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("json envelope")
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}
