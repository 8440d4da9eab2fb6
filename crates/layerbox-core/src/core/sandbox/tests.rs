use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use layerbox_domain::{
    DescriptorPaths, DescriptorState, HostRuntime, ImageOrigin, ImageReference,
    ImageSourceChoice, LaunchSpec, LocalImage, ProjectContext, PulledImage, RunningSession,
    TargetPlatform, DEFAULT_IMAGE,
};
use serde_json::json;
use tempfile::{tempdir, TempDir};

use super::*;
use crate::{
    sandbox_error, BuildRequest, CommandContext, CommandStatus, ContainerEngine, Effects,
    EnvSnapshot, ErrorKind, ExecutionOutcome, GlobalOptions, HostProbe, Notice,
    RecordingReporter, SandboxError, SessionOptions, SessionOutcome,
};

#[derive(Default)]
struct FakeEngine {
    running: Vec<RunningSession>,
    local: Vec<LocalImage>,
    pulled: Option<PulledImage>,
    build_fails: bool,
    session: Option<SessionOutcome>,
    calls: Mutex<Vec<String>>,
    launched: Mutex<Option<LaunchSpec>>,
    pull_platform: Mutex<Option<Option<TargetPlatform>>>,
}

impl FakeEngine {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, name: &str) -> bool {
        self.calls().iter().any(|call| call == name)
    }

    fn launched(&self) -> Option<LaunchSpec> {
        self.launched.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn session_outcome(&self) -> SessionOutcome {
        self.session
            .clone()
            .unwrap_or(SessionOutcome::Exited { code: 0 })
    }
}

impl ContainerEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn list_running_sessions(&self) -> Result<Vec<RunningSession>> {
        self.record("ps");
        Ok(self.running.clone())
    }

    fn list_local_images(&self) -> Result<Vec<LocalImage>> {
        self.record("images");
        Ok(self.local.clone())
    }

    fn build_image(&self, request: &BuildRequest<'_>) -> Result<LocalImage> {
        self.record("build");
        assert!(request.descriptor.exists(), "descriptor must exist before a build");
        if self.build_fails {
            return Err(sandbox_error(
                ErrorKind::BuildFailed,
                "image build failed",
                json!({ "stderr": "yum: command not found" }),
            )
            .into());
        }
        Ok(LocalImage {
            id: "sha256:built".into(),
            tags: vec![request.tag.to_string()],
        })
    }

    fn pull_image(
        &self,
        reference: &ImageReference,
        platform: Option<TargetPlatform>,
    ) -> Result<PulledImage> {
        self.record("pull");
        *self.pull_platform.lock().unwrap() = Some(platform);
        match &self.pulled {
            Some(pulled) => Ok(pulled.clone()),
            None => Err(sandbox_error(
                ErrorKind::PullFailed,
                "image pull failed",
                json!({ "reference": reference.as_str() }),
            )
            .into()),
        }
    }

    fn run_command_line(&self, spec: &LaunchSpec, options: SessionOptions) -> Vec<String> {
        let mut line = vec!["fake".to_string(), "run".to_string()];
        if options.tty {
            line.push("-t".to_string());
        }
        line.push(spec.container_name.clone());
        line.push(spec.image.id.clone());
        line
    }

    fn run_interactive(
        &self,
        spec: &LaunchSpec,
        _options: SessionOptions,
    ) -> Result<SessionOutcome> {
        self.record("run");
        *self.launched.lock().unwrap() = Some(spec.clone());
        Ok(self.session_outcome())
    }

    fn attach_interactive(
        &self,
        session: &RunningSession,
        _options: SessionOptions,
    ) -> Result<SessionOutcome> {
        self.record(&format!("attach {}", session.name));
        Ok(self.session_outcome())
    }
}

struct FakeHost {
    runtime: Option<HostRuntime>,
    tty: bool,
}

impl HostProbe for FakeHost {
    fn probe_runtime(&self) -> Result<HostRuntime> {
        self.runtime.clone().ok_or_else(|| {
            sandbox_error(
                ErrorKind::InterpreterProbeFailed,
                "no python interpreter found",
                json!({}),
            )
            .into()
        })
    }

    fn stdin_is_terminal(&self) -> bool {
        self.tty
    }
}

struct FakeEffects {
    engine: Arc<FakeEngine>,
    host: FakeHost,
}

impl Effects for FakeEffects {
    fn engine(&self) -> &dyn ContainerEngine {
        self.engine.as_ref()
    }

    fn host(&self) -> &dyn HostProbe {
        &self.host
    }
}

#[derive(Default)]
struct ScriptedPrompter {
    source: Option<ImageSourceChoice>,
    repository: Option<String>,
    asked: Cell<usize>,
}

impl Prompter for ScriptedPrompter {
    fn choose_source(&self) -> Result<Option<ImageSourceChoice>> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.source)
    }

    fn repository(&self, default: &ImageReference) -> Result<Option<String>> {
        assert_eq!(default.as_str(), DEFAULT_IMAGE);
        self.asked.set(self.asked.get() + 1);
        Ok(self.repository.clone())
    }
}

struct Harness {
    project: TempDir,
    home: TempDir,
    engine: Arc<FakeEngine>,
    runtime: Option<HostRuntime>,
    tty: bool,
    env: Vec<(String, String)>,
}

impl Harness {
    fn new(engine: FakeEngine) -> Self {
        Self {
            project: tempdir().unwrap(),
            home: tempdir().unwrap(),
            engine: Arc::new(engine),
            runtime: Some(HostRuntime::new("3.9.18", "x86_64")),
            tty: false,
            env: Vec::new(),
        }
    }

    fn root(&self) -> &Path {
        self.project.path()
    }

    fn key(&self) -> String {
        ProjectContext::from_dir(self.root())
            .unwrap()
            .session_key()
            .to_string()
    }

    fn descriptor_paths(&self) -> DescriptorPaths {
        DescriptorPaths::in_project(self.root())
    }

    fn open(
        &self,
        request: &SandboxRequest,
        prompter: &dyn Prompter,
    ) -> (Result<ExecutionOutcome>, Vec<Notice>) {
        let global = GlobalOptions::default();
        let mut pairs: Vec<(&str, &str)> = vec![("HOME", self.home.path().to_str().unwrap())];
        pairs.extend(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let effects = FakeEffects {
            engine: self.engine.clone(),
            host: FakeHost {
                runtime: self.runtime.clone(),
                tty: self.tty,
            },
        };
        let ctx = CommandContext::from_parts(
            &global,
            EnvSnapshot::testing(&pairs),
            self.root().to_path_buf(),
            Arc::new(effects),
        );
        let reporter = RecordingReporter::default();
        let result = open_sandbox(&ctx, request, prompter, &reporter);
        (result, reporter.notices())
    }
}

fn request(source: ImageSourceChoice) -> SandboxRequest {
    SandboxRequest {
        source,
        choose: false,
        image: None,
        platform: None,
        dry_run: false,
        no_input: false,
    }
}

fn sandbox_kind(err: &anyhow::Error) -> ErrorKind {
    err.downcast_ref::<SandboxError>()
        .expect("sandbox error")
        .kind()
}

fn local(id: &str, tags: &[&str]) -> LocalImage {
    LocalImage {
        id: id.to_string(),
        tags: tags.iter().map(ToString::to_string).collect(),
    }
}

#[test]
fn running_session_is_reattached_without_resolving_an_image() {
    let project = tempdir().unwrap();
    let key = ProjectContext::from_dir(project.path())
        .unwrap()
        .session_key();
    let engine = FakeEngine {
        running: vec![
            RunningSession {
                name: "postgres".into(),
                handle: "aaa".into(),
            },
            RunningSession {
                name: key.to_string(),
                handle: "bbb".into(),
            },
        ],
        session: Some(SessionOutcome::Exited { code: 4 }),
        ..FakeEngine::default()
    };
    let mut harness = Harness::new(engine);
    harness.project = project;

    let (result, notices) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let outcome = result.unwrap();

    assert_eq!(
        harness.engine.calls(),
        vec!["ps".to_string(), format!("attach {key}")]
    );
    assert!(harness.engine.launched().is_none());
    assert!(!harness.descriptor_paths().descriptor.exists());
    assert_eq!(outcome.details["action"], "reattach");
    assert_eq!(outcome.exit_code(), 4);
    assert_eq!(
        notices,
        vec![Notice::AttachingToSession {
            name: key.to_string()
        }]
    );
}

#[test]
fn foreign_containers_do_not_trigger_reattach() {
    let engine = FakeEngine {
        running: vec![RunningSession {
            name: "sandbox-layer-some-other-project".into(),
            handle: "ccc".into(),
        }],
        ..FakeEngine::default()
    };
    let harness = Harness::new(engine);
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    result.unwrap();
    assert!(harness.engine.called("run"));
    assert!(!harness.engine.calls().iter().any(|c| c.starts_with("attach")));
}

#[test]
fn build_writes_descriptor_for_newer_python() {
    let harness = Harness::new(FakeEngine::default());
    let (result, notices) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let outcome = result.unwrap();

    let paths = harness.descriptor_paths();
    let contents = fs::read_to_string(&paths.descriptor).unwrap();
    assert!(contents.contains("FROM mlupin/docker-lambda:python3.9-build"));
    let record = layerbox_domain::load_record_optional(&paths.record)
        .unwrap()
        .expect("record written");
    assert_eq!(record.python_version, "3.9");
    assert_eq!(record.machine, "x86_64");

    let launched = harness.engine.launched().expect("session launched");
    assert_eq!(launched.image.id, "sha256:built");
    assert_eq!(launched.image.origin, ImageOrigin::Built);
    assert_eq!(launched.container_name, harness.key());
    assert_eq!(outcome.details["descriptor"]["state"], "written");
    assert!(notices.contains(&Notice::BuildingImage {
        tag: "sandbox-layer".into()
    }));
}

#[test]
fn legacy_python_uses_lambci_family() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.runtime = Some(HostRuntime::new("3.7.12", "x86_64"));
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    result.unwrap();
    let contents = fs::read_to_string(harness.descriptor_paths().descriptor).unwrap();
    assert!(contents.contains("FROM lambci/lambda:build-python3.7"));
}

#[test]
fn unsupported_python_aborts_before_writing() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.runtime = Some(HostRuntime::new("3.11.4", "x86_64"));
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let err = result.unwrap_err();

    assert_eq!(sandbox_kind(&err), ErrorKind::UnsupportedRuntime);
    let paths = harness.descriptor_paths();
    assert!(!paths.descriptor.exists());
    assert!(!paths.record.exists());
    assert!(!harness.engine.called("build"));
    assert!(!harness.engine.called("run"));
}

#[test]
fn arm_host_with_legacy_python_aborts_before_writing() {
    for version in ["3.6.15", "3.7.17"] {
        let mut harness = Harness::new(FakeEngine::default());
        harness.runtime = Some(HostRuntime::new(version, "AArch64"));
        let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
        let err = result.unwrap_err();
        assert_eq!(sandbox_kind(&err), ErrorKind::UnsupportedRuntime);
        let details = err.downcast_ref::<SandboxError>().unwrap().details();
        assert_eq!(details["machine"], "aarch64");
        assert!(!harness.descriptor_paths().descriptor.exists());
    }
}

#[test]
fn arm_host_with_newer_python_builds() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.runtime = Some(HostRuntime::new("3.8.16", "arm64"));
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    result.unwrap();
    let contents = fs::read_to_string(harness.descriptor_paths().descriptor).unwrap();
    assert!(contents.contains("FROM mlupin/docker-lambda:python3.8-build"));
}

#[test]
fn existing_descriptor_is_never_rewritten() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.runtime = Some(HostRuntime::new("3.6.0", "armv7l"));
    let paths = harness.descriptor_paths();
    fs::write(&paths.descriptor, "FROM custom/base:1\n").unwrap();

    let (result, notices) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let outcome = result.unwrap();

    assert_eq!(
        fs::read_to_string(&paths.descriptor).unwrap(),
        "FROM custom/base:1\n"
    );
    assert!(!paths.record.exists());
    assert!(harness.engine.called("build"));
    assert_eq!(outcome.details["descriptor"]["state"], "untracked");
    assert!(notices.iter().any(|notice| matches!(
        notice,
        Notice::DescriptorReused { state, .. } if state == "untracked"
    )));
}

#[test]
fn descriptor_from_another_host_is_reported_stale_and_kept() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.open(&request(ImageSourceChoice::Build), &NoPrompt).0.unwrap();
    let paths = harness.descriptor_paths();
    let before = fs::read_to_string(&paths.descriptor).unwrap();
    let record_before = fs::read_to_string(&paths.record).unwrap();

    harness.runtime = Some(HostRuntime::new("3.8.10", "x86_64"));
    let (result, notices) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let outcome = result.unwrap();

    assert_eq!(fs::read_to_string(&paths.descriptor).unwrap(), before);
    assert_eq!(fs::read_to_string(&paths.record).unwrap(), record_before);
    assert_eq!(outcome.details["descriptor"]["state"], "stale");
    let note = notices
        .iter()
        .find_map(|notice| match notice {
            Notice::DescriptorReused { note, .. } => note.clone(),
            _ => None,
        })
        .expect("stale note");
    assert!(note.contains("Python 3.9"));
    assert!(note.contains("Python 3.8"));
}

#[test]
fn edited_descriptor_is_reported_modified() {
    let harness = Harness::new(FakeEngine::default());
    harness.open(&request(ImageSourceChoice::Build), &NoPrompt).0.unwrap();
    let paths = harness.descriptor_paths();
    fs::write(
        &paths.descriptor,
        "FROM mlupin/docker-lambda:python3.9-build\nRUN true\n",
    )
    .unwrap();

    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    assert_eq!(result.unwrap().details["descriptor"]["state"], "modified");
}

#[test]
fn unchanged_descriptor_is_reused_quietly() {
    let harness = Harness::new(FakeEngine::default());
    harness.open(&request(ImageSourceChoice::Build), &NoPrompt).0.unwrap();
    let (result, notices) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    assert_eq!(result.unwrap().details["descriptor"]["state"], "reused");
    assert!(notices.contains(&Notice::DescriptorReused {
        path: harness.descriptor_paths().descriptor.display().to_string(),
        state: "reused".into(),
        note: None,
    }));
}

#[test]
fn unprobeable_host_still_reuses_existing_descriptor() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.open(&request(ImageSourceChoice::Build), &NoPrompt).0.unwrap();
    harness.runtime = None;
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    assert_eq!(result.unwrap().details["descriptor"]["state"], "reused");
}

#[test]
fn build_failure_is_fatal() {
    let harness = Harness::new(FakeEngine {
        build_fails: true,
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::Build), &NoPrompt);
    let err = result.unwrap_err();
    assert_eq!(sandbox_kind(&err), ErrorKind::BuildFailed);
    assert!(!harness.engine.called("run"));
    assert!(!harness.engine.called("pull"));
}

#[test]
fn local_image_with_exact_tag_is_reused_without_pull() {
    let harness = Harness::new(FakeEngine {
        local: vec![
            local("sha256:other", &["myrepo:tag10"]),
            local("sha256:mine", &["myrepo:latest", "myrepo:tag1"]),
        ],
        ..FakeEngine::default()
    });
    let mut req = request(ImageSourceChoice::PullNamed);
    req.image = Some("myrepo:tag1".into());
    let (result, notices) = harness.open(&req, &NoPrompt);
    result.unwrap();

    assert!(!harness.engine.called("pull"));
    let launched = harness.engine.launched().unwrap();
    assert_eq!(launched.image.id, "sha256:mine");
    assert_eq!(launched.image.origin, ImageOrigin::Reused);
    assert!(notices.contains(&Notice::ReusingLocalImage {
        reference: "myrepo:tag1".into()
    }));
}

#[test]
fn default_pull_uses_known_good_image() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[DEFAULT_IMAGE]))),
        ..FakeEngine::default()
    });
    let prompter = ScriptedPrompter::default();
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &prompter);
    let outcome = result.unwrap();

    assert_eq!(prompter.asked.get(), 0);
    assert!(harness.engine.called("pull"));
    assert_eq!(outcome.details["image"]["reference"], DEFAULT_IMAGE);
    assert_eq!(outcome.details["image"]["origin"], "pulled");
    assert!(!harness.descriptor_paths().descriptor.exists());
}

#[test]
fn multi_image_pull_takes_the_first() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::Many(vec![
            local("sha256:first", &[]),
            local("sha256:second", &[]),
        ])),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    result.unwrap();
    assert_eq!(harness.engine.launched().unwrap().image.id, "sha256:first");
}

#[test]
fn empty_pull_is_a_pull_failure() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::Many(Vec::new())),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    assert_eq!(sandbox_kind(&result.unwrap_err()), ErrorKind::PullFailed);
    assert!(!harness.engine.called("run"));
}

#[test]
fn pull_failure_does_not_fall_back_to_build() {
    let harness = Harness::new(FakeEngine::default());
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    assert_eq!(sandbox_kind(&result.unwrap_err()), ErrorKind::PullFailed);
    assert!(!harness.engine.called("build"));
    assert!(!harness.descriptor_paths().descriptor.exists());
}

#[test]
fn named_pull_prompts_for_repository_when_interactive() {
    let mut harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:team", &[]))),
        ..FakeEngine::default()
    });
    harness.tty = true;
    let prompter = ScriptedPrompter {
        repository: Some("team/layer:py39".into()),
        ..ScriptedPrompter::default()
    };
    let (result, _) = harness.open(&request(ImageSourceChoice::PullNamed), &prompter);
    let outcome = result.unwrap();
    assert_eq!(prompter.asked.get(), 1);
    assert_eq!(outcome.details["image"]["reference"], "team/layer:py39");
}

#[test]
fn blank_repository_answer_falls_back_to_default() {
    let mut harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        ..FakeEngine::default()
    });
    harness.tty = true;
    let prompter = ScriptedPrompter {
        repository: Some("   ".into()),
        ..ScriptedPrompter::default()
    };
    let (result, _) = harness.open(&request(ImageSourceChoice::PullNamed), &prompter);
    assert_eq!(result.unwrap().details["image"]["reference"], DEFAULT_IMAGE);
}

#[test]
fn no_input_never_prompts() {
    let mut harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        ..FakeEngine::default()
    });
    harness.tty = true;
    let prompter = ScriptedPrompter {
        source: Some(ImageSourceChoice::Build),
        repository: Some("team/layer:py39".into()),
        ..ScriptedPrompter::default()
    };
    let mut req = request(ImageSourceChoice::PullNamed);
    req.choose = true;
    req.no_input = true;
    let (result, _) = harness.open(&req, &prompter);
    let outcome = result.unwrap();
    assert_eq!(prompter.asked.get(), 0);
    assert_eq!(outcome.details["image"]["reference"], DEFAULT_IMAGE);
}

#[test]
fn choose_lets_the_operator_pick_a_build() {
    let mut harness = Harness::new(FakeEngine::default());
    harness.tty = true;
    let prompter = ScriptedPrompter {
        source: Some(ImageSourceChoice::Build),
        ..ScriptedPrompter::default()
    };
    let mut req = request(ImageSourceChoice::PullDefault);
    req.choose = true;
    let (result, _) = harness.open(&req, &prompter);
    let outcome = result.unwrap();
    assert_eq!(outcome.details["source"], "build");
    assert!(harness.engine.called("build"));
    assert!(!harness.engine.called("pull"));
}

#[test]
fn image_flag_is_rejected_for_builds() {
    let harness = Harness::new(FakeEngine::default());
    let mut req = request(ImageSourceChoice::Build);
    req.image = Some("myrepo:tag1".into());
    let (result, _) = harness.open(&req, &NoPrompt);
    assert_eq!(sandbox_kind(&result.unwrap_err()), ErrorKind::InvalidInput);
    assert!(!harness.descriptor_paths().descriptor.exists());
}

#[test]
fn image_flag_turns_default_pull_into_named_pull() {
    let harness = Harness::new(FakeEngine {
        local: vec![local("sha256:mine", &["myrepo:tag1"])],
        ..FakeEngine::default()
    });
    let mut req = request(ImageSourceChoice::PullDefault);
    req.image = Some("myrepo:tag1".into());
    let (result, _) = harness.open(&req, &NoPrompt);
    let outcome = result.unwrap();
    assert_eq!(outcome.details["source"], "pull");
    assert_eq!(outcome.details["image"]["id"], "sha256:mine");
}

#[test]
fn only_profile_variable_is_forwarded() {
    let mut harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        ..FakeEngine::default()
    });
    harness.env = vec![
        ("AWS_PROFILE".into(), "dev".into()),
        ("AWS_SESSION_TOKEN".into(), "ignored".into()),
    ];
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    let outcome = result.unwrap();
    let launched = harness.engine.launched().unwrap();
    assert_eq!(launched.env_vars.len(), 1);
    assert_eq!(launched.env_vars["AWS_PROFILE"], "dev");
    assert_eq!(outcome.details["env"], json!(["AWS_PROFILE"]));
}

#[test]
fn credentials_directory_is_mounted_only_when_present() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        ..FakeEngine::default()
    });
    harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt).0.unwrap();
    let mounts = harness.engine.launched().unwrap().mounts;
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].host, harness.root());
    assert_eq!(mounts[0].container, PathBuf::from("/var/task"));

    fs::create_dir(harness.home.path().join(".aws")).unwrap();
    harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt).0.unwrap();
    let mounts = harness.engine.launched().unwrap().mounts;
    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[0].host, harness.home.path().join(".aws"));
    assert_eq!(mounts[0].container, PathBuf::from("/root/.aws"));
    assert_eq!(mounts[1].container, PathBuf::from("/var/task"));
}

#[test]
fn requested_platform_reaches_pull_but_run_stays_pinned() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:arm", &[]))),
        ..FakeEngine::default()
    });
    let mut req = request(ImageSourceChoice::PullDefault);
    req.platform = Some(TargetPlatform::LinuxArm64);
    let (result, notices) = harness.open(&req, &NoPrompt);
    result.unwrap();

    assert_eq!(
        *harness.engine.pull_platform.lock().unwrap(),
        Some(Some(TargetPlatform::LinuxArm64))
    );
    assert_eq!(
        harness.engine.launched().unwrap().platform,
        TargetPlatform::LinuxAmd64
    );
    assert!(notices.contains(&Notice::PlatformPinned {
        requested: "linux/arm64".into(),
        run: "linux/amd64".into(),
    }));
}

#[test]
fn session_exit_status_becomes_the_exit_code() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        session: Some(SessionOutcome::Exited { code: 3 }),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    let outcome = result.unwrap();
    assert_eq!(outcome.status, CommandStatus::Ok);
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(outcome.details["session"]["outcome"]["kind"], "exited");
}

#[test]
fn terminated_session_maps_signal_to_exit_code() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        session: Some(SessionOutcome::Terminated { signal: Some(2) }),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    assert_eq!(result.unwrap().exit_code(), 130);
}

#[test]
fn unstartable_session_is_a_start_failure() {
    let harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        session: Some(SessionOutcome::FailedToStart {
            reason: "No such file or directory".into(),
        }),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    let err = result.unwrap_err();
    assert_eq!(sandbox_kind(&err), ErrorKind::SessionStartFailed);
    let outcome = crate::outcome_from_error(&err);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.details["code"], "LB401");
}

#[test]
fn dry_run_plans_a_build_without_side_effects() {
    let harness = Harness::new(FakeEngine::default());
    let mut req = request(ImageSourceChoice::Build);
    req.dry_run = true;
    let (result, notices) = harness.open(&req, &NoPrompt);
    let outcome = result.unwrap();

    assert_eq!(harness.engine.calls(), vec!["ps".to_string()]);
    assert!(!harness.descriptor_paths().descriptor.exists());
    assert_eq!(outcome.details["dry_run"], true);
    assert_eq!(outcome.details["descriptor"]["state"], "planned");
    assert_eq!(
        outcome.details["descriptor"]["base_image"],
        "mlupin/docker-lambda:python3.9-build"
    );
    assert_eq!(outcome.exit_code(), 0);
    assert!(notices
        .iter()
        .any(|notice| matches!(notice, Notice::CommandPreview { .. })));
}

#[test]
fn dry_run_pull_checks_local_images_but_never_pulls() {
    let harness = Harness::new(FakeEngine::default());
    let mut req = request(ImageSourceChoice::PullDefault);
    req.dry_run = true;
    let (result, _) = harness.open(&req, &NoPrompt);
    let outcome = result.unwrap();
    assert_eq!(
        harness.engine.calls(),
        vec!["ps".to_string(), "images".to_string()]
    );
    assert_eq!(outcome.details["image"]["id"], DEFAULT_IMAGE);
    assert!(outcome.details.get("session").is_none());
}

#[test]
fn dry_run_reports_reattach_without_attaching() {
    let project = tempdir().unwrap();
    let key = ProjectContext::from_dir(project.path())
        .unwrap()
        .session_key();
    let mut harness = Harness::new(FakeEngine {
        running: vec![RunningSession {
            name: key.to_string(),
            handle: "ddd".into(),
        }],
        ..FakeEngine::default()
    });
    harness.project = project;
    let mut req = request(ImageSourceChoice::PullDefault);
    req.dry_run = true;
    let (result, _) = harness.open(&req, &NoPrompt);
    let outcome = result.unwrap();
    assert_eq!(harness.engine.calls(), vec!["ps".to_string()]);
    assert_eq!(outcome.details["action"], "reattach");
    assert_eq!(outcome.message, format!("would attach to {key}"));
}

#[test]
fn tty_is_requested_only_for_terminals() {
    let mut harness = Harness::new(FakeEngine {
        pulled: Some(PulledImage::One(local("sha256:default", &[]))),
        ..FakeEngine::default()
    });
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    assert!(!requests_tty(&result.unwrap()));

    harness.tty = true;
    let (result, _) = harness.open(&request(ImageSourceChoice::PullDefault), &NoPrompt);
    assert!(requests_tty(&result.unwrap()));
}

fn requests_tty(outcome: &ExecutionOutcome) -> bool {
    outcome.details["command"]
        .as_array()
        .is_some_and(|command| command.iter().any(|arg| arg == "-t"))
}

#[test]
fn written_descriptor_state_carries_its_record() {
    let harness = Harness::new(FakeEngine::default());
    let outcome = ensure_descriptor_for(&harness);
    match outcome.state {
        DescriptorState::Written { record } => {
            assert_eq!(record.base_image, "mlupin/docker-lambda:python3.9-build");
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert!(outcome.persisted);
}

fn ensure_descriptor_for(harness: &Harness) -> DescriptorOutcome {
    let host = FakeHost {
        runtime: harness.runtime.clone(),
        tty: false,
    };
    descriptor::ensure_descriptor(
        harness.root(),
        &host,
        DescriptorMode::Write,
        &crate::SilentReporter,
    )
    .unwrap()
}
