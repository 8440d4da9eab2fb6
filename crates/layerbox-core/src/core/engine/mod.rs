mod docker;

pub use docker::{DockerCliEngine, EngineKind};
