pub mod context;
pub mod settings;

pub use settings::{
    Config, EngineConfig, EnvSnapshot, GlobalOptions, PythonConfig, ENGINE_ENV, PYTHON_ENV,
};
