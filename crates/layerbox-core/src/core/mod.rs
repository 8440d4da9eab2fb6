//! Internal implementation modules for `layerbox-core`.
//!
//! Callers go through the re-exports at the crate root.

pub mod config;
pub mod engine;
pub mod python;
pub mod runtime;
pub mod sandbox;
pub mod tooling;
