//! Opening a sandbox session for the project in the working directory.
//!
//! An already-running session is reattached as-is. Otherwise an image is
//! resolved (local build, named pull, or the default pull), the launch
//! parameters are assembled, and a new interactive session is started.

mod descriptor;
mod detect;
mod launch;
mod orchestrate;
mod prompt;
mod resolve;

#[cfg(test)]
mod tests;

pub use descriptor::{DescriptorMode, DescriptorOutcome};
pub use detect::SessionProbe;
pub use orchestrate::{open_sandbox, SandboxRequest};
pub use prompt::{NoPrompt, Prompter};
