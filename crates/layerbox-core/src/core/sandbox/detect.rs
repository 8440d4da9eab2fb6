use anyhow::Result;
use layerbox_domain::{RunningSession, SessionKey, SessionRegistry};
use tracing::debug;

use crate::ContainerEngine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionProbe {
    /// A session for the key is already running.
    Reattach(RunningSession),
    Proceed,
}

/// Looks the project's key up in one listing of running sessions.
///
/// # Errors
///
/// Returns an engine-unavailable error when the engine cannot list sessions.
pub fn detect_session(engine: &dyn ContainerEngine, key: &SessionKey) -> Result<SessionProbe> {
    let registry = SessionRegistry::from_listing(engine.list_running_sessions()?);
    debug!(
        running = registry.len(),
        sandboxes = registry.sandbox_sessions().count(),
        key = %key,
        "checked running sessions"
    );
    Ok(match registry.lookup(key) {
        Some(session) => SessionProbe::Reattach(session.clone()),
        None => SessionProbe::Proceed,
    })
}
