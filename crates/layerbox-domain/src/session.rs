use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SESSION_PREFIX: &str = "sandbox-layer-";

/// Identity of a project's sandbox session.
///
/// The key is also the container name, so at most one session exists per
/// project basename on a host. Basenames are used verbatim: two projects with
/// the same basename share a key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    #[must_use]
    pub fn for_project(project_name: &str) -> Self {
        Self(format!("{SESSION_PREFIX}{project_name}"))
    }

    #[must_use]
    pub fn from_container_name(name: &str) -> Self {
        Self(name.trim_start_matches('/').to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A running container as reported by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningSession {
    pub name: String,
    pub handle: String,
}

/// Running sessions indexed by their key.
///
/// Built from a single engine listing. Containers not created by this tool
/// are indexed too; only keys carrying [`SESSION_PREFIX`] can ever match a
/// project.
#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionKey, RunningSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn from_listing(listing: Vec<RunningSession>) -> Self {
        let mut sessions = BTreeMap::new();
        for session in listing {
            let key = SessionKey::from_container_name(&session.name);
            sessions.entry(key).or_insert(session);
        }
        Self { sessions }
    }

    #[must_use]
    pub fn lookup(&self, key: &SessionKey) -> Option<&RunningSession> {
        self.sessions.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sandbox_sessions(&self) -> impl Iterator<Item = (&SessionKey, &RunningSession)> {
        self.sessions
            .iter()
            .filter(|(key, _)| key.as_str().starts_with(SESSION_PREFIX))
    }
}
