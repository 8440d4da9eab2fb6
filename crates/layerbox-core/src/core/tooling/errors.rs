use serde_json::{json, Value};
use strum::{AsRefStr, IntoStaticStr};

use crate::ExecutionOutcome;

/// Failure classes an invocation can end with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    EngineUnavailable,
    UnsupportedRuntime,
    InterpreterProbeFailed,
    BuildFailed,
    PullFailed,
    SessionStartFailed,
    DescriptorIo,
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::EngineUnavailable => "LB101",
            Self::UnsupportedRuntime => "LB201",
            Self::InterpreterProbeFailed => "LB202",
            Self::BuildFailed => "LB301",
            Self::PullFailed => "LB302",
            Self::SessionStartFailed => "LB401",
            Self::DescriptorIo => "LB501",
            Self::InvalidInput => "LB601",
        }
    }

    #[must_use]
    pub fn reason(self) -> &'static str {
        self.into()
    }
}

/// A failure the operator can act on. Carries a JSON payload with at least
/// `reason` and `code`, and usually a `hint`.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct SandboxError {
    kind: ErrorKind,
    message: String,
    details: Value,
}

impl SandboxError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn details(&self) -> &Value {
        &self.details
    }

    /// Adds one more field to the payload.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value);
        }
        self
    }

    #[must_use]
    pub fn to_outcome(&self) -> ExecutionOutcome {
        ExecutionOutcome::user_error(self.message.clone(), self.details.clone())
    }
}

pub fn sandbox_error(kind: ErrorKind, message: impl Into<String>, details: Value) -> SandboxError {
    let mut merged = details;
    match merged {
        Value::Object(ref mut map) => {
            map.insert("reason".into(), Value::String(kind.reason().to_string()));
            map.insert("code".into(), Value::String(kind.code().to_string()));
        }
        _ => {
            merged = json!({
                "reason": kind.reason(),
                "code": kind.code(),
                "details": merged,
            });
        }
    }
    SandboxError {
        kind,
        message: message.into(),
        details: merged,
    }
}

/// Converts any error escaping a command into an outcome.
#[must_use]
pub fn outcome_from_error(err: &anyhow::Error) -> ExecutionOutcome {
    if let Some(sandbox) = err.downcast_ref::<SandboxError>() {
        return sandbox.to_outcome();
    }
    let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
    ExecutionOutcome::failure(
        err.to_string(),
        json!({
            "reason": "internal_error",
            "error": err.to_string(),
            "issues": issues,
            "hint": "Re-run with `-vv` for more detail, or open an issue if this persists.",
        }),
    )
}
