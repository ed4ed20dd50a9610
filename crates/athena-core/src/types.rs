//! Core types for Athena

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Annotation marking a literal or plan label as produced by cognition.
pub const SOURCE_ANNOTATION: &str = "source(athena)";

/// Rationale attached next to [`SOURCE_ANNOTATION`].
pub const RATIONALE_ANNOTATION: &str = "rationale(\"cognitive_inference\")";

/// Label annotation that identifies an ephemeral (machine-generated) plan.
pub const EPHEMERAL_ANNOTATION: &str = "type(athena_ephemeral)";

/// Belief added once the cognitive session is up.
pub const INCORPORATED_BELIEF: &str = "incorporated";

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The routing namespace for this session. Never shares remembered
    /// context with the conversational session.
    pub fn router(&self) -> Self {
        Self::new(format!("{}_router", self.0))
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Coordinator state as seen from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorState {
    Idle,
    Busy,
}

/// Kind of context the host can attach to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    Persona,
    /// Multi-agent-system context: plan sources of this and other agents.
    Mas,
    Image,
}

impl ContextKind {
    /// Case-insensitive lookup; `plans` is an alias of `mas`, `video` of `image`.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "persona" => Some(Self::Persona),
            "mas" | "plans" => Some(Self::Mas),
            "image" | "video" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Truncate text for log previews (30 chars, char-boundary safe).
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(30) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
