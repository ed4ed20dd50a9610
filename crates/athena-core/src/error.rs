//! Error types for Athena

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A cognitive task was requested while another one is in flight.
    #[error("cognitive coordinator is busy")]
    Busy,

    /// The watchdog expired before the inference service answered.
    #[error("cognitive task timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("session not initialized: {0}")]
    SessionNotInitialized(String),

    #[error("malformed directive '{line}': {reason}")]
    MalformedDirective { line: String, reason: String },

    #[error("invalid trigger syntax '{trigger}': {reason}")]
    InvalidTriggerSyntax { trigger: String, reason: String },

    #[error("cognitive task cancelled")]
    Cancelled,

    #[error("inference error: {0}")]
    Inference(String),

    #[error("agent mind error: {0}")]
    Mind(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDirective {
            line: line.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_trigger(trigger: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTriggerSyntax {
            trigger: trigger.into(),
            reason: reason.into(),
        }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    pub fn mind(message: impl Into<String>) -> Self {
        Self::Mind(message.into())
    }

    /// Errors the caller may retry later (the coordinator is healthy again).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Busy | Self::Timeout { .. } | Self::Cancelled | Self::Inference(_)
        )
    }
}
