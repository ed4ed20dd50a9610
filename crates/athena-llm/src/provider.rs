//! Inference service trait

use crate::types::{AskRequest, Translation};
use athena_core::SessionKey;
use tokio_util::sync::CancellationToken;

/// Result type for inference operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Inference error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("session not initialized: {0}")]
    SessionNotInitialized(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl From<LlmError> for athena_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::SessionNotInitialized(session) => Self::SessionNotInitialized(session),
            LlmError::Cancelled => Self::Cancelled,
            other => Self::inference(other.to_string()),
        }
    }
}

/// A text-generation service that keeps per-session conversational context.
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    fn name(&self) -> &str;

    /// Open (or reopen) a session primed with `system_prompt`. Returns the
    /// prompt cost in tokens.
    async fn initialize(&self, session: &SessionKey, system_prompt: &str) -> LlmResult<u32>;

    /// Send one request on an initialized session. If `cancel` is triggered
    /// the request is dropped and `LlmError::Cancelled` is returned.
    async fn ask(
        &self,
        request: AskRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<Translation>;

    /// Forget the session's context and abort any request pending on it.
    async fn end_session(&self, session: &SessionKey);
}
