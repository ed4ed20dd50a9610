//! Athena LLM - the inference-service seam and its providers

pub mod mock;
pub mod ollama;
pub mod provider;
pub mod types;

pub use mock::{ProviderCall, ScriptedBehavior, ScriptedProvider};
pub use ollama::OllamaProvider;
pub use provider::{InferenceService, LlmError, LlmResult};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
