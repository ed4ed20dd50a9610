//! Athena Agent - the single-flight cognitive task coordinator

pub mod coordinator;
pub mod prompt;

pub use coordinator::{
    persona_fingerprint, CognitiveCoordinator, CognitiveRequest, CoordinatorConfig, TaskHandle,
};
pub use prompt::PromptTemplates;
