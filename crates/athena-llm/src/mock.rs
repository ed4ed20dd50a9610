//! ScriptedProvider - deterministic inference responses for tests and offline runs
//!
//! Answers are popped from a script in order; once the script is exhausted
//! the default behavior repeats. Every call is recorded so tests can assert
//! on ordering (for example `EndSession` before `Initialize`).

use crate::provider::{InferenceService, LlmError, LlmResult};
use crate::types::{split_lines, AskRequest, Translation};
use athena_core::SessionKey;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ScriptedBehavior {
    /// Answer immediately with this text
    Text(String),
    /// Answer with this text after a delay
    Delayed { text: String, delay: Duration },
    /// Never answer; only cancellation ends the request
    Hang,
    /// Fail the request
    Error(String),
}

/// Recorded call, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderCall {
    Initialize {
        session: String,
        system_prompt: String,
    },
    Ask {
        session: String,
        input: String,
        system: Option<String>,
        model: Option<String>,
        images: usize,
    },
    EndSession {
        session: String,
    },
}

pub struct ScriptedProvider {
    behaviors: Mutex<VecDeque<ScriptedBehavior>>,
    default_behavior: ScriptedBehavior,
    init_cost: u32,
    init_error: Option<String>,
    next_init_error: Mutex<Option<String>>,
    require_session: bool,
    sessions: Mutex<HashSet<SessionKey>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    /// Always answer with the same behavior
    pub fn constant(behavior: ScriptedBehavior) -> Self {
        Self {
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: behavior,
            init_cost: 0,
            init_error: None,
            next_init_error: Mutex::new(None),
            require_session: true,
            sessions: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::constant(ScriptedBehavior::Text(text.into()))
    }

    /// Consume behaviors in order, then answer with an empty text
    pub fn sequence(behaviors: Vec<ScriptedBehavior>) -> Self {
        let provider = Self::constant(ScriptedBehavior::Text(String::new()));
        *provider.behaviors.lock() = behaviors.into();
        provider
    }

    pub fn with_init_cost(mut self, cost: u32) -> Self {
        self.init_cost = cost;
        self
    }

    /// Make every `initialize` fail with `message`
    pub fn failing_initialize(mut self, message: impl Into<String>) -> Self {
        self.init_error = Some(message.into());
        self
    }

    /// Make only the next `initialize` fail with `message`
    pub fn fail_next_initialize(&self, message: impl Into<String>) {
        *self.next_init_error.lock() = Some(message.into());
    }

    /// Accept asks on sessions that were never initialized
    pub fn without_session_check(mut self) -> Self {
        self.require_session = false;
        self
    }

    pub fn push(&self, behavior: ScriptedBehavior) {
        self.behaviors.lock().push_back(behavior);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Number of `ask` calls received
    pub fn ask_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ProviderCall::Ask { .. }))
            .count()
    }

    pub fn has_session(&self, session: &SessionKey) -> bool {
        self.sessions.lock().contains(session)
    }

    fn next_behavior(&self) -> ScriptedBehavior {
        self.behaviors
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

#[async_trait::async_trait]
impl InferenceService for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn initialize(&self, session: &SessionKey, system_prompt: &str) -> LlmResult<u32> {
        self.calls.lock().push(ProviderCall::Initialize {
            session: session.to_string(),
            system_prompt: system_prompt.to_string(),
        });
        if let Some(message) = self.next_init_error.lock().take() {
            return Err(LlmError::RequestFailed(message));
        }
        if let Some(message) = &self.init_error {
            return Err(LlmError::RequestFailed(message.clone()));
        }
        self.sessions.lock().insert(session.clone());
        Ok(self.init_cost)
    }

    async fn ask(
        &self,
        request: AskRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<Translation> {
        self.calls.lock().push(ProviderCall::Ask {
            session: request.session.to_string(),
            input: request.input.clone(),
            system: request.system.clone(),
            model: request.model.clone(),
            images: request.images.len(),
        });

        if self.require_session && !self.has_session(&request.session) {
            return Err(LlmError::SessionNotInitialized(request.session.to_string()));
        }

        let behavior = self.next_behavior();
        let cancel = cancel.unwrap_or_default();
        let answer = async move {
            match behavior {
                ScriptedBehavior::Text(text) => Ok(text),
                ScriptedBehavior::Delayed { text, delay } => {
                    tokio::time::sleep(delay).await;
                    Ok(text)
                }
                ScriptedBehavior::Hang => std::future::pending::<LlmResult<String>>().await,
                ScriptedBehavior::Error(message) => Err(LlmError::RequestFailed(message)),
            }
        };

        tokio::select! {
            r = answer => r.map(|text| Translation::from_lines(split_lines(&text))),
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
        }
    }

    async fn end_session(&self, session: &SessionKey) {
        self.calls.lock().push(ProviderCall::EndSession {
            session: session.to_string(),
        });
        self.sessions.lock().remove(session);
    }
}
