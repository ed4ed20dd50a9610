//! Ollama-style generate provider
//!
//! Conversational memory lives on the service side as a context vector; the
//! provider keeps the latest vector per session and sends it back with each
//! request.

use crate::provider::{InferenceService, LlmError, LlmResult};
use crate::types::{
    AskRequest, GenerateOptions, GenerateRequest, GenerateResponse, Translation,
    DEFAULT_KEEP_ALIVE, DEFAULT_NUM_CTX,
};
use athena_core::SessionKey;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "ministral-3:3b";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20 * 60);

pub struct OllamaProvider {
    client: Client,
    url: String,
    model: String,
    num_ctx: u32,
    keep_alive: String,
    request_timeout: Duration,
    sessions: DashMap<SessionKey, Vec<i64>>,
    pending: DashMap<SessionKey, (u64, CancellationToken)>,
    next_request: AtomicU64,
}

impl OllamaProvider {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            model: model.into(),
            num_ctx: DEFAULT_NUM_CTX,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sessions: DashMap::new(),
            pending: DashMap::new(),
            next_request: AtomicU64::new(0),
        }
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = num_ctx;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_session(&self, session: &SessionKey) -> bool {
        self.sessions.contains_key(session)
    }

    fn request(&self, model: String, prompt: String) -> GenerateRequest {
        let mut body = GenerateRequest::new(model, prompt);
        body.options = GenerateOptions {
            num_ctx: self.num_ctx,
        };
        body.keep_alive = self.keep_alive.clone();
        body
    }

    async fn generate(&self, body: &GenerateRequest) -> LlmResult<GenerateResponse> {
        debug!(
            "Ollama request: model={} prompt_len={} images={}",
            body.model,
            body.prompt.len(),
            body.images.len()
        );

        let response = self
            .client
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama error {}: {}", status, error_text);
            return Err(LlmError::RequestFailed(format!("{}: {}", status, error_text)));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl InferenceService for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn initialize(&self, session: &SessionKey, system_prompt: &str) -> LlmResult<u32> {
        let body = self.request(self.model.clone(), system_prompt.to_string());
        let response = self.generate(&body).await?;
        let cost = response.prompt_eval_count;
        self.sessions.insert(session.clone(), response.context);
        info!("[{}] Session initialized. Context cost: {} tokens", session, cost);
        Ok(cost)
    }

    async fn ask(
        &self,
        request: AskRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<Translation> {
        let AskRequest {
            session,
            model,
            input,
            system,
            images,
        } = request;

        let context = self
            .sessions
            .get(&session)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LlmError::SessionNotInitialized(session.to_string()))?;

        let mut body = self.request(model.unwrap_or_else(|| self.model.clone()), input);
        body.system = system;
        body.context = Some(context);
        body.images = images;

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let session_cancel = CancellationToken::new();
        self.pending
            .insert(session.clone(), (id, session_cancel.clone()));
        let caller_cancel = cancel.unwrap_or_default();

        let result = tokio::select! {
            r = self.generate(&body) => r,
            _ = session_cancel.cancelled() => Err(LlmError::Cancelled),
            _ = caller_cancel.cancelled() => Err(LlmError::Cancelled),
        };
        self.pending.remove_if(&session, |_, (pending_id, _)| *pending_id == id);

        let (translation, context) = result?.into_translation();
        if let Some(mut entry) = self.sessions.get_mut(&session) {
            *entry = context;
        }

        debug!(
            "[{}] Translation: {} lines, prompt_eval={} eval={} total={}ns load={}ns eval_time={}ns",
            session,
            translation.lines.len(),
            translation.prompt_eval_count,
            translation.eval_count,
            translation.total_duration,
            translation.load_duration,
            translation.eval_duration
        );
        Ok(translation)
    }

    async fn end_session(&self, session: &SessionKey) {
        self.sessions.remove(session);
        if let Some((_, (_, token))) = self.pending.remove(session) {
            token.cancel();
        }
        info!("[{}] Session terminated and context cleared", session);
    }
}
