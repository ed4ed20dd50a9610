//! Cognitive task coordinator
//!
//! At most one cognitive task is in flight per agent. A request made while
//! busy fails immediately with `Error::Busy`; nothing is queued behind a
//! running task. Accepted tasks are handed to a single worker task over an
//! mpsc channel, so service calls for one agent never overlap. Each task
//! runs under a watchdog and can be cancelled; every exit path returns the
//! coordinator to idle.
//!
//! The persona is tracked by content fingerprint. When it changes, the old
//! session is ended and a new one is initialized with the new system prompt
//! before the request is sent.

use crate::prompt::PromptTemplates;
use athena_core::{filter_directive_lines, preview, CoordinatorState, Error, Result, SessionKey};
use athena_llm::{AskRequest, InferenceService, LlmError};
use base64::Engine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub watchdog: Duration,
    pub templates: PromptTemplates,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            watchdog: DEFAULT_WATCHDOG,
            templates: PromptTemplates::default(),
        }
    }
}

/// Input of a translation task.
#[derive(Clone, Debug, Default)]
pub struct CognitiveRequest {
    pub persona: String,
    /// Plan library / multi-agent context substituted into the template.
    pub plans: String,
    pub input: String,
    /// Base64-encoded images.
    pub images: Vec<String>,
    pub model: Option<String>,
}

impl CognitiveRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_plans(mut self, plans: impl Into<String>) -> Self {
        self.plans = plans.into();
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Completion signal of an accepted task. Always resolves: with the answer,
/// or with the error that ended the task.
pub struct TaskHandle {
    id: u64,
    rx: oneshot::Receiver<Result<String>>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn wait(self) -> Result<String> {
        self.rx.await.unwrap_or(Err(Error::Cancelled))
    }
}

/// SHA-256 of the persona text, base64-encoded.
pub fn persona_fingerprint(persona: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, persona.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest.as_ref())
}

struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

enum JobKind {
    Translate(CognitiveRequest),
    Route {
        content: String,
        agents: Vec<String>,
    },
    Ask {
        system: String,
        input: String,
        images: Vec<String>,
        model: Option<String>,
    },
}

impl JobKind {
    fn label(&self) -> &'static str {
        match self {
            JobKind::Translate(_) => "translation",
            JobKind::Route { .. } => "routing",
            JobKind::Ask { .. } => "question",
        }
    }
}

struct Job {
    id: u64,
    cancel: CancellationToken,
    kind: JobKind,
    reply: oneshot::Sender<Result<String>>,
}

/// State shared between the coordinator handle and its worker.
struct Shared {
    session: SessionKey,
    service: Arc<dyn InferenceService>,
    templates: PromptTemplates,
    watchdog: Duration,
    in_flight: Mutex<Option<InFlight>>,
    fingerprint: Mutex<Option<String>>,
    router_ready: AtomicBool,
}

impl Shared {
    /// Clear the busy slot if it still belongs to task `id`.
    fn release(&self, id: u64) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|task| task.id == id) {
            *slot = None;
        }
    }

    async fn run(&self, job: Job) {
        let Job {
            id,
            cancel,
            kind,
            reply,
        } = job;
        let label = kind.label();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            r = tokio::time::timeout(self.watchdog, self.execute(kind, &cancel)) => match r {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(Error::Timeout { secs: self.watchdog.as_secs() })
                }
            },
        };

        match &outcome {
            Ok(text) => debug!("[{}] {} complete: {}", self.session, label, preview(text)),
            Err(Error::Cancelled) => warn!("[{}] {} interrupted", self.session, label),
            Err(e) => error!("[{}] {} processing error: {}", self.session, label, e),
        }

        self.release(id);
        let _ = reply.send(outcome);
    }

    async fn execute(&self, kind: JobKind, cancel: &CancellationToken) -> Result<String> {
        match kind {
            JobKind::Translate(request) => self.translate(request, cancel).await,
            JobKind::Route { content, agents } => self.route(content, agents, cancel).await,
            JobKind::Ask {
                system,
                input,
                images,
                model,
            } => {
                let request = AskRequest::new(self.session.clone(), input)
                    .with_system(system)
                    .with_model(model)
                    .with_images(images);
                let translation = self.service.ask(request, Some(cancel.clone())).await?;
                Ok(translation.text())
            }
        }
    }

    async fn translate(
        &self,
        request: CognitiveRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let CognitiveRequest {
            persona,
            plans,
            input,
            images,
            model,
        } = request;

        let system_prompt = self.templates.system_prompt(&persona, &plans);

        let fingerprint = persona_fingerprint(&persona);
        let shifted = self.fingerprint.lock().as_deref() != Some(fingerprint.as_str());
        if shifted {
            info!("[{}] Persona shifted, loading new mental model", self.session);
            // The old session is gone from here on, whatever initialize does.
            *self.fingerprint.lock() = None;
            self.service.end_session(&self.session).await;
            self.service.initialize(&self.session, &system_prompt).await?;
            *self.fingerprint.lock() = Some(fingerprint);
        }

        let ask = AskRequest::new(self.session.clone(), input)
            .with_system(system_prompt)
            .with_model(model)
            .with_images(images);
        let translation = self.service.ask(ask, Some(cancel.clone())).await?;
        Ok(filter_directive_lines(&translation.lines))
    }

    async fn route(
        &self,
        content: String,
        agents: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let router = self.session.router();
        if !self.router_ready.load(Ordering::Acquire) {
            self.service.initialize(&router, "").await?;
            self.router_ready.store(true, Ordering::Release);
        }

        let prompt = self.templates.delegation_prompt(&content, &agents);
        match self
            .service
            .ask(AskRequest::new(router, prompt), Some(cancel.clone()))
            .await
        {
            Ok(translation) => Ok(filter_directive_lines(&translation.lines)),
            Err(e) => {
                if matches!(e, LlmError::SessionNotInitialized(_)) {
                    self.router_ready.store(false, Ordering::Release);
                }
                Err(e.into())
            }
        }
    }
}

/// Single-flight front for one agent's inference session.
pub struct CognitiveCoordinator {
    shared: Arc<Shared>,
    jobs: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
}

impl CognitiveCoordinator {
    /// Create the coordinator and spawn its worker. Must be called from
    /// within a Tokio runtime.
    pub fn spawn(
        session: SessionKey,
        service: Arc<dyn InferenceService>,
        config: CoordinatorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            session,
            service,
            templates: config.templates,
            watchdog: config.watchdog,
            in_flight: Mutex::new(None),
            fingerprint: Mutex::new(None),
            router_ready: AtomicBool::new(false),
        });
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let shutdown = CancellationToken::new();

        let worker = shared.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            debug!("[{}] Coordinator worker started", worker.session);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => worker.run(job).await,
                        None => break,
                    },
                }
            }
            debug!("[{}] Coordinator worker stopped", worker.session);
        });

        Self {
            shared,
            jobs,
            shutdown,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn session(&self) -> &SessionKey {
        &self.shared.session
    }

    pub fn state(&self) -> CoordinatorState {
        if self.shared.in_flight.lock().is_some() {
            CoordinatorState::Busy
        } else {
            CoordinatorState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == CoordinatorState::Busy
    }

    /// Fingerprint of the persona the current session was initialized with.
    pub fn fingerprint(&self) -> Option<String> {
        self.shared.fingerprint.lock().clone()
    }

    /// Translate `request.input` into agent-language lines.
    pub fn dispatch(&self, request: CognitiveRequest) -> Result<TaskHandle> {
        self.submit(JobKind::Translate(request))
    }

    /// Decide which known agents should receive `content`. Runs on the
    /// router session and never uses the persona.
    pub fn route_information(
        &self,
        content: impl Into<String>,
        known_agents: &[String],
    ) -> Result<TaskHandle> {
        self.submit(JobKind::Route {
            content: content.into(),
            agents: known_agents.to_vec(),
        })
    }

    /// Plain question on the agent's session; the answer is not filtered.
    pub fn ask(
        &self,
        system: impl Into<String>,
        input: impl Into<String>,
        images: Vec<String>,
        model: Option<String>,
    ) -> Result<TaskHandle> {
        self.submit(JobKind::Ask {
            system: system.into(),
            input: input.into(),
            images,
            model,
        })
    }

    /// Interrupt the in-flight task, if any, and return to idle at once.
    pub fn cancel(&self) -> bool {
        match self.shared.in_flight.lock().take() {
            Some(task) => {
                task.cancel.cancel();
                warn!(
                    "[{}] Cognitive task interrupted by priority override",
                    self.shared.session
                );
                true
            }
            None => false,
        }
    }

    /// Initialize the agent's session directly with `system_prompt`. The
    /// next translation re-initializes with its own template.
    pub async fn open_session(&self, system_prompt: &str) -> Result<u32> {
        *self.shared.fingerprint.lock() = None;
        let cost = self
            .shared
            .service
            .initialize(&self.shared.session, system_prompt)
            .await?;
        Ok(cost)
    }

    /// Cancel in-flight work and end the agent's session.
    pub async fn end_session(&self) {
        self.cancel();
        *self.shared.fingerprint.lock() = None;
        self.shared.service.end_session(&self.shared.session).await;
    }

    /// End both sessions and stop the worker. Pending handles resolve with
    /// `Error::Cancelled`.
    pub async fn shutdown(&self) {
        self.end_session().await;
        if self.shared.router_ready.swap(false, Ordering::AcqRel) {
            self.shared
                .service
                .end_session(&self.shared.session.router())
                .await;
        }
        self.shutdown.cancel();
    }

    fn submit(&self, kind: JobKind) -> Result<TaskHandle> {
        let (id, cancel) = {
            let mut slot = self.shared.in_flight.lock();
            if slot.is_some() {
                warn!(
                    "[{}] Coordinator is busy, dropping {} request",
                    self.shared.session,
                    kind.label()
                );
                return Err(Error::Busy);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let cancel = self.shutdown.child_token();
            *slot = Some(InFlight {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel)
        };

        let (reply, rx) = oneshot::channel();
        let job = Job {
            id,
            cancel,
            kind,
            reply,
        };
        if self.jobs.send(job).is_err() {
            self.shared.release(id);
            return Err(Error::Cancelled);
        }
        Ok(TaskHandle { id, rx })
    }
}

impl Drop for CognitiveCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
