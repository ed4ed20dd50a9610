//! The Athena facade: the one object a host agent talks to.

use crate::context::{encode_file, is_image_file, render_plans, resolve_content, CognitiveContext};
use crate::injection::{InjectionReport, Injector};
use crate::monitor::{ActivityMonitor, MonitorSettings};
use crate::policy::InjectorSettings;
use crate::pressure::{MemorySampler, ProcMeminfo};
use crate::AthenaConfig;
use athena_agent::{CognitiveCoordinator, CognitiveRequest, CoordinatorConfig, TaskHandle};
use athena_core::{
    preview, AgentMind, ContextKind, Error, Literal, Result, SessionKey, INCORPORATED_BELIEF,
};
use athena_llm::InferenceService;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct Athena {
    session: SessionKey,
    mind: Arc<dyn AgentMind>,
    context: Arc<CognitiveContext>,
    coordinator: Arc<CognitiveCoordinator>,
    injector: Arc<Injector>,
    monitor: Mutex<Option<ActivityMonitor>>,
}

impl Athena {
    /// Attach Athena to `mind`. Spawns the coordinator worker, so it must be
    /// called from within a Tokio runtime.
    pub fn new(
        mind: Arc<dyn AgentMind>,
        service: Arc<dyn InferenceService>,
        coordinator: CoordinatorConfig,
        settings: InjectorSettings,
    ) -> Arc<Self> {
        Self::with_sampler(mind, service, coordinator, settings, Arc::new(ProcMeminfo::default()))
    }

    pub fn from_config(
        mind: Arc<dyn AgentMind>,
        service: Arc<dyn InferenceService>,
        config: &AthenaConfig,
    ) -> Arc<Self> {
        Self::new(mind, service, config.coordinator_config(), config.injector_settings())
    }

    /// Like [`Athena::new`] with a custom RAM source.
    pub fn with_sampler(
        mind: Arc<dyn AgentMind>,
        service: Arc<dyn InferenceService>,
        coordinator: CoordinatorConfig,
        settings: InjectorSettings,
        sampler: Arc<dyn MemorySampler>,
    ) -> Arc<Self> {
        let session = SessionKey::new(mind.name());
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let injector = Injector::new(mind.clone(), settings)
            .with_sampler(sampler)
            .with_kill_notice(notice_tx);

        let athena = Arc::new(Self {
            coordinator: Arc::new(CognitiveCoordinator::spawn(
                session.clone(),
                service,
                coordinator,
            )),
            session,
            mind,
            context: Arc::new(CognitiveContext::new()),
            injector: Arc::new(injector),
            monitor: Mutex::new(None),
        });

        let weak = Arc::downgrade(&athena);
        tokio::spawn(async move {
            while let Some(killed) = notice_rx.recv().await {
                let Some(athena) = weak.upgrade() else {
                    break;
                };
                error!(
                    "[{}] Stopping cognition after kill switch (terminated: {:?})",
                    athena.session, killed
                );
                athena.stop_thinking().await;
            }
        });

        athena
    }

    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    pub fn mind(&self) -> &Arc<dyn AgentMind> {
        &self.mind
    }

    pub fn context(&self) -> &Arc<CognitiveContext> {
        &self.context
    }

    pub fn coordinator(&self) -> &Arc<CognitiveCoordinator> {
        &self.coordinator
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub fn is_thinking(&self) -> bool {
        self.context.is_thinking()
    }

    // ============================================================
    // Context
    // ============================================================

    /// Set the persona from text, or from a file when `content` is a path.
    pub fn set_persona(&self, content: &str) -> Result<()> {
        self.notify_activity();
        self.context.set_persona(resolve_content(content)?);
        Ok(())
    }

    pub fn clear_persona(&self) {
        self.notify_activity();
        self.context.clear_persona();
        info!("[{}] Persona removed", self.session);
    }

    pub fn add_context(&self, kind: &str, content: &str) -> Result<()> {
        self.notify_activity();
        match ContextKind::parse(kind) {
            Some(ContextKind::Persona) => self.set_persona(content),
            Some(ContextKind::Mas) => {
                let text = resolve_content(content)?;
                info!("[{}] MAS context added: {}", self.session, preview(&text));
                self.context.append_mas(&text);
                Ok(())
            }
            Some(ContextKind::Image) => {
                let path = Path::new(content);
                if !path.is_file() {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("Image/Video file not found: {}", content),
                    )));
                }
                self.context.queue_image(encode_file(path)?);
                info!("[{}] Image queued: {}", self.session, path.display());
                Ok(())
            }
            None => Err(Error::Config(format!("unknown context kind '{}'", kind))),
        }
    }

    pub fn remove_context(&self, kind: &str) -> Result<()> {
        match ContextKind::parse(kind) {
            Some(ContextKind::Persona) => self.clear_persona(),
            Some(ContextKind::Image) => {
                self.notify_activity();
                self.context.clear_images();
                info!("[{}] Image queue cleared", self.session);
            }
            Some(ContextKind::Mas) => {
                warn!(
                    "[{}] MAS context cannot be removed, use reflect_plans to rebuild it",
                    self.session
                );
            }
            None => return Err(Error::Config(format!("unknown context kind '{}'", kind))),
        }
        Ok(())
    }

    /// Rebuild the MAS context from the mind's behavior source, or from its
    /// plan library when the source cannot be read.
    pub fn reflect_plans(&self) {
        self.notify_activity();
        self.context.clear_mas();
        let source = self.mind.behavior_source().and_then(|path| {
            std::fs::read_to_string(&path)
                .map_err(|e| warn!("Failed to read behavior source {}: {}", path.display(), e))
                .ok()
        });
        let plans = source.unwrap_or_else(|| render_plans(&self.mind.plans()));
        self.context.append_mas(&plans);
        info!("[{}] Plans reflected: {}", self.session, preview(&plans));
    }

    // ============================================================
    // Thinking lifecycle
    // ============================================================

    /// Open the cognitive session with the persona and MAS context and mark
    /// the agent as incorporated. Returns the initialization cost in tokens.
    pub async fn start_thinking(&self, model: Option<&str>) -> Result<u32> {
        self.notify_activity();
        let mas = self.context.ensure_mas(|| render_plans(&self.mind.plans()));
        self.context.set_model(model.map(String::from));
        let persona = self.context.persona();
        let prompt = if persona.is_empty() {
            mas
        } else {
            format!("{}\n\n{}", persona, mas)
        };

        match self.coordinator.open_session(&prompt).await {
            Ok(cost) => {
                self.mind.add_belief(Literal::new(INCORPORATED_BELIEF))?;
                self.context.set_thinking(true);
                info!("[{}] Athena is thinking (init cost {} tokens)", self.session, cost);
                Ok(cost)
            }
            Err(e) => {
                error!("[{}] Failed to start thinking: {}", self.session, e);
                Err(e)
            }
        }
    }

    /// End the session, stop the monitor and drop the `incorporated` belief.
    pub async fn stop_thinking(&self) {
        self.context.set_thinking(false);
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.shutdown();
        }
        self.coordinator.end_session().await;
        if let Err(e) = self.mind.remove_belief(&Literal::new(INCORPORATED_BELIEF)) {
            warn!("[{}] Failed to remove {}: {}", self.session, INCORPORATED_BELIEF, e);
        }
        info!("[{}] Athena stopped thinking", self.session);
    }

    /// Stop everything, including both inference sessions and the policies.
    pub async fn shutdown(&self) {
        self.stop_thinking().await;
        self.injector.disable_nap();
        self.injector.disable_collector();
        self.coordinator.shutdown().await;
    }

    // ============================================================
    // Policies and monitor
    // ============================================================

    pub fn configure_nap(&self, keep_count: usize, ram_threshold_percent: f64) -> Result<()> {
        self.injector.configure_nap(keep_count, ram_threshold_percent)
    }

    pub fn configure_collector(&self, keep_count: usize, period_minutes: u64) -> Result<()> {
        self.injector.configure_collector(keep_count, period_minutes)
    }

    /// Start a monitor with `settings` and shut down the current one. Settings
    /// the monitor cannot run with leave the current one in place.
    pub fn configure_monitor(&self, settings: MonitorSettings) -> Result<()> {
        let monitor = ActivityMonitor::new(
            settings,
            self.mind.clone(),
            self.coordinator.clone(),
            self.injector.clone(),
            self.context.clone(),
        );
        monitor.start()?;
        if let Some(old) = self.monitor.lock().replace(monitor) {
            old.shutdown();
        }
        Ok(())
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Reset the monitor's idle clock.
    pub fn notify_activity(&self) {
        if let Some(monitor) = self.monitor.lock().as_ref() {
            monitor.notify_activity();
        }
    }

    // ============================================================
    // Cognition
    // ============================================================

    /// Think about `message` and inject the outcome into the mind. An empty
    /// `persona` keeps the current one; image files among `context_paths`
    /// are attached along with the queued images.
    pub fn think(
        &self,
        persona: &str,
        model: Option<&str>,
        message: &str,
        context_paths: &[PathBuf],
    ) -> Result<JoinHandle<Result<InjectionReport>>> {
        self.notify_activity();
        let persona = if persona.is_empty() {
            self.context.persona()
        } else {
            resolve_content(persona)?
        };

        let mut images = self.context.queued_images();
        for path in context_paths.iter().filter(|p| is_image_file(p)) {
            match encode_file(path) {
                Ok(encoded) => images.push(encoded),
                Err(e) => warn!("Skipping context image {}: {}", path.display(), e),
            }
        }

        let plans = self.context.ensure_mas(|| render_plans(&self.mind.plans()));
        let model = model
            .filter(|m| !m.is_empty())
            .map(String::from)
            .or_else(|| self.context.model());
        let request = CognitiveRequest::new(message)
            .with_persona(persona)
            .with_plans(plans)
            .with_images(images)
            .with_model(model);

        let handle = self.coordinator.dispatch(request)?;
        let injector = self.injector.clone();
        let session = self.session.clone();
        Ok(tokio::spawn(async move {
            match handle.wait().await {
                Ok(result) => Ok(injector.inject(&result)),
                Err(e) => {
                    warn!("[{}] Thought failed: {}", session, e);
                    Err(e)
                }
            }
        }))
    }

    /// Ask a plain question with the persona as system prompt. Consumes the
    /// queued images.
    pub fn ask(&self, message: &str) -> Result<TaskHandle> {
        self.notify_activity();
        let images = self.context.take_images();
        self.coordinator
            .ask(self.context.persona(), message, images, self.context.model())
    }

    /// Apply agent-language text directly.
    pub fn inject(&self, text: &str) -> InjectionReport {
        self.notify_activity();
        self.injector.inject(text)
    }

    pub fn route_information(&self, content: &str, known_agents: &[String]) -> Result<TaskHandle> {
        self.notify_activity();
        self.coordinator.route_information(content, known_agents)
    }
}
