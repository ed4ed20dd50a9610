//! Per-agent cognitive context: persona, MAS context, queued images and the
//! thinking flag.

use athena_core::{preview, PlanRule, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Extensions attached as images by an explicit think.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Default)]
pub struct CognitiveContext {
    persona: RwLock<String>,
    mas: RwLock<String>,
    images: Mutex<Vec<String>>,
    model: RwLock<Option<String>>,
    thinking: AtomicBool,
}

impl CognitiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persona(&self) -> String {
        self.persona.read().clone()
    }

    pub fn set_persona(&self, persona: impl Into<String>) {
        let persona = persona.into();
        info!("Persona defined: {}", preview(&persona));
        *self.persona.write() = persona;
    }

    pub fn clear_persona(&self) {
        self.persona.write().clear();
    }

    /// Plan sources of this agent and its peers, blank-line separated.
    pub fn mas(&self) -> String {
        self.mas.read().clone()
    }

    pub fn append_mas(&self, content: &str) {
        let mut mas = self.mas.write();
        if !mas.is_empty() {
            mas.push_str("\n\n");
        }
        mas.push_str(content);
    }

    pub fn clear_mas(&self) {
        self.mas.write().clear();
    }

    /// Seed an empty MAS context with `plans` and return the result.
    pub fn ensure_mas(&self, plans: impl FnOnce() -> String) -> String {
        let mut mas = self.mas.write();
        if mas.is_empty() {
            *mas = plans();
        }
        mas.clone()
    }

    pub fn queue_image(&self, encoded: String) {
        self.images.lock().push(encoded);
    }

    pub fn queued_images(&self) -> Vec<String> {
        self.images.lock().clone()
    }

    pub fn take_images(&self) -> Vec<String> {
        std::mem::take(&mut *self.images.lock())
    }

    pub fn clear_images(&self) {
        self.images.lock().clear();
    }

    /// Model chosen when thinking started; `None` uses the provider default.
    pub fn model(&self) -> Option<String> {
        self.model.read().clone()
    }

    pub fn set_model(&self, model: Option<String>) {
        *self.model.write() = model.filter(|m| !m.is_empty());
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking.load(Ordering::Acquire)
    }

    pub fn set_thinking(&self, thinking: bool) {
        self.thinking.store(thinking, Ordering::Release);
    }
}

/// File content when `content` names an existing file, the text itself
/// otherwise.
pub fn resolve_content(content: &str) -> Result<String> {
    let path = Path::new(content);
    if !content.is_empty() && path.is_file() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(content.to_string())
    }
}

pub fn encode_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(STANDARD.encode(bytes))
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// The plan library as agent-language source, one plan per line.
pub fn render_plans(plans: &[PlanRule]) -> String {
    plans
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
