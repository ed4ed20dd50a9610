//! Inference request/response types and the generate wire format

use athena_core::SessionKey;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NUM_CTX: u32 = 4096;
pub const DEFAULT_KEEP_ALIVE: &str = "5m";

/// One request on a session.
#[derive(Clone, Debug)]
pub struct AskRequest {
    pub session: SessionKey,
    /// Overrides the provider's default model when set.
    pub model: Option<String>,
    pub input: String,
    pub system: Option<String>,
    /// Base64-encoded images.
    pub images: Vec<String>,
}

impl AskRequest {
    pub fn new(session: SessionKey, input: impl Into<String>) -> Self {
        Self {
            session,
            model: None,
            input: input.into(),
            system: None,
            images: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = (!system.is_empty()).then_some(system);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.is_empty());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Lines of a generated answer plus the service's accounting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Translation {
    pub lines: Vec<String>,
    pub prompt_eval_count: u32,
    pub eval_count: u32,
    /// Nanoseconds.
    pub total_duration: u64,
    pub load_duration: u64,
    pub eval_duration: u64,
}

impl Translation {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Trim, split into lines, drop blank ones.
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateOptions {
    pub num_ctx: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            num_ctx: DEFAULT_NUM_CTX,
        }
    }
}

/// `POST /api/generate` body
#[derive(Clone, Debug, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    pub options: GenerateOptions,
    pub stream: bool,
    pub think: bool,
    pub keep_alive: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            context: None,
            options: GenerateOptions::default(),
            stream: false,
            think: false,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            images: Vec::new(),
        }
    }
}

/// Non-streaming generate response. Unknown fields are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub context: Vec<i64>,
    #[serde(default)]
    pub prompt_eval_count: u32,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub load_duration: u64,
    #[serde(default)]
    pub eval_duration: u64,
}

impl GenerateResponse {
    pub fn into_translation(self) -> (Translation, Vec<i64>) {
        let translation = Translation {
            lines: split_lines(&self.response),
            prompt_eval_count: self.prompt_eval_count,
            eval_count: self.eval_count,
            total_duration: self.total_duration,
            load_duration: self.load_duration,
            eval_duration: self.eval_duration,
        };
        (translation, self.context)
    }
}
