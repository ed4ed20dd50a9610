//! Prompt templates for translation and delegation

use std::path::Path;
use tracing::warn;

/// Replaced with the agent's plan library in the translation template.
pub const PLANS_PLACEHOLDER: &str = "##PLANOS_DO_AGENTE##";

pub const DEFAULT_TRANSLATION_TEMPLATE: &str = "\
You translate situations into commands for a BDI agent.
Answer ONLY with agent-language lines, one per line, no prose, no markdown:
  +belief(args)          add a belief
  -belief(args)          remove a belief
  +!goal(args)           adopt a goal
  +!goal : context <- step1; step2.   a new plan
The agent currently knows these plans:
##PLANOS_DO_AGENTE##";

pub const DEFAULT_DELEGATION_TEMPLATE: &str = "AGENT_LIST: {agents}\nDATA: {content}";

#[derive(Clone, Debug)]
pub struct PromptTemplates {
    translation: String,
    delegation: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            translation: DEFAULT_TRANSLATION_TEMPLATE.to_string(),
            delegation: DEFAULT_DELEGATION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn new(translation: impl Into<String>, delegation: impl Into<String>) -> Self {
        Self {
            translation: translation.into(),
            delegation: delegation.into(),
        }
    }

    /// Load templates from files, keeping the built-in text for any path that
    /// is absent or unreadable.
    pub fn load(translation: Option<&Path>, delegation: Option<&Path>) -> Self {
        let defaults = Self::default();
        Self {
            translation: read_or(translation, defaults.translation),
            delegation: read_or(delegation, defaults.delegation),
        }
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    pub fn delegation(&self) -> &str {
        &self.delegation
    }

    /// Translation template with the plans substituted, prefixed with the
    /// persona when there is one.
    pub fn system_prompt(&self, persona: &str, plans: &str) -> String {
        let prompt = self.translation.replace(PLANS_PLACEHOLDER, plans);
        if persona.is_empty() {
            prompt
        } else {
            format!("{}\n\n{}", persona, prompt)
        }
    }

    /// Stateless routing prompt; never includes the persona.
    pub fn delegation_prompt(&self, content: &str, known_agents: &[String]) -> String {
        let agents = format!("[{}]", known_agents.join(", "));
        self.delegation
            .replace("{agents}", &agents)
            .replace("{content}", content)
    }
}

fn read_or(path: Option<&Path>, fallback: String) -> String {
    let Some(path) = path else {
        return fallback;
    };
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Failed to read template {}: {}, using built-in default",
                path.display(),
                e
            );
            fallback
        }
    }
}
