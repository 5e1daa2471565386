//! Two-turn chat prompt templates

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::PromptConfig;

/// Errors raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Template variable {{{0}}} has no value")]
    MissingVariable(String),
}

/// Constant pattern; `test_placeholder_pattern` pins that it compiles
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// A text template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in placeholder_regex().captures_iter(&self.template) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder in a single pass. Substituted values are
    /// not rescanned, so braces inside a question are left alone.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> Result<String, PromptError> {
        if let Some(missing) = self.variables().into_iter().find(|v| !vars.contains_key(v)) {
            return Err(PromptError::MissingVariable(missing.to_string()));
        }

        let rendered = placeholder_regex().replace_all(&self.template, |caps: &Captures| {
            vars.get(&caps[1]).copied().unwrap_or_default().to_string()
        });
        Ok(rendered.into_owned())
    }
}

/// Rendered system and user turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// System turn followed by a user turn carrying the question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: PromptTemplate,
    pub user: PromptTemplate,
}

impl ChatPrompt {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            system: PromptTemplate::new(&config.system),
            user: PromptTemplate::new(&config.user),
        }
    }

    /// Render for one question; `possible_answers` is the newline-joined
    /// candidate list
    pub fn render(&self, question: &str, possible_answers: &str) -> Result<RenderedPrompt, PromptError> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("question", question),
            ("possible_answers", possible_answers),
        ]);

        Ok(RenderedPrompt {
            system: self.system.render(&vars)?,
            user: self.user.render(&vars)?,
        })
    }
}

impl Default for ChatPrompt {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default())
    }
}

/// Join candidates into the display block shown to the model
pub fn candidates_display<S: AsRef<str>>(candidates: &[S]) -> String {
    candidates
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}
