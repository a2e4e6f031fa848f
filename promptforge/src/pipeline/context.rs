//! The directive a run is seeded with and the context that grows from it.

use serde::{Deserialize, Serialize};

/// Base directive plus an optional steering modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDirective {
    /// The system directive.
    pub base: String,
    /// Free-text steering supplied by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

impl GlobalDirective {
    /// Creates a directive with no modifier.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            modifier: None,
        }
    }

    /// Sets the steering modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// The seed text: `base`, or `base + "\n" + modifier` when the modifier
    /// is not blank. Neither part is trimmed.
    #[must_use]
    pub fn compose(&self) -> String {
        match self.modifier.as_deref() {
            Some(modifier) if !modifier.trim().is_empty() => {
                format!("{}\n{modifier}", self.base)
            }
            _ => self.base.clone(),
        }
    }
}

/// Append-only text buffer shared by the stages of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedContext {
    text: String,
}

impl AccumulatedContext {
    /// Starts a context from a composed seed.
    #[must_use]
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self { text: seed.into() }
    }

    /// Appends `"\n[stage_id]: output"`.
    pub fn append(&mut self, stage_id: &str, output: &str) {
        self.text.reserve(stage_id.len() + output.len() + 5);
        self.text.push_str("\n[");
        self.text.push_str(stage_id);
        self.text.push_str("]: ");
        self.text.push_str(output);
    }

    /// The full context text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}
