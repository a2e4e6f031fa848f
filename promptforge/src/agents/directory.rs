//! Ordered table of agent stages.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::prompts;
use crate::core::{ModelTier, Stage, INGEST_STAGE_ID};
use crate::errors::PipelineError;

/// Immutable definition of one agent stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDirectoryEntry {
    /// Stage identifier, used as the context tag.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description shown to observers.
    pub description: String,
    /// Role instructions sent with every request for this stage.
    pub instructions: String,
    /// Model tier serving this stage.
    #[serde(default)]
    pub tier: ModelTier,
}

impl AgentDirectoryEntry {
    /// Creates a fast-tier entry.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            tier: ModelTier::Fast,
        }
    }

    /// Sets the model tier.
    #[must_use]
    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    /// Returns an idle [`Stage`] for this entry.
    #[must_use]
    pub fn to_stage(&self) -> Stage {
        Stage::new(&self.id, &self.name, &self.description)
    }
}

/// Non-empty, ordered list of agent entries with unique ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AgentDirectory {
    entries: Vec<AgentDirectoryEntry>,
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::standard()
    }
}

impl AgentDirectory {
    /// Builds a directory, rejecting empty tables, duplicate ids and ids
    /// that collide with the ingest stage.
    pub fn new(entries: Vec<AgentDirectoryEntry>) -> Result<Self, PipelineError> {
        if entries.is_empty() {
            return Err(PipelineError::InvalidDirectory(
                "directory must contain at least one entry".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(PipelineError::InvalidDirectory(
                    "entry ids must not be blank".to_string(),
                ));
            }
            if entry.id == INGEST_STAGE_ID {
                return Err(PipelineError::InvalidDirectory(format!(
                    "'{INGEST_STAGE_ID}' is reserved for the ingest stage"
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(PipelineError::InvalidDirectory(format!(
                    "duplicate entry id '{}'",
                    entry.id
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Parses and validates a directory from a JSON array of entries.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let entries: Vec<AgentDirectoryEntry> = serde_json::from_str(json)
            .map_err(|e| PipelineError::InvalidDirectory(e.to_string()))?;
        Self::new(entries)
    }

    /// The built-in seven-stage directory.
    ///
    /// Five independent vision passes feed two reasoning-tier synthesis
    /// passes; `optimizer` produces the artifact.
    #[must_use]
    pub fn standard() -> Self {
        let entries = vec![
            AgentDirectoryEntry::new(
                "analyst",
                "Subject Specialist",
                "Deconstructing subjects, actions, and environmental persistence.",
                prompts::ANALYST,
            ),
            AgentDirectoryEntry::new(
                "style",
                "Cinematography Node",
                "Analyzing camera movement, focal shifts, and lighting dynamics.",
                prompts::STYLE,
            ),
            AgentDirectoryEntry::new(
                "technical",
                "Optical Architect",
                "Evaluating textures, motion blur, and technical rendering quality.",
                prompts::TECHNICAL,
            ),
            AgentDirectoryEntry::new(
                "emotional",
                "Temporal Narrative",
                "Mapping the mood progression and symbolic storytelling arc.",
                prompts::EMOTIONAL,
            ),
            AgentDirectoryEntry::new(
                "research",
                "Style Historian",
                "Cross-referencing cinematic eras and artistic movements.",
                prompts::RESEARCH,
            ),
            AgentDirectoryEntry::new(
                "consolidator",
                "Synthesis Nexus",
                "Merging multi-perspective temporal data into a coherent audit.",
                prompts::CONSOLIDATOR,
            )
            .with_tier(ModelTier::Reasoning),
            AgentDirectoryEntry::new(
                "optimizer",
                "Prompt Engineer",
                "Encoding the analysis into hyper-optimized generative syntax.",
                prompts::OPTIMIZER,
            )
            .with_tier(ModelTier::Reasoning),
        ];
        Self { entries }
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgentDirectoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Iterates entries in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentDirectoryEntry> {
        self.entries.iter()
    }

    /// Stage ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty directory cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry whose output is the delivered artifact.
    #[must_use]
    pub fn final_entry(&self) -> &AgentDirectoryEntry {
        // new() and standard() guarantee at least one entry
        &self.entries[self.entries.len() - 1]
    }
}
