//! Responder persona: the base identity loaded from disk, and the
//! per-query variant produced by the LLM.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Who the pitch is written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
}

impl Persona {
    /// Load the base persona from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let persona = Self::from_json(&raw).map_err(|e| {
            ConfigError::ParseError(format!("persona {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), name = %persona.name, "Loaded base persona");
        Ok(persona)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Overlay an LLM-drafted persona on this base persona.
    ///
    /// Name, title and company fall back to the base when missing or blank.
    /// The website is always the base website.
    pub fn merge(&self, draft: PersonaDraft) -> Persona {
        fn pick(value: Option<String>, base: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| base.to_string())
        }

        let expertise = draft
            .expertise
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .or_else(|| self.expertise.clone());

        Persona {
            name: pick(draft.name, &self.name),
            title: pick(draft.title, &self.title),
            company: pick(draft.company, &self.company),
            website: self.website.clone(),
            expertise,
        }
    }
}

/// Persona fields as returned by the model. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaDraft {
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub expertise: Option<String>,
}
