//! Keyword tables for the relevance classifier.
//!
//! Two phrase lists: an inclusion vocabulary (topics worth pitching) and an
//! exclusion vocabulary (topics always rejected). The built-in tables can be
//! replaced from a TOML file:
//!
//! ```toml
//! inclusion = ["energy", "fintech"]
//! exclusion = ["sportsbook"]
//! ```
//!
//! A key left out of the file keeps its built-in table.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// High-value topics: business, technology, energy and consumer affairs.
pub const DEFAULT_INCLUSION: &[&str] = &[
    // Business & finance
    "business",
    "budget",
    "budgeting",
    "small business",
    "startup",
    "entrepreneur",
    "founder",
    "scaling",
    "cash flow",
    "financial planning",
    "cost of living",
    "inflation",
    "personal finance",
    "saving money",
    "household expenses",
    "economy",
    "economic trends",
    "market trends",
    "productivity",
    "leadership",
    "remote work",
    "future of work",
    // Technology & digital transformation
    "ai",
    "artificial intelligence",
    "automation",
    "cloud",
    "digital transformation",
    "cybersecurity",
    "data",
    "saas",
    "workflow automation",
    "tech trends",
    "digital payments",
    "fintech",
    // Energy, utilities & sustainability
    "electricity",
    "energy",
    "power",
    "utility",
    "utilities",
    "renewable",
    "solar",
    "smart meter",
    "smart home",
    "energy efficiency",
    "energy saving",
    "electricity prices",
    "electricity rates",
    "billing",
    "digital billing",
    "online billing",
    "sustainability",
    "climate",
    "carbon footprint",
    "green energy",
    "energy crisis",
    "energy policy",
    "public utilities",
    "infrastructure",
    "smart city",
    // Consumer behavior
    "consumer",
    "consumer behavior",
    "consumer rights",
];

/// Topics rejected regardless of any inclusion match.
pub const DEFAULT_EXCLUSION: &[&str] = &[
    // Gambling
    "sportsbook",
    "sports betting",
    "betting",
    "bet",
    "odds",
    "casino",
    "gambling",
    "poker",
    "lottery",
    "sweepstakes",
    "wager",
    // Regulated or adult products
    "cbd",
    "cannabis",
    "marijuana",
    "vape",
    "vaping",
    "adult entertainment",
    "escort",
    "onlyfans",
    // Low-value placements
    "payday loan",
    "essay writing",
    "celebrity gossip",
];

/// Inclusion and exclusion phrase lists.
///
/// Immutable once built; share it behind the classifier rather than
/// mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordTables {
    #[serde(default = "default_inclusion")]
    pub inclusion: Vec<String>,
    #[serde(default = "default_exclusion")]
    pub exclusion: Vec<String>,
}

fn default_inclusion() -> Vec<String> {
    DEFAULT_INCLUSION.iter().map(|s| s.to_string()).collect()
}

fn default_exclusion() -> Vec<String> {
    DEFAULT_EXCLUSION.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            inclusion: default_inclusion(),
            exclusion: default_exclusion(),
        }
    }
}

impl KeywordTables {
    /// Build tables from explicit phrase lists (handy for small test vocabularies).
    pub fn new<I, E, S, T>(inclusion: I, exclusion: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            inclusion: inclusion.into_iter().map(Into::into).collect(),
            exclusion: exclusion.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse tables from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(format!("keyword tables: {e}")))
    }

    /// Load tables from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` when given, otherwise use the built-in tables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let tables = Self::from_file(p)?;
                tracing::info!(
                    path = %p.display(),
                    inclusion = tables.inclusion.len(),
                    exclusion = tables.exclusion.len(),
                    "Loaded keyword tables"
                );
                Ok(tables)
            }
            None => Ok(Self::default()),
        }
    }
}
