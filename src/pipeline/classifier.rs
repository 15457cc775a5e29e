//! Keyword relevance classifier.
//!
//! Decides whether a query is worth answering by plain substring matching
//! against the keyword tables:
//! - any exclusion phrase → rejected, whatever else matches
//! - otherwise any inclusion phrase → relevant
//!
//! Matching is substring containment on the lowercased text, not whole
//! words, so short phrases like "ai" or "bet" also hit inside longer words.

use tracing::debug;

use crate::pipeline::keywords::KeywordTables;

/// Pure relevance/exclusion classifier over free text.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    inclusion: Vec<String>,
    exclusion: Vec<String>,
}

impl KeywordClassifier {
    /// Build a classifier from keyword tables.
    ///
    /// Phrases are lowercased; empty phrases are dropped since they would
    /// match every text.
    pub fn new(tables: KeywordTables) -> Self {
        Self {
            inclusion: normalize(tables.inclusion),
            exclusion: normalize(tables.exclusion),
        }
    }

    /// True iff `text` is non-empty and contains an exclusion phrase.
    pub fn is_excluded<'a>(&self, text: impl Into<Option<&'a str>>) -> bool {
        match non_empty(text.into()) {
            Some(text) => first_match(&self.exclusion, &text.to_lowercase()).is_some(),
            None => false,
        }
    }

    /// True iff `text` is non-empty, not excluded, and contains an
    /// inclusion phrase.
    pub fn is_relevant<'a>(&self, text: impl Into<Option<&'a str>>) -> bool {
        let Some(text) = non_empty(text.into()) else {
            return false;
        };
        let lower = text.to_lowercase();

        if let Some(phrase) = first_match(&self.exclusion, &lower) {
            debug!(phrase, "Query matched exclusion phrase");
            return false;
        }

        first_match(&self.inclusion, &lower).is_some()
    }

    /// Number of (inclusion, exclusion) phrases in use.
    pub fn table_sizes(&self) -> (usize, usize) {
        (self.inclusion.len(), self.exclusion.len())
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(KeywordTables::default())
    }
}

fn normalize(phrases: Vec<String>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

fn first_match<'a>(phrases: &'a [String], lower: &str) -> Option<&'a str> {
    phrases
        .iter()
        .find(|p| lower.contains(p.as_str()))
        .map(String::as_str)
}
