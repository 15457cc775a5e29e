//! Pitch generator — drafts a reply to one journalist query with the LLM.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{QueryRecord, ResponseGenerator};

use super::persona::{Persona, PersonaDraft};

/// Suffix appended to truncated query text.
pub const TRUNCATION_MARKER: &str = "\n\n...[TRUNCATED]...";

/// Configuration for pitch generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Query text longer than this (in chars) is truncated in the pitch prompt.
    pub max_query_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a topic-specific persona before each pitch.
    pub dynamic_persona: bool,
    pub persona_max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_query_chars: 3500,
            temperature: 0.7,
            max_tokens: 600,
            dynamic_persona: true,
            persona_max_tokens: 300,
        }
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..idx]),
        None => text.to_string(),
    }
}

/// First `max_chars` characters of `text`, no marker.
fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull a JSON object out of a model reply that may be wrapped in a
/// markdown code fence or surrounded by chatter.
fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner;
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return &trimmed[start..=end];
    }

    trimmed
}

/// Generates pitches as a configured persona.
pub struct PitchGenerator {
    llm: Arc<dyn LlmProvider>,
    base_persona: Persona,
    config: GeneratorConfig,
}

impl PitchGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, base_persona: Persona, config: GeneratorConfig) -> Self {
        Self {
            llm,
            base_persona,
            config,
        }
    }

    /// Persona tailored to the query's topic. Falls back to the base persona
    /// on any failure.
    pub async fn persona_for(&self, query: &QueryRecord) -> Persona {
        if !self.config.dynamic_persona {
            return self.base_persona.clone();
        }

        match self.draft_persona(query).await {
            Ok(draft) => {
                let persona = self.base_persona.merge(draft);
                debug!(title = %persona.title, "Generated dynamic persona");
                persona
            }
            Err(e) => {
                warn!(error = %e, "Failed to generate dynamic persona, using base persona");
                self.base_persona.clone()
            }
        }
    }

    async fn draft_persona(&self, query: &QueryRecord) -> Result<PersonaDraft, LlmError> {
        let base = &self.base_persona;
        let prompt = format!(
            "Based on this HARO query, create a professional expert persona that would be \
             credible for responding:\n\n\
             Title: {title}\n\
             Query: {query}\n\n\
             Generate a JSON object with:\n\
             - \"name\": A professional first name (use \"{name}\" as the name)\n\
             - \"title\": A specific expert title relevant to the query topic (e.g., \"Energy \
             Efficiency Specialist\", \"Personal Finance Advisor\", \"Digital Transformation \
             Consultant\")\n\
             - \"company\": A credible company name (use \"{company}\" format, or create a \
             relevant one)\n\
             - \"website\": Use exactly \"{website}\" as the website URL\n\
             - \"expertise\": One sentence describing their specific expertise in the query's \
             domain\n\n\
             Make the title and expertise highly relevant to the query topic. Be specific and \
             credible.\n\
             Respond ONLY with valid JSON, no other text.",
            title = head(&query.title, 200),
            query = head(&query.query_text, 800),
            name = base.name,
            company = base.company,
            website = base.website,
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system("You are a persona generator. Respond only with valid JSON."),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.persona_max_tokens);

        let response = self.llm.complete(request).await?;
        let draft = serde_json::from_str(extract_json_object(&response.content))?;
        Ok(draft)
    }

    fn pitch_messages(&self, persona: &Persona, query: &QueryRecord) -> Vec<ChatMessage> {
        let expertise_note = persona
            .expertise
            .as_deref()
            .map(|e| format!(" Your expertise: {e}"))
            .unwrap_or_default();

        let system = format!(
            "You are {name}, {title} at {website}.{expertise_note} Write like a real human \
             expert - direct, conversational, and helpful. No marketing fluff or buzzwords.",
            name = persona.name,
            title = persona.title,
            website = persona.website,
        );

        let user = format!(
            "Publication: {publication}\n\
             Title: {title}\n\n\
             Query:\n\
             {query}\n\n\
             Write a direct, human-sounding response that answers the query:\n\
             - Be direct and to the point - answer the question asked, no fluff\n\
             - Use natural, conversational language like you're talking to a colleague\n\
             - Keep it short (1-2 short paragraphs maximum)\n\
             - Include one clear, quotable sentence that directly addresses their question\n\
             - Sound human and easy to understand - avoid corporate jargon\n\
             - Do NOT make up fake data, statistics, or case studies\n\
             - Do NOT add unnecessary background or sales pitches\n\
             - Just answer what they're asking for in a helpful, expert way\n\
             - IMPORTANT: Write complete, full sentences - do not cut off mid-sentence\n\n\
             End with this complete signature:\n\n\
             {name}\n\
             {persona_title}\n\
             {website}",
            publication = query.publication,
            title = query.title,
            query = truncate_text(&query.query_text, self.config.max_query_chars),
            name = persona.name,
            persona_title = persona.title,
            website = persona.website,
        );

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

#[async_trait]
impl ResponseGenerator for PitchGenerator {
    async fn generate(&self, query: &QueryRecord) -> Result<String, LlmError> {
        let persona = self.persona_for(query).await;

        let request = CompletionRequest::new(self.pitch_messages(&persona, query))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await?;
        let pitch = response.content.trim();
        if pitch.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty pitch".into(),
            });
        }

        info!(
            title = %query.title,
            persona = %persona.title,
            tokens = response.output_tokens,
            "Generated pitch"
        );
        Ok(pitch.to_string())
    }
}
