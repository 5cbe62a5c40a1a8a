//! LLM client abstraction.
//!
//! Provides a unified interface over OpenAI-compatible chat endpoints and the
//! parsing of their structured classification output.

mod openai;
pub mod system_prompt;

pub use openai::OpenAiClient;
pub use system_prompt::{
    CLASSIFICATION_SYSTEM_PROMPT, ModelClassification, ModelOutput, build_classification_prompt,
};

use crate::{Error, Result};
use std::time::Duration;

/// Trait for LLM providers.
///
/// Implementations must be shareable across the fan-out threads; every call
/// works on its own request and response values.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

impl<P: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete_with_system(system, user)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Reads `MEMSWEEP_LLM_TIMEOUT_MS` and `MEMSWEEP_LLM_CONNECT_TIMEOUT_MS`.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(timeout_ms) =
            lookup("MEMSWEEP_LLM_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) =
            lookup("MEMSWEEP_LLM_CONNECT_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
///
/// A timed-out request surfaces as an ordinary transport error, which the
/// classifier turns into a failed attempt.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Parses and validates a classifier response.
///
/// Accepts the JSON object bare, inside a markdown fence, or surrounded by
/// prose. The object must carry `classification`, `confidence` and
/// `reasoning` with the expected types; anything else is rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if no valid classification object is found.
pub fn parse_model_output(response: &str) -> Result<ModelOutput> {
    let json_str = extract_json_from_response(response);
    let output: ModelOutput = serde_json::from_str(json_str)
        .map_err(|e| Error::InvalidInput(format!("invalid classification output: {e}")))?;

    if !output.confidence.is_finite() {
        return Err(Error::InvalidInput(
            "invalid classification output: confidence is not a finite number".to_string(),
        ));
    }

    Ok(output)
}

/// Extracts JSON from LLM response, handling markdown code blocks.
fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw object somewhere in the text
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}
