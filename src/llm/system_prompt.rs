//! Prompts and structured output for memory durability classification.
//!
//! Every classifier receives the same system prompt and the same user prompt,
//! so disagreements between models reflect the models and not the wording.

use serde::{Deserialize, Serialize};

/// System prompt shared by every classifier.
pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"<identity>
You classify stored memories of a personal AI assistant by durability. You decide whether a memory is worth keeping for the long run or is a short-lived note that can be safely forgotten.
</identity>

<principles>
A memory qualifies as long-term only when it is self-contained: someone reading it later, without any surrounding conversation, must be able to understand and use it.

Stable personal facts are the exception. Where a person lives, what they do, what they prefer, and enduring attributes (allergies, degrees, pets, languages) stay useful even when stated tersely, and are long-term.
</principles>

<categories>
## transient
Time-bound or ephemeral content.
- Reminders and errands: "Call John at 3 PM today", "Pick up milk on the way home"
- Deadlines and temporary status: "Submit report by Friday", "The printer is out of paper"
- Logistics that expire: "Meeting moved to room B", "Parking spot 47A today"
- Transactional fragments with no purpose attached: "paid 1200 bill", "processed 15 invoices today"
- Vague activity logs and partial numbers: "called client", "usage went up 8%"

## long-term
Enduring knowledge with enough context to stand alone.
- Facts and procedures: "To reset the router, hold the button for 10 seconds"
- Insights and preferences with reasons: "Prefers TypeScript for large projects because of type checking"
- Relationships and references: "Alice is the primary contact at TechCorp for the mobile app"
- Significant events with detail: "Completed an advanced React course in March 2024"
- Stable personal facts: "Lives in Kolkata, India", "Allergic to peanuts", "Has a cat named Whiskers"

## unclassified
Content too ambiguous to judge either way.
- Statements with no referent: "it was successful", "she agreed to it"
- References to unnamed things: "the document is ready", "file was uploaded"
</categories>

<evaluation>
Consider, in order:
1. Is the memory understandable on its own?
2. Will it still matter after the moment it describes has passed?
3. Does it give concrete, specific detail rather than a vague outline?
4. Would it help personalize or inform future conversations?

Never label a context-deficient fragment long-term unless it is a stable personal fact.
</evaluation>

<output_format>
Respond with a single JSON object and nothing else:
{"classification": "transient" | "long-term" | "unclassified", "confidence": <number between 0.0 and 1.0>, "reasoning": "<one or two sentences>"}
</output_format>"#;

/// Builds the user prompt for one memory.
#[must_use]
pub fn build_classification_prompt(content: &str) -> String {
    format!(
        r#"Classify the following memory as "transient", "long-term", or "unclassified".

MEMORY CONTENT:
"{content}"

Give a confidence between 0.0 and 1.0 and explain which characteristics of the memory, including any temporal or contextual cues, led to your decision."#
    )
}

/// Label a model may assign, including the refusal label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ModelClassification {
    /// Short-lived content.
    #[serde(rename = "transient")]
    Transient,
    /// Enduring content.
    #[serde(rename = "long-term")]
    LongTerm,
    /// The model declined to decide.
    #[serde(rename = "unclassified")]
    Unclassified,
}

/// Structured output every classifier must return.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelOutput {
    /// The assigned label.
    pub classification: ModelClassification,
    /// Self-reported confidence.
    pub confidence: f64,
    /// Explanation for the label.
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_content() {
        let prompt = build_classification_prompt("Lives in Kolkata");
        assert!(prompt.contains("\"Lives in Kolkata\""));
        assert!(prompt.contains("unclassified"));
    }

    #[test]
    fn test_system_prompt_names_every_label() {
        for label in ["transient", "long-term", "unclassified"] {
            assert!(CLASSIFICATION_SYSTEM_PROMPT.contains(label));
        }
    }
}
