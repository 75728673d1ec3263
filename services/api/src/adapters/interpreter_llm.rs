//! services/api/src/adapters/interpreter_llm.rs
//!
//! This module contains the adapter for the interpretation LLM.
//! It implements the `InterpretationService` port from the `core` crate,
//! wrapping the upstream call in a bounded retry-with-backoff policy and a
//! fixed per-request timeout.

const PERSONA_INSTRUCTIONS: &str = r#"You are Madame Arcana, a warm and theatrical tarot reader.

You receive a seeker's reading: the category they chose, their question (if they asked one),
their name and birth date (if given), and the cards they drew, each upright or reversed.

Style:
- Speak directly to the seeker in the second person, warmly and with a touch of mystery.
- Weave the drawn cards together into one coherent story rather than listing them.
- Mention each card by name exactly once, and respect its orientation: a reversed card
  tempers or inverts its upright meaning.
- Close with one concrete, gentle suggestion the seeker can act on this week.
- Three to five short paragraphs. No headings, no bullet points, no disclaimers.
- Never mention that you are an AI or that this is generated text."#;

const READING_TEMPLATE: &str = r#"CATEGORY: {category}
SEEKER: {seeker}
QUESTION: {question}
CARDS:
{cards}

Give the seeker their reading."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use arcana_core::ports::{InterpretationRequest, InterpretationService, PortError, PortResult};

//=========================================================================================
// Retry Policy
//=========================================================================================

/// Bounded retry-with-backoff for the upstream generation call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped_ms)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InterpretationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiInterpreterAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiInterpreterAdapter {
    /// Creates a new `OpenAiInterpreterAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, retry: RetryPolicy) -> Self {
        Self {
            client,
            model,
            retry,
        }
    }

    fn build_prompt(request: &InterpretationRequest) -> String {
        let seeker = request
            .seeker
            .as_ref()
            .map(|s| match s.birth_date {
                Some(birth) => format!("{} (born {})", s.name, birth),
                None => s.name.clone(),
            })
            .unwrap_or_else(|| "unknown".to_string());

        let cards = request
            .cards
            .iter()
            .map(|card| {
                if card.reversed {
                    format!("- {} (reversed)", card.name)
                } else {
                    format!("- {} (upright)", card.name)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        READING_TEMPLATE
            .replace("{category}", &format!("{:?}", request.category))
            .replace("{seeker}", &seeker)
            .replace(
                "{question}",
                request.question.as_deref().unwrap_or("(none given)"),
            )
            .replace("{cards}", &cards)
    }

    async fn complete(&self, prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(PERSONA_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Interpretation LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Interpretation LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}

//=========================================================================================
// `InterpretationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InterpretationService for OpenAiInterpreterAdapter {
    /// Produces the reading text, retrying transient upstream failures with
    /// exponential backoff. The caller substitutes the canned fallback on
    /// total failure.
    async fn interpret(&self, request: &InterpretationRequest) -> PortResult<String> {
        let prompt = Self::build_prompt(request);

        let mut last_error = PortError::Unexpected("no attempts were made".to_string());
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt - 1)).await;
            }
            match tokio::time::timeout(self.retry.request_timeout, self.complete(&prompt)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    warn!("Interpretation attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
                Err(_) => {
                    warn!("Interpretation attempt {} timed out", attempt + 1);
                    last_error = PortError::Unexpected(format!(
                        "request timed out after {:?}",
                        self.retry.request_timeout
                    ));
                }
            }
        }
        Err(last_error)
    }
}
