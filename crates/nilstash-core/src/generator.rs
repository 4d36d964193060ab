//! Bounded-retry structured content generation.
//!
//! State machine per attempt:
//!
//! ```text
//! Pending ──► ParsedOK          ──► Content(text)
//!         ──► SkipSignal        ──► Skip
//!         ──► ParseFailure      ──► (corrective turn appended) Pending
//!         ──► RetriesExhausted  ──► Exhausted
//! ```
//!
//! The loop makes at most `max_retries + 1` completion calls.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::completion::TextCompletion;
use crate::content::{parse_response, ParsedResponse};
use crate::message::ChatMessage;
use crate::obs::{emit_generation_attempt, emit_generation_rejected, emit_generation_resolved};

/// Retries allowed after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// User turn appended after a response that broke the contract.
pub const CORRECTIVE_INSTRUCTION: &str =
    "Please output only the data as specified, with no additional text.";

/// System turn prepended to every completion request.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a helpful assistant that uploads data into a privacy preserving, secret-shared database. Take inspiration from the user's messages and prepare the data as a JSON output.

Rules for the content:
1. Never generate special characters.
2. Never generate control characters.
3. Never generate newlines; join separate lines with a semicolon instead.
4. The content must serialize to JSON text and stay within ASCII at all times.
5. If the input does not ask you to store something, output only the uppercase word SKIP. Example:
SKIP
6. Otherwise output a JSON object with exactly one field, content. Example:
{"content":"Call me Ishmael"}
7. Do not add any commentary. Your response must be only the complete, valid, parseable JSON object.
8. Your response must be complete. If you cannot finish in one response, wait."#;

/// Terminal result of one generation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentResult {
    /// Validated, storable content.
    Content(String),
    /// The conversation did not ask for anything to be stored.
    Skip,
    /// Every attempt broke the contract.
    Exhausted,
}

/// Forces an unreliable completion call into the content contract.
pub struct ContentGenerator {
    completion: Arc<dyn TextCompletion>,
    max_retries: u32,
    instruction: String,
}

impl ContentGenerator {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        ContentGenerator {
            completion,
            max_retries: DEFAULT_MAX_RETRIES,
            instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the system instruction (tests and alternate deployments).
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run the generation chain over `messages`.
    ///
    /// Each rejected response appends [`CORRECTIVE_INSTRUCTION`] to
    /// `messages`. A failed completion call consumes an attempt without
    /// appending anything.
    #[instrument(skip_all, fields(max_retries = self.max_retries))]
    pub async fn generate(&self, messages: &mut Vec<ChatMessage>) -> ContentResult {
        let mut retries_remaining = self.max_retries;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            emit_generation_attempt(attempt, retries_remaining);

            let request = self.build_request(messages);
            let needs_correction = match self.completion.complete(&request).await {
                Ok(raw) => match parse_response(&raw) {
                    Ok(ParsedResponse::Content(text)) => {
                        emit_generation_resolved("content", attempt);
                        return ContentResult::Content(text);
                    }
                    Ok(ParsedResponse::Skip) => {
                        emit_generation_resolved("skip", attempt);
                        return ContentResult::Skip;
                    }
                    Err(e) => {
                        debug!(attempt, response = %raw, "rejected completion response");
                        emit_generation_rejected(attempt, &e);
                        true
                    }
                },
                Err(e) => {
                    emit_generation_rejected(attempt, &e);
                    false
                }
            };

            if retries_remaining == 0 {
                emit_generation_resolved("exhausted", attempt);
                return ContentResult::Exhausted;
            }
            retries_remaining -= 1;

            if needs_correction {
                messages.push(ChatMessage::user(CORRECTIVE_INSTRUCTION));
            }
        }
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut request = Vec::with_capacity(messages.len() + 1);
        request.push(ChatMessage::system(self.instruction.clone()));
        request.extend_from_slice(messages);
        request
    }
}
