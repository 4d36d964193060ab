//! Parsing of raw completion output into the generation contract.
//!
//! A valid response is either the literal token `SKIP` or a JSON object with
//! exactly one string field, `content`. Content must be ASCII without
//! control characters; line breaks are flattened into `;` first.

use serde::Deserialize;

/// Token the model emits when the conversation does not ask for storage.
pub const SKIP_TOKEN: &str = "SKIP";

/// Separator that replaces line breaks in generated content.
pub const LINE_SEPARATOR: &str = ";";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ContentEnvelope {
    content: String,
}

/// A response that satisfied the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Content(String),
    Skip,
}

/// Why a response was rejected. Recoverable: the generator retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationParseError {
    #[error("response is not a single-field content object: {0}")]
    NotContentObject(String),

    #[error("content is empty")]
    EmptyContent,

    #[error("content contains non-ASCII character {0:?}")]
    NonAscii(char),

    #[error("content contains control character U+{0:04X}")]
    ControlCharacter(u32),
}

/// Classify one raw completion response.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, GenerationParseError> {
    let trimmed = raw.trim();
    if trimmed == SKIP_TOKEN {
        return Ok(ParsedResponse::Skip);
    }

    let envelope: ContentEnvelope = serde_json::from_str(trimmed)
        .map_err(|e| GenerationParseError::NotContentObject(e.to_string()))?;
    sanitize_content(&envelope.content).map(ParsedResponse::Content)
}

/// Flatten line breaks and enforce the storable character set.
pub fn sanitize_content(text: &str) -> Result<String, GenerationParseError> {
    let flattened = text
        .trim()
        .replace("\r\n", LINE_SEPARATOR)
        .replace(['\n', '\r'], LINE_SEPARATOR);

    if flattened.is_empty() {
        return Err(GenerationParseError::EmptyContent);
    }
    if let Some(c) = flattened.chars().find(|c| !c.is_ascii()) {
        return Err(GenerationParseError::NonAscii(c));
    }
    if let Some(c) = flattened.chars().find(|c| c.is_ascii_control()) {
        return Err(GenerationParseError::ControlCharacter(c as u32));
    }
    Ok(flattened)
}

/// Whether `text` already satisfies the storable character set.
pub fn is_storable(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}
