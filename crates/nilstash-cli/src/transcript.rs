//! File-backed [`Conversation`]: history from a JSON transcript, replies to a
//! writer.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use nilstash_core::{ChatMessage, Conversation};
use tracing::{info, warn};

/// Read a transcript (JSON array of `{role, content}`) from a file, or from
/// stdin when `source` is `-`.
pub fn load_transcript(source: &str) -> Result<Vec<ChatMessage>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read transcript from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read transcript file: {source}"))?
    };
    parse_transcript(&raw)
}

pub fn parse_transcript(raw: &str) -> Result<Vec<ChatMessage>> {
    serde_json::from_str(raw).context("Transcript must be a JSON array of {role, content} messages")
}

pub fn write_transcript(path: &Path, messages: &[ChatMessage]) -> Result<()> {
    let json = serde_json::to_string_pretty(messages)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write transcript: {}", path.display()))
}

pub struct TranscriptConversation<W> {
    history: Vec<ChatMessage>,
    replies: Vec<String>,
    out: W,
    done: bool,
}

impl<W: Write> TranscriptConversation<W> {
    pub fn new(history: Vec<ChatMessage>, out: W) -> Self {
        TranscriptConversation {
            history,
            replies: Vec::new(),
            out,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    /// History followed by every reply as an assistant turn.
    pub fn into_transcript(self) -> Vec<ChatMessage> {
        let mut messages = self.history;
        messages.extend(self.replies.into_iter().map(ChatMessage::assistant));
        messages
    }
}

impl<W: Write> Conversation for TranscriptConversation<W> {
    fn messages(&self) -> Vec<ChatMessage> {
        self.history.clone()
    }

    fn reply(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!(error = %e, "failed to write reply");
        }
        self.replies.push(text.to_string());
    }

    fn system_log(&mut self, text: &str) {
        info!(target: "nilstash::conversation", "{text}");
    }

    fn mark_done(&mut self) {
        self.done = true;
    }
}
