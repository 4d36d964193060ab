//! Task sequencing: conversation → content → record → cluster.

use serde::Serialize;
use tracing::{info, instrument};

use crate::coordinator::UploadCoordinator;
use crate::error::UploadError;
use crate::generator::{ContentGenerator, ContentResult};
use crate::message::ChatMessage;
use crate::record::ContentRecord;
use crate::splitter::ShareSplitter;

/// Reply sent when nothing was generated.
pub const GENERATION_FALLBACK_REPLY: &str =
    "Content generation failed or was skipped. What else can I do for you?";
pub const STORED_REPLY: &str = "COMPLETE! stored content";
pub const STORE_FAILED_REPLY: &str = "FAILED! error storing content";

/// The environment a task runs in: it supplies history and renders replies.
pub trait Conversation {
    fn messages(&self) -> Vec<ChatMessage>;
    fn reply(&mut self, text: &str);
    fn system_log(&mut self, text: &str);
    fn mark_done(&mut self);
}

/// How one task invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Empty history; the task did nothing.
    NoMessages,
    /// The conversation did not ask for storage.
    Skipped,
    /// Generation never produced valid content.
    Exhausted,
    Stored,
    StoreFailed,
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Exhausted | TaskOutcome::StoreFailed)
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskOutcome::NoMessages => "no messages",
            TaskOutcome::Skipped => "generation skipped",
            TaskOutcome::Exhausted => "generation exhausted",
            TaskOutcome::Stored => "stored successfully",
            TaskOutcome::StoreFailed => "store failed",
        };
        f.write_str(label)
    }
}

/// Wires a generator to an upload coordinator for one team.
pub struct StorageTask<S> {
    generator: ContentGenerator,
    coordinator: UploadCoordinator<S>,
    team: String,
}

impl<S: ShareSplitter> StorageTask<S> {
    pub fn new(
        generator: ContentGenerator,
        coordinator: UploadCoordinator<S>,
        team: impl Into<String>,
    ) -> Self {
        StorageTask {
            generator,
            coordinator,
            team: team.into(),
        }
    }

    pub fn coordinator(&self) -> &UploadCoordinator<S> {
        &self.coordinator
    }

    /// Run the task against `conversation`.
    #[instrument(skip_all, fields(team = %self.team))]
    pub async fn run<C: Conversation + ?Sized>(&self, conversation: &mut C) -> TaskOutcome {
        let mut messages = conversation.messages();
        if messages.is_empty() {
            info!("no messages in conversation, nothing to do");
            return TaskOutcome::NoMessages;
        }

        conversation.reply(&format!("Generating creative work for [{}] team...", self.team));
        let text = match self.generator.generate(&mut messages).await {
            ContentResult::Content(text) => text,
            ContentResult::Skip => {
                conversation
                    .system_log("Generation skipped: conversation did not request storage.");
                return self.finish(conversation, GENERATION_FALLBACK_REPLY, TaskOutcome::Skipped);
            }
            ContentResult::Exhausted => {
                conversation.system_log(&format!(
                    "Failed to generate content after {} attempts.",
                    self.generator.max_retries() + 1
                ));
                return self.finish(conversation, GENERATION_FALLBACK_REPLY, TaskOutcome::Exhausted);
            }
        };

        conversation.reply("Encrypting content...");
        let record = ContentRecord::new(self.team.as_str(), text);

        conversation.reply(&format!(
            "Uploading content for schema [{}]...",
            self.coordinator.schema_id()
        ));
        let (committed, stored): (Vec<usize>, bool) =
            match self.coordinator.upload_detailed(&record).await {
                Ok(report) => (report.outcomes.iter().map(|o| o.node_index).collect(), true),
                Err(UploadError::NodeRejected { committed, .. }) => (committed, false),
                Err(UploadError::Split(_)) => (Vec::new(), false),
            };
        for node_index in committed {
            conversation.reply(&format!("- uploaded to host {node_index}"));
        }

        if stored {
            self.finish(conversation, STORED_REPLY, TaskOutcome::Stored)
        } else {
            self.finish(conversation, STORE_FAILED_REPLY, TaskOutcome::StoreFailed)
        }
    }

    fn finish<C: Conversation + ?Sized>(
        &self,
        conversation: &mut C,
        reply: &str,
        outcome: TaskOutcome,
    ) -> TaskOutcome {
        conversation.reply(reply);
        conversation.mark_done();
        info!(outcome = %outcome, "task finished");
        outcome
    }
}
