//! nilstash Core Library
//!
//! Turns free-form conversation into a validated content record and stores
//! it across a fixed cluster of nodes using secret sharing, so that no
//! single node ever holds the plaintext.
//!
//! ## Components
//!
//! - [`ContentGenerator`]: bounded-retry loop forcing a completion call into
//!   the `{"content": ...}` / `SKIP` contract
//! - [`ShareSplitter`]: injected capability producing one share per node
//! - [`HttpNodeClient`]: one authenticated create request per share
//! - [`UploadCoordinator`]: sequential, all-or-nothing delivery without
//!   rollback
//! - [`StorageTask`]: sequencing over a [`Conversation`]

pub mod completion;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod message;
pub mod node_client;
pub mod obs;
pub mod orchestrator;
pub mod record;
pub mod splitter;
pub mod telemetry;

pub use completion::{CompletionConfig, HttpCompletionClient, TextCompletion};
pub use config::{ClusterConfig, NodeClientConfig, NodeDescriptor, TaskIdentity};
pub use content::{is_storable, parse_response, GenerationParseError, ParsedResponse, SKIP_TOKEN};
pub use coordinator::{UploadCoordinator, UploadOutcome, UploadReport};
pub use error::{CompletionError, ConfigError, SplitError, UploadError, UploadResult};
pub use generator::{
    ContentGenerator, ContentResult, CORRECTIVE_INSTRUCTION, DEFAULT_MAX_RETRIES,
    SYSTEM_INSTRUCTION,
};
pub use message::{ChatMessage, Role};
pub use node_client::{endpoint_url, HttpNodeClient, NodeResponse, NodeTransport, HTTP_OK};
pub use orchestrator::{Conversation, StorageTask, TaskOutcome};
pub use record::ContentRecord;
pub use splitter::{AllotSplitter, Share, ShareSplitter};
pub use telemetry::{init_tracing, LogFormat};

/// nilstash version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
