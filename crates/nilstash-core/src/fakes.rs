//! In-memory fakes for the nilstash seams (testing only)
//!
//! Provides `ScriptedCompletion`, `RecordingTransport`, `FixedSplitter` and
//! `MemoryConversation`, none of which touch the network or real crypto.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::config::NodeDescriptor;
use crate::error::{CompletionError, SplitError};
use crate::message::ChatMessage;
use crate::node_client::{NodeResponse, NodeTransport, HTTP_OK};
use crate::orchestrator::Conversation;
use crate::record::ContentRecord;
use crate::splitter::{Share, ShareSplitter};

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Completion that replays scripted responses and records every request.
///
/// Once the script runs out, the last scripted response repeats.
#[derive(Debug)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletion {
    fn from_script(script: VecDeque<Result<String, String>>) -> Self {
        ScriptedCompletion {
            script: Mutex::new(script),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `response`.
    pub fn always(response: &str) -> Self {
        Self::from_script(VecDeque::from([Ok(response.to_string())]))
    }

    /// Answer calls with `responses` in order.
    pub fn sequence<I, R>(responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self::from_script(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Fail every call as if the endpoint were unreachable.
    pub fn failing(detail: &str) -> Self {
        Self::from_script(VecDeque::from([Err(detail.to_string())]))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every message list the generator sent, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl crate::completion::TextCompletion for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        match last.clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(detail)) => Err(CompletionError::Http(detail)),
            None => Err(CompletionError::MalformedResponse("empty script".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// A share as it reached a fake node.
#[derive(Debug, Clone, PartialEq)]
pub struct SentShare {
    pub address: String,
    pub auth_token: String,
    pub schema_id: String,
    pub share: Share,
}

/// Node transport that records deliveries and answers per node address.
///
/// Nodes without a scripted response accept with status 200.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: HashMap<String, NodeResponse>,
    sent: Mutex<Vec<SentShare>>,
}

impl RecordingTransport {
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Answer requests to `address` with `status` and `errors`.
    pub fn respond(mut self, address: &str, status: u16, errors: &[&str]) -> Self {
        self.responses.insert(
            address.to_string(),
            NodeResponse {
                status: Some(status),
                errors: errors.iter().map(|e| e.to_string()).collect(),
                body: None,
            },
        );
        self
    }

    /// Fail requests to `address` before any response arrives.
    pub fn fail_transport(mut self, address: &str, detail: &str) -> Self {
        self.responses
            .insert(address.to_string(), NodeResponse::transport_fault(detail));
        self
    }

    /// Every share handed to the transport, including rejected ones.
    pub fn sent(&self) -> Vec<SentShare> {
        self.sent.lock().unwrap().clone()
    }

    /// Addresses that were contacted, in order.
    pub fn contacted(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.address).collect()
    }
}

#[async_trait]
impl NodeTransport for RecordingTransport {
    async fn send(&self, node: &NodeDescriptor, schema_id: &str, share: &Share) -> NodeResponse {
        self.sent.lock().unwrap().push(SentShare {
            address: node.address.clone(),
            auth_token: node.auth_token.clone(),
            schema_id: schema_id.to_string(),
            share: share.clone(),
        });
        self.responses
            .get(&node.address)
            .cloned()
            .unwrap_or(NodeResponse {
                status: Some(HTTP_OK),
                errors: Vec::new(),
                body: None,
            })
    }
}

// ---------------------------------------------------------------------------
// FixedSplitter
// ---------------------------------------------------------------------------

/// Deterministic splitter producing `{"$share": "share-<i>"}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct FixedSplitter {
    share_count: Option<usize>,
    failure: Option<String>,
}

impl FixedSplitter {
    /// One share per node.
    pub fn matching() -> Self {
        Self::default()
    }

    /// Always produce `count` shares, whatever the node count.
    pub fn with_share_count(count: usize) -> Self {
        FixedSplitter {
            share_count: Some(count),
            failure: None,
        }
    }

    /// Fail every split.
    pub fn failing(detail: &str) -> Self {
        FixedSplitter {
            share_count: None,
            failure: Some(detail.to_string()),
        }
    }
}

impl ShareSplitter for FixedSplitter {
    type Key = usize;

    fn derive_key(&self, node_count: usize) -> Result<usize, SplitError> {
        match &self.failure {
            Some(detail) => Err(SplitError::Other(detail.clone())),
            None => Ok(self.share_count.unwrap_or(node_count)),
        }
    }

    fn split_record(&self, key: &usize, record: &ContentRecord) -> Result<Vec<Share>, SplitError> {
        Ok((0..*key)
            .map(|i| {
                json!({
                    "_id": record.id.to_string(),
                    "team": record.team,
                    "text": { "$share": format!("share-{i}") },
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryConversation
// ---------------------------------------------------------------------------

/// Conversation environment that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryConversation {
    pub history: Vec<ChatMessage>,
    pub replies: Vec<String>,
    pub system_logs: Vec<String>,
    pub done: bool,
}

impl MemoryConversation {
    pub fn new(history: Vec<ChatMessage>) -> Self {
        MemoryConversation {
            history,
            ..Self::default()
        }
    }
}

impl Conversation for MemoryConversation {
    fn messages(&self) -> Vec<ChatMessage> {
        self.history.clone()
    }

    fn reply(&mut self, text: &str) {
        self.replies.push(text.to_string());
    }

    fn system_log(&mut self, text: &str) {
        self.system_logs.push(text.to_string());
    }

    fn mark_done(&mut self) {
        self.done = true;
    }
}
