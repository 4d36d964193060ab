//! The logical record stored across the cluster.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One piece of generated content, labelled with its team.
///
/// `text` is the only sensitive field; `id` and `team` are stored in clear
/// on every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub team: String,
    pub text: String,
}

impl ContentRecord {
    /// Build a record with a fresh random id. Ids are never reused.
    pub fn new(team: impl Into<String>, text: impl Into<String>) -> Self {
        ContentRecord {
            id: Uuid::new_v4(),
            team: team.into(),
            text: text.into(),
        }
    }
}
