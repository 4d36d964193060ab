//! ShareSplitter seam.
//!
//! The coordinator treats splitting as a pure, injected capability so tests
//! can swap in [`crate::fakes::FixedSplitter`]. [`AllotSplitter`] is the
//! production implementation backed by `secret-allot`.

use serde_json::json;

use secret_allot::{allot, encrypt, SecretKey, ALLOT_KEY};

use crate::error::SplitError;
use crate::record::ContentRecord;

/// One node's JSON document.
pub type Share = serde_json::Value;

/// Turns one record into per-node shares.
pub trait ShareSplitter: Send + Sync {
    type Key: Send + Sync;

    /// Key material sized to `node_count`.
    fn derive_key(&self, node_count: usize) -> Result<Self::Key, SplitError>;

    /// Encrypt the sensitive field and split the record into shares.
    fn split_record(
        &self,
        key: &Self::Key,
        record: &ContentRecord,
    ) -> Result<Vec<Share>, SplitError>;
}

/// Encrypts `text` under a cluster key and allots the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllotSplitter;

impl AllotSplitter {
    /// The pre-split document: `text` replaced by its `$allot` ciphertext.
    pub fn allotted_document(
        key: &SecretKey,
        record: &ContentRecord,
    ) -> Result<serde_json::Value, SplitError> {
        let ciphertext = encrypt(key, &record.text)?;
        Ok(json!({
            "_id": record.id.to_string(),
            "team": record.team,
            "text": { ALLOT_KEY: ciphertext },
        }))
    }
}

impl ShareSplitter for AllotSplitter {
    type Key = SecretKey;

    fn derive_key(&self, node_count: usize) -> Result<SecretKey, SplitError> {
        Ok(SecretKey::generate(node_count)?)
    }

    fn split_record(
        &self,
        key: &SecretKey,
        record: &ContentRecord,
    ) -> Result<Vec<Share>, SplitError> {
        let document = Self::allotted_document(key, record)?;
        Ok(allot(&document)?)
    }
}
