//! Secret-shared multi-node upload.
//!
//! Nodes are contacted strictly in configured order. The first node that
//! fails the success criterion ends the upload: later nodes are never
//! contacted and earlier nodes keep the shares they already stored. There is
//! no compensating delete, so a partial failure leaves the cluster holding an
//! incomplete record that cannot be reassembled.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ClusterConfig, NodeDescriptor};
use crate::error::{SplitError, UploadError, UploadResult};
use crate::node_client::{NodeResponse, NodeTransport};
use crate::obs::{
    emit_share_sent, emit_upload_aborted, emit_upload_finished, share_fingerprint, upload_span,
};
use crate::record::ContentRecord;
use crate::splitter::{Share, ShareSplitter};

/// Result of sending one share to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub node_index: usize,
    pub success: bool,
    pub http_status: Option<u16>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UploadOutcome {
    fn from_response(node_index: usize, response: NodeResponse) -> Self {
        UploadOutcome {
            node_index,
            success: response.is_accepted(),
            http_status: response.status,
            errors: response.errors,
            detail: response.body,
        }
    }
}

/// Per-node outcomes of a fully stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub record_id: Uuid,
    pub outcomes: Vec<UploadOutcome>,
}

/// Splits records and delivers one share to each configured node.
pub struct UploadCoordinator<S> {
    nodes: Vec<NodeDescriptor>,
    schema_id: String,
    splitter: S,
    transport: Arc<dyn NodeTransport>,
}

impl<S: ShareSplitter> UploadCoordinator<S> {
    pub fn new(
        cluster: ClusterConfig,
        schema_id: impl Into<String>,
        splitter: S,
        transport: Arc<dyn NodeTransport>,
    ) -> Self {
        UploadCoordinator {
            nodes: cluster.hosts,
            schema_id: schema_id.into(),
            splitter,
            transport,
        }
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    /// Produce exactly one share per node, or fail without side effects.
    pub fn split(&self, record: &ContentRecord) -> Result<Vec<Share>, SplitError> {
        if self.nodes.is_empty() {
            return Err(SplitError::NoNodes);
        }
        let key = self.splitter.derive_key(self.nodes.len())?;
        let shares = self.splitter.split_record(&key, record)?;
        if shares.len() != self.nodes.len() {
            return Err(SplitError::ShareCountMismatch {
                expected: self.nodes.len(),
                actual: shares.len(),
            });
        }
        Ok(shares)
    }

    /// Upload `record`, reporting every contacted node's outcome.
    pub async fn upload_detailed(&self, record: &ContentRecord) -> UploadResult<UploadReport> {
        let record_id = record.id.to_string();
        let span = upload_span(&record_id);

        async {
            let result = self.deliver(record).await;
            match &result {
                Ok(report) => emit_upload_finished(&record_id, report.outcomes.len()),
                Err(e) => emit_upload_aborted(&record_id, e),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Upload `record`; `true` only if every node accepted its share.
    pub async fn upload(&self, record: &ContentRecord) -> bool {
        self.upload_detailed(record).await.is_ok()
    }

    async fn deliver(&self, record: &ContentRecord) -> UploadResult<UploadReport> {
        let shares = self.split(record)?;
        let mut outcomes = Vec::with_capacity(self.nodes.len());

        for (node_index, (node, share)) in self.nodes.iter().zip(&shares).enumerate() {
            let response = self.transport.send(node, &self.schema_id, share).await;
            let outcome = UploadOutcome::from_response(node_index, response);
            emit_share_sent(
                node_index,
                &share_fingerprint(share),
                outcome.http_status,
                outcome.success,
            );

            if !outcome.success {
                return Err(UploadError::NodeRejected {
                    node_index,
                    status: outcome.http_status,
                    errors: outcome.errors,
                    detail: outcome.detail,
                    committed: (0..node_index).collect(),
                });
            }
            outcomes.push(outcome);
        }

        Ok(UploadReport {
            record_id: record.id,
            outcomes,
        })
    }
}
