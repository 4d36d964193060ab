//! Structured observability hooks for the generation and upload lifecycle.
//!
//! This module provides:
//! - A record-scoped tracing span via [`upload_span`], attached to the upload
//!   future with `Instrument` so it is only entered while the future is polled
//! - Emission functions for generation attempts, per-node sends and upload results
//!
//! Share payloads and bearer tokens are never logged; shares are identified
//! by [`share_fingerprint`].

use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Span tagged with the record id, for one upload.
pub fn upload_span(record_id: &str) -> tracing::Span {
    tracing::info_span!("nilstash.upload", record_id = %record_id)
}

/// Short SHA-256 fingerprint of a share, safe to log.
pub fn share_fingerprint(share: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(share.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

pub fn emit_generation_attempt(attempt: u32, retries_remaining: u32) {
    info!(
        event = "generation.attempt",
        attempt = attempt,
        retries_remaining = retries_remaining,
    );
}

pub fn emit_generation_rejected(attempt: u32, reason: &dyn std::fmt::Display) {
    warn!(event = "generation.rejected", attempt = attempt, reason = %reason);
}

/// `outcome` is one of `content`, `skip`, `exhausted`.
pub fn emit_generation_resolved(outcome: &str, attempts: u32) {
    info!(event = "generation.resolved", outcome = %outcome, attempts = attempts);
}

pub fn emit_share_sent(node_index: usize, fingerprint: &str, status: Option<u16>, accepted: bool) {
    info!(
        event = "upload.share_sent",
        node_index = node_index,
        share = %fingerprint,
        status = ?status,
        accepted = accepted,
    );
}

pub fn emit_upload_finished(record_id: &str, nodes: usize) {
    info!(event = "upload.finished", record_id = %record_id, nodes = nodes);
}

/// Upload stopped early. Nodes before the failure keep their shares.
pub fn emit_upload_aborted(record_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "upload.aborted", record_id = %record_id, error = %error);
}
