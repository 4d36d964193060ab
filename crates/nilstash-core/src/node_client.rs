//! Per-node ingestion client.
//!
//! One call sends one share to one node:
//!
//! ```text
//! POST https://{url}/api/v1/data/create
//! Authorization: Bearer {bearer}
//! {"schema": "<schema id>", "data": [<share>]}
//! ```
//!
//! Failures are returned as values, never raised; the coordinator decides
//! what they mean.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{NodeClientConfig, NodeDescriptor};
use crate::error::ConfigError;
use crate::splitter::Share;

/// Ingestion path on every node.
pub const CREATE_DATA_PATH: &str = "/api/v1/data/create";

/// The only status a node may answer with for a share to count as stored.
pub const HTTP_OK: u16 = 200;

const MAX_BODY_DETAIL: usize = 512;

/// Request body for the create endpoint.
#[derive(Debug, Serialize)]
pub struct CreateDataRequest<'a> {
    pub schema: &'a str,
    pub data: [&'a Share; 1],
}

/// What one node said about one share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResponse {
    /// HTTP status, `None` on a transport fault.
    pub status: Option<u16>,
    /// Entries of the response's `errors` array, or the transport fault.
    pub errors: Vec<String>,
    /// Truncated raw body, kept for diagnostics.
    pub body: Option<String>,
}

impl NodeResponse {
    pub fn transport_fault(detail: impl Into<String>) -> Self {
        NodeResponse {
            status: None,
            errors: vec![detail.into()],
            body: None,
        }
    }

    /// Status 200 and no reported errors.
    pub fn is_accepted(&self) -> bool {
        self.status == Some(HTTP_OK) && self.errors.is_empty()
    }
}

/// Sends a share to a node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn send(&self, node: &NodeDescriptor, schema_id: &str, share: &Share) -> NodeResponse;
}

/// Full create URL for a node address.
///
/// Bare hosts get `https://`; addresses that already carry a scheme are used
/// as given.
pub fn endpoint_url(address: &str) -> String {
    let base = address.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{CREATE_DATA_PATH}")
    } else {
        format!("https://{base}{CREATE_DATA_PATH}")
    }
}

/// Extract the `errors` list from a response body.
///
/// An empty body, or a JSON object without `errors`, reports no errors. A
/// body that is not a JSON object is itself an error.
pub fn parse_errors(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(parsed @ Value::Object(_)) => parsed,
        Ok(_) => return vec!["response body is not a JSON object".to_string()],
        Err(e) => return vec![format!("response body is not JSON: {e}")],
    };
    match parsed.get("errors") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(other) => vec![other.to_string()],
    }
}

fn truncate_detail(body: &str) -> String {
    if body.len() <= MAX_BODY_DETAIL {
        return body.to_string();
    }
    let mut end = MAX_BODY_DETAIL;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// reqwest-backed [`NodeTransport`].
pub struct HttpNodeClient {
    http_client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(config: &NodeClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(HttpNodeClient {
            http_client: builder.build()?,
        })
    }
}

#[async_trait]
impl NodeTransport for HttpNodeClient {
    async fn send(&self, node: &NodeDescriptor, schema_id: &str, share: &Share) -> NodeResponse {
        let url = endpoint_url(&node.address);
        let body = CreateDataRequest {
            schema: schema_id,
            data: [share],
        };

        let response = match self
            .http_client
            .post(&url)
            .bearer_auth(&node.auth_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return NodeResponse::transport_fault(e.to_string()),
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return NodeResponse {
                    status: Some(status),
                    errors: vec![format!("failed to read response body: {e}")],
                    body: None,
                }
            }
        };
        debug!(%url, status, bytes = text.len(), "node responded");

        NodeResponse {
            status: Some(status),
            errors: parse_errors(&text),
            body: (!text.is_empty()).then(|| truncate_detail(&text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_defaults_to_https() {
        assert_eq!(
            endpoint_url("nildb-a.example.com"),
            "https://nildb-a.example.com/api/v1/data/create"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_explicit_scheme() {
        assert_eq!(
            endpoint_url("http://127.0.0.1:8080/"),
            "http://127.0.0.1:8080/api/v1/data/create"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let share = serde_json::json!({"_id": "a", "text": {"$share": "x"}});
        let body = CreateDataRequest {
            schema: "schema-1",
            data: [&share],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"schema": "schema-1", "data": [share]})
        );
    }

    #[test]
    fn test_parse_errors_variants() {
        assert!(parse_errors("").is_empty());
        assert!(parse_errors("{}").is_empty());
        assert!(parse_errors(r#"{"data":{"created":["a"]},"errors":[]}"#).is_empty());
        assert_eq!(
            parse_errors(r#"{"errors":["duplicate key", {"code": 7}]}"#),
            vec!["duplicate key".to_string(), r#"{"code":7}"#.to_string()]
        );
        assert_eq!(parse_errors(r#"{"errors":"nope"}"#), vec!["nope".to_string()]);
    }

    #[test]
    fn test_non_json_body_is_an_error() {
        let errors = parse_errors("<html>proxy login</html>");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("response body is not JSON"));

        assert_eq!(
            parse_errors(r#"["created"]"#),
            vec!["response body is not a JSON object".to_string()]
        );
    }

    #[test]
    fn test_acceptance_requires_exact_ok_and_no_errors() {
        let ok = NodeResponse {
            status: Some(200),
            errors: vec![],
            body: None,
        };
        assert!(ok.is_accepted());

        let created = NodeResponse {
            status: Some(201),
            ..ok.clone()
        };
        assert!(!created.is_accepted());

        let with_errors = NodeResponse {
            errors: vec!["schema mismatch".to_string()],
            ..ok
        };
        assert!(!with_errors.is_accepted());

        assert!(!NodeResponse::transport_fault("timeout").is_accepted());
    }

    #[test]
    fn test_truncate_detail_respects_char_boundaries() {
        let long = "é".repeat(MAX_BODY_DETAIL);
        let out = truncate_detail(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= MAX_BODY_DETAIL + 3);
    }
}
