//! Typed cluster configuration, validated once at startup.
//!
//! The on-disk shape is `{"hosts": [{"url": "...", "bearer": "..."}]}`.
//! Host order is significant: share *i* is always delivered to host *i*.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One storage node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Host (optionally with scheme) of the node's API.
    #[serde(rename = "url")]
    pub address: String,
    /// Bearer token presented on every request to this node.
    #[serde(rename = "bearer")]
    pub auth_token: String,
}

impl NodeDescriptor {
    pub fn new(address: impl Into<String>, auth_token: impl Into<String>) -> Self {
        NodeDescriptor {
            address: address.into(),
            auth_token: auth_token.into(),
        }
    }
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("address", &self.address)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// The ordered set of storage nodes a record is split across.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub hosts: Vec<NodeDescriptor>,
}

impl ClusterConfig {
    /// Parse and validate a cluster config from a JSON blob.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a cluster config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject configs that could never store a record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        for (index, host) in self.hosts.iter().enumerate() {
            if host.address.trim().is_empty() {
                return Err(ConfigError::EmptyUrl { index });
            }
            if host.auth_token.trim().is_empty() {
                return Err(ConfigError::EmptyBearer { index });
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.hosts
    }

    pub fn node_count(&self) -> usize {
        self.hosts.len()
    }
}

/// Identifiers supplied alongside the cluster config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    /// Schema (collection) the nodes store records under.
    pub schema_id: String,
    /// Team label written in clear into every record.
    pub team: String,
}

impl TaskIdentity {
    pub fn new(schema_id: impl Into<String>, team: impl Into<String>) -> Result<Self, ConfigError> {
        let identity = TaskIdentity {
            schema_id: schema_id.into(),
            team: team.into(),
        };
        if identity.schema_id.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "schema_id" });
        }
        if identity.team.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "team" });
        }
        Ok(identity)
    }
}

/// Timeouts for outbound node requests.
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    /// Whole-request timeout, including reading the response body.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        NodeClientConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("nilstash/{}", env!("CARGO_PKG_VERSION")),
            use_system_proxy: true,
        }
    }
}

impl NodeClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }
}
