//! Error taxonomy for nilstash.
//!
//! Generation parse failures live next to the parser in
//! [`crate::content::GenerationParseError`]; they never leave the generator.

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cluster config must list at least one host")]
    NoHosts,

    #[error("host {index} has an empty url")]
    EmptyUrl { index: usize },

    #[error("host {index} has an empty bearer token")]
    EmptyBearer { index: usize },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::HttpClient(err.to_string())
    }
}

/// Errors from the text-completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(String),

    #[error("completion endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response malformed: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Http(err.to_string())
    }
}

/// Fatal errors while turning one record into per-node shares.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("share splitting failed: {0}")]
    Allot(#[from] secret_allot::AllotError),

    #[error("no nodes to split across")]
    NoNodes,

    #[error("splitter produced {actual} shares for {expected} nodes")]
    ShareCountMismatch { expected: usize, actual: usize },

    #[error("share splitting failed: {0}")]
    Other(String),
}

/// Why an upload of one record did not complete.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Split(#[from] SplitError),

    /// Node `node_index` failed the success criterion. Nodes listed in
    /// `committed` already hold their shares; nothing is rolled back.
    #[error(
        "node {node_index} rejected share (status {status:?}): {errors:?}, body: {}",
        .detail.as_deref().unwrap_or("<empty>")
    )]
    NodeRejected {
        node_index: usize,
        status: Option<u16>,
        errors: Vec<String>,
        /// Truncated raw response body.
        detail: Option<String>,
        committed: Vec<usize>,
    },
}

/// Result type for upload operations.
pub type UploadResult<T> = std::result::Result<T, UploadError>;
