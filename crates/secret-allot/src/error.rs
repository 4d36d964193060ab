//! Error types for secret-allot

use thiserror::Error;

/// Errors that can occur while encrypting or allotting a document
#[derive(Error, Debug)]
pub enum AllotError {
    /// A cluster needs at least one node
    #[error("cluster must contain at least one node")]
    EmptyCluster,

    /// Encryption failed inside the AEAD primitive
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered ciphertext)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Ciphertext shape does not match the key
    #[error("ciphertext does not match key: expected {expected} share(s), got {actual}")]
    ShareCountMismatch { expected: usize, actual: usize },

    /// Shares of one secret must all have the same length
    #[error("shares have inconsistent lengths")]
    InconsistentShareLength,

    /// `$allot` arrays in one document disagree on the number of shares
    #[error("document allots {found} shares at {path}, expected {expected}")]
    AllotLengthMismatch {
        path: String,
        expected: usize,
        found: usize,
    },

    /// A `$allot` or `$share` marker object carried extra keys
    #[error("marker object at {path} must contain exactly one key")]
    MalformedMarker { path: String },

    /// `unify` was called with no shares
    #[error("no shares to unify")]
    NoShares,

    /// Shares passed to `unify` do not have the same structure
    #[error("shares disagree at {path}")]
    StructureMismatch { path: String },

    /// Base64 decoding error
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decrypted bytes were not UTF-8
    #[error("plaintext is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
