//! Secret-Allot: Secret Sharing for Multi-Node Record Storage
//!
//! This crate provides the cryptographic layer for nilstash. A record's
//! sensitive field is encrypted under a cluster-sized [`SecretKey`] and the
//! record is then allotted into one document per storage node, so that no
//! single node ever holds the plaintext.
//!
//! ## Layer 0 - Primitives
//!
//! - [`SecretKey::generate`]: key sized to the node count
//! - [`encrypt`] / [`decrypt`]: XOR secret sharing for two or more nodes,
//!   ChaCha20-Poly1305 sealing for a single node
//! - [`allot`] / [`unify`]: split a `$allot`-marked document into per-node
//!   `$share` documents and back

pub mod allot;
pub mod cipher;
pub mod error;
pub mod key;

pub use allot::{allot, unify, ALLOT_KEY, SHARE_KEY};
pub use cipher::{decrypt, encrypt, Ciphertext};
pub use error::AllotError;
pub use key::SecretKey;

/// Result type for secret-allot operations
pub type Result<T> = std::result::Result<T, AllotError>;
