//! Cluster-sized secret keys.

use chacha20poly1305::aead::{KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key};

use crate::error::AllotError;
use crate::Result;

/// How a secret key protects the sensitive field.
#[derive(Clone)]
pub(crate) enum KeyMaterial {
    /// One node: the value is sealed with a local symmetric key that never
    /// leaves the process.
    Sealed(Key),
    /// Two or more nodes: the value is XOR secret-shared, one share per node.
    XorShares,
}

/// Secret key for one cluster of storage nodes.
///
/// The key is sized to the node count at generation time; every ciphertext
/// it produces carries exactly that many shares.
#[derive(Clone)]
pub struct SecretKey {
    node_count: usize,
    pub(crate) material: KeyMaterial,
}

impl SecretKey {
    /// Generate a fresh key for a cluster of `node_count` nodes.
    pub fn generate(node_count: usize) -> Result<Self> {
        let material = match node_count {
            0 => return Err(AllotError::EmptyCluster),
            1 => KeyMaterial::Sealed(ChaCha20Poly1305::generate_key(&mut OsRng)),
            _ => KeyMaterial::XorShares,
        };
        tracing::debug!(node_count, "generated cluster secret key");
        Ok(SecretKey {
            node_count,
            material,
        })
    }

    /// Number of nodes (and therefore shares) this key was generated for.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Whether this key splits values across nodes rather than sealing them.
    pub fn is_shared(&self) -> bool {
        matches!(self.material, KeyMaterial::XorShares)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.material {
            KeyMaterial::Sealed(_) => "sealed",
            KeyMaterial::XorShares => "xor-shares",
        };
        f.debug_struct("SecretKey")
            .field("node_count", &self.node_count)
            .field("kind", &kind)
            .finish()
    }
}
