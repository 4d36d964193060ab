//! Encryption of a single sensitive value under a [`SecretKey`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AllotError;
use crate::key::{KeyMaterial, SecretKey};
use crate::Result;

const NONCE_LEN: usize = 12;

/// Encrypted form of one value.
///
/// Serializes as a bare base64 string (sealed) or as an array of base64
/// strings (one per node), which is exactly what goes under `$allot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ciphertext {
    /// `nonce || ciphertext`, base64 encoded
    Sealed(String),
    /// XOR shares, base64 encoded, in node order
    Shares(Vec<String>),
}

impl Ciphertext {
    /// Number of per-node pieces in this ciphertext.
    pub fn share_count(&self) -> usize {
        match self {
            Ciphertext::Sealed(_) => 1,
            Ciphertext::Shares(shares) => shares.len(),
        }
    }
}

/// Encrypt `plaintext` for the cluster described by `key`.
pub fn encrypt(key: &SecretKey, plaintext: &str) -> Result<Ciphertext> {
    match &key.material {
        KeyMaterial::Sealed(secret) => {
            let cipher = ChaCha20Poly1305::new(secret);
            let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
            let sealed = cipher
                .encrypt(&nonce, plaintext.as_bytes())
                .map_err(|e| AllotError::Encryption(e.to_string()))?;

            let mut blob = nonce.to_vec();
            blob.extend_from_slice(&sealed);
            Ok(Ciphertext::Sealed(STANDARD.encode(blob)))
        }
        KeyMaterial::XorShares => Ok(Ciphertext::Shares(xor_split(
            plaintext.as_bytes(),
            key.node_count(),
        ))),
    }
}

/// Recover the plaintext from a ciphertext produced by [`encrypt`].
pub fn decrypt(key: &SecretKey, ciphertext: &Ciphertext) -> Result<String> {
    match (&key.material, ciphertext) {
        (KeyMaterial::Sealed(secret), Ciphertext::Sealed(blob)) => {
            let blob = STANDARD.decode(blob)?;
            if blob.len() < NONCE_LEN {
                return Err(AllotError::Decryption("ciphertext too short".to_string()));
            }
            let (nonce, sealed) = blob.split_at(NONCE_LEN);
            let cipher = ChaCha20Poly1305::new(secret);
            let plain = cipher
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|e| AllotError::Decryption(e.to_string()))?;
            Ok(String::from_utf8(plain)?)
        }
        (KeyMaterial::XorShares, Ciphertext::Shares(shares)) => {
            if shares.len() != key.node_count() {
                return Err(AllotError::ShareCountMismatch {
                    expected: key.node_count(),
                    actual: shares.len(),
                });
            }
            let decoded = shares
                .iter()
                .map(|s| STANDARD.decode(s))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(String::from_utf8(xor_join(&decoded)?)?)
        }
        (_, other) => Err(AllotError::ShareCountMismatch {
            expected: key.node_count(),
            actual: other.share_count(),
        }),
    }
}

/// Split `secret` into `count` random-looking shares whose XOR is `secret`.
fn xor_split(secret: &[u8], count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut last = secret.to_vec();
    let mut shares = Vec::with_capacity(count);

    for _ in 1..count {
        let mut mask = vec![0u8; secret.len()];
        rng.fill_bytes(&mut mask);
        for (byte, m) in last.iter_mut().zip(&mask) {
            *byte ^= m;
        }
        shares.push(STANDARD.encode(&mask));
    }
    shares.push(STANDARD.encode(&last));
    shares
}

fn xor_join(shares: &[Vec<u8>]) -> Result<Vec<u8>> {
    let len = shares.first().map(Vec::len).unwrap_or(0);
    if shares.iter().any(|s| s.len() != len) {
        return Err(AllotError::InconsistentShareLength);
    }
    let mut out = vec![0u8; len];
    for share in shares {
        for (byte, s) in out.iter_mut().zip(share) {
            *byte ^= s;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_reconstruct_plaintext() {
        let key = SecretKey::generate(3).unwrap();
        let ct = encrypt(&key, "Call me Ishmael").unwrap();

        assert_eq!(ct.share_count(), 3);
        assert_eq!(decrypt(&key, &ct).unwrap(), "Call me Ishmael");
    }

    #[test]
    fn test_no_single_share_is_plaintext() {
        let key = SecretKey::generate(2).unwrap();
        let plaintext = "a reasonably long secret sentence for masking";
        let Ciphertext::Shares(shares) = encrypt(&key, plaintext).unwrap() else {
            panic!("expected xor shares");
        };

        for share in &shares {
            let bytes = STANDARD.decode(share).unwrap();
            assert_ne!(bytes, plaintext.as_bytes());
        }
    }

    #[test]
    fn test_sealed_round_trip_single_node() {
        let key = SecretKey::generate(1).unwrap();
        let ct = encrypt(&key, "solo").unwrap();

        assert!(matches!(ct, Ciphertext::Sealed(_)));
        assert_eq!(decrypt(&key, &ct).unwrap(), "solo");
    }

    #[test]
    fn test_sealed_rejects_foreign_key() {
        let key = SecretKey::generate(1).unwrap();
        let other = SecretKey::generate(1).unwrap();
        let ct = encrypt(&key, "solo").unwrap();

        assert!(matches!(
            decrypt(&other, &ct),
            Err(AllotError::Decryption(_))
        ));
    }

    #[test]
    fn test_missing_share_is_rejected() {
        let key = SecretKey::generate(3).unwrap();
        let Ciphertext::Shares(mut shares) = encrypt(&key, "abc").unwrap() else {
            panic!("expected xor shares");
        };
        shares.pop();

        let err = decrypt(&key, &Ciphertext::Shares(shares)).unwrap_err();
        assert!(matches!(
            err,
            AllotError::ShareCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_ciphertext_serializes_as_allot_payload() {
        let ct = Ciphertext::Shares(vec!["AA==".to_string(), "AQ==".to_string()]);
        assert_eq!(
            serde_json::to_value(&ct).unwrap(),
            serde_json::json!(["AA==", "AQ=="])
        );
    }
}
