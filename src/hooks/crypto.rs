//! Payload and header encryption for the ingestion path.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call; the nonce is
//! prepended to the ciphertext so the decrypt side needs only the key id.
//! Keys come from a [`KeyProvider`]: ephemeral keys are minted per request,
//! addressable keys are resolved by id so header and payload ciphertexts can
//! share one key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// AES-GCM nonce length in bytes (96-bit).
const NONCE_LEN: usize = 12;

/// Symmetric key length in bytes (AES-256).
const KEY_LEN: usize = 32;

/// Errors raised by the crypto service.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key registered under id '{0}'")]
    UnknownKey(String),

    #[error("random number generation failed: {0}")]
    RandomFailure(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("ciphertext shorter than nonce ({0} bytes)")]
    TruncatedCiphertext(usize),
}

/// A symmetric key addressable by an opaque id.
#[derive(Clone)]
pub struct EncryptionKey {
    pub id: String,
    pub material: [u8; KEY_LEN],
}

/// Source of encryption keys.
///
/// Durable key management is a collaborator concern; this trait is the seam.
pub trait KeyProvider: Send + Sync {
    /// Mint a fresh random key, registered so `by_id` can resolve it later.
    fn ephemeral(&self) -> Result<EncryptionKey, CryptoError>;

    /// Resolve a previously issued key.
    fn by_id(&self, id: &str) -> Option<EncryptionKey>;
}

/// In-memory key provider. Minted keys live for the process lifetime.
#[derive(Default)]
pub struct MemoryKeyProvider {
    keys: RwLock<HashMap<String, [u8; KEY_LEN]>>,
}

impl MemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyProvider for MemoryKeyProvider {
    fn ephemeral(&self) -> Result<EncryptionKey, CryptoError> {
        let mut material = [0u8; KEY_LEN];
        getrandom::fill(&mut material).map_err(|e| CryptoError::RandomFailure(e.to_string()))?;
        let id = Uuid::new_v4().to_string();
        self.keys.write().insert(id.clone(), material);
        Ok(EncryptionKey { id, material })
    }

    fn by_id(&self, id: &str) -> Option<EncryptionKey> {
        self.keys.read().get(id).map(|material| EncryptionKey {
            id: id.to_string(),
            material: *material,
        })
    }
}

/// Encrypts payload and header bytes before they leave the ingestion path.
#[derive(Clone)]
pub struct Encryptor {
    keys: Arc<dyn KeyProvider>,
}

impl Encryptor {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Encryptor { keys }
    }

    /// Encrypt under a fresh ephemeral key; returns the key id alongside the
    /// nonce-prefixed ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(String, Vec<u8>), CryptoError> {
        let key = self.keys.ephemeral()?;
        let ciphertext = seal(&key.material, plaintext)?;
        Ok((key.id, ciphertext))
    }

    /// Encrypt under the key behind `key_id`, binding this ciphertext to an
    /// earlier `encrypt` call.
    pub fn encrypt_with_key_id(
        &self,
        plaintext: &[u8],
        key_id: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        let key = self
            .keys
            .by_id(key_id)
            .ok_or_else(|| CryptoError::UnknownKey(key_id.to_string()))?;
        seal(&key.material, plaintext)
    }

    /// Inverse of `encrypt`/`encrypt_with_key_id`.
    pub fn decrypt(&self, data: &[u8], key_id: &str) -> Result<Vec<u8>, CryptoError> {
        let key = self
            .keys
            .by_id(key_id)
            .ok_or_else(|| CryptoError::UnknownKey(key_id.to_string()))?;
        if data.len() < NONCE_LEN {
            return Err(CryptoError::TruncatedCiphertext(data.len()));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(key.material.as_ref().into());
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

fn seal(material: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce_bytes).map_err(|e| CryptoError::RandomFailure(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(material.as_ref().into());
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> Encryptor {
        Encryptor::new(Arc::new(MemoryKeyProvider::new()))
    }

    #[test]
    fn round_trip_with_ephemeral_key() {
        let enc = encryptor();
        let (key_id, ciphertext) = enc.encrypt(b"payload bytes").expect("encrypt");
        assert_ne!(ciphertext, b"payload bytes");
        let plain = enc.decrypt(&ciphertext, &key_id).expect("decrypt");
        assert_eq!(plain, b"payload bytes");
    }

    #[test]
    fn header_ciphertext_shares_the_payload_key() {
        let enc = encryptor();
        let (key_id, _) = enc.encrypt(b"payload").expect("encrypt");
        let header_ct = enc
            .encrypt_with_key_id(b"{\"Content-Type\":[\"application/json\"]}", &key_id)
            .expect("encrypt headers");
        let plain = enc.decrypt(&header_ct, &key_id).expect("decrypt");
        assert!(plain.starts_with(b"{\"Content-Type\""));
    }

    #[test]
    fn nonces_never_repeat_across_calls() {
        let enc = encryptor();
        let (key_id, first) = enc.encrypt(b"same input").expect("encrypt");
        let second = enc
            .encrypt_with_key_id(b"same input", &key_id)
            .expect("encrypt");
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_key_is_a_typed_error() {
        let enc = encryptor();
        let err = enc.encrypt_with_key_id(b"x", "no-such-key").unwrap_err();
        assert!(matches!(err, CryptoError::UnknownKey(_)));
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let enc = encryptor();
        let (key_id, _) = enc.encrypt(b"x").expect("encrypt");
        let err = enc.decrypt(&[0u8; 4], &key_id).unwrap_err();
        assert!(matches!(err, CryptoError::TruncatedCiphertext(4)));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let enc = encryptor();
        let (key_id, mut ciphertext) = enc.encrypt(b"payload").expect("encrypt");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        assert!(matches!(
            enc.decrypt(&ciphertext, &key_id),
            Err(CryptoError::DecryptionFailed)
        ));
    }
}
