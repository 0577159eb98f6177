use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use txcert_core::types::{hex_bytes, hex_vec};
use zeroize::Zeroizing;

// AES-256-GCM with a random per-message nonce stored next to the ciphertext.
// Callers bind context through the associated data.

pub const NONCE_SIZE: usize = 12;

/// Encrypted envelope: nonce + ciphertext (includes GCM tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(with = "hex_bytes")]
    pub nonce: [u8; NONCE_SIZE],
    #[serde(with = "hex_vec")]
    pub ciphertext: Vec<u8>,
}

pub fn encrypt(key: &Zeroizing<[u8; 32]>, plaintext: &[u8]) -> CryptoResult<EncryptedEnvelope> {
    encrypt_with_aad(key, plaintext, b"")
}

pub fn decrypt(key: &Zeroizing<[u8; 32]>, envelope: &EncryptedEnvelope) -> CryptoResult<Vec<u8>> {
    decrypt_with_aad(key, envelope, b"")
}

pub fn encrypt_with_aad(
    key: &Zeroizing<[u8; 32]>,
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<EncryptedEnvelope> {
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            AesNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(format!("encryption failed: {}", e)))?;

    Ok(EncryptedEnvelope {
        nonce: nonce_bytes,
        ciphertext,
    })
}

pub fn decrypt_with_aad(
    key: &Zeroizing<[u8; 32]>,
    envelope: &EncryptedEnvelope,
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| CryptoError::Decryption(format!("cipher init failed: {}", e)))?;

    cipher
        .decrypt(
            AesNonce::from_slice(&envelope.nonce),
            Payload {
                msg: envelope.ciphertext.as_ref(),
                aad,
            },
        )
        .map_err(|e| CryptoError::Decryption(format!("decryption failed: {}", e)))
}
