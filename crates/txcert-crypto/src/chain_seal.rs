//! Confidentiality toward the chain: payloads sealed to the chain's X25519
//! public key so that only validators holding the chain secret can read them.
//!
//! Sealing: ephemeral X25519 → shared secret → HKDF-SHA256 (salt binds both
//! public keys) → AES-256-GCM with the ephemeral public key as AAD.

use crate::envelope::{self, EncryptedEnvelope};
use crate::error::{CryptoError, CryptoResult};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use txcert_core::types::hex_bytes;
use txcert_core::ChainPublicKey;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

const CHAIN_SEAL_INFO: &[u8] = b"txcert-chain-seal-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEnvelope {
    #[serde(with = "hex_bytes")]
    pub ephemeral_public: [u8; 32],
    pub sealed: EncryptedEnvelope,
}

/// The chain's long-lived key pair. Held by validators, never by clients.
pub struct ChainKeyPair {
    secret: StaticSecret,
    public: ChainPublicKey,
}

impl ChainKeyPair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(secret))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = ChainPublicKey(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public_key(&self) -> ChainPublicKey {
        self.public
    }

    pub fn open(&self, envelope: &ChainEnvelope) -> CryptoResult<Vec<u8>> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(envelope.ephemeral_public));
        let key = derive_seal_key(&shared, &envelope.ephemeral_public, self.public.as_bytes())
            .map_err(|_| CryptoError::Decryption("invalid ephemeral key".into()))?;
        envelope::decrypt_with_aad(&key, &envelope.sealed, &envelope.ephemeral_public)
    }
}

pub fn seal_for_chain(chain_key: &ChainPublicKey, plaintext: &[u8]) -> CryptoResult<ChainEnvelope> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*chain_key.as_bytes()));
    let key = derive_seal_key(&shared, &ephemeral_public, chain_key.as_bytes())
        .map_err(|_| CryptoError::Encryption("chain public key is degenerate".into()))?;
    let sealed = envelope::encrypt_with_aad(&key, plaintext, &ephemeral_public)?;
    Ok(ChainEnvelope {
        ephemeral_public,
        sealed,
    })
}

fn derive_seal_key(
    shared: &SharedSecret,
    ephemeral_public: &[u8; 32],
    chain_public: &[u8; 32],
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    if !shared.was_contributory() {
        return Err(CryptoError::KeyDerivation("non-contributory key exchange".into()));
    }
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_public);
    salt[32..].copy_from_slice(chain_public);
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(CHAIN_SEAL_INFO, &mut *okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}
