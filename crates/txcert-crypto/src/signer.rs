use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::RngCore;
use txcert_core::CertFingerprint;
use zeroize::Zeroizing;

/// Ed25519 signer over a 32-byte seed.
///
/// Used for enrollment keys, TCert keys and certificate authorities alike.
pub struct KeySigner {
    signing_key: Zeroizing<[u8; 32]>,
    verifying_key: [u8; 32],
}

impl KeySigner {
    pub fn from_seed(seed: Zeroizing<[u8; 32]>) -> Self {
        let verifying_key = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        Self {
            signing_key: seed,
            verifying_key,
        }
    }

    /// Create a signer from raw key bytes (for testing).
    pub fn from_bytes(key_bytes: [u8; 32]) -> Self {
        Self::from_seed(Zeroizing::new(key_bytes))
    }

    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *seed);
        Self::from_seed(seed)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key
    }

    pub fn fingerprint(&self) -> CertFingerprint {
        txcert_core::fingerprint_from_pubkey(&self.verifying_key)
    }

    /// Copy of the seed, for handing a freshly created key to its owner.
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        self.signing_key.clone()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        SigningKey::from_bytes(&self.signing_key)
            .sign(message)
            .to_bytes()
    }
}

impl Clone for KeySigner {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
            verifying_key: self.verifying_key,
        }
    }
}

/// Strict Ed25519 verification of `signature` over `message`.
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let vk = VerifyingKey::from_bytes(public_key)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    vk.verify_strict(message, &Signature::from_bytes(&bytes))
        .map_err(|_| CryptoError::InvalidSignature)
}
