//! TCert key derivation from the owner KDF key shared between a client and
//! the TCA:
//!
//! ```text
//! KDFKey
//!   → IndexSealingKey (HKDF + "tcert-index-seal")   encrypts TCertIndex into the cert
//!   → TCertSigningKey (HKDF, salt = TCertIndex)     one Ed25519 seed per TCert
//! QueryStateKey
//!   → QueryResultKey = HMAC(QSK, 0x06 || tx nonce)
//! ```
//!
//! Only the holder of the KDF key can open the sealed index, so only the
//! owner can derive a TCert's signing key. Two TCerts share no visible link.

use crate::envelope::{self, EncryptedEnvelope};
use crate::error::{CryptoError, CryptoResult};
use crate::signer::KeySigner;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use txcert_core::{Certificate, SealedIndex};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const INDEX_SEAL_INFO: &[u8] = b"txcert-tcert-index-seal";
const SIGNING_KEY_INFO: &[u8] = b"txcert-tcert-signing-key";
const INDEX_AAD: &[u8] = b"txcert-tcert-index";
const QUERY_RESULT_TAG: u8 = 0x06;

/// Position of a TCert inside an issued batch: batch timestamp, batch random
/// value and a counter restarting at 1 for every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TCertIndex {
    pub batch_time: u64,
    pub batch_rand: [u8; 16],
    pub counter: u64,
}

impl TCertIndex {
    pub const LEN: usize = 32;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..8].copy_from_slice(&self.batch_time.to_be_bytes());
        out[8..24].copy_from_slice(&self.batch_rand);
        out[24..].copy_from_slice(&self.counter.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != Self::LEN {
            return Err(CryptoError::KeyDerivation(format!(
                "tcert index must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut time = [0u8; 8];
        let mut rand = [0u8; 16];
        let mut counter = [0u8; 8];
        time.copy_from_slice(&bytes[..8]);
        rand.copy_from_slice(&bytes[8..24]);
        counter.copy_from_slice(&bytes[24..]);
        Ok(Self {
            batch_time: u64::from_be_bytes(time),
            batch_rand: rand,
            counter: u64::from_be_bytes(counter),
        })
    }
}

fn hkdf_derive(
    salt: Option<&[u8]>,
    ikm: &[u8],
    info: &[u8],
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(info, &mut *okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

pub fn index_sealing_key(kdf_key: &[u8; 32]) -> CryptoResult<Zeroizing<[u8; 32]>> {
    hkdf_derive(None, kdf_key, INDEX_SEAL_INFO)
}

/// Derive the Ed25519 seed for the TCert at `index`.
pub fn tcert_signing_key(
    kdf_key: &[u8; 32],
    index: &TCertIndex,
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    hkdf_derive(Some(&index.to_bytes()), kdf_key, SIGNING_KEY_INFO)
}

pub fn seal_index(kdf_key: &[u8; 32], index: &TCertIndex) -> CryptoResult<SealedIndex> {
    let key = index_sealing_key(kdf_key)?;
    let envelope = envelope::encrypt_with_aad(&key, &index.to_bytes(), INDEX_AAD)?;
    Ok(SealedIndex {
        nonce: envelope.nonce,
        ciphertext: envelope.ciphertext,
    })
}

pub fn open_index(kdf_key: &[u8; 32], sealed: &SealedIndex) -> CryptoResult<TCertIndex> {
    let key = index_sealing_key(kdf_key)?;
    let envelope = EncryptedEnvelope {
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext.clone(),
    };
    let plaintext = Zeroizing::new(envelope::decrypt_with_aad(&key, &envelope, INDEX_AAD)?);
    TCertIndex::from_bytes(&plaintext)
}

/// Recover the signing key of a TCert owned by the holder of `kdf_key`.
///
/// Fails if the certificate carries no sealed index, if the index does not
/// open under this KDF key, or if the derived key does not match the
/// certificate's public key.
pub fn recover_tcert_signing_key(
    kdf_key: &[u8; 32],
    cert: &Certificate,
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let sealed = cert
        .body
        .sealed_index
        .as_ref()
        .ok_or_else(|| CryptoError::Certificate("missing sealed tcert index".into()))?;
    let index = open_index(kdf_key, sealed)
        .map_err(|_| CryptoError::Certificate("tcert index does not open for this owner".into()))?;
    let seed = tcert_signing_key(kdf_key, &index)?;
    let derived = KeySigner::from_seed(seed.clone()).public_key();
    if !bool::from(derived.as_slice().ct_eq(cert.public_key().as_slice())) {
        return Err(CryptoError::Certificate(
            "derived signing key does not match certificate".into(),
        ));
    }
    Ok(seed)
}

/// Key validators use to encrypt the result of a query transaction.
pub fn query_result_key(query_state_key: &[u8], nonce: &[u8]) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let mut mac = HmacSha256::new_from_slice(query_state_key)
        .map_err(|e| CryptoError::KeyDerivation(format!("HMAC init failed: {}", e)))?;
    mac.update(&[QUERY_RESULT_TAG]);
    mac.update(nonce);
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}
