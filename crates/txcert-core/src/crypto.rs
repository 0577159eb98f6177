use crate::types::{CertFingerprint, Certificate};
use sha2::{Digest, Sha256};

/// Fingerprint of a certificate public key.
///
/// Formula: Base58(SHA-256(Ed25519_pubkey)[0:20])
pub fn fingerprint_from_pubkey(pubkey: &[u8; 32]) -> CertFingerprint {
    let hash = Sha256::digest(pubkey);
    CertFingerprint(bs58::encode(&hash[..20]).into_string())
}

pub fn certificate_fingerprint(cert: &Certificate) -> CertFingerprint {
    fingerprint_from_pubkey(cert.public_key())
}
