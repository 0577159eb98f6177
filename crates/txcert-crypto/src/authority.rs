use rand::RngCore;
use txcert_core::{
    CertSerial, Certificate, CertificateBody, CertificateKind, SealedIndex, Timestamp,
};

use crate::error::{CryptoError, CryptoResult};
use crate::signer::{verify_signature, KeySigner};

/// What an authority needs to mint a certificate.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub kind: CertificateKind,
    pub subject: Option<String>,
    pub public_key: [u8; 32],
    pub attributes: Vec<String>,
    pub sealed_index: Option<SealedIndex>,
}

/// Certificate authority signing certificate bodies with an Ed25519 root key.
///
/// The same type plays the enrollment CA and the transaction CA; only the
/// issued kind and the validity period differ.
pub struct CertificateAuthority {
    name: String,
    signer: KeySigner,
    validity_secs: u64,
}

impl CertificateAuthority {
    pub fn new(name: impl Into<String>, signer: KeySigner, validity_secs: u64) -> Self {
        Self {
            name: name.into(),
            signer,
            validity_secs,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signer.public_key()
    }

    pub fn issue(&self, request: IssueRequest) -> CryptoResult<Certificate> {
        let mut serial = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut serial);
        let now = Timestamp::now();

        let body = CertificateBody {
            kind: request.kind,
            serial: CertSerial::new(hex::encode(serial)),
            issuer: self.name.clone(),
            subject: request.subject,
            public_key: request.public_key,
            not_before: Timestamp::from_seconds(now.seconds_since_epoch),
            not_after: now.plus_seconds(self.validity_secs),
            attributes: request.attributes,
            sealed_index: request.sealed_index,
        };
        let message = body
            .canonical_bytes()
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let issuer_signature = self.signer.sign(&message);

        Ok(Certificate {
            body,
            issuer_signature,
        })
    }
}

/// Chain-of-trust check for a certificate against its issuing root.
///
/// Checks the expected kind, the issuer signature over the canonical body and
/// the validity window at `at`.
pub fn verify_certificate(
    cert: &Certificate,
    root_public_key: &[u8; 32],
    expected_kind: CertificateKind,
    at: Timestamp,
) -> CryptoResult<()> {
    if cert.kind() != expected_kind {
        return Err(CryptoError::Certificate(format!(
            "expected {} but got {}",
            expected_kind,
            cert.kind()
        )));
    }
    let message = cert
        .body
        .canonical_bytes()
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    verify_signature(root_public_key, &message, &cert.issuer_signature).map_err(|_| {
        CryptoError::Certificate(format!(
            "issuer signature invalid for serial {}",
            cert.serial()
        ))
    })?;
    if !cert.is_valid_at(at) {
        return Err(CryptoError::Certificate(format!(
            "certificate {} outside validity window",
            cert.serial()
        )));
    }
    Ok(())
}
