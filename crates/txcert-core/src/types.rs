use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{TxCertError, TxCertResult};

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp() as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn plus_seconds(&self, seconds: u64) -> Self {
        Self {
            seconds_since_epoch: self.seconds_since_epoch.saturating_add(seconds),
            nanoseconds: self.nanoseconds,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }

    pub fn is_expired(&self) -> bool {
        *self < Self::now()
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    TxUuid,
    "Caller-chosen unique identifier bound into a transaction."
);
define_id!(CertSerial, "Serial number of an issued certificate.");
define_id!(
    CertFingerprint,
    "Base58 fingerprint of a certificate public key."
);

// ---------------------------------------------------------------------------
// NodeRole: which kind of node a session is registered as
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Client,
    Peer,
    Validator,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Client => write!(f, "client"),
            NodeRole::Peer => write!(f, "peer"),
            NodeRole::Validator => write!(f, "validator"),
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeSet: named claims a transaction certificate is scoped to
// ---------------------------------------------------------------------------

/// Sorted, de-duplicated attribute names. Empty means unscoped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeSet(Vec<String>);

impl AttributeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self(names)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// SHA-256 over the canonical (sorted, NUL-separated) names.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for name in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        hasher.finalize().into()
    }
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateKind {
    /// Long-lived certificate binding the participant's enrollment identity.
    Enrollment,
    /// Short-lived, unlinkable certificate for a single transaction.
    Transaction,
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateKind::Enrollment => write!(f, "ECert"),
            CertificateKind::Transaction => write!(f, "TCert"),
        }
    }
}

/// TCert index encrypted under a key only the certificate owner can derive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedIndex {
    #[serde(with = "hex_bytes")]
    pub nonce: [u8; 12],
    #[serde(with = "hex_vec")]
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBody {
    pub kind: CertificateKind,
    pub serial: CertSerial,
    pub issuer: String,
    /// Enrollment id for ECerts; TCerts carry no subject.
    pub subject: Option<String>,
    #[serde(with = "hex_bytes")]
    pub public_key: [u8; 32],
    pub not_before: Timestamp,
    pub not_after: Timestamp,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_index: Option<SealedIndex>,
}

/// A certificate body plus the issuer's Ed25519 signature over
/// [`CertificateBody::canonical_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub body: CertificateBody,
    #[serde(with = "hex_bytes")]
    pub issuer_signature: [u8; 64],
}

impl CertificateBody {
    pub fn canonical_bytes(&self) -> TxCertResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TxCertError::Serialization(e.to_string()))
    }
}

impl Certificate {
    pub fn kind(&self) -> CertificateKind {
        self.body.kind
    }

    pub fn serial(&self) -> &CertSerial {
        &self.body.serial
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.body.public_key
    }

    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.body.not_before <= at && at < self.body.not_after
    }

    pub fn encode(&self) -> TxCertResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TxCertError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> TxCertResult<Self> {
        if bytes.is_empty() {
            return Err(TxCertError::Certificate("empty certificate bytes".into()));
        }
        serde_json::from_slice(bytes)
            .map_err(|e| TxCertError::Certificate(format!("malformed certificate: {}", e)))
    }
}

/// A transaction certificate together with the signing key its owner derived
/// for it. Deliberately not `Clone`: a TCert backs exactly one operation.
pub struct TCert {
    pub certificate: Certificate,
    pub signing_key: Zeroizing<[u8; 32]>,
}

impl TCert {
    pub fn new(certificate: Certificate, signing_key: Zeroizing<[u8; 32]>) -> Self {
        Self {
            certificate,
            signing_key,
        }
    }

    pub fn serial(&self) -> &CertSerial {
        self.certificate.serial()
    }
}

impl fmt::Debug for TCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TCert")
            .field("serial", &self.certificate.body.serial)
            .field("attributes", &self.certificate.body.attributes)
            .finish_non_exhaustive()
    }
}

/// Unit of allocation handed out by a certificate pool.
#[derive(Debug)]
pub struct TCertBlock {
    pub tcert: TCert,
    pub attribute_digest: [u8; 32],
}

/// The client's long-lived identity: its ECert and the matching signing key.
#[derive(Clone)]
pub struct EnrollmentIdentity {
    pub enrollment_id: String,
    pub certificate: Certificate,
    pub signing_key: Zeroizing<[u8; 32]>,
}

impl fmt::Debug for EnrollmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentIdentity")
            .field("enrollment_id", &self.enrollment_id)
            .field("serial", &self.certificate.body.serial)
            .finish_non_exhaustive()
    }
}

/// X25519 public key of the chain, used to seal confidential payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainPublicKey(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl ChainPublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

pub mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

pub mod hex_vec {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
