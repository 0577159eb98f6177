use std::fmt;
use thiserror::Error;
use txcert_core::TxCertError;
use txcert_crypto::CryptoError;

/// Named step of the register / init pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    NodeRegistration,
    CryptoEngineRegistration,
    NodeInit,
    KeyStoreInit,
    CryptoEngineInit,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStep::NodeRegistration => write!(f, "node registration"),
            LifecycleStep::CryptoEngineRegistration => write!(f, "crypto engine registration"),
            LifecycleStep::NodeInit => write!(f, "node init"),
            LifecycleStep::KeyStoreInit => write!(f, "keystore init"),
            LifecycleStep::CryptoEngineInit => write!(f, "crypto engine init"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client not initialized")]
    NotInitialized,

    #[error("client already initialized")]
    AlreadyInitialized,

    #[error("client closed")]
    Closed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pool handed back a different number of TCerts than requested.
    #[error("pool returned {returned} transaction certificates, expected {requested}")]
    PoolMismatch { requested: usize, returned: usize },

    #[error("certificate pool failure: {0}")]
    Pool(#[source] TxCertError),

    #[error("certificate validation failed: {0}")]
    CertificateValidation(String),

    #[error("{step} failed: {source}")]
    Lifecycle {
        step: LifecycleStep,
        source: TxCertError,
    },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the same request may succeed if simply issued again.
    ///
    /// Pool exhaustion and pool failures are transient; a rejected
    /// certificate or a lifecycle violation is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Pool(_) | ClientError::PoolMismatch { .. })
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
