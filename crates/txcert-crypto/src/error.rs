use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("certificate rejected: {0}")]
    Certificate(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CryptoError> for txcert_core::TxCertError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Certificate(msg) => txcert_core::TxCertError::Certificate(msg),
            other => txcert_core::TxCertError::Crypto(other.to_string()),
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
