use thiserror::Error;

/// Failures reported by the collaborators behind the transaction client:
/// the certificate pool, the node session, the keystore and the crypto engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxCertError {
    #[error("pool error: {0}")]
    Pool(String),

    #[error("pool stopped")]
    PoolStopped,

    #[error("node error: {0}")]
    Node(String),

    #[error("keystore error: {0}")]
    KeyStore(String),

    #[error("keystore already initialized")]
    KeyStoreAlreadyInitialized,

    #[error("crypto engine error: {0}")]
    CryptoEngine(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TxCertResult<T> = Result<T, TxCertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TxCertError::Pool("exhausted".into()).to_string(),
            "pool error: exhausted"
        );
        assert_eq!(
            TxCertError::KeyStoreAlreadyInitialized.to_string(),
            "keystore already initialized"
        );
    }

    #[test]
    fn test_keystore_already_initialized_is_distinct() {
        assert_ne!(
            TxCertError::KeyStoreAlreadyInitialized,
            TxCertError::KeyStore("keystore already initialized".into())
        );
    }
}
