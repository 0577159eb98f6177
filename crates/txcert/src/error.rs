use thiserror::Error;

/// Error type of the txcert binary, aggregating the errors of the crates it
/// drives.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("client error: {0}")]
    Client(#[from] txcert_client::ClientError),

    #[error("network error: {0}")]
    Network(#[from] txcert_core::TxCertError),

    #[error("crypto error: {0}")]
    Crypto(#[from] txcert_crypto::CryptoError),

    #[error("configuration error: {0}")]
    Config(String),

    /// `close` completed but some subsystem failed to release.
    #[error("teardown incomplete: {0}")]
    Teardown(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_error_display() {
        let err = RootError::Config("empty client id".into());
        assert_eq!(err.to_string(), "configuration error: empty client id");
    }

    #[test]
    fn test_root_error_from_client() {
        let err: RootError = txcert_client::ClientError::NotInitialized.into();
        assert_eq!(err.to_string(), "client error: client not initialized");
    }

    #[test]
    fn test_root_error_from_network() {
        let err: RootError = txcert_core::TxCertError::PoolStopped.into();
        assert!(matches!(err, RootError::Network(_)));
    }

    #[test]
    fn test_root_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: RootError = toml_err.into();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_root_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RootError = io_err.into();
        assert!(matches!(err, RootError::Io(_)));
    }
}
