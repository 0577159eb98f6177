use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::TxCertResult;
use crate::types::{AttributeSet, ChainPublicKey, EnrollmentIdentity, NodeRole, TCertBlock};

// ---------------------------------------------------------------------------
// CertificatePool: issuer/cache of not-yet-used transaction certificates
//
// Implementations must allocate atomically: a block handed out to one
// caller is never handed out again, even under concurrent requests.
// ---------------------------------------------------------------------------

pub trait CertificatePool: Send + Sync {
    fn get_next_tcerts(&self, count: usize, attributes: &AttributeSet)
        -> TxCertResult<Vec<TCertBlock>>;
    fn stop(&self) -> TxCertResult<()>;
}

// ---------------------------------------------------------------------------
// NodeSession: base lifecycle the transaction client extends
// ---------------------------------------------------------------------------

pub trait NodeSession: Send + Sync {
    fn register(
        &self,
        role: NodeRole,
        id: &str,
        secret: &[u8],
        enroll_id: &str,
        enroll_secret: &[u8],
    ) -> TxCertResult<()>;

    fn init(&self, role: NodeRole, id: &str, secret: &[u8]) -> TxCertResult<()>;

    fn close(&self) -> TxCertResult<()>;

    /// Enrollment identity loaded by a successful `init`.
    fn enrollment(&self) -> TxCertResult<EnrollmentIdentity>;
}

// ---------------------------------------------------------------------------
// KeyStore / CryptoEngine: opaque services initialized before use
// ---------------------------------------------------------------------------

pub trait KeyStore: Send + Sync {
    /// Returns `TxCertError::KeyStoreAlreadyInitialized` when called again.
    fn init_key_store(&self) -> TxCertResult<()>;
}

pub trait CryptoEngine: Send + Sync {
    fn register_crypto_engine(&self) -> TxCertResult<()>;
    fn init_crypto_engine(&self) -> TxCertResult<EngineMaterial>;
}

/// Key material and pool produced by crypto-engine initialization.
pub struct EngineMaterial {
    pub chain_public_key: ChainPublicKey,
    pub query_state_key: Zeroizing<Vec<u8>>,
    pub tcert_owner_kdf_key: Zeroizing<[u8; 32]>,
    /// Root the TCA signs transaction certificates with.
    pub tca_public_key: [u8; 32],
    pub pool: Arc<dyn CertificatePool>,
}

impl fmt::Debug for EngineMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineMaterial")
            .field("chain_public_key", &self.chain_public_key)
            .field("tca_public_key", &hex::encode(self.tca_public_key))
            .finish_non_exhaustive()
    }
}
