use std::sync::Arc;
use tracing::{debug, info};
use txcert_core::{CryptoEngine, EngineMaterial, TxCertResult};
use zeroize::Zeroizing;

use crate::network::LocalNetwork;
use crate::pool::MemoryTCertPool;

/// Crypto engine for one enrolled owner of a [`LocalNetwork`].
///
/// Registration asks the TCA for the owner's KDF and query-state keys;
/// initialization hands them out together with a fresh pool.
pub struct LocalCryptoEngine {
    network: Arc<LocalNetwork>,
    enrollment_id: String,
    batch_size: usize,
}

impl LocalCryptoEngine {
    pub fn new(
        network: Arc<LocalNetwork>,
        enrollment_id: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            network,
            enrollment_id: enrollment_id.into(),
            batch_size,
        }
    }
}

impl CryptoEngine for LocalCryptoEngine {
    fn register_crypto_engine(&self) -> TxCertResult<()> {
        self.network.register_owner(&self.enrollment_id)?;
        debug!(enrollment_id = %self.enrollment_id, "crypto engine registered");
        Ok(())
    }

    fn init_crypto_engine(&self) -> TxCertResult<EngineMaterial> {
        let (kdf_key, query_state_key) = self.network.owner_keys(&self.enrollment_id)?;
        let pool = MemoryTCertPool::new(
            Arc::clone(&self.network),
            self.enrollment_id.clone(),
            kdf_key.clone(),
            self.batch_size,
        );
        info!(
            enrollment_id = %self.enrollment_id,
            batch_size = self.batch_size,
            "crypto engine initialized"
        );
        Ok(EngineMaterial {
            chain_public_key: self.network.chain_public_key(),
            query_state_key: Zeroizing::new(query_state_key.to_vec()),
            tcert_owner_kdf_key: kdf_key,
            tca_public_key: self.network.tca_public_key(),
            pool: Arc::new(pool),
        })
    }
}
