use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use txcert_core::{KeyStore, TxCertError, TxCertResult};

/// Keystore that keeps nothing on disk. Initializes once; later calls report
/// `KeyStoreAlreadyInitialized`.
#[derive(Default)]
pub struct MemoryKeyStore {
    initialized: AtomicBool,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl KeyStore for MemoryKeyStore {
    fn init_key_store(&self) -> TxCertResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(TxCertError::KeyStoreAlreadyInitialized);
        }
        debug!("keystore initialized");
        Ok(())
    }
}
