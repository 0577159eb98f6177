use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use txcert_core::{AttributeSet, CertificatePool, TCert, TCertBlock, TxCertError, TxCertResult};
use txcert_crypto::kdf;
use zeroize::Zeroizing;

use crate::network::{LocalNetwork, MAX_TCERT_BATCH};

#[derive(Default)]
struct PoolState {
    /// Unused TCerts per attribute-set digest.
    cache: HashMap<[u8; 32], VecDeque<TCert>>,
    stopped: bool,
}

/// TCert pool refilled in batches from the TCA of a [`LocalNetwork`].
///
/// Allocation happens under one lock, so a TCert leaves the cache exactly
/// once even with concurrent callers.
pub struct MemoryTCertPool {
    network: Arc<LocalNetwork>,
    owner: String,
    tcert_owner_kdf_key: Zeroizing<[u8; 32]>,
    batch_size: usize,
    state: Mutex<PoolState>,
}

impl MemoryTCertPool {
    pub fn new(
        network: Arc<LocalNetwork>,
        owner: impl Into<String>,
        tcert_owner_kdf_key: Zeroizing<[u8; 32]>,
        batch_size: usize,
    ) -> Self {
        Self {
            network,
            owner: owner.into(),
            tcert_owner_kdf_key,
            batch_size: batch_size.clamp(1, MAX_TCERT_BATCH),
            state: Mutex::new(PoolState::default()),
        }
    }

    fn lock_state(&self) -> TxCertResult<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|e| TxCertError::Pool(format!("lock poisoned: {}", e)))
    }

    /// Unused TCerts currently cached for `attributes`.
    pub fn cached(&self, attributes: &AttributeSet) -> usize {
        self.lock_state()
            .map(|s| s.cache.get(&attributes.digest()).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    fn refill(
        &self,
        queue: &mut VecDeque<TCert>,
        attributes: &AttributeSet,
        missing: usize,
    ) -> TxCertResult<()> {
        let size = missing.max(self.batch_size).min(MAX_TCERT_BATCH);
        let certificates = self.network.issue_tcert_batch(&self.owner, attributes, size)?;
        for certificate in certificates {
            let signing_key =
                kdf::recover_tcert_signing_key(&self.tcert_owner_kdf_key, &certificate)
                    .map_err(|e| TxCertError::Pool(format!("unusable TCert from TCA: {}", e)))?;
            queue.push_back(TCert::new(certificate, signing_key));
        }
        debug!(owner = %self.owner, size, "pool refilled");
        Ok(())
    }
}

impl CertificatePool for MemoryTCertPool {
    fn get_next_tcerts(
        &self,
        count: usize,
        attributes: &AttributeSet,
    ) -> TxCertResult<Vec<TCertBlock>> {
        if count > MAX_TCERT_BATCH {
            return Err(TxCertError::Pool(format!(
                "request for {} TCerts exceeds the limit of {}",
                count, MAX_TCERT_BATCH
            )));
        }
        let mut state = self.lock_state()?;
        if state.stopped {
            return Err(TxCertError::PoolStopped);
        }

        let digest = attributes.digest();
        let queue = state.cache.entry(digest).or_default();
        if queue.len() < count {
            let missing = count - queue.len();
            self.refill(queue, attributes, missing)?;
        }
        if queue.len() < count {
            return Err(TxCertError::Pool(format!(
                "TCA issued too few TCerts: have {}, need {}",
                queue.len(),
                count
            )));
        }

        Ok(queue
            .drain(..count)
            .map(|tcert| TCertBlock {
                tcert,
                attribute_digest: digest,
            })
            .collect())
    }

    fn stop(&self) -> TxCertResult<()> {
        let mut state = self.lock_state()?;
        let discarded: usize = state.cache.values().map(VecDeque::len).sum();
        state.cache.clear();
        state.stopped = true;
        info!(owner = %self.owner, discarded, "pool stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkSettings;
    use std::collections::HashSet;

    fn pool(batch_size: usize) -> MemoryTCertPool {
        let network = Arc::new(LocalNetwork::new(NetworkSettings::default()));
        network.register_user("alice", b"pw").unwrap();
        network.enroll("alice", b"pw").unwrap();
        network.register_owner("alice").unwrap();
        let (kdf_key, _) = network.owner_keys("alice").unwrap();
        MemoryTCertPool::new(network, "alice", kdf_key, batch_size)
    }

    #[test]
    fn test_batched_refill_and_cache() {
        let pool = pool(4);
        let attrs = AttributeSet::empty();
        let blocks = pool.get_next_tcerts(1, &attrs).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].attribute_digest, attrs.digest());
        assert_eq!(pool.cached(&attrs), 3);

        let more = pool.get_next_tcerts(5, &attrs).unwrap();
        assert_eq!(more.len(), 5);
    }

    #[test]
    fn test_caches_are_per_attribute_set() {
        let pool = pool(2);
        let scoped = AttributeSet::new(["role"]);
        let block = pool.get_next_tcerts(1, &scoped).unwrap().pop().unwrap();
        assert_eq!(block.tcert.certificate.body.attributes, vec!["role".to_string()]);
        assert_eq!(pool.cached(&scoped), 1);
        assert_eq!(pool.cached(&AttributeSet::empty()), 0);
    }

    #[test]
    fn test_never_hands_out_a_tcert_twice() {
        let pool = Arc::new(pool(3));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    (0..5)
                        .map(|_| {
                            pool.get_next_tcerts(1, &AttributeSet::empty()).unwrap()[0]
                                .tcert
                                .serial()
                                .clone()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for serial in handle.join().unwrap() {
                assert!(seen.insert(serial));
            }
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn test_stopped_pool_refuses() {
        let pool = pool(2);
        pool.get_next_tcerts(1, &AttributeSet::empty()).unwrap();
        pool.stop().unwrap();
        assert_eq!(
            pool.get_next_tcerts(1, &AttributeSet::empty()).unwrap_err(),
            TxCertError::PoolStopped
        );
        assert_eq!(pool.cached(&AttributeSet::empty()), 0);
    }

    #[test]
    fn test_oversized_request_leaves_pool_usable() {
        let pool = Arc::new(pool(2));
        let attrs = AttributeSet::empty();

        let huge = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                pool.get_next_tcerts(usize::MAX, &AttributeSet::empty())
            })
            .join()
            .unwrap()
        };
        assert!(matches!(huge, Err(TxCertError::Pool(_))));
        assert!(matches!(
            pool.get_next_tcerts(MAX_TCERT_BATCH + 1, &attrs),
            Err(TxCertError::Pool(_))
        ));
        assert_eq!(pool.cached(&attrs), 0);

        assert_eq!(pool.get_next_tcerts(1, &attrs).unwrap().len(), 1);
        let full = pool.get_next_tcerts(MAX_TCERT_BATCH, &attrs).unwrap();
        assert_eq!(full.len(), MAX_TCERT_BATCH);
    }

    #[test]
    fn test_unregistered_owner_fails() {
        let network = Arc::new(LocalNetwork::new(NetworkSettings::default()));
        let pool = MemoryTCertPool::new(network, "nobody", Zeroizing::new([0u8; 32]), 2);
        assert!(pool.get_next_tcerts(1, &AttributeSet::empty()).is_err());
    }
}
