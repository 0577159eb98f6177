//! Hand-written collaborator doubles for the client's unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use txcert_core::{
    AttributeSet, Certificate, CertificateKind, CertificatePool, CryptoEngine, EngineMaterial,
    EnrollmentIdentity, KeyStore, NodeRole, NodeSession, TCert, TCertBlock, Timestamp,
    TxCertError, TxCertResult,
};
use txcert_crypto::authority::{CertificateAuthority, IssueRequest};
use txcert_crypto::chain_seal::ChainKeyPair;
use txcert_crypto::kdf::{self, TCertIndex};
use txcert_crypto::signer::KeySigner;
use zeroize::Zeroizing;

use crate::client::TransactionClient;

const KDF_KEY: [u8; 32] = [0x62; 32];

type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, call: &str) {
    log.lock().unwrap().push(call.to_string());
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PoolBehavior {
    Normal,
    /// Always answer with this many TCerts, whatever was asked.
    Fixed(usize),
    Fail,
    /// Scope blocks to an attribute set nobody asked for.
    WrongScope,
}

pub(crate) struct FakePool {
    tca: CertificateAuthority,
    counter: Mutex<u64>,
    behavior: Mutex<PoolBehavior>,
    pub requests: AtomicUsize,
    pub fail_stop: AtomicBool,
}

impl FakePool {
    fn new(tca: CertificateAuthority) -> Self {
        Self {
            tca,
            counter: Mutex::new(0),
            behavior: Mutex::new(PoolBehavior::Normal),
            requests: AtomicUsize::new(0),
            fail_stop: AtomicBool::new(false),
        }
    }

    pub fn set_behavior(&self, behavior: PoolBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    fn mint(&self, kdf_key: &[u8; 32], attributes: &AttributeSet) -> TCert {
        let counter = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            *counter
        };
        let index = TCertIndex {
            batch_time: Timestamp::now().seconds_since_epoch,
            batch_rand: [0x07; 16],
            counter,
        };
        let seed = kdf::tcert_signing_key(kdf_key, &index).unwrap();
        let public_key = KeySigner::from_seed(seed.clone()).public_key();
        let certificate = self
            .tca
            .issue(IssueRequest {
                kind: CertificateKind::Transaction,
                subject: None,
                public_key,
                attributes: attributes.names().to_vec(),
                sealed_index: Some(kdf::seal_index(kdf_key, &index).unwrap()),
            })
            .unwrap();
        TCert::new(certificate, seed)
    }
}

impl CertificatePool for FakePool {
    fn get_next_tcerts(
        &self,
        count: usize,
        attributes: &AttributeSet,
    ) -> TxCertResult<Vec<TCertBlock>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        let (count, digest) = match behavior {
            PoolBehavior::Normal => (count, attributes.digest()),
            PoolBehavior::Fixed(n) => (n, attributes.digest()),
            PoolBehavior::Fail => return Err(TxCertError::Pool("issuer unreachable".into())),
            PoolBehavior::WrongScope => (count, AttributeSet::new(["other"]).digest()),
        };
        Ok((0..count)
            .map(|_| TCertBlock {
                tcert: self.mint(&KDF_KEY, attributes),
                attribute_digest: digest,
            })
            .collect())
    }

    fn stop(&self) -> TxCertResult<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(TxCertError::Pool("stop timed out".into()));
        }
        Ok(())
    }
}

pub(crate) struct FakeNode {
    log: CallLog,
    identity: EnrollmentIdentity,
    pub fail_register: AtomicBool,
    pub fail_init: AtomicBool,
    pub fail_close: AtomicBool,
}

impl NodeSession for FakeNode {
    fn register(
        &self,
        role: NodeRole,
        _id: &str,
        _secret: &[u8],
        _enroll_id: &str,
        _enroll_secret: &[u8],
    ) -> TxCertResult<()> {
        record(&self.log, "node.register");
        assert_eq!(role, NodeRole::Client);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(TxCertError::Node("registrar rejected".into()));
        }
        Ok(())
    }

    fn init(&self, role: NodeRole, _id: &str, _secret: &[u8]) -> TxCertResult<()> {
        record(&self.log, "node.init");
        assert_eq!(role, NodeRole::Client);
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(TxCertError::Node("unknown user".into()));
        }
        Ok(())
    }

    fn close(&self) -> TxCertResult<()> {
        record(&self.log, "node.close");
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TxCertError::Node("connection reset".into()));
        }
        Ok(())
    }

    fn enrollment(&self) -> TxCertResult<EnrollmentIdentity> {
        record(&self.log, "node.enrollment");
        Ok(self.identity.clone())
    }
}

pub(crate) struct FakeKeyStore {
    log: CallLog,
    pub already_initialized: AtomicBool,
    pub fail: AtomicBool,
}

impl KeyStore for FakeKeyStore {
    fn init_key_store(&self) -> TxCertResult<()> {
        record(&self.log, "keystore.init");
        if self.fail.load(Ordering::SeqCst) {
            return Err(TxCertError::KeyStore("disk full".into()));
        }
        if self.already_initialized.load(Ordering::SeqCst) {
            return Err(TxCertError::KeyStoreAlreadyInitialized);
        }
        Ok(())
    }
}

pub(crate) struct FakeEngine {
    log: CallLog,
    pool: Arc<FakePool>,
    tca_public_key: [u8; 32],
    pub query_state_key: [u8; 32],
    pub fail_init: AtomicBool,
}

impl CryptoEngine for FakeEngine {
    fn register_crypto_engine(&self) -> TxCertResult<()> {
        record(&self.log, "engine.register");
        Ok(())
    }

    fn init_crypto_engine(&self) -> TxCertResult<EngineMaterial> {
        record(&self.log, "engine.init");
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(TxCertError::CryptoEngine("missing chain key".into()));
        }
        Ok(EngineMaterial {
            chain_public_key: ChainKeyPair::from_bytes([0x65; 32]).public_key(),
            query_state_key: Zeroizing::new(self.query_state_key.to_vec()),
            tcert_owner_kdf_key: Zeroizing::new(KDF_KEY),
            tca_public_key: self.tca_public_key,
            pool: self.pool.clone(),
        })
    }
}

/// Wires one set of doubles sharing a call log.
pub(crate) struct Harness {
    log: CallLog,
    pub node: Arc<FakeNode>,
    pub key_store: Arc<FakeKeyStore>,
    pub engine: Arc<FakeEngine>,
    pub pool: Arc<FakePool>,
}

impl Harness {
    pub fn new() -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));

        let tca = CertificateAuthority::new("tca", KeySigner::from_bytes([0x61; 32]), 600);
        let tca_public_key = tca.public_key();
        let pool = Arc::new(FakePool::new(tca));

        let eca = CertificateAuthority::new("eca", KeySigner::from_bytes([0x63; 32]), 3600);
        let owner = KeySigner::from_bytes([0x64; 32]);
        let certificate = eca
            .issue(IssueRequest {
                kind: CertificateKind::Enrollment,
                subject: Some("alice".into()),
                public_key: owner.public_key(),
                attributes: Vec::new(),
                sealed_index: None,
            })
            .unwrap();

        Self {
            node: Arc::new(FakeNode {
                log: log.clone(),
                identity: EnrollmentIdentity {
                    enrollment_id: "alice".into(),
                    certificate,
                    signing_key: owner.seed(),
                },
                fail_register: AtomicBool::new(false),
                fail_init: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
            }),
            key_store: Arc::new(FakeKeyStore {
                log: log.clone(),
                already_initialized: AtomicBool::new(false),
                fail: AtomicBool::new(false),
            }),
            engine: Arc::new(FakeEngine {
                log: log.clone(),
                pool: pool.clone(),
                tca_public_key,
                query_state_key: [0x66; 32],
                fail_init: AtomicBool::new(false),
            }),
            pool,
            log,
        }
    }

    pub fn client(&self) -> TransactionClient {
        TransactionClient::new(
            self.node.clone(),
            self.key_store.clone(),
            self.engine.clone(),
        )
    }

    /// Initialized client with the call log cleared.
    pub fn initialized_client(&self) -> TransactionClient {
        let client = self.client();
        client.init("alice", b"secret").unwrap();
        self.log.lock().unwrap().clear();
        client
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// A valid TCert from the same TCA, owned by somebody else.
    pub fn foreign_tcert(&self) -> Certificate {
        self.pool.mint(&[0x99; 32], &AttributeSet::empty()).certificate
    }
}
