use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};
use txcert_core::{
    AttributeSet, Certificate, CertificateKind, CertificatePool, ChainPublicKey, CryptoEngine,
    EnrollmentIdentity, KeyStore, NodeRole, NodeSession, TCert, Timestamp, TxCertError, TxUuid,
};
use txcert_crypto::authority::verify_certificate;
use txcert_crypto::envelope::{self, EncryptedEnvelope};
use txcert_crypto::kdf;
use txcert_crypto::signer::KeySigner;
use zeroize::Zeroizing;

use crate::error::{ClientError, ClientResult, LifecycleStep};
use crate::handler::{CertCapability, EnrollmentCertHandler, TCertHandler};
use crate::lifecycle::{run_step, LifecycleState, TeardownReport, TeardownStep};
use crate::transaction::{
    self, build_transaction, ChaincodeDeploymentSpec, ChaincodeInvocationSpec, Transaction,
    TransactionDescriptor, TransactionKind,
};

/// Everything the client holds once `init` has completed.
struct ClientSession {
    id: String,
    enrollment: EnrollmentIdentity,
    chain_public_key: ChainPublicKey,
    query_state_key: Zeroizing<Vec<u8>>,
    tcert_owner_kdf_key: Zeroizing<[u8; 32]>,
    tca_public_key: [u8; 32],
    pool: Arc<dyn CertificatePool>,
}

enum ClientState {
    Uninitialized,
    Initialized(Arc<ClientSession>),
    Closed,
}

impl ClientState {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            ClientState::Uninitialized => LifecycleState::Uninitialized,
            ClientState::Initialized(_) => LifecycleState::Initialized,
            ClientState::Closed => LifecycleState::Closed,
        }
    }
}

/// Client-side identity and transaction construction.
///
/// Signs every deploy, invoke and query with a fresh transaction certificate
/// drawn from the pool that crypto-engine initialization produced. The
/// enrollment certificate is only used through its own handler.
///
/// Thread-safe: lifecycle transitions hold the state write lock for the whole
/// pipeline; certificate operations only clone the session under a read lock.
pub struct TransactionClient {
    node: Arc<dyn NodeSession>,
    key_store: Arc<dyn KeyStore>,
    engine: Arc<dyn CryptoEngine>,
    state: RwLock<ClientState>,
}

impl TransactionClient {
    pub fn new(
        node: Arc<dyn NodeSession>,
        key_store: Arc<dyn KeyStore>,
        engine: Arc<dyn CryptoEngine>,
    ) -> Self {
        Self {
            node,
            key_store,
            engine,
            state: RwLock::new(ClientState::Uninitialized),
        }
    }

    pub fn lifecycle_state(&self) -> ClientResult<LifecycleState> {
        let state = self
            .state
            .read()
            .map_err(|_| ClientError::Internal("lock poisoned".into()))?;
        Ok(state.lifecycle())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.lifecycle_state(), Ok(LifecycleState::Initialized))
    }

    /// Enrollment id the client was initialized with.
    pub fn id(&self) -> ClientResult<String> {
        Ok(self.session()?.id.clone())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Register the client with the network and its crypto engine.
    ///
    /// Does not initialize the client.
    pub fn register(
        &self,
        id: &str,
        secret: &[u8],
        enroll_id: &str,
        enroll_secret: &[u8],
    ) -> ClientResult<()> {
        let state = self
            .state
            .write()
            .map_err(|_| ClientError::Internal("lock poisoned".into()))?;
        match *state {
            ClientState::Initialized(_) => {
                warn!(id, "register called on an initialized client");
                return Err(ClientError::AlreadyInitialized);
            }
            ClientState::Closed => return Err(ClientError::Closed),
            ClientState::Uninitialized => {}
        }

        run_step(LifecycleStep::NodeRegistration, || {
            self.node
                .register(NodeRole::Client, id, secret, enroll_id, enroll_secret)
        })?;
        run_step(LifecycleStep::CryptoEngineRegistration, || {
            self.engine.register_crypto_engine()
        })?;

        info!(id, enroll_id, "client registered");
        Ok(())
    }

    /// Bring the client up: node session, keystore, crypto engine, in that
    /// order. The client is initialized only if all three succeed.
    pub fn init(&self, id: &str, secret: &[u8]) -> ClientResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ClientError::Internal("lock poisoned".into()))?;
        match *state {
            ClientState::Initialized(_) => {
                warn!(id, "init called on an initialized client");
                return Err(ClientError::AlreadyInitialized);
            }
            ClientState::Closed => return Err(ClientError::Closed),
            ClientState::Uninitialized => {}
        }

        let mut enrollment = None;
        run_step(LifecycleStep::NodeInit, || {
            self.node.init(NodeRole::Client, id, secret)?;
            enrollment = Some(self.node.enrollment()?);
            Ok(())
        })?;
        let enrollment = enrollment.ok_or_else(|| {
            ClientError::Internal("node init yielded no enrollment identity".into())
        })?;

        run_step(LifecycleStep::KeyStoreInit, || self.key_store.init_key_store())?;

        let mut material = None;
        run_step(LifecycleStep::CryptoEngineInit, || {
            material = Some(self.engine.init_crypto_engine()?);
            Ok(())
        })?;
        let material = material.ok_or_else(|| {
            ClientError::Internal("crypto engine init yielded no key material".into())
        })?;

        *state = ClientState::Initialized(Arc::new(ClientSession {
            id: id.to_string(),
            enrollment,
            chain_public_key: material.chain_public_key,
            query_state_key: material.query_state_key,
            tcert_owner_kdf_key: material.tcert_owner_kdf_key,
            tca_public_key: material.tca_public_key,
            pool: material.pool,
        }));
        info!(id, "client initialized");
        Ok(())
    }

    /// Best-effort teardown. Stops the pool if one exists and closes the node
    /// session; both are always attempted and reported individually.
    pub fn close(&self) -> TeardownReport {
        // A poisoned lock still lets us reach the collaborators.
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = std::mem::replace(&mut *state, ClientState::Closed);

        let report = match previous {
            ClientState::Closed => {
                debug!("close called on a closed client");
                TeardownReport {
                    pool: TeardownStep::Skipped,
                    node: TeardownStep::Skipped,
                }
            }
            ClientState::Uninitialized => TeardownReport {
                pool: TeardownStep::Skipped,
                node: TeardownStep::attempt("node", || self.node.close()),
            },
            ClientState::Initialized(session) => TeardownReport {
                pool: TeardownStep::attempt("pool", || session.pool.stop()),
                node: TeardownStep::attempt("node", || self.node.close()),
            },
        };

        if report.is_clean() {
            info!("client closed");
        } else {
            warn!(failures = ?report.failures(), "client closed with teardown failures");
        }
        report
    }

    fn session(&self) -> ClientResult<Arc<ClientSession>> {
        let state = self
            .state
            .read()
            .map_err(|_| ClientError::Internal("lock poisoned".into()))?;
        match &*state {
            ClientState::Initialized(session) => Ok(Arc::clone(session)),
            _ => Err(ClientError::NotInitialized),
        }
    }

    // -----------------------------------------------------------------------
    // Certificates
    // -----------------------------------------------------------------------

    pub fn chain_public_key(&self) -> ClientResult<ChainPublicKey> {
        Ok(self.session()?.chain_public_key)
    }

    pub fn enrollment_certificate(&self) -> ClientResult<Certificate> {
        Ok(self.session()?.enrollment.certificate.clone())
    }

    /// Draw exactly `count` unused TCerts scoped to `attributes`.
    pub fn get_next_tcerts(&self, count: usize, attributes: &[&str]) -> ClientResult<Vec<TCert>> {
        if count == 0 {
            return Err(ClientError::InvalidArgument(
                "number of requested TCerts must be at least 1".into(),
            ));
        }
        let session = self.session()?;
        fetch_tcerts(&session, count, attributes)
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    pub fn new_deploy_transaction(
        &self,
        spec: &ChaincodeDeploymentSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        self.new_transaction(TransactionKind::Deploy, spec, uuid.into(), attributes)
    }

    pub fn new_invoke_transaction(
        &self,
        spec: &ChaincodeInvocationSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        self.new_transaction(TransactionKind::Invoke, spec, uuid.into(), attributes)
    }

    pub fn new_query_transaction(
        &self,
        spec: &ChaincodeInvocationSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        self.new_transaction(TransactionKind::Query, spec, uuid.into(), attributes)
    }

    fn new_transaction<D: TransactionDescriptor>(
        &self,
        kind: TransactionKind,
        descriptor: &D,
        uuid: TxUuid,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        let session = self.session()?;
        transaction::check_uuid(&uuid)?;

        let tcert = fetch_one_tcert(&session, attributes)?;
        let serial = tcert.serial().clone();
        let capability = tcert_capability(tcert, session.chain_public_key)?;
        let tx = build_transaction(
            kind,
            descriptor,
            uuid,
            attributes,
            transaction::fresh_nonce(),
            &capability,
        )?;

        debug!(%kind, uuid = %tx.uuid, tcert = %serial, "transaction signed");
        Ok(tx)
    }

    /// Open a query result encrypted by validators for `tx`.
    pub fn decrypt_query_result(
        &self,
        tx: &Transaction,
        result: &EncryptedEnvelope,
    ) -> ClientResult<Vec<u8>> {
        let session = self.session()?;
        if tx.kind != TransactionKind::Query {
            return Err(ClientError::InvalidArgument(format!(
                "expected a query transaction, got {}",
                tx.kind
            )));
        }
        let key = kdf::query_result_key(&session.query_state_key, &tx.nonce)?;
        Ok(envelope::decrypt(&key, result)?)
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    pub fn get_enrollment_certificate_handler(&self) -> ClientResult<EnrollmentCertHandler> {
        let session = self.session()?;
        EnrollmentCertHandler::new(&session.enrollment, session.chain_public_key)
    }

    /// Handler over the next unused TCert scoped to `attributes`.
    pub fn get_tcert_handler_next(&self, attributes: &[&str]) -> ClientResult<TCertHandler> {
        let session = self.session()?;
        let tcert = fetch_one_tcert(&session, attributes)?;
        TCertHandler::new(tcert, session.chain_public_key)
    }

    /// Handler over a TCert this client owns, given in encoded form.
    ///
    /// The certificate must be issued by the TCA, be currently valid and
    /// carry an index that opens under this client's KDF key.
    pub fn get_tcert_handler_from_bytes(&self, encoded: &[u8]) -> ClientResult<TCertHandler> {
        let session = self.session()?;
        let tcert = recover_tcert(&session, encoded).map_err(|e| {
            warn!(error = %e, "rejected encoded TCert");
            ClientError::CertificateValidation(e)
        })?;
        TCertHandler::new(tcert, session.chain_public_key)
    }
}

fn recover_tcert(session: &ClientSession, encoded: &[u8]) -> Result<TCert, String> {
    let certificate = Certificate::decode(encoded).map_err(|e| e.to_string())?;
    verify_certificate(
        &certificate,
        &session.tca_public_key,
        CertificateKind::Transaction,
        Timestamp::now(),
    )
    .map_err(|e| e.to_string())?;
    let signing_key = kdf::recover_tcert_signing_key(&session.tcert_owner_kdf_key, &certificate)
        .map_err(|e| e.to_string())?;
    Ok(TCert::new(certificate, signing_key))
}

fn tcert_capability(tcert: TCert, chain_key: ChainPublicKey) -> ClientResult<CertCapability> {
    let TCert {
        certificate,
        signing_key,
    } = tcert;
    CertCapability::new(certificate, KeySigner::from_seed(signing_key), chain_key)
}

fn fetch_one_tcert(session: &ClientSession, attributes: &[&str]) -> ClientResult<TCert> {
    let mut tcerts = fetch_tcerts(session, 1, attributes)?;
    tcerts.pop().ok_or(ClientError::PoolMismatch {
        requested: 1,
        returned: 0,
    })
}

fn fetch_tcerts(
    session: &ClientSession,
    count: usize,
    attributes: &[&str],
) -> ClientResult<Vec<TCert>> {
    let set = AttributeSet::new(attributes.iter().copied());
    let blocks = session.pool.get_next_tcerts(count, &set).map_err(|e| {
        error!(count, error = %e, "failed getting TCerts from the pool");
        ClientError::Pool(e)
    })?;

    if blocks.len() != count {
        error!(
            requested = count,
            returned = blocks.len(),
            "pool returned an unexpected number of TCerts"
        );
        return Err(ClientError::PoolMismatch {
            requested: count,
            returned: blocks.len(),
        });
    }

    let digest = set.digest();
    if blocks.iter().any(|b| b.attribute_digest != digest) {
        error!(count, "pool returned TCerts scoped to other attributes");
        return Err(ClientError::Pool(TxCertError::Pool(
            "TCert attribute scope does not match request".into(),
        )));
    }

    Ok(blocks.into_iter().map(|b| b.tcert).collect())
}
