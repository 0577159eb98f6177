use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use txcert_core::{
    AttributeSet, Certificate, CertificateKind, ChainPublicKey, EnrollmentIdentity, Timestamp,
    TxCertError, TxCertResult,
};
use txcert_crypto::authority::{CertificateAuthority, IssueRequest};
use txcert_crypto::chain_seal::{ChainEnvelope, ChainKeyPair};
use txcert_crypto::envelope::{self, EncryptedEnvelope};
use txcert_crypto::kdf::{self, TCertIndex};
use txcert_crypto::signer::KeySigner;
use zeroize::Zeroizing;

/// Largest number of TCerts the TCA issues in one batch.
pub const MAX_TCERT_BATCH: usize = 256;

/// Tunables of a local network.
#[derive(Debug, Clone, Copy)]
pub struct NetworkSettings {
    pub ecert_validity_secs: u64,
    pub tcert_validity_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ecert_validity_secs: 365 * 24 * 3600,
            tcert_validity_secs: 24 * 3600,
        }
    }
}

struct UserRecord {
    secret_hash: [u8; 32],
    enrolled: bool,
    owner_keys: Option<OwnerKeys>,
}

/// Secrets the TCA shares with one enrolled owner.
#[derive(Clone)]
struct OwnerKeys {
    tcert_owner_kdf_key: Zeroizing<[u8; 32]>,
    query_state_key: Zeroizing<[u8; 32]>,
}

fn hash_secret(secret: &[u8]) -> [u8; 32] {
    Sha256::digest(secret).into()
}

/// An in-process permissioned network: enrollment CA, transaction CA, user
/// registry and the chain key held by validators.
pub struct LocalNetwork {
    eca: CertificateAuthority,
    tca: CertificateAuthority,
    chain: ChainKeyPair,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl LocalNetwork {
    pub fn new(settings: NetworkSettings) -> Self {
        Self {
            eca: CertificateAuthority::new(
                "eca",
                KeySigner::generate(),
                settings.ecert_validity_secs,
            ),
            tca: CertificateAuthority::new(
                "tca",
                KeySigner::generate(),
                settings.tcert_validity_secs,
            ),
            chain: ChainKeyPair::generate(),
            users: Mutex::new(HashMap::new()),
        }
    }

    fn lock_users(&self) -> TxCertResult<MutexGuard<'_, HashMap<String, UserRecord>>> {
        self.users
            .lock()
            .map_err(|e| TxCertError::Internal(format!("lock poisoned: {}", e)))
    }

    pub fn eca_public_key(&self) -> [u8; 32] {
        self.eca.public_key()
    }

    pub fn tca_public_key(&self) -> [u8; 32] {
        self.tca.public_key()
    }

    pub fn chain_public_key(&self) -> ChainPublicKey {
        self.chain.public_key()
    }

    // -----------------------------------------------------------------------
    // Registrar / enrollment CA
    // -----------------------------------------------------------------------

    /// Add a user to the registry with its one-time enrollment secret.
    pub fn register_user(&self, enrollment_id: &str, enroll_secret: &[u8]) -> TxCertResult<()> {
        if enrollment_id.is_empty() {
            return Err(TxCertError::Node("enrollment id must not be empty".into()));
        }
        let mut users = self.lock_users()?;
        if users.contains_key(enrollment_id) {
            return Err(TxCertError::Node(format!(
                "user {} already registered",
                enrollment_id
            )));
        }
        users.insert(
            enrollment_id.to_string(),
            UserRecord {
                secret_hash: hash_secret(enroll_secret),
                enrolled: false,
                owner_keys: None,
            },
        );
        info!(enrollment_id, "user registered with the registrar");
        Ok(())
    }

    /// Exchange the enrollment secret for an ECert. Allowed once per user.
    pub fn enroll(
        &self,
        enrollment_id: &str,
        enroll_secret: &[u8],
    ) -> TxCertResult<EnrollmentIdentity> {
        let mut users = self.lock_users()?;
        let user = users
            .get_mut(enrollment_id)
            .ok_or_else(|| TxCertError::Node(format!("unknown user {}", enrollment_id)))?;

        let presented = hash_secret(enroll_secret);
        if !bool::from(presented.as_slice().ct_eq(user.secret_hash.as_slice())) {
            warn!(enrollment_id, "enrollment rejected: wrong secret");
            return Err(TxCertError::Node("invalid enrollment secret".into()));
        }
        if user.enrolled {
            return Err(TxCertError::Node(format!(
                "user {} already enrolled",
                enrollment_id
            )));
        }

        let signer = KeySigner::generate();
        let certificate = self.eca.issue(IssueRequest {
            kind: CertificateKind::Enrollment,
            subject: Some(enrollment_id.to_string()),
            public_key: signer.public_key(),
            attributes: Vec::new(),
            sealed_index: None,
        })?;
        user.enrolled = true;

        info!(enrollment_id, serial = %certificate.serial(), "ECert issued");
        Ok(EnrollmentIdentity {
            enrollment_id: enrollment_id.to_string(),
            certificate,
            signing_key: signer.seed(),
        })
    }

    // -----------------------------------------------------------------------
    // Transaction CA
    // -----------------------------------------------------------------------

    /// Create the KDF and query-state keys shared with `enrollment_id`.
    /// Calling it again keeps the existing keys.
    pub fn register_owner(&self, enrollment_id: &str) -> TxCertResult<()> {
        let mut users = self.lock_users()?;
        let user = users
            .get_mut(enrollment_id)
            .filter(|u| u.enrolled)
            .ok_or_else(|| {
                TxCertError::CryptoEngine(format!("user {} is not enrolled", enrollment_id))
            })?;
        if user.owner_keys.is_some() {
            debug!(enrollment_id, "owner keys already present");
            return Ok(());
        }

        let mut kdf_key = Zeroizing::new([0u8; 32]);
        let mut qsk = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *kdf_key);
        rand::rngs::OsRng.fill_bytes(&mut *qsk);
        user.owner_keys = Some(OwnerKeys {
            tcert_owner_kdf_key: kdf_key,
            query_state_key: qsk,
        });
        info!(enrollment_id, "TCA owner keys created");
        Ok(())
    }

    /// `(tcert owner KDF key, query state key)` for a registered owner.
    pub fn owner_keys(
        &self,
        enrollment_id: &str,
    ) -> TxCertResult<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
        let keys = self.lookup_owner(enrollment_id)?;
        Ok((keys.tcert_owner_kdf_key, keys.query_state_key))
    }

    fn lookup_owner(&self, enrollment_id: &str) -> TxCertResult<OwnerKeys> {
        let users = self.lock_users()?;
        users
            .get(enrollment_id)
            .and_then(|u| u.owner_keys.clone())
            .ok_or_else(|| {
                TxCertError::CryptoEngine(format!(
                    "no crypto engine registered for {}",
                    enrollment_id
                ))
            })
    }

    /// Issue one batch of `count` TCerts for `enrollment_id`.
    ///
    /// Every certificate carries its index sealed under the owner's KDF key;
    /// the batch shares a timestamp and a random value, the counter starts
    /// at 1.
    pub fn issue_tcert_batch(
        &self,
        enrollment_id: &str,
        attributes: &AttributeSet,
        count: usize,
    ) -> TxCertResult<Vec<Certificate>> {
        if count > MAX_TCERT_BATCH {
            return Err(TxCertError::Node(format!(
                "TCert batch of {} exceeds the limit of {}",
                count, MAX_TCERT_BATCH
            )));
        }
        let keys = self.lookup_owner(enrollment_id)?;
        let mut batch_rand = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut batch_rand);
        let batch_time = Timestamp::now().seconds_since_epoch;

        let mut certificates = Vec::new();
        for counter in 1..=count as u64 {
            let index = TCertIndex {
                batch_time,
                batch_rand,
                counter,
            };
            let seed = kdf::tcert_signing_key(&keys.tcert_owner_kdf_key, &index)?;
            let public_key = KeySigner::from_seed(seed).public_key();
            let sealed_index = kdf::seal_index(&keys.tcert_owner_kdf_key, &index)?;
            certificates.push(self.tca.issue(IssueRequest {
                kind: CertificateKind::Transaction,
                subject: None,
                public_key,
                attributes: attributes.names().to_vec(),
                sealed_index: Some(sealed_index),
            })?);
        }

        debug!(
            enrollment_id,
            count,
            batch = %hex::encode(batch_rand),
            "TCert batch issued"
        );
        Ok(certificates)
    }

    // -----------------------------------------------------------------------
    // Validators
    // -----------------------------------------------------------------------

    pub fn open_sealed(&self, envelope: &ChainEnvelope) -> TxCertResult<Vec<u8>> {
        Ok(self.chain.open(envelope)?)
    }

    /// Encrypt a query result for the owner of a query transaction, the way
    /// validators answer confidential queries.
    pub fn encrypt_query_result(
        &self,
        enrollment_id: &str,
        nonce: &[u8],
        result: &[u8],
    ) -> TxCertResult<EncryptedEnvelope> {
        let keys = self.lookup_owner(enrollment_id)?;
        let key = kdf::query_result_key(keys.query_state_key.as_slice(), nonce)?;
        Ok(envelope::encrypt(&key, result)?)
    }
}
