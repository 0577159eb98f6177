//! Certificate handlers: one certificate, one signer, one capability surface.
//!
//! Handlers are built on demand and never pooled. The enrollment handler and
//! the TCert handler share [`CertCapability`] and differ only in the kind of
//! certificate they were constructed from.

use subtle::ConstantTimeEq;
use txcert_core::{Certificate, CertificateKind, ChainPublicKey, EnrollmentIdentity, TCert, TxUuid};
use txcert_crypto::chain_seal::{self, ChainEnvelope};
use txcert_crypto::signer::{verify_signature, KeySigner};

use crate::error::{ClientError, ClientResult};
use crate::transaction::{
    self, build_transaction, ChaincodeDeploymentSpec, ChaincodeInvocationSpec, Transaction,
    TransactionKind, NONCE_SIZE,
};

/// Uniform capability over whichever certificate backs the handler.
pub trait CertificateHandler: Send + Sync {
    fn kind(&self) -> CertificateKind;

    fn certificate(&self) -> &Certificate;

    /// Encoded form of the backing certificate.
    fn certificate_bytes(&self) -> &[u8];

    fn sign(&self, message: &[u8]) -> ClientResult<Vec<u8>>;

    fn verify(&self, signature: &[u8], message: &[u8]) -> ClientResult<()>;

    /// Seal `plaintext` to the chain public key.
    fn encrypt(&self, plaintext: &[u8]) -> ClientResult<ChainEnvelope>;

    fn transaction_handler(&self) -> ClientResult<TransactionHandler>;
}

/// A certificate bound to the key that signs for it.
#[derive(Clone)]
pub struct CertCapability {
    certificate: Certificate,
    certificate_bytes: Vec<u8>,
    signer: KeySigner,
    chain_key: ChainPublicKey,
}

impl CertCapability {
    /// Fails when `signer` does not hold the key named in `certificate`.
    pub fn new(
        certificate: Certificate,
        signer: KeySigner,
        chain_key: ChainPublicKey,
    ) -> ClientResult<Self> {
        let matches = signer
            .public_key()
            .as_slice()
            .ct_eq(certificate.public_key().as_slice());
        if !bool::from(matches) {
            return Err(ClientError::CertificateValidation(format!(
                "signing key does not match certificate {}",
                certificate.serial()
            )));
        }
        let certificate_bytes = certificate
            .encode()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(Self {
            certificate,
            certificate_bytes,
            signer,
            chain_key,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_bytes(&self) -> &[u8] {
        &self.certificate_bytes
    }

    pub fn chain_key(&self) -> &ChainPublicKey {
        &self.chain_key
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signer.sign(message)
    }

    fn verify(&self, signature: &[u8], message: &[u8]) -> ClientResult<()> {
        verify_signature(self.certificate.public_key(), message, signature)?;
        Ok(())
    }

    fn seal(&self, plaintext: &[u8]) -> ClientResult<ChainEnvelope> {
        Ok(chain_seal::seal_for_chain(&self.chain_key, plaintext)?)
    }
}

macro_rules! delegate_handler {
    ($ty:ty) => {
        impl CertificateHandler for $ty {
            fn kind(&self) -> CertificateKind {
                self.capability.certificate().kind()
            }

            fn certificate(&self) -> &Certificate {
                self.capability.certificate()
            }

            fn certificate_bytes(&self) -> &[u8] {
                self.capability.certificate_bytes()
            }

            fn sign(&self, message: &[u8]) -> ClientResult<Vec<u8>> {
                Ok(self.capability.sign(message).to_vec())
            }

            fn verify(&self, signature: &[u8], message: &[u8]) -> ClientResult<()> {
                self.capability.verify(signature, message)
            }

            fn encrypt(&self, plaintext: &[u8]) -> ClientResult<ChainEnvelope> {
                self.capability.seal(plaintext)
            }

            fn transaction_handler(&self) -> ClientResult<TransactionHandler> {
                Ok(TransactionHandler::new(self.capability.clone()))
            }
        }
    };
}

/// Handler backed by the client's enrollment certificate.
pub struct EnrollmentCertHandler {
    capability: CertCapability,
}

impl EnrollmentCertHandler {
    pub fn new(identity: &EnrollmentIdentity, chain_key: ChainPublicKey) -> ClientResult<Self> {
        if identity.certificate.kind() != CertificateKind::Enrollment {
            return Err(ClientError::CertificateValidation(format!(
                "expected {} but got {}",
                CertificateKind::Enrollment,
                identity.certificate.kind()
            )));
        }
        let signer = KeySigner::from_seed(identity.signing_key.clone());
        let capability = CertCapability::new(identity.certificate.clone(), signer, chain_key)?;
        Ok(Self { capability })
    }
}

delegate_handler!(EnrollmentCertHandler);

/// Handler backed by a single transaction certificate.
pub struct TCertHandler {
    capability: CertCapability,
}

impl TCertHandler {
    /// Consumes the TCert; the handler becomes its only holder.
    pub fn new(tcert: TCert, chain_key: ChainPublicKey) -> ClientResult<Self> {
        let TCert {
            certificate,
            signing_key,
        } = tcert;
        let signer = KeySigner::from_seed(signing_key);
        let capability = CertCapability::new(certificate, signer, chain_key)?;
        Ok(Self { capability })
    }
}

delegate_handler!(TCertHandler);

/// Builds transactions with a fixed certificate and a fixed nonce.
///
/// Every transaction produced by the same handler shares the same
/// [`binding`](TransactionHandler::binding).
pub struct TransactionHandler {
    capability: CertCapability,
    nonce: [u8; NONCE_SIZE],
}

impl TransactionHandler {
    fn new(capability: CertCapability) -> Self {
        Self {
            capability,
            nonce: transaction::fresh_nonce(),
        }
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn binding(&self) -> [u8; 32] {
        transaction::binding(self.capability.certificate_bytes(), &self.nonce)
    }

    pub fn new_deploy_transaction(
        &self,
        spec: &ChaincodeDeploymentSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        build_transaction(
            TransactionKind::Deploy,
            spec,
            uuid.into(),
            attributes,
            self.nonce,
            &self.capability,
        )
    }

    pub fn new_invoke_transaction(
        &self,
        spec: &ChaincodeInvocationSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        build_transaction(
            TransactionKind::Invoke,
            spec,
            uuid.into(),
            attributes,
            self.nonce,
            &self.capability,
        )
    }

    pub fn new_query_transaction(
        &self,
        spec: &ChaincodeInvocationSpec,
        uuid: impl Into<TxUuid>,
        attributes: &[&str],
    ) -> ClientResult<Transaction> {
        build_transaction(
            TransactionKind::Query,
            spec,
            uuid.into(),
            attributes,
            self.nonce,
            &self.capability,
        )
    }
}
