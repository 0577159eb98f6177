//! Chaincode descriptors and the signed transactions built from them.
//!
//! A transaction is signed over its canonical bytes with the signature field
//! empty. The encoded certificate travels inside the transaction so that any
//! validator can check the signature without contacting the client.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use txcert_core::types::{hex_bytes, hex_vec};
use txcert_core::{Certificate, Timestamp, TxUuid};
use txcert_crypto::chain_seal::{self, ChainEnvelope, ChainKeyPair};
use txcert_crypto::signer::verify_signature;

use crate::error::{ClientError, ClientResult};
use crate::handler::CertCapability;

pub const NONCE_SIZE: usize = 24;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeId {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInput {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidentialityLevel {
    #[default]
    Public,
    /// Payload sealed to the chain public key.
    Confidential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeDeploymentSpec {
    pub chaincode_id: ChaincodeId,
    pub ctor_msg: ChaincodeInput,
    #[serde(default, with = "hex_vec")]
    pub code_package: Vec<u8>,
    #[serde(default)]
    pub confidentiality: ConfidentialityLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInvocationSpec {
    pub chaincode_id: ChaincodeId,
    pub input: ChaincodeInput,
    #[serde(default)]
    pub confidentiality: ConfidentialityLevel,
}

/// Anything that can be bound into a transaction payload.
pub trait TransactionDescriptor: Serialize {
    fn chaincode_id(&self) -> &ChaincodeId;
    fn confidentiality(&self) -> ConfidentialityLevel;
}

impl TransactionDescriptor for ChaincodeDeploymentSpec {
    fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    fn confidentiality(&self) -> ConfidentialityLevel {
        self.confidentiality
    }
}

impl TransactionDescriptor for ChaincodeInvocationSpec {
    fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    fn confidentiality(&self) -> ConfidentialityLevel {
        self.confidentiality
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deploy,
    Invoke,
    Query,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deploy => write!(f, "deploy"),
            TransactionKind::Invoke => write!(f, "invoke"),
            TransactionKind::Query => write!(f, "query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum TransactionPayload {
    Plain {
        #[serde(with = "hex_vec")]
        bytes: Vec<u8>,
    },
    Sealed {
        envelope: ChainEnvelope,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub uuid: TxUuid,
    pub chaincode_id: ChaincodeId,
    pub confidentiality: ConfidentialityLevel,
    pub payload: TransactionPayload,
    #[serde(with = "hex_bytes")]
    pub nonce: [u8; NONCE_SIZE],
    pub timestamp: Timestamp,
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Encoded certificate of the signer.
    #[serde(with = "hex_vec")]
    pub cert: Vec<u8>,
    #[serde(default, with = "hex_vec")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Canonical bytes covered by the signature.
    pub fn signing_bytes(&self) -> ClientResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signature = Vec::new();
        Ok(serde_json::to_vec(&unsigned)?)
    }

    pub fn certificate(&self) -> ClientResult<Certificate> {
        Certificate::decode(&self.cert)
            .map_err(|e| ClientError::CertificateValidation(e.to_string()))
    }

    /// Check the signature against the public key of the embedded certificate.
    pub fn verify_signature(&self) -> ClientResult<()> {
        let cert = self.certificate()?;
        verify_signature(cert.public_key(), &self.signing_bytes()?, &self.signature)?;
        Ok(())
    }

    /// SHA-256 over the signer certificate and the nonce.
    pub fn binding(&self) -> [u8; 32] {
        binding(&self.cert, &self.nonce)
    }

    /// Plaintext payload, opening it with the chain key pair when sealed.
    pub fn open_payload(&self, chain: Option<&ChainKeyPair>) -> ClientResult<Vec<u8>> {
        match (&self.payload, chain) {
            (TransactionPayload::Plain { bytes }, _) => Ok(bytes.clone()),
            (TransactionPayload::Sealed { envelope }, Some(chain)) => Ok(chain.open(envelope)?),
            (TransactionPayload::Sealed { .. }, None) => Err(ClientError::InvalidArgument(
                "sealed payload requires the chain key".into(),
            )),
        }
    }

    pub fn to_bytes(&self) -> ClientResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ClientResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub fn binding(cert: &[u8], nonce: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(cert);
    hasher.update(nonce);
    hasher.finalize().into()
}

pub(crate) fn check_uuid(uuid: &TxUuid) -> ClientResult<()> {
    if uuid.as_str().trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "transaction uuid must not be empty".into(),
        ));
    }
    Ok(())
}

pub(crate) fn fresh_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Bind `descriptor`, `uuid` and `attributes` to the certificate held by
/// `capability` and sign the result. Either a fully signed transaction comes
/// back or an error; nothing partial escapes.
pub(crate) fn build_transaction<D: TransactionDescriptor>(
    kind: TransactionKind,
    descriptor: &D,
    uuid: TxUuid,
    attributes: &[&str],
    nonce: [u8; NONCE_SIZE],
    capability: &CertCapability,
) -> ClientResult<Transaction> {
    check_uuid(&uuid)?;

    let plain = serde_json::to_vec(descriptor)?;
    let confidentiality = descriptor.confidentiality();
    let payload = match confidentiality {
        ConfidentialityLevel::Public => TransactionPayload::Plain { bytes: plain },
        ConfidentialityLevel::Confidential => TransactionPayload::Sealed {
            envelope: chain_seal::seal_for_chain(capability.chain_key(), &plain)?,
        },
    };

    let mut tx = Transaction {
        kind,
        uuid,
        chaincode_id: descriptor.chaincode_id().clone(),
        confidentiality,
        payload,
        nonce,
        timestamp: Timestamp::now(),
        attributes: attributes.iter().map(|a| a.to_string()).collect(),
        cert: capability.certificate_bytes().to_vec(),
        signature: Vec::new(),
    };
    tx.signature = capability.sign(&tx.signing_bytes()?).to_vec();
    Ok(tx)
}
