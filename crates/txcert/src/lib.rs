//! txcert root library.
//!
//! Wires a [`TransactionClient`] to an in-process [`LocalNetwork`] from a
//! [`RootConfig`], and turns client results into printable summaries. The
//! binary in `main.rs` is a thin layer over [`bootstrap`] and [`shutdown`].

pub mod config;
pub mod error;

pub use config::{ClientConfig, LoggingConfig, PoolConfig, RootConfig};
pub use error::{RootError, RootResult};

use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use txcert_client::{
    ChaincodeDeploymentSpec, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    ConfidentialityLevel, TransactionClient,
};
use txcert_core::{
    certificate_fingerprint, CertFingerprint, CertSerial, Certificate, CertificateKind,
};
use txcert_node::{LocalCryptoEngine, LocalNetwork, LocalNode, MemoryKeyStore, NetworkSettings};

/// A client registered and initialized against its own local network.
pub struct LocalSession {
    pub network: Arc<LocalNetwork>,
    pub client: TransactionClient,
    pub config: RootConfig,
}

fn random_secret() -> Vec<u8> {
    let mut secret = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    hex::encode(secret).into_bytes()
}

/// Start a local network, register the configured user with it, then
/// register and initialize a client for that user.
pub fn bootstrap(config: RootConfig) -> RootResult<LocalSession> {
    config.validate()?;

    let network = Arc::new(LocalNetwork::new(NetworkSettings {
        tcert_validity_secs: config.pool.tcert_validity_secs,
        ..NetworkSettings::default()
    }));
    let enroll_secret = random_secret();
    network.register_user(&config.client.enrollment_id, &enroll_secret)?;

    let client = TransactionClient::new(
        Arc::new(LocalNode::new(Arc::clone(&network))),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(LocalCryptoEngine::new(
            Arc::clone(&network),
            config.client.enrollment_id.clone(),
            config.pool.batch_size,
        )),
    );

    let local_secret = random_secret();
    client.register(
        &config.client.id,
        &local_secret,
        &config.client.enrollment_id,
        &enroll_secret,
    )?;
    client.init(&config.client.id, &local_secret)?;

    info!(id = %config.client.id, "local session ready");
    Ok(LocalSession {
        network,
        client,
        config,
    })
}

/// Close the client. Fails if any subsystem did not release cleanly.
pub fn shutdown(session: LocalSession) -> RootResult<()> {
    let report = session.client.close();
    if report.is_clean() {
        return Ok(());
    }
    let failures = report.failures().join("; ");
    warn!(%failures, "teardown incomplete");
    Err(RootError::Teardown(failures))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Chaincode request as given on the command line.
#[derive(Debug, Clone)]
pub struct ChaincodeRequest {
    pub name: String,
    pub path: String,
    pub function: String,
    pub args: Vec<String>,
    pub confidential: bool,
}

impl ChaincodeRequest {
    fn chaincode_id(&self) -> ChaincodeId {
        ChaincodeId {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    fn input(&self) -> ChaincodeInput {
        ChaincodeInput {
            function: self.function.clone(),
            args: self.args.clone(),
        }
    }

    fn confidentiality(&self) -> ConfidentialityLevel {
        if self.confidential {
            ConfidentialityLevel::Confidential
        } else {
            ConfidentialityLevel::Public
        }
    }

    pub fn deployment_spec(&self) -> ChaincodeDeploymentSpec {
        ChaincodeDeploymentSpec {
            chaincode_id: self.chaincode_id(),
            ctor_msg: self.input(),
            code_package: Vec::new(),
            confidentiality: self.confidentiality(),
        }
    }

    pub fn invocation_spec(&self) -> ChaincodeInvocationSpec {
        ChaincodeInvocationSpec {
            chaincode_id: self.chaincode_id(),
            input: self.input(),
            confidentiality: self.confidentiality(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Printable view of a certificate. Never includes key material.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub kind: CertificateKind,
    pub serial: CertSerial,
    pub fingerprint: CertFingerprint,
    pub issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub attributes: Vec<String>,
    pub not_after: String,
}

impl From<&Certificate> for CertificateSummary {
    fn from(cert: &Certificate) -> Self {
        Self {
            kind: cert.kind(),
            serial: cert.serial().clone(),
            fingerprint: certificate_fingerprint(cert),
            issuer: cert.body.issuer.clone(),
            subject: cert.body.subject.clone(),
            attributes: cert.body.attributes.clone(),
            not_after: cert.body.not_after.to_rfc3339(),
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> RootResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(confidential: bool) -> ChaincodeRequest {
        ChaincodeRequest {
            name: "asset".into(),
            path: "github.com/example/asset".into(),
            function: "init".into(),
            args: vec!["a".into(), "1".into()],
            confidential,
        }
    }

    #[test]
    fn test_request_specs() {
        let deploy = request(false).deployment_spec();
        assert_eq!(deploy.chaincode_id.name, "asset");
        assert_eq!(deploy.ctor_msg.args, vec!["a".to_string(), "1".to_string()]);
        assert_eq!(deploy.confidentiality, ConfidentialityLevel::Public);

        let invoke = request(true).invocation_spec();
        assert_eq!(invoke.input.function, "init");
        assert_eq!(invoke.confidentiality, ConfidentialityLevel::Confidential);
    }

    #[test]
    fn test_bootstrap_rejects_invalid_config() {
        let mut config = RootConfig::default();
        config.pool.batch_size = 0;
        assert!(matches!(bootstrap(config), Err(RootError::Config(_))));
    }

    #[test]
    fn test_bootstrap_and_shutdown() {
        let session = bootstrap(RootConfig::default()).unwrap();
        assert!(session.client.is_initialized());
        assert_eq!(session.client.id().unwrap(), "alice");
        shutdown(session).unwrap();
    }

    #[test]
    fn test_certificate_summary_omits_key_material() {
        let session = bootstrap(RootConfig::default()).unwrap();
        let ecert = session.client.enrollment_certificate().unwrap();
        let summary = CertificateSummary::from(&ecert);
        assert_eq!(summary.kind, CertificateKind::Enrollment);
        assert_eq!(summary.subject.as_deref(), Some("alice"));

        let json = to_json(&summary).unwrap();
        assert!(json.contains("\"fingerprint\""));
        assert!(!json.contains("signing_key"));
        shutdown(session).unwrap();
    }
}
