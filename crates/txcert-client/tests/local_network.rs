//! The transaction client against the in-process reference network.
//!
//! 1. Alice is registered with the registrar and registers her client
//! 2. Alice initializes the client (node session, keystore, crypto engine)
//! 3. Every transaction she signs carries its own TCert
//! 4. Two of her TCerts cannot be linked to each other or to her ECert
//! 5. Validators read confidential payloads; Alice reads her query results
//! 6. Alice hands a TCert to herself as bytes and gets a handler back
//! 7. Bob cannot use Alice's TCerts
//! 8. Closing releases the pool and the node session

use std::sync::Arc;
use txcert_client::{
    ChaincodeDeploymentSpec, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    CertificateHandler, ClientError, ConfidentialityLevel, LifecycleState, TeardownStep,
    TransactionClient, TransactionPayload,
};
use txcert_core::CertificateKind;
use txcert_node::{LocalCryptoEngine, LocalNetwork, LocalNode, MemoryKeyStore, NetworkSettings};

fn network() -> Arc<LocalNetwork> {
    Arc::new(LocalNetwork::new(NetworkSettings::default()))
}

fn client_for(network: &Arc<LocalNetwork>, user: &str) -> TransactionClient {
    network
        .register_user(user, format!("{}-enroll", user).as_bytes())
        .unwrap();
    let client = TransactionClient::new(
        Arc::new(LocalNode::new(Arc::clone(network))),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(LocalCryptoEngine::new(Arc::clone(network), user, 4)),
    );
    client
        .register(user, b"local-pw", user, format!("{}-enroll", user).as_bytes())
        .unwrap();
    client.init(user, b"local-pw").unwrap();
    client
}

fn chaincode() -> ChaincodeId {
    ChaincodeId {
        path: "github.com/example/asset".into(),
        name: "asset".into(),
    }
}

fn deployment(level: ConfidentialityLevel) -> ChaincodeDeploymentSpec {
    ChaincodeDeploymentSpec {
        chaincode_id: chaincode(),
        ctor_msg: ChaincodeInput {
            function: "init".into(),
            args: vec!["a".into(), "100".into(), "b".into(), "200".into()],
        },
        code_package: b"package bytes".to_vec(),
        confidentiality: level,
    }
}

fn invocation(function: &str) -> ChaincodeInvocationSpec {
    ChaincodeInvocationSpec {
        chaincode_id: chaincode(),
        input: ChaincodeInput {
            function: function.into(),
            args: vec!["a".into()],
        },
        confidentiality: ConfidentialityLevel::Public,
    }
}

// ============================================================================
// Chapter 1: lifecycle
// ============================================================================

#[test]
fn chapter_1_alice_brings_her_client_up() {
    let network = network();
    let client = client_for(&network, "alice");
    assert_eq!(client.lifecycle_state().unwrap(), LifecycleState::Initialized);
    assert_eq!(client.id().unwrap(), "alice");
    assert_eq!(client.chain_public_key().unwrap(), network.chain_public_key());

    // A second init changes nothing.
    assert!(matches!(
        client.init("alice", b"local-pw"),
        Err(ClientError::AlreadyInitialized)
    ));
    assert!(client.is_initialized());
}

#[test]
fn chapter_1b_wrong_local_secret_keeps_client_down() {
    let network = network();
    network.register_user("carol", b"carol-enroll").unwrap();
    let client = TransactionClient::new(
        Arc::new(LocalNode::new(Arc::clone(&network))),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(LocalCryptoEngine::new(Arc::clone(&network), "carol", 4)),
    );
    client
        .register("carol", b"pw", "carol", b"carol-enroll")
        .unwrap();
    assert!(matches!(
        client.init("carol", b"not-pw"),
        Err(ClientError::Lifecycle { .. })
    ));
    assert_eq!(client.lifecycle_state().unwrap(), LifecycleState::Uninitialized);
    client.init("carol", b"pw").unwrap();
}

// ============================================================================
// Chapter 2: one TCert per transaction
// ============================================================================

#[test]
fn chapter_2_each_deploy_has_its_own_tcert() {
    let network = network();
    let client = client_for(&network, "alice");

    let tx1 = client
        .new_deploy_transaction(&deployment(ConfidentialityLevel::Public), "tx-1", &[])
        .unwrap();
    let tx2 = client
        .new_deploy_transaction(&deployment(ConfidentialityLevel::Public), "tx-2", &[])
        .unwrap();

    assert_eq!(tx1.uuid.as_str(), "tx-1");
    assert_eq!(tx2.uuid.as_str(), "tx-2");
    assert_ne!(tx1.cert, tx2.cert);
    assert!(tx1.verify_signature().is_ok());
    assert!(tx2.verify_signature().is_ok());

    let c1 = tx1.certificate().unwrap();
    let c2 = tx2.certificate().unwrap();
    assert_eq!(c1.kind(), CertificateKind::Transaction);
    assert_ne!(c1.public_key(), c2.public_key());
    // TCerts carry no subject: nothing links them to Alice.
    assert!(c1.body.subject.is_none());
    let ecert = client.enrollment_certificate().unwrap();
    assert_ne!(c1.public_key(), ecert.public_key());
}

#[test]
fn chapter_2b_attributes_scope_the_tcert() {
    let network = network();
    let client = client_for(&network, "alice");

    let tx = client
        .new_invoke_transaction(&invocation("transfer"), "tx-3", &["account", "role"])
        .unwrap();
    assert_eq!(tx.attributes, vec!["account".to_string(), "role".to_string()]);
    assert_eq!(
        tx.certificate().unwrap().body.attributes,
        vec!["account".to_string(), "role".to_string()]
    );
}

#[test]
fn chapter_2c_batch_of_tcerts_spans_refills() {
    let network = network();
    let client = client_for(&network, "alice");

    let tcerts = client.get_next_tcerts(10, &[]).unwrap();
    assert_eq!(tcerts.len(), 10);
    let serials: std::collections::HashSet<_> = tcerts.iter().map(|t| t.serial().clone()).collect();
    assert_eq!(serials.len(), 10);
}

// ============================================================================
// Chapter 3: confidentiality
// ============================================================================

#[test]
fn chapter_3_validators_open_confidential_deploys() {
    let network = network();
    let client = client_for(&network, "alice");
    let spec = deployment(ConfidentialityLevel::Confidential);

    let tx = client.new_deploy_transaction(&spec, "tx-secret", &[]).unwrap();
    let envelope = match &tx.payload {
        TransactionPayload::Sealed { envelope } => envelope.clone(),
        other => panic!("expected a sealed payload, got {:?}", other),
    };
    let plain = network.open_sealed(&envelope).unwrap();
    let decoded: ChaincodeDeploymentSpec = serde_json::from_slice(&plain).unwrap();
    assert_eq!(decoded, spec);
}

#[test]
fn chapter_3b_alice_reads_her_query_result() {
    let network = network();
    let client = client_for(&network, "alice");
    let tx = client.new_query_transaction(&invocation("query"), "tx-q", &[]).unwrap();

    let answer = network.encrypt_query_result("alice", &tx.nonce, b"100").unwrap();
    assert_eq!(client.decrypt_query_result(&tx, &answer).unwrap(), b"100");
}

// ============================================================================
// Chapter 4: handlers
// ============================================================================

#[test]
fn chapter_4_tcert_from_bytes_round_trip() {
    let network = network();
    let client = client_for(&network, "alice");

    let handler = client.get_tcert_handler_next(&[]).unwrap();
    let encoded = handler.certificate_bytes().to_vec();
    let restored = client.get_tcert_handler_from_bytes(&encoded).unwrap();

    let sig = restored.sign(b"sign me").unwrap();
    assert!(handler.verify(&sig, b"sign me").is_ok());

    let txh = restored.transaction_handler().unwrap();
    let tx = txh.new_invoke_transaction(&invocation("transfer"), "tx-h", &[]).unwrap();
    assert_eq!(tx.cert, encoded);
    assert_eq!(tx.binding(), txh.binding());
}

#[test]
fn chapter_4b_ecert_handler_signs_as_alice() {
    let network = network();
    let client = client_for(&network, "alice");
    let handler = client.get_enrollment_certificate_handler().unwrap();
    assert_eq!(handler.kind(), CertificateKind::Enrollment);
    assert_eq!(
        handler.certificate().body.subject.as_deref(),
        Some("alice")
    );
    let sig = handler.sign(b"hello").unwrap();
    assert!(client
        .get_enrollment_certificate_handler()
        .unwrap()
        .verify(&sig, b"hello")
        .is_ok());
}

#[test]
fn chapter_5_bob_cannot_use_alices_tcerts() {
    let network = network();
    let alice = client_for(&network, "alice");
    let bob = client_for(&network, "bob");

    let alice_tcert = alice.get_tcert_handler_next(&[]).unwrap();
    let err = bob
        .get_tcert_handler_from_bytes(alice_tcert.certificate_bytes())
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::CertificateValidation(_)));
}

// ============================================================================
// Chapter 6: teardown
// ============================================================================

#[test]
fn chapter_6_close_releases_everything() {
    let network = network();
    let client = client_for(&network, "alice");
    client.get_next_tcerts(1, &[]).unwrap();

    let report = client.close();
    assert!(report.is_clean());
    assert_eq!(report.pool, TeardownStep::Released);
    assert_eq!(report.node, TeardownStep::Released);
    assert_eq!(client.lifecycle_state().unwrap(), LifecycleState::Closed);
    assert!(matches!(
        client.get_next_tcerts(1, &[]),
        Err(ClientError::NotInitialized)
    ));
    assert!(matches!(client.init("alice", b"local-pw"), Err(ClientError::Closed)));
}
