use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use txcert_core::{EnrollmentIdentity, NodeRole, NodeSession, TxCertError, TxCertResult};

use crate::network::LocalNetwork;

struct LocalUser {
    role: NodeRole,
    secret_hash: [u8; 32],
    identity: EnrollmentIdentity,
}

#[derive(Default)]
struct NodeState {
    users: HashMap<String, LocalUser>,
    active: Option<String>,
}

/// Node session against a [`LocalNetwork`].
///
/// `register` enrolls with the ECA and keeps the enrollment locally under the
/// node-local id and secret; `init` unlocks it again.
pub struct LocalNode {
    network: Arc<LocalNetwork>,
    state: Mutex<NodeState>,
}

impl LocalNode {
    pub fn new(network: Arc<LocalNetwork>) -> Self {
        Self {
            network,
            state: Mutex::new(NodeState::default()),
        }
    }

    fn lock_state(&self) -> TxCertResult<MutexGuard<'_, NodeState>> {
        self.state
            .lock()
            .map_err(|e| TxCertError::Node(format!("lock poisoned: {}", e)))
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.lock_state()
            .map(|s| s.users.contains_key(id))
            .unwrap_or(false)
    }
}

impl NodeSession for LocalNode {
    fn register(
        &self,
        role: NodeRole,
        id: &str,
        secret: &[u8],
        enroll_id: &str,
        enroll_secret: &[u8],
    ) -> TxCertResult<()> {
        let mut state = self.lock_state()?;
        if state.users.contains_key(id) {
            info!(%role, id, "already registered, skipping enrollment");
            return Ok(());
        }

        let identity = self.network.enroll(enroll_id, enroll_secret)?;
        state.users.insert(
            id.to_string(),
            LocalUser {
                role,
                secret_hash: Sha256::digest(secret).into(),
                identity,
            },
        );
        info!(%role, id, enroll_id, "node registered");
        Ok(())
    }

    fn init(&self, role: NodeRole, id: &str, secret: &[u8]) -> TxCertResult<()> {
        let mut state = self.lock_state()?;
        let user = state
            .users
            .get(id)
            .ok_or_else(|| TxCertError::Node(format!("{} is not registered", id)))?;
        if user.role != role {
            return Err(TxCertError::Node(format!(
                "{} is registered as {}, not {}",
                id, user.role, role
            )));
        }
        let presented: [u8; 32] = Sha256::digest(secret).into();
        if !bool::from(presented.as_slice().ct_eq(user.secret_hash.as_slice())) {
            warn!(id, "node init rejected: wrong secret");
            return Err(TxCertError::Node("invalid secret".into()));
        }

        state.active = Some(id.to_string());
        debug!(%role, id, "node session open");
        Ok(())
    }

    fn close(&self) -> TxCertResult<()> {
        let mut state = self.lock_state()?;
        if let Some(id) = state.active.take() {
            debug!(id = %id, "node session closed");
        }
        Ok(())
    }

    fn enrollment(&self) -> TxCertResult<EnrollmentIdentity> {
        let state = self.lock_state()?;
        state
            .active
            .as_ref()
            .and_then(|id| state.users.get(id))
            .map(|u| u.identity.clone())
            .ok_or_else(|| TxCertError::Node("node session not initialized".into()))
    }
}
