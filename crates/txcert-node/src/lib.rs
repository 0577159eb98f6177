//! In-process reference implementations of the collaborators behind the
//! transaction client.
//!
//! [`LocalNetwork`] plays the enrollment CA, the transaction CA and the
//! chain's validators. [`LocalNode`], [`MemoryKeyStore`],
//! [`LocalCryptoEngine`] and [`MemoryTCertPool`] implement the client-facing
//! traits on top of it.

pub mod engine;
pub mod keystore;
pub mod network;
pub mod node;
pub mod pool;

pub use engine::LocalCryptoEngine;
pub use keystore::MemoryKeyStore;
pub use network::{LocalNetwork, NetworkSettings, MAX_TCERT_BATCH};
pub use node::LocalNode;
pub use pool::MemoryTCertPool;
