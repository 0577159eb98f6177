//! Transaction client for a permissioned ledger.
//!
//! Deploy, invoke and query transactions are signed with single-use
//! transaction certificates (TCerts) drawn from a certificate pool, so that
//! two transactions of the same participant cannot be linked through their
//! signatures. The long-lived enrollment certificate stays behind its own
//! handler.
//!
//! ```text
//! TransactionClient::new(node, keystore, engine)
//!   .register(..)          node registration, crypto engine registration
//!   .init(..)              node init, keystore init, crypto engine init
//!   .new_*_transaction(..) one fresh TCert per transaction
//!   .close()               pool stop, node close (both always attempted)
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use client::TransactionClient;
pub use error::*;
pub use handler::{
    CertCapability, CertificateHandler, EnrollmentCertHandler, TCertHandler, TransactionHandler,
};
pub use lifecycle::{LifecycleState, StepOutcome, TeardownReport, TeardownStep};
pub use transaction::{
    ChaincodeDeploymentSpec, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    ConfidentialityLevel, Transaction, TransactionDescriptor, TransactionKind, TransactionPayload,
};
