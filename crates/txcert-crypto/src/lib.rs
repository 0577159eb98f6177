//! Cryptographic primitives behind the txcert client.
//!
//! Everything here is synchronous and allocation-light. Key material is held
//! in `Zeroizing` buffers and never logged.

pub mod authority;
pub mod chain_seal;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod signer;

pub use error::*;
