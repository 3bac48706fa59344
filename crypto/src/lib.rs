//! Cryptographic primitives for the vsolve solver.
//!
//! - **Keccak-256** commitments, matching the hashing the incentive layer
//!   applies to registration secrets and committed solutions
//! - **HMAC-SHA256** derivation of per-task secrets from a local key

pub mod hash;
pub mod secret;

pub use hash::{hash_secret, keccak, solution_commitment};
pub use secret::{CryptoError, SecretKey, TaskSecret};
