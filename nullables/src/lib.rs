//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the solver (ledger, execution engine,
//! output stager, clock, random source) is abstracted behind a trait. This
//! crate provides test implementations that:
//! - Return deterministic values
//! - Can be scripted and inspected programmatically
//! - Never touch the network, a real ledger or storage
//!
//! Usage: build a `SolverDeps` from nullables in tests.

pub mod clock;
pub mod engine;
pub mod ledger;
pub mod random;
pub mod stager;

pub use clock::NullClock;
pub use engine::{NullEngine, NullTrace};
pub use ledger::{NullLedger, Predicate};
pub use random::NullRandom;
pub use stager::NullStager;
