//! Error type for parsing and validating shared types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid ledger id: {0}")]
    InvalidId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown event kind: {0}")]
    UnknownEvent(String),

    #[error("unknown phase index: {0}")]
    UnknownPhase(u64),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("{0}")]
    Other(String),
}
