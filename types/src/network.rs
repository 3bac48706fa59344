//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TypesError;

/// Identifies which ledger network the solver is attached to.
///
/// Each network has its own contracts document, named after the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Main,
    /// The public test network.
    Goerli,
    /// Local development chain.
    Private,
}

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Goerli => "goerli",
            Self::Private => "private",
        }
    }

    /// File name of the contracts document produced by provisioning.
    pub fn contracts_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "goerli" => Ok(Self::Goerli),
            "private" | "dev" => Ok(Self::Private),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}
