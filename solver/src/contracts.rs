//! Per-network contracts document.
//!
//! Provisioning writes one JSON file per network mapping contract names to
//! `{address, abi}`. The same document may carry operator tunables
//! (`WAIT_TIME`, `REWARD_LIMIT`, `solving_rate`, `NO_AUTO_DEPOSIT`) next to
//! the contract entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use vsolve_types::{Account, Contract};

use crate::SolverError;

/// Contracts the solver cannot operate without.
pub const REQUIRED_CONTRACTS: [&str; 4] = ["incentiveLayer", "interactive", "fileSystem", "stake"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub address: Account,
    #[serde(default)]
    pub abi: serde_json::Value,
}

/// Address a subscription or call is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractHandle {
    pub name: &'static str,
    pub address: Account,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractsDocument {
    /// Cooldown and admission retry delay, in milliseconds.
    #[serde(rename = "WAIT_TIME", default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<u64>,

    /// Minimum reward, in whole tokens.
    #[serde(rename = "REWARD_LIMIT", default, skip_serializing_if = "Option::is_none")]
    pub reward_limit: Option<u64>,

    #[serde(rename = "solving_rate", default, skip_serializing_if = "Option::is_none")]
    pub solving_rate: Option<f64>,

    #[serde(rename = "NO_AUTO_DEPOSIT", default, skip_serializing_if = "Option::is_none")]
    pub no_auto_deposit: Option<bool>,

    #[serde(flatten)]
    pub contracts: BTreeMap<String, ContractEntry>,
}

impl ContractsDocument {
    pub fn from_json_str(s: &str) -> Result<Self, SolverError> {
        serde_json::from_str(s).map_err(|e| SolverError::Contracts(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, SolverError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SolverError::Contracts(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Required contracts absent from the document.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_CONTRACTS
            .iter()
            .copied()
            .filter(|name| !self.contracts.contains_key(*name))
            .collect()
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SolverError::Contracts(format!(
                "missing contracts: {}",
                missing.join(", ")
            )))
        }
    }

    /// Handle for a contract hosting solver events, if provisioned.
    pub fn handle(&self, contract: Contract) -> Option<ContractHandle> {
        let name = contract.document_name();
        self.contracts.get(name).map(|entry| ContractHandle {
            name,
            address: entry.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{
        "WAIT_TIME": 1500,
        "REWARD_LIMIT": 2,
        "incentiveLayer": { "address": "0x00000000000000000000000000000000000000a1", "abi": [] },
        "interactive": { "address": "0x00000000000000000000000000000000000000a2", "abi": [] },
        "fileSystem": { "address": "0x00000000000000000000000000000000000000a3" },
        "stake": { "address": "0x00000000000000000000000000000000000000a4", "abi": [] }
    }"#;

    #[test]
    fn parses_contracts_and_tunables() {
        let doc = ContractsDocument::from_json_str(DOC).unwrap();
        assert_eq!(doc.wait_time, Some(1500));
        assert_eq!(doc.reward_limit, Some(2));
        assert_eq!(doc.solving_rate, None);
        assert_eq!(doc.contracts.len(), 4);
        assert!(doc.validate().is_ok());

        let handle = doc.handle(Contract::Interactive).unwrap();
        assert_eq!(handle.name, "interactive");
        assert_eq!(handle.address.0[19], 0xa2);
    }

    #[test]
    fn reports_missing_contracts() {
        let doc = ContractsDocument::from_json_str(
            r#"{ "incentiveLayer": { "address": "0x00000000000000000000000000000000000000a1" } }"#,
        )
        .unwrap();
        assert_eq!(doc.missing(), vec!["interactive", "fileSystem", "stake"]);
        assert!(matches!(doc.validate(), Err(SolverError::Contracts(_))));
        assert!(doc.handle(Contract::Interactive).is_none());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        let doc = ContractsDocument::from_file(file.path()).unwrap();
        assert!(doc.handle(Contract::IncentiveLayer).is_some());
    }

    #[test]
    fn missing_file_is_a_contracts_error() {
        let result = ContractsDocument::from_file(Path::new("/nonexistent/private.json"));
        match result {
            Err(SolverError::Contracts(msg)) => assert!(msg.starts_with("/nonexistent/private.json: ")),
            other => panic!("expected a contracts error, got {other:?}"),
        }
    }
}
