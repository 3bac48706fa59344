//! Solver configuration with TOML file support.
//!
//! Operator tunables can come from three places. Precedence, highest first:
//! command-line overrides, the TOML file, the contracts document, then the
//! built-in default. [`SolverConfig::resolve`] folds them into the
//! [`SolverSettings`] the running solver reads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vsolve_types::{Account, Amount, NetworkId};

use crate::{ContractsDocument, SolverError};

/// Configuration for a solver process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Account the solver registers and submits as.
    #[serde(default)]
    pub account: Option<Account>,

    /// Directory holding one `<network>.json` contracts document per network.
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,

    /// Explicit contracts document, overriding `contracts_dir`.
    #[serde(default)]
    pub contracts_file: Option<PathBuf>,

    /// File holding the hex-encoded key per-task secrets are derived from.
    #[serde(default)]
    pub secret_key_file: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Blocks of history to replay on startup; 0 starts live.
    #[serde(default)]
    pub recovery_blocks: u64,

    /// Tracked-task count above which new tasks are declined.
    #[serde(default)]
    pub throttle: Option<usize>,

    #[serde(default)]
    pub wait_time_ms: Option<u64>,

    /// Minimum reward, in whole tokens.
    #[serde(default)]
    pub reward_limit: Option<u64>,

    /// Probability of accepting an otherwise admissible task.
    #[serde(default)]
    pub solving_rate: Option<f64>,

    #[serde(default)]
    pub no_auto_deposit: Option<bool>,
}

/// Command-line overrides; `None` defers to the lower layers.
#[derive(Clone, Debug, Default)]
pub struct SettingsOverrides {
    pub account: Option<Account>,
    pub wait_time_ms: Option<u64>,
    pub reward_limit: Option<u64>,
    pub solving_rate: Option<f64>,
    pub no_auto_deposit: Option<bool>,
    pub throttle: Option<usize>,
    pub recovery_blocks: Option<u64>,
}

/// Effective settings of a running solver.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverSettings {
    pub account: Account,
    /// Admission retry delay and per-entity cooldown; zero disables both.
    pub wait_time: Duration,
    pub reward_limit: Amount,
    /// `None` disables the random admission filter.
    pub solving_rate: Option<f64>,
    pub auto_deposit: bool,
    pub throttle: Option<usize>,
    pub tick_interval: Duration,
    /// Blocks of history to replay on startup; 0 starts live.
    pub recovery_blocks: u64,
}

impl SolverSettings {
    /// Settings with every tunable at its default.
    pub fn new(account: Account) -> Self {
        Self {
            account,
            wait_time: Duration::ZERO,
            reward_limit: Amount::ZERO,
            solving_rate: None,
            auto_deposit: true,
            throttle: None,
            tick_interval: Duration::from_millis(default_tick_interval_ms()),
            recovery_blocks: 0,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Private
}

fn default_contracts_dir() -> PathBuf {
    PathBuf::from("./contracts")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    2_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SolverConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, SolverError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SolverError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SolverError> {
        toml::from_str(s).map_err(|e| SolverError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, SolverError> {
        toml::to_string_pretty(self).map_err(|e| SolverError::Config(e.to_string()))
    }

    /// Location of the contracts document for the configured network.
    pub fn contracts_path(&self) -> PathBuf {
        match &self.contracts_file {
            Some(path) => path.clone(),
            None => self.contracts_dir.join(self.network.contracts_file_name()),
        }
    }

    /// Fold overrides, this file and the contracts document into settings.
    pub fn resolve(
        &self,
        contracts: &ContractsDocument,
        overrides: &SettingsOverrides,
    ) -> Result<SolverSettings, SolverError> {
        let account = overrides
            .account
            .or(self.account)
            .ok_or_else(|| SolverError::Config("no solver account configured".into()))?;

        let wait_time_ms = overrides
            .wait_time_ms
            .or(self.wait_time_ms)
            .or(contracts.wait_time)
            .unwrap_or(0);
        let reward_limit = overrides
            .reward_limit
            .or(self.reward_limit)
            .or(contracts.reward_limit)
            .unwrap_or(0);
        let solving_rate = overrides
            .solving_rate
            .or(self.solving_rate)
            .or(contracts.solving_rate);
        if let Some(rate) = solving_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SolverError::Config(format!(
                    "solving_rate {rate} is outside [0, 1]"
                )));
            }
        }
        let no_auto_deposit = overrides
            .no_auto_deposit
            .or(self.no_auto_deposit)
            .or(contracts.no_auto_deposit)
            .unwrap_or(false);
        if self.tick_interval_ms == 0 {
            return Err(SolverError::Config("tick_interval_ms must be positive".into()));
        }

        Ok(SolverSettings {
            account,
            wait_time: Duration::from_millis(wait_time_ms),
            reward_limit: Amount::from_whole_tokens(reward_limit),
            solving_rate,
            auto_deposit: !no_auto_deposit,
            throttle: overrides.throttle.or(self.throttle),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            recovery_blocks: overrides.recovery_blocks.unwrap_or(self.recovery_blocks),
        })
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            account: None,
            contracts_dir: default_contracts_dir(),
            contracts_file: None,
            secret_key_file: None,
            log_format: default_log_format(),
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval_ms(),
            recovery_blocks: 0,
            throttle: None,
            wait_time_ms: None,
            reward_limit: None,
            solving_rate: None,
            no_auto_deposit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ACCOUNT: &str = "0x00000000000000000000000000000000000000c0";

    fn account() -> Account {
        ACCOUNT.parse().unwrap()
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SolverConfig {
            account: Some(account()),
            ..SolverConfig::default()
        };
        let toml_str = config.to_toml_string().unwrap();
        let parsed = SolverConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.account, config.account);
        assert_eq!(parsed.tick_interval_ms, 2_000);
        assert_eq!(parsed.network, NetworkId::Private);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = SolverConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.log_format, "human");
        assert_eq!(config.recovery_blocks, 0);
        assert_eq!(config.contracts_path(), PathBuf::from("./contracts/private.json"));
    }

    #[test]
    fn contracts_file_overrides_directory() {
        let config = SolverConfig::from_toml_str(
            r#"
            network = "goerli"
            contracts_file = "/etc/vsolve/goerli.json"
        "#,
        )
        .unwrap();
        assert_eq!(config.contracts_path(), PathBuf::from("/etc/vsolve/goerli.json"));
    }

    #[test]
    fn precedence_is_cli_then_toml_then_document() {
        let config = SolverConfig {
            account: Some(account()),
            wait_time_ms: Some(200),
            ..SolverConfig::default()
        };
        let doc = ContractsDocument {
            wait_time: Some(100),
            reward_limit: Some(3),
            no_auto_deposit: Some(true),
            ..ContractsDocument::default()
        };

        let settings = config.resolve(&doc, &SettingsOverrides::default()).unwrap();
        assert_eq!(settings.wait_time, Duration::from_millis(200));
        assert_eq!(settings.reward_limit, Amount::from_whole_tokens(3));
        assert!(!settings.auto_deposit);

        let overrides = SettingsOverrides {
            wait_time_ms: Some(300),
            no_auto_deposit: Some(false),
            ..SettingsOverrides::default()
        };
        let settings = config.resolve(&doc, &overrides).unwrap();
        assert_eq!(settings.wait_time, Duration::from_millis(300));
        assert!(settings.auto_deposit);
    }

    #[test]
    fn resolve_requires_an_account() {
        let result = SolverConfig::default().resolve(
            &ContractsDocument::default(),
            &SettingsOverrides::default(),
        );
        assert!(matches!(result, Err(SolverError::Config(_))));
    }

    #[test]
    fn resolve_rejects_out_of_range_solving_rate() {
        let config = SolverConfig {
            account: Some(account()),
            solving_rate: Some(1.5),
            ..SolverConfig::default()
        };
        let result = config.resolve(&ContractsDocument::default(), &SettingsOverrides::default());
        assert!(matches!(result, Err(SolverError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "account = \"{ACCOUNT}\"\nthrottle = 4").unwrap();
        let config = SolverConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.account, Some(account()));
        assert_eq!(config.throttle, Some(4));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = SolverConfig::from_toml_file(Path::new("/nonexistent/vsolve.toml"));
        match result {
            Err(SolverError::Config(msg)) => assert!(msg.starts_with("/nonexistent/vsolve.toml: ")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }
}
