//! vsolve: operator command line for the solver.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};

use vsolve_crypto::{hash_secret, SecretKey};
use vsolve_solver::{
    init_logging, ContractsDocument, LogFormat, RecoveryPlan, SettingsOverrides, SolverConfig,
    SolverSettings,
};
use vsolve_types::{Account, EventRecord, NetworkId, TaskId};

#[derive(Parser)]
#[command(name = "vsolve", about = "Verifiable computation solver")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "VSOLVE_CONFIG")]
    config: Option<PathBuf>,

    /// Network whose contracts document to load: "main", "goerli" or "private".
    #[arg(long, env = "VSOLVE_NETWORK")]
    network: Option<NetworkId>,

    /// Contracts document, overriding the per-network file.
    #[arg(long, env = "VSOLVE_CONTRACTS")]
    contracts: Option<PathBuf>,

    /// Solver account.
    #[arg(long, env = "VSOLVE_ACCOUNT")]
    account: Option<Account>,

    /// Cooldown and admission retry delay, in milliseconds.
    #[arg(long, env = "VSOLVE_WAIT_TIME_MS")]
    wait_time_ms: Option<u64>,

    /// Minimum task reward, in whole tokens.
    #[arg(long, env = "VSOLVE_REWARD_LIMIT")]
    reward_limit: Option<u64>,

    /// Probability of registering for an eligible task, in [0, 1].
    #[arg(long, env = "VSOLVE_SOLVING_RATE")]
    solving_rate: Option<f64>,

    /// Do not post a deposit before registering.
    #[arg(long, env = "VSOLVE_NO_AUTO_DEPOSIT")]
    no_auto_deposit: bool,

    /// Stop registering once more than this many tasks are tracked.
    #[arg(long, env = "VSOLVE_THROTTLE")]
    throttle: Option<usize>,

    /// Blocks of history to replay on startup.
    #[arg(long, env = "VSOLVE_RECOVERY_BLOCKS")]
    recovery_blocks: Option<u64>,

    /// Log format: "human" or "json".
    #[arg(long, env = "VSOLVE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "VSOLVE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Inspect the contracts document.
    Contracts {
        #[command(subcommand)]
        action: ContractsAction,
    },
    /// Analyse recorded event logs offline.
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },
    /// Work with the local secret key.
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the merged configuration file as TOML.
    Show,
    /// Resolve the configuration against the contracts document and print
    /// the effective solver settings.
    Validate,
}

#[derive(clap::Subcommand)]
enum ContractsAction {
    /// Check that every required contract is present.
    Check,
}

#[derive(clap::Subcommand)]
enum RecoveryAction {
    /// Print the replay plan for a JSON-lines event log.
    Inspect {
        /// One event record per line.
        #[arg(long)]
        events: PathBuf,
    },
}

#[derive(clap::Subcommand)]
enum SecretAction {
    /// Print the registration hash derived for a task.
    Hash {
        #[arg(long)]
        task: TaskId,
    },
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            account: self.account,
            wait_time_ms: self.wait_time_ms,
            reward_limit: self.reward_limit,
            solving_rate: self.solving_rate,
            no_auto_deposit: self.no_auto_deposit.then_some(true),
            throttle: self.throttle,
            recovery_blocks: self.recovery_blocks,
        }
    }

    /// Configuration file merged with the file-level CLI flags.
    fn load_config(&self) -> anyhow::Result<SolverConfig> {
        let mut config = match &self.config {
            Some(path) => SolverConfig::from_toml_file(path)?,
            None => SolverConfig::default(),
        };
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(contracts) = &self.contracts {
            config.contracts_file = Some(contracts.clone());
        }
        if let Some(account) = self.account {
            config.account = Some(account);
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    match &cli.command {
        Command::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml_string()?);
            }
            ConfigAction::Validate => {
                let contracts = load_contracts(&config)?;
                let settings = config.resolve(&contracts, &cli.overrides())?;
                print_settings(&settings);
            }
        },
        Command::Contracts { action } => match action {
            ContractsAction::Check => {
                let contracts = load_contracts(&config)?;
                let missing = contracts.missing();
                for (name, entry) in &contracts.contracts {
                    println!("{name:<16} {}", entry.address);
                }
                if !missing.is_empty() {
                    anyhow::bail!("missing contracts: {}", missing.join(", "));
                }
                println!("all required contracts present");
            }
        },
        Command::Recovery { action } => match action {
            RecoveryAction::Inspect { events } => {
                let account = config
                    .account
                    .context("an account is needed to tell this solver's events apart")?;
                let records = read_events(events)?;
                let plan = RecoveryPlan::analyze(account, &records);
                tracing::info!(
                    events = records.len(),
                    open_tasks = plan.open_tasks.len(),
                    open_games = plan.open_games.len(),
                    "recovery plan computed"
                );
                println!("{}", serde_json::to_string_pretty(&plan)?);
            }
        },
        Command::Secret { action } => match action {
            SecretAction::Hash { task } => {
                let key = load_secret_key(&config)?;
                let secret = key.task_secret(task)?;
                println!("{}", hash_secret(&secret));
            }
        },
    }
    Ok(())
}

fn load_contracts(config: &SolverConfig) -> anyhow::Result<ContractsDocument> {
    let path = config.contracts_path();
    let contracts = ContractsDocument::from_file(&path)?;
    tracing::info!(path = %path.display(), contracts = contracts.contracts.len(), "loaded contracts document");
    Ok(contracts)
}

fn load_secret_key(config: &SolverConfig) -> anyhow::Result<SecretKey> {
    let path = config
        .secret_key_file
        .as_deref()
        .context("secret_key_file is not configured")?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading secret key {}", path.display()))?;
    Ok(SecretKey::from_hex(&content)?)
}

/// Read a JSON-lines event log, ordered by emission position.
fn read_events(path: &Path) -> anyhow::Result<Vec<EventRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading event log {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: EventRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed event", path.display(), n + 1))?;
        records.push(record);
    }
    records.sort_by_key(|record| record.position);
    Ok(records)
}

fn print_settings(settings: &SolverSettings) {
    println!("account          {}", settings.account);
    println!("wait_time_ms     {}", settings.wait_time.as_millis());
    println!("reward_limit     {}", settings.reward_limit);
    match settings.solving_rate {
        Some(rate) => println!("solving_rate     {rate}"),
        None => println!("solving_rate     off"),
    }
    println!("auto_deposit     {}", settings.auto_deposit);
    match settings.throttle {
        Some(limit) => println!("throttle         {limit}"),
        None => println!("throttle         off"),
    }
    println!("tick_interval_ms {}", settings.tick_interval.as_millis());
    println!("recovery_blocks  {}", settings.recovery_blocks);
}
