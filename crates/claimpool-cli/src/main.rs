//! Claimpool CLI
//!
//! Drives a pool persisted in a JSON state file, backed by the in-memory
//! asset ledger.

mod store;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use claimpool_core::{
    AccountId, Amount, ClaimId, ClaimPool, ClaimReason, DisputeRuling, InMemoryLedger, PoolState,
    Transfer, TransferDirection,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use store::{expand_path, load_config, StateFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "claimpool")]
#[command(version)]
#[command(about = "Claimpool - pooled collateral insurance for service delivery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State file
    #[arg(short, long, global = true, env = "CLAIMPOOL_STATE", default_value = "claimpool.json")]
    state: PathBuf,

    /// Clock override, unix seconds
    #[arg(long, global = true)]
    now: Option<i64>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new state file
    Init {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Initial emergency pool
        #[arg(long, default_value = "0")]
        emergency: Amount,

        /// Initial platform fund
        #[arg(long, default_value = "0")]
        platform: Amount,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Mint wallet funds in the in-memory ledger
    Fund { account: AccountId, amount: Amount },

    /// Register or reactivate a provider
    Register { provider: AccountId, amount: Amount },

    /// Add collateral
    Deposit { provider: AccountId, amount: Amount },

    /// Withdraw unlocked collateral
    Withdraw { provider: AccountId, amount: Amount },

    /// Withdraw everything and deactivate
    WithdrawAll { provider: AccountId },

    /// Open a claim
    Claim {
        client: AccountId,
        claim_id: ClaimId,
        provider: AccountId,
        amount: Amount,

        #[arg(short, long, default_value = "not-delivered")]
        reason: ClaimReason,
    },

    /// Execute a claim after its dispute window
    Execute { claim_id: ClaimId },

    /// Dispute a claim as its provider
    Dispute {
        claim_id: ClaimId,
        provider: AccountId,

        /// Evidence text
        #[arg(short, long, default_value = "")]
        evidence: String,

        /// Evidence file, read as bytes
        #[arg(long, conflicts_with = "evidence")]
        evidence_file: Option<PathBuf>,
    },

    /// Resolve a dispute as the configured arbiter
    Resolve {
        claim_id: ClaimId,
        arbiter: AccountId,
        ruling: Ruling,
    },

    /// Show a provider
    Provider { provider: AccountId },

    /// Show a claim
    ClaimInfo { claim_id: ClaimId },

    /// Show delayed compensation owed by a provider
    Pending { provider: AccountId },

    /// Check whether a claim of `amount` would be paid now
    Quote { provider: AccountId, amount: Amount },

    /// Show global pool totals and ledger custody
    Totals,

    /// Verify the accounting invariants
    Audit,
}

#[derive(Clone, Copy, ValueEnum)]
enum Ruling {
    /// Claim rejected
    Provider,
    /// Claim reopened and payable
    Client,
}

impl From<Ruling> for DisputeRuling {
    fn from(ruling: Ruling) -> Self {
        match ruling {
            Ruling::Provider => DisputeRuling::ProviderUpheld,
            Ruling::Client => DisputeRuling::ClientUpheld,
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_transfers(transfers: &[Transfer]) {
    if transfers.is_empty() {
        println!("ok (no transfers)");
    }
    for t in transfers {
        let arrow = match t.direction {
            TransferDirection::In => "in ",
            TransferDirection::Out => "out",
        };
        println!("{} {} {}", arrow, t.amount, t.account.to_hex());
    }
}

/// Load the pool, run one mutating operation, persist on success
fn mutate<F>(path: &Path, op: F) -> anyhow::Result<()>
where
    F: FnOnce(&ClaimPool<InMemoryLedger>) -> claimpool_core::Result<Vec<Transfer>>,
{
    let pool = StateFile::load(path)?.into_pool();
    let transfers = op(&pool)?;
    StateFile::from_pool(pool).save(path)?;
    print_transfers(&transfers);
    Ok(())
}

fn query<R>(path: &Path, f: impl FnOnce(&PoolState, &InMemoryLedger) -> R) -> anyhow::Result<R> {
    let file = StateFile::load(path)?;
    Ok(f(&file.state, &file.ledger))
}

#[derive(Serialize)]
struct ClaimView {
    #[serde(flatten)]
    claim: claimpool_core::Claim,
    evidence_hex: Option<String>,
}

#[derive(Serialize)]
struct TotalsView {
    #[serde(flatten)]
    totals: claimpool_core::LedgerTotals,
    custody: Amount,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let path = expand_path(&cli.state);
    let now = cli.now.unwrap_or_else(|| chrono::Utc::now().timestamp());

    match cli.command {
        Commands::Init { config, emergency, platform, force } => {
            if path.exists() && !force {
                anyhow::bail!("state file {:?} already exists (use --force to overwrite)", path);
            }
            let config = load_config(config.map(|p| expand_path(&p)).as_deref())?;
            let mut file = StateFile::new(config);
            file.state = file.state.with_reserves(emergency, platform);
            file.ledger.fund_custody(emergency.saturating_add(platform));
            file.save(&path)?;
            tracing::info!("Initialized pool state at {:?}", path);
        }

        Commands::Config => {
            let config = query(&path, |state, _| state.config().clone())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Fund { account, amount } => {
            let mut file = StateFile::load(&path)?;
            file.ledger.fund(account, amount);
            file.save(&path)?;
            println!("{} {}", account.to_hex(), file.ledger.balance_of(&account));
        }

        Commands::Register { provider, amount } => {
            mutate(&path, |pool| pool.register_or_reactivate(provider, amount, now))?;
        }

        Commands::Deposit { provider, amount } => {
            mutate(&path, |pool| pool.deposit_additional(provider, amount))?;
        }

        Commands::Withdraw { provider, amount } => {
            mutate(&path, |pool| pool.withdraw(provider, amount))?;
        }

        Commands::WithdrawAll { provider } => {
            mutate(&path, |pool| pool.withdraw_all_and_deactivate(provider))?;
        }

        Commands::Claim { client, claim_id, provider, amount, reason } => {
            mutate(&path, |pool| {
                pool.initiate_claim(client, claim_id, provider, amount, reason, now)
            })?;
        }

        Commands::Execute { claim_id } => {
            mutate(&path, |pool| pool.execute_claim(claim_id, now))?;
        }

        Commands::Dispute { claim_id, provider, evidence, evidence_file } => {
            let evidence = match evidence_file {
                Some(file) => std::fs::read(&file)
                    .with_context(|| format!("reading evidence {:?}", file))?,
                None => evidence.into_bytes(),
            };
            mutate(&path, |pool| pool.dispute_claim(claim_id, provider, &evidence, now))?;
        }

        Commands::Resolve { claim_id, arbiter, ruling } => {
            mutate(&path, |pool| pool.resolve_dispute(claim_id, arbiter, ruling.into(), now))?;
        }

        Commands::Provider { provider } => {
            let info = query(&path, |state, _| state.provider_info(&provider))?
                .with_context(|| format!("provider {} not found", provider))?;
            print_json(&info)?;
        }

        Commands::ClaimInfo { claim_id } => {
            let claim = query(&path, |state, _| state.claim_info(&claim_id).cloned())?
                .with_context(|| format!("claim {} not found", claim_id))?;
            let evidence_hex = claim.evidence_hash.map(hex::encode);
            print_json(&ClaimView { claim, evidence_hex })?;
        }

        Commands::Pending { provider } => {
            let pending = query(&path, |state, _| state.pending_compensations(&provider))?;
            print_json(&pending)?;
        }

        Commands::Quote { provider, amount } => {
            let (accepted, reason) =
                query(&path, |state, _| state.can_accept_service(&provider, amount))?;
            println!("{}: {}", if accepted { "accept" } else { "refuse" }, reason);
        }

        Commands::Totals => {
            let view = query(&path, |state, ledger| TotalsView {
                totals: state.totals().clone(),
                custody: ledger.custody(),
            })?;
            print_json(&view)?;
        }

        Commands::Audit => {
            query(&path, |state, _| state.audit())??;
            println!("ok");
        }
    }

    Ok(())
}
