// src/main.rs
//! MotivateMe command line client.
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use ethers::types::U256;
use motivate_me::actions::{self, ClaimableKind};
use motivate_me::blockchain::{ContractCall, EthersClient};
use motivate_me::cli::{ClaimCommand, Cli, Commands, CounterCommand};
use motivate_me::core::validation::{checksummed, validate_recipient_address};
use motivate_me::core::{ContractAbi, DappConfig};
use motivate_me::session::{Session, SessionManager};
use motivate_me::tracker::{ActionKind, ActionStatus, ConfirmationTracker};
use motivate_me::utils::{format_eth, short_address};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Signing key for the connected account. Read here only, never logged.
const ENV_PRIVATE_KEY: &str = "MOTIVATE_PRIVATE_KEY";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    info!("Starting MotivateMe client v{}", env!("CARGO_PKG_VERSION"));

    let config = DappConfig::load(cli.config.as_deref(), cli.contract.as_deref())?;
    let abi = ContractAbi::load(config.abi_path.as_deref())?;
    if !abi.has_motivation_events() {
        warn!("Loaded ABI declares no MotivateMe events, only counter commands will work");
    }

    let private_key = std::env::var(ENV_PRIVATE_KEY)
        .map_err(|_| anyhow::anyhow!("{} is not set", ENV_PRIVATE_KEY))?;
    let client =
        Arc::new(EthersClient::connect(&config.network, &private_key, config.contract()?, abi).await?);
    drop(private_key);

    let manager = SessionManager::new(config.network.clone());
    let session = manager.connect(client.clone(), client).await?;
    println!("Connected: {}", session.status_line());

    let tracker = ConfirmationTracker::new(config.tracker.clone(), Arc::new(print_status));
    let me = session.account();

    match cli.command {
        Commands::Balance => {
            let balance = session.wallet().balance().await?;
            println!("Balance: {} ETH", format_eth(balance));
        }
        Commands::Claims => {
            let claims = actions::load_claimable(
                session.chain().as_ref(),
                me,
                config.claims.lookback_blocks,
                Utc::now(),
            )
            .await?;
            if claims.is_empty() {
                println!("You have no claimable motivations at this time.");
            }
            for claim in claims {
                let status = match &claim.kind {
                    ClaimableKind::TimeLocked { is_unlocked: true, .. } => "Ready to claim".to_string(),
                    ClaimableKind::TimeLocked { days_remaining, unlock_date, .. } => {
                        format!("Unlocks {} ({} days)", unlock_date, days_remaining)
                    }
                    ClaimableKind::ProofOfAction { action_required } => {
                        format!("Action required: \"{}\"", action_required)
                    }
                };
                println!(
                    "#{} from {}: {} ETH. {}",
                    claim.index,
                    short_address(&claim.sender),
                    format_eth(claim.amount),
                    status
                );
                if let Some(message) = &claim.message {
                    println!("    \"{}\"", message);
                }
            }
        }
        Commands::Stats => {
            let stats = actions::load_statistics(session.chain().as_ref()).await?;
            println!("Unique recipients:       {}", stats.unique_recipients);
            println!("Instant sent:            {} ETH", format_eth(stats.total_instant));
            println!("Time-locked sent:        {} ETH", format_eth(stats.total_timelocked));
            println!("Proof-of-action sent:    {} ETH", format_eth(stats.total_proof));
            println!("Time-locked unclaimed:   {} ETH", format_eth(stats.timelocked_unclaimed()));
            println!("Proof-of-action unclaimed: {} ETH", format_eth(stats.proof_unclaimed()));
            println!("Contract holds:          {} ETH", format_eth(stats.contract_holds()));
        }
        Commands::Counter { action: CounterCommand::Read } => {
            let value = actions::read_counter(session.chain().as_ref()).await?;
            println!("number = {}", value);
        }
        Commands::Counter { action: CounterCommand::Set { value } } => {
            submit(&tracker, &session, actions::set_number(U256::from(value))).await?;
        }
        Commands::Counter { action: CounterCommand::Increment } => {
            submit(&tracker, &session, actions::increment()).await?;
        }
        Commands::Send { kind } => {
            let (kind, form) = kind.to_form();
            let call = form.into_call(kind, me, Utc::now())?;
            submit(&tracker, &session, call).await?;
        }
        Commands::Claim { kind } => {
            let call = match kind {
                ClaimCommand::Timelocked { sender, index } => {
                    let sender = validate_recipient_address(&sender)?;
                    actions::claim_timelocked(me, sender, U256::from(index))
                }
                ClaimCommand::Proof { sender, index, proof } => {
                    let sender = validate_recipient_address(&sender)?;
                    actions::claim_proof_of_action(me, sender, U256::from(index), &proof)?
                }
            };
            submit(&tracker, &session, call).await?;
        }
    }

    manager.disconnect();
    Ok(())
}

/// Runs one write through the tracker. Ctrl-C abandons the session.
async fn submit(tracker: &ConfirmationTracker, session: &Session, call: ContractCall) -> Result<()> {
    let kind = call.kind;
    let result = tokio::select! {
        result = tracker.execute(session, call) => result,
        _ = tokio::signal::ctrl_c() => {
            session.invalidate();
            println!("Cancelled. If you already confirmed, check your claims or balance.");
            return Ok(());
        }
    };

    let outcome = result?;
    println!("{}", outcome.user_message(kind));
    if outcome.is_success() {
        println!("Account: {}", checksummed(&session.account()));
    }
    Ok(())
}

fn print_status(_kind: ActionKind, status: &ActionStatus) {
    match status {
        ActionStatus::Idle => {}
        ActionStatus::Submitted { tx_hash } => println!("{} (tx {:?})", status.label(), tx_hash),
        _ => println!("{}", status.label()),
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,motivate_me=info"));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(false).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
