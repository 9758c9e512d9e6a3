use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::{MotivationForm, MotivationType};

/// MotivateMe CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "motivate", about = "Send and claim motivations on Ink", version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Use this contract instead of the configured one
    #[arg(long, global = true)]
    pub contract: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a motivation
    Send {
        #[command(subcommand)]
        kind: SendCommand,
    },
    /// Claim a motivation sent to you
    Claim {
        #[command(subcommand)]
        kind: ClaimCommand,
    },
    /// List motivations you can claim
    Claims,
    /// Contract-wide statistics
    Stats,
    Counter {
        #[command(subcommand)]
        action: CounterCommand,
    },
    Balance,
}

#[derive(Debug, Subcommand)]
pub enum SendCommand {
    Instant {
        #[arg(long)]
        to: String,
        /// ETH amount, e.g. 0.01
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    Timelocked {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        /// YYYY-MM-DD (UTC)
        #[arg(long)]
        unlock: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    Proof {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        /// What the recipient has to do
        #[arg(long)]
        action: String,
    },
}

impl SendCommand {
    pub fn to_form(&self) -> (MotivationType, MotivationForm) {
        match self {
            SendCommand::Instant { to, amount, message } => (
                MotivationType::Instant,
                MotivationForm {
                    recipient: to.clone(),
                    amount: amount.clone(),
                    unlock_date: None,
                    message: message.clone(),
                },
            ),
            SendCommand::Timelocked { to, amount, unlock, message } => (
                MotivationType::TimeLocked,
                MotivationForm {
                    recipient: to.clone(),
                    amount: amount.clone(),
                    unlock_date: Some(unlock.clone()),
                    message: message.clone(),
                },
            ),
            SendCommand::Proof { to, amount, action } => (
                MotivationType::ProofOfAction,
                MotivationForm {
                    recipient: to.clone(),
                    amount: amount.clone(),
                    unlock_date: None,
                    message: action.clone(),
                },
            ),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ClaimCommand {
    Timelocked {
        /// Who sent the motivation
        #[arg(long)]
        sender: String,
        #[arg(long)]
        index: u64,
    },
    Proof {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        index: u64,
        /// What you did
        #[arg(long)]
        proof: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CounterCommand {
    Read,
    Set { value: u64 },
    Increment,
}
