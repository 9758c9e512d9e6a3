use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::blockchain::traits::ChainClient;
use crate::core::abi::{EventFilter, LogEvent, MotivationEvent};
use crate::core::errors::DappError;

/// Contract-wide totals computed from its event history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStatistics {
    pub instant_count: usize,
    pub timelocked_count: usize,
    pub timelocked_claim_count: usize,
    pub proof_count: usize,
    pub proof_claim_count: usize,
    pub unique_recipients: usize,
    pub total_instant: U256,
    pub total_timelocked: U256,
    pub total_proof: U256,
    pub timelocked_claimed: U256,
    pub proof_claimed: U256,
}

impl ContractStatistics {
    pub fn from_events(events: &[LogEvent]) -> Self {
        let mut stats = Self::default();
        let mut recipients: HashSet<Address> = HashSet::new();
        for event in events {
            match event.event {
                MotivationEvent::InstantMotivation => {
                    stats.instant_count += 1;
                    stats.total_instant = stats.total_instant.saturating_add(event.amount);
                    recipients.insert(event.recipient);
                }
                MotivationEvent::TimelockedMotivationCreated => {
                    stats.timelocked_count += 1;
                    stats.total_timelocked = stats.total_timelocked.saturating_add(event.amount);
                    recipients.insert(event.recipient);
                }
                MotivationEvent::ProofOfActionMotivationCreated => {
                    stats.proof_count += 1;
                    stats.total_proof = stats.total_proof.saturating_add(event.amount);
                    recipients.insert(event.recipient);
                }
                MotivationEvent::TimelockedMotivationClaimed => {
                    stats.timelocked_claim_count += 1;
                    stats.timelocked_claimed = stats.timelocked_claimed.saturating_add(event.amount);
                }
                MotivationEvent::ProofOfActionClaimed => {
                    stats.proof_claim_count += 1;
                    stats.proof_claimed = stats.proof_claimed.saturating_add(event.amount);
                }
            }
        }
        stats.unique_recipients = recipients.len();
        stats
    }

    pub fn timelocked_unclaimed(&self) -> U256 {
        self.total_timelocked.saturating_sub(self.timelocked_claimed)
    }

    pub fn proof_unclaimed(&self) -> U256 {
        self.total_proof.saturating_sub(self.proof_claimed)
    }

    /// Value still held by the contract.
    pub fn contract_holds(&self) -> U256 {
        self.timelocked_unclaimed().saturating_add(self.proof_unclaimed())
    }
}

/// Reads every event from genesis to the current head.
pub async fn load_statistics(chain: &dyn ChainClient) -> Result<ContractStatistics, DappError> {
    let head = chain.block_number().await?;
    let mut events = Vec::new();
    for kind in MotivationEvent::ALL {
        events.extend(chain.query_logs(&EventFilter::new(kind), 0, head).await?);
    }
    let stats = ContractStatistics::from_events(&events);
    info!(
        head,
        events = events.len(),
        recipients = stats.unique_recipients,
        "Contract statistics loaded"
    );
    Ok(stats)
}
