//! Contract call builders and read-side helpers.
//!
//! Every builder attaches the event the call is expected to emit so the tracker
//! can confirm it from the logs when the node's reply is unusable.

pub mod claims;
pub mod stats;

use chrono::{DateTime, Utc};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::blockchain::traits::{ChainClient, ContractCall};
use crate::core::abi::{EventFilter, MotivationEvent};
use crate::core::errors::DappError;
use crate::core::validation;
use crate::tracker::types::ActionKind;

pub use claims::{load_claimable, ClaimableKind, ClaimableMotivation};
pub use stats::{load_statistics, ContractStatistics};

/// Which motivation the form creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotivationType {
    Instant,
    TimeLocked,
    ProofOfAction,
}

/// Raw user input for a new motivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotivationForm {
    pub recipient: String,
    pub amount: String,
    /// `YYYY-MM-DD`, time-locked only.
    pub unlock_date: Option<String>,
    /// Free text; for proof-of-action this is the required action.
    pub message: String,
}

impl MotivationForm {
    /// Validates the form in display order and builds the call.
    pub fn into_call(
        &self,
        kind: MotivationType,
        sender: Address,
        now: DateTime<Utc>,
    ) -> Result<ContractCall, DappError> {
        let recipient = validation::validate_recipient_address(&self.recipient)?;
        let value = validation::parse_eth_amount(&self.amount)?;
        match kind {
            MotivationType::Instant => Ok(instant_motivation(
                sender,
                recipient,
                value,
                &validation::normalize_message(&self.message),
            )),
            MotivationType::TimeLocked => {
                let unlock =
                    validation::parse_unlock_date(self.unlock_date.as_deref().unwrap_or(""), now)?;
                Ok(timelocked_motivation(
                    sender,
                    recipient,
                    value,
                    unlock,
                    &validation::normalize_message(&self.message),
                ))
            }
            MotivationType::ProofOfAction => {
                let action = validation::require_action_description(&self.message)?;
                Ok(proof_of_action_motivation(sender, recipient, value, &action, None))
            }
        }
    }
}

pub fn instant_motivation(
    sender: Address,
    recipient: Address,
    value: U256,
    message: &str,
) -> ContractCall {
    ContractCall {
        kind: ActionKind::DirectTransfer,
        function: "instantMotivation".to_string(),
        args: vec![Token::Address(recipient), Token::String(message.to_string())],
        value,
        confirmation_event: Some(EventFilter::new(MotivationEvent::InstantMotivation).sender(sender)),
    }
}

pub fn timelocked_motivation(
    sender: Address,
    recipient: Address,
    value: U256,
    unlock_timestamp: u64,
    message: &str,
) -> ContractCall {
    ContractCall {
        kind: ActionKind::TimeLockedDeposit,
        function: "timelockedMotivation".to_string(),
        args: vec![
            Token::Address(recipient),
            Token::Uint(U256::from(unlock_timestamp)),
            Token::String(message.to_string()),
        ],
        value,
        confirmation_event: Some(
            EventFilter::new(MotivationEvent::TimelockedMotivationCreated).sender(sender),
        ),
    }
}

/// `message` defaults to the action text.
pub fn proof_of_action_motivation(
    sender: Address,
    recipient: Address,
    value: U256,
    action_required: &str,
    message: Option<&str>,
) -> ContractCall {
    ContractCall {
        kind: ActionKind::ConditionalDeposit,
        function: "proofOfActionMotivation".to_string(),
        args: vec![
            Token::Address(recipient),
            Token::String(action_required.to_string()),
            Token::String(message.unwrap_or(action_required).to_string()),
        ],
        value,
        confirmation_event: Some(
            EventFilter::new(MotivationEvent::ProofOfActionMotivationCreated).sender(sender),
        ),
    }
}

/// `claimer` is the connected account, `sender` who created the motivation.
pub fn claim_timelocked(claimer: Address, sender: Address, index: U256) -> ContractCall {
    ContractCall {
        kind: ActionKind::ClaimTimeLocked,
        function: "claimTimelockedMotivation".to_string(),
        args: vec![Token::Address(sender), Token::Uint(index)],
        value: U256::zero(),
        confirmation_event: Some(
            EventFilter::new(MotivationEvent::TimelockedMotivationClaimed)
                .recipient(claimer)
                .sender(sender),
        ),
    }
}

pub fn claim_proof_of_action(
    claimer: Address,
    sender: Address,
    index: U256,
    proof: &str,
) -> Result<ContractCall, DappError> {
    let proof = validation::require_proof(proof)?;
    Ok(ContractCall {
        kind: ActionKind::ClaimConditional,
        function: "claimProofOfAction".to_string(),
        args: vec![Token::Address(sender), Token::Uint(index), Token::String(proof)],
        value: U256::zero(),
        confirmation_event: Some(
            EventFilter::new(MotivationEvent::ProofOfActionClaimed)
                .recipient(claimer)
                .sender(sender),
        ),
    })
}

pub fn set_number(value: U256) -> ContractCall {
    ContractCall {
        kind: ActionKind::GenericWrite,
        function: "setNumber".to_string(),
        args: vec![Token::Uint(value)],
        value: U256::zero(),
        confirmation_event: None,
    }
}

pub fn increment() -> ContractCall {
    ContractCall {
        kind: ActionKind::GenericWrite,
        function: "increment".to_string(),
        args: vec![],
        value: U256::zero(),
        confirmation_event: None,
    }
}

/// Current value of the counter.
pub async fn read_counter(chain: &dyn ChainClient) -> Result<U256, DappError> {
    let output = chain.call("number", vec![]).await?;
    match output.first() {
        Some(Token::Uint(value)) => Ok(*value),
        other => Err(DappError::AbiError(format!("unexpected number() output: {:?}", other))),
    }
}
