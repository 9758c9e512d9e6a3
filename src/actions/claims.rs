use chrono::{DateTime, Utc};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blockchain::traits::ChainClient;
use crate::core::abi::{EventFilter, LogEvent, MotivationEvent};
use crate::core::errors::DappError;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimableKind {
    TimeLocked {
        unlock_timestamp: u64,
        /// `YYYY-MM-DD` (UTC).
        unlock_date: String,
        is_unlocked: bool,
        /// Rounded up; zero or negative once unlocked.
        days_remaining: i64,
    },
    ProofOfAction {
        action_required: String,
    },
}

/// A motivation addressed to the connected account that can still be claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableMotivation {
    pub sender: Address,
    pub index: U256,
    pub amount: U256,
    pub message: Option<String>,
    pub kind: ClaimableKind,
}

impl ClaimableMotivation {
    pub fn is_claimable_now(&self) -> bool {
        match &self.kind {
            ClaimableKind::TimeLocked { is_unlocked, .. } => *is_unlocked,
            ClaimableKind::ProofOfAction { .. } => true,
        }
    }
}

/// Unclaimed motivations sent to `me` within the last `lookback_blocks` blocks,
/// time-locked first. Each candidate is re-checked against contract storage.
pub async fn load_claimable(
    chain: &dyn ChainClient,
    me: Address,
    lookback_blocks: u64,
    now: DateTime<Utc>,
) -> Result<Vec<ClaimableMotivation>, DappError> {
    let head = chain.block_number().await?;
    let from = head.saturating_sub(lookback_blocks);
    debug!(from, head, "Querying claimable motivations");

    let timelocked = chain
        .query_logs(
            &EventFilter::new(MotivationEvent::TimelockedMotivationCreated).recipient(me),
            from,
            head,
        )
        .await?;
    let proofs = chain
        .query_logs(
            &EventFilter::new(MotivationEvent::ProofOfActionMotivationCreated).recipient(me),
            from,
            head,
        )
        .await?;

    let locks = join_all(timelocked.iter().map(|e| time_lock(chain, me, e, now))).await;
    let actions = join_all(proofs.iter().map(|e| proof_of_action(chain, me, e))).await;

    let mut claims = Vec::new();
    for entry in locks.into_iter().chain(actions) {
        match entry {
            Ok(Some(claim)) => claims.push(claim),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping motivation that could not be read"),
        }
    }
    info!(count = claims.len(), "Claimable motivations loaded");
    Ok(claims)
}

async fn time_lock(
    chain: &dyn ChainClient,
    me: Address,
    event: &LogEvent,
    now: DateTime<Utc>,
) -> Result<Option<ClaimableMotivation>, DappError> {
    let index = event_index(event)?;
    let out = chain
        .call("timeLocks", vec![Token::Address(me), Token::Address(event.sender), Token::Uint(index)])
        .await?;
    let amount = uint_at(&out, 0)?;
    let unlock_timestamp = u64::try_from(uint_at(&out, 1)?).unwrap_or(u64::MAX);
    if amount.is_zero() || bool_at(&out, 2)? {
        return Ok(None);
    }

    let unlock_secs = i64::try_from(unlock_timestamp).unwrap_or(i64::MAX);
    let remaining = unlock_secs.saturating_sub(now.timestamp());
    let unlock_date = DateTime::<Utc>::from_timestamp(unlock_secs, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    Ok(Some(ClaimableMotivation {
        sender: event.sender,
        index,
        amount,
        message: event.message.clone(),
        kind: ClaimableKind::TimeLocked {
            unlock_timestamp,
            unlock_date,
            is_unlocked: remaining <= 0,
            days_remaining: div_ceil(remaining, SECONDS_PER_DAY),
        },
    }))
}

async fn proof_of_action(
    chain: &dyn ChainClient,
    me: Address,
    event: &LogEvent,
) -> Result<Option<ClaimableMotivation>, DappError> {
    let index = event_index(event)?;
    let out = chain
        .call(
            "proofOfActions",
            vec![Token::Address(me), Token::Address(event.sender), Token::Uint(index)],
        )
        .await?;
    let amount = uint_at(&out, 0)?;
    let action_required = match out.get(1) {
        Some(Token::String(s)) => s.clone(),
        other => return Err(unexpected("proofOfActions", other)),
    };
    if amount.is_zero() || bool_at(&out, 2)? {
        return Ok(None);
    }

    // the message only adds something when it differs from the action text
    let message = event.message.clone().filter(|m| Some(m) != event.action_required.as_ref());
    Ok(Some(ClaimableMotivation {
        sender: event.sender,
        index,
        amount,
        message,
        kind: ClaimableKind::ProofOfAction { action_required },
    }))
}

fn event_index(event: &LogEvent) -> Result<U256, DappError> {
    event
        .index
        .ok_or_else(|| DappError::AbiError(format!("{} event without index", event.event.name())))
}

fn uint_at(tokens: &[Token], i: usize) -> Result<U256, DappError> {
    match tokens.get(i) {
        Some(Token::Uint(v)) => Ok(*v),
        other => Err(unexpected("uint", other)),
    }
}

fn bool_at(tokens: &[Token], i: usize) -> Result<bool, DappError> {
    match tokens.get(i) {
        Some(Token::Bool(b)) => Ok(*b),
        other => Err(unexpected("bool", other)),
    }
}

fn unexpected(what: &str, token: Option<&Token>) -> DappError {
    DappError::AbiError(format!("unexpected {} output: {:?}", what, token))
}

fn div_ceil(a: i64, b: i64) -> i64 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}
