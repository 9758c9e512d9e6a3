use ethers::types::H256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of state-changing operations the client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// instantMotivation: value goes straight to the recipient.
    DirectTransfer,
    /// timelockedMotivation: value is held until the unlock date.
    TimeLockedDeposit,
    /// proofOfActionMotivation: value is held until the recipient submits proof.
    ConditionalDeposit,
    ClaimTimeLocked,
    ClaimConditional,
    /// Counter writes.
    GenericWrite,
}

impl ActionKind {
    /// Message shown next to the block number once the action is confirmed.
    pub fn success_message(&self) -> &'static str {
        match self {
            ActionKind::DirectTransfer => "Instant motivation sent",
            ActionKind::TimeLockedDeposit => "Time-locked motivation created",
            ActionKind::ConditionalDeposit => "Proof-of-action motivation created",
            ActionKind::ClaimTimeLocked => "Time-locked motivation claimed",
            ActionKind::ClaimConditional => "Proof-of-action motivation claimed",
            ActionKind::GenericWrite => "Transaction confirmed",
        }
    }
}

/// Why an action failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    UserDeclined(String),
    /// Derived from a balance check, never reported by the transport directly.
    InsufficientFunds(String),
    OnChainRevert(String),
    /// The outcome could not be observed in time; the transaction may still land.
    Timeout,
    Unknown(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UserDeclined(msg)
            | FailureReason::InsufficientFunds(msg)
            | FailureReason::OnChainRevert(msg)
            | FailureReason::Unknown(msg) => write!(f, "{}", msg),
            FailureReason::Timeout => {
                write!(f, "Timed out. If you confirmed, check your claims or balance to verify.")
            }
        }
    }
}

/// Lifecycle of a [`PendingAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Idle,
    AwaitingSignature,
    Submitted { tx_hash: H256 },
    QuirkPolling,
    Confirmed { block: u64 },
    Failed(FailureReason),
    TimedOut,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Confirmed { .. } | ActionStatus::Failed(_) | ActionStatus::TimedOut
        )
    }

    /// Button text for this state.
    pub fn label(&self) -> &'static str {
        match self {
            ActionStatus::Idle => "Motivate",
            ActionStatus::AwaitingSignature => "Confirm in your wallet...",
            ActionStatus::Submitted { .. } => "Confirming...",
            ActionStatus::QuirkPolling => "Waiting for confirmation...",
            ActionStatus::Confirmed { .. } => "Success!",
            ActionStatus::Failed(_) => "Failed",
            ActionStatus::TimedOut => "Timed out",
        }
    }
}

/// The single in-flight operation of a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub tx_hash: Option<H256>,
    /// Block height when quirk polling started.
    pub submitted_at_block: Option<u64>,
    pub status: ActionStatus,
    pub result_block: Option<u64>,
}

impl PendingAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            tx_hash: None,
            submitted_at_block: None,
            status: ActionStatus::Idle,
            result_block: None,
        }
    }
}

/// Terminal result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationOutcome {
    Success(u64),
    Failure(FailureReason),
}

impl ConfirmationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConfirmationOutcome::Success(_))
    }

    pub fn user_message(&self, kind: ActionKind) -> String {
        match self {
            ConfirmationOutcome::Success(block) => {
                format!("{} in block {}", kind.success_message(), block)
            }
            ConfirmationOutcome::Failure(reason @ FailureReason::Timeout) => reason.to_string(),
            ConfirmationOutcome::Failure(reason) => format!("Error: {}", reason),
        }
    }
}
