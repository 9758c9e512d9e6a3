//! Maps a genuine (non-quirk) submission error to a [`FailureReason`].

use ethers::types::U256;
use ethers::utils::format_ether;
use tracing::{debug, warn};

use crate::blockchain::traits::{SubmitError, SubmitErrorCode, WalletSession};
use crate::core::config::TrackerConfig;
use crate::tracker::types::FailureReason;
use crate::utils::truncate_message;

/// EIP-1193 "user rejected request".
const USER_REJECTED_RPC_CODE: i64 = 4001;

pub async fn classify_failure(
    err: &SubmitError,
    wallet: &dyn WalletSession,
    config: &TrackerConfig,
) -> FailureReason {
    // Wallets report both "rejected" and "can't pay for gas" this way. The balance
    // decides which hint to show; it is a guess, not a diagnosis.
    if err.code == SubmitErrorCode::UnknownError
        && err.inner_message().map_or(false, |m| m.contains("User rejected"))
    {
        return match wallet.balance().await {
            Ok(balance) => balance_hint(balance, config.dust_threshold_wei),
            Err(e) => {
                warn!(error = %e, "Balance lookup failed while classifying rejection");
                FailureReason::UserDeclined("Transaction rejected by wallet".to_string())
            }
        };
    }

    let rejected_code =
        err.inner.as_ref().and_then(|i| i.code) == Some(USER_REJECTED_RPC_CODE);
    if err.code == SubmitErrorCode::ActionRejected
        || rejected_code
        || err.message.to_lowercase().contains("user rejected")
    {
        return FailureReason::UserDeclined("You cancelled the transaction".to_string());
    }

    if err.code == SubmitErrorCode::Timeout || err.message.to_lowercase().contains("timeout") {
        return FailureReason::Timeout;
    }

    let max_len = config.max_error_message_len;
    if err.message.contains("Already claimed") {
        return FailureReason::OnChainRevert("Already claimed".to_string());
    }
    if err.message.contains("still locked") {
        return FailureReason::OnChainRevert("Still locked - check unlock date".to_string());
    }
    if err.code == SubmitErrorCode::CallException || err.message.contains("execution reverted") {
        return FailureReason::OnChainRevert(truncate_message(&err.message, max_len));
    }

    if !err.message.is_empty() {
        debug!(full_error = %err.message, "Unclassified submission error");
        return FailureReason::Unknown(truncate_message(&err.message, max_len));
    }
    FailureReason::Unknown("Transaction failed".to_string())
}

fn balance_hint(balance: U256, dust_threshold_wei: u64) -> FailureReason {
    let balance_eth = format_ether(balance);
    if balance.is_zero() {
        FailureReason::InsufficientFunds("No funds for gas. Balance: 0 ETH".to_string())
    } else if balance < U256::from(dust_threshold_wei) {
        FailureReason::InsufficientFunds(format!(
            "Low balance: {} ETH (need more for gas)",
            balance_eth
        ))
    } else {
        FailureReason::UserDeclined(format!(
            "Transaction rejected. Balance: {} ETH. Check wallet.",
            balance_eth
        ))
    }
}
