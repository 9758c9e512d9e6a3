use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::abi::{EventFilter, LogEvent};
use crate::core::errors::DappError;
use crate::tracker::types::ActionKind;

/// A state-changing contract call, ready to hand to the wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub kind: ActionKind,
    pub function: String,
    pub args: Vec<Token>,
    /// Native value attached to the call (wei).
    pub value: U256,
    /// Event whose appearance proves the call went through. `None` for calls that
    /// emit nothing (counter writes).
    pub confirmation_event: Option<EventFilter>,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub success: bool,
}

/// Error class reported by the wallet / client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitErrorCode {
    /// The signer explicitly refused.
    ActionRejected,
    /// Catch-all code wallets use for both rejection and insufficient funds.
    UnknownError,
    Timeout,
    /// The node refused the call (revert during estimation or execution).
    CallException,
    Other,
}

/// Error nested inside a submission error, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorInfo {
    pub code: Option<i64>,
    pub message: String,
}

/// Shape of an error raised while submitting a transaction or waiting for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmitError {
    pub code: SubmitErrorCode,
    pub message: String,
    pub inner: Option<ProviderErrorInfo>,
}

impl SubmitError {
    pub fn new(code: SubmitErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), inner: None }
    }

    pub fn with_inner(mut self, code: Option<i64>, message: impl Into<String>) -> Self {
        self.inner = Some(ProviderErrorInfo { code, message: message.into() });
        self
    }

    /// True only when the top-level message names the unparseable-response failure
    /// AND the nested provider error carries an empty message.
    pub fn is_transport_quirk(&self, marker: &str) -> bool {
        let marker_hit = !marker.is_empty() && self.message.contains(marker);
        let empty_inner = self.inner.as_ref().map_or(false, |inner| inner.message.is_empty());
        marker_hit && empty_inner
    }

    pub fn inner_message(&self) -> Option<&str> {
        self.inner.as_ref().map(|i| i.message.as_str())
    }
}

/// The user's wallet: signer identity, balance, submission and receipts.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Address of the current signer.
    fn address(&self) -> Address;

    /// Chain the wallet is connected to.
    async fn chain_id(&self) -> Result<u64, DappError>;

    /// Native balance of the signer (wei).
    async fn balance(&self) -> Result<U256, DappError>;

    /// Signs and broadcasts the call, returning the transaction hash.
    async fn submit(&self, call: &ContractCall) -> Result<H256, SubmitError>;

    /// Waits until the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, SubmitError>;
}

/// Read-side access to the chain and the contract's logs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, DappError>;

    /// Matching events in `[from_block, to_block]`, ordered by `(block, log index)`.
    async fn query_logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>, DappError>;

    /// Read-only contract call.
    async fn call(&self, function: &str, args: Vec<Token>) -> Result<Vec<Token>, DappError>;
}
