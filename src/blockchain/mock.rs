// filepath: src/blockchain/mock.rs
//! In-memory wallet and chain used by tests and the offline CLI mode.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::blockchain::traits::{
    ChainClient, ContractCall, SubmitError, SubmitErrorCode, TxReceipt, WalletSession,
};
use crate::core::abi::{EventFilter, LogEvent, MotivationEvent};
use crate::core::config::NetworkConfig;
use crate::core::errors::DappError;

/// Scripted wallet. Unscripted submissions succeed with a fresh hash and unscripted
/// receipts report success in block 1.
pub struct MockWallet {
    address: Address,
    chain_id: u64,
    balance: Mutex<Option<U256>>,
    submissions: Mutex<VecDeque<Result<H256, SubmitError>>>,
    receipts: Mutex<VecDeque<Result<TxReceipt, SubmitError>>>,
    submitted: Mutex<Vec<ContractCall>>,
    submit_calls: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl MockWallet {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            chain_id: NetworkConfig::default().chain_id,
            balance: Mutex::new(Some(U256::exp10(18))),
            submissions: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_balance(self, balance: U256) -> Self {
        *self.balance.lock() = Some(balance);
        self
    }

    /// Balance lookups fail from now on.
    pub fn failing_balance(self) -> Self {
        *self.balance.lock() = None;
        self
    }

    /// Every submission waits for a permit on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push_submit(&self, result: Result<H256, SubmitError>) {
        self.submissions.lock().push_back(result);
    }

    pub fn push_receipt(&self, result: Result<TxReceipt, SubmitError>) {
        self.receipts.lock().push_back(result);
    }

    /// Queues the failure shape of an unparseable node response.
    pub fn push_transport_quirk(&self) {
        self.push_submit(Err(transport_quirk()));
    }

    /// Same failure shape, raised while waiting for the receipt.
    pub fn push_receipt_quirk(&self) {
        self.push_receipt(Err(transport_quirk()));
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<ContractCall> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl WalletSession for MockWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64, DappError> {
        Ok(self.chain_id)
    }

    async fn balance(&self) -> Result<U256, DappError> {
        (*self.balance.lock())
            .ok_or_else(|| DappError::BlockchainError("balance unavailable".to_string()))
    }

    async fn submit(&self, call: &ContractCall) -> Result<H256, SubmitError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().push(call.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.submissions.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(H256::from_low_u64_be(u64::from(n))))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, SubmitError> {
        let scripted = self.receipts.lock().pop_front();
        scripted.unwrap_or(Ok(TxReceipt { tx_hash, block_number: 1, success: true }))
    }
}

/// Chain whose height moves forward by `step` on every `block_number` call.
pub struct MockChain {
    height: AtomicU64,
    step: u64,
    logs: Mutex<Vec<LogEvent>>,
    pending_failures: AtomicU32,
    block_number_calls: AtomicU32,
    log_queries: Mutex<Vec<(u64, u64)>>,
    responses: Mutex<Vec<(String, Vec<Token>, Vec<Token>)>>,
}

impl MockChain {
    pub fn new(height: u64) -> Self {
        Self {
            height: AtomicU64::new(height),
            step: 1,
            logs: Mutex::new(Vec::new()),
            pending_failures: AtomicU32::new(0),
            block_number_calls: AtomicU32::new(0),
            log_queries: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// A chain that never advances.
    pub fn frozen(height: u64) -> Self {
        Self { step: 0, ..Self::new(height) }
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Mines `blocks` blocks without anyone asking for the height.
    pub fn advance(&self, blocks: u64) {
        self.height.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn push_log(&self, event: LogEvent) {
        self.logs.lock().push(event);
    }

    /// The next `n` block-number lookups fail.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    pub fn respond_to(&self, function: &str, args: Vec<Token>, output: Vec<Token>) {
        self.responses.lock().push((function.to_string(), args, output));
    }

    pub fn block_number_calls(&self) -> u32 {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, DappError> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DappError::BlockchainError("mock rpc unavailable".to_string()));
        }
        Ok(self.height.fetch_add(self.step, Ordering::SeqCst))
    }

    async fn query_logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>, DappError> {
        self.log_queries.lock().push((from_block, to_block));
        let mut found: Vec<LogEvent> = self
            .logs
            .lock()
            .iter()
            .filter(|e| filter.matches(e) && (from_block..=to_block).contains(&e.block_number))
            .cloned()
            .collect();
        found.sort_by_key(LogEvent::id);
        Ok(found)
    }

    async fn call(&self, function: &str, args: Vec<Token>) -> Result<Vec<Token>, DappError> {
        self.responses
            .lock()
            .iter()
            .find(|(f, a, _)| f == function && *a == args)
            .map(|(_, _, out)| out.clone())
            .ok_or_else(|| DappError::BlockchainError(format!("call reverted: {}", function)))
    }
}

fn transport_quirk() -> SubmitError {
    SubmitError::new(
        SubmitErrorCode::UnknownError,
        "could not coalesce error (error={ \"code\": -32603 })",
    )
    .with_inner(Some(-32603), "")
}

/// A bare event of `kind` at `block`; callers fill in the event-specific fields.
pub fn log_event(
    kind: MotivationEvent,
    block_number: u64,
    sender: Address,
    recipient: Address,
    amount: U256,
) -> LogEvent {
    LogEvent {
        event: kind,
        block_number,
        log_index: 0,
        tx_hash: None,
        sender,
        recipient,
        amount,
        index: None,
        message: None,
        action_required: None,
        proof_description: None,
        unlock_timestamp: None,
    }
}
