//! Drives one submission from signature to a terminal outcome.
//!
//! Normal path: `Idle -> AwaitingSignature -> Submitted -> Confirmed | Failed | TimedOut`.
//!
//! Some nodes answer with a response the client library cannot parse even though
//! the transaction was accepted. When that failure shape is seen the tracker does
//! not report an error; it switches to `QuirkPolling` and watches the contract's
//! logs for the event the call is expected to emit, giving up after
//! `max_polls` ticks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::blockchain::traits::{ChainClient, ContractCall, SubmitError};
use crate::core::abi::EventFilter;
use crate::core::config::TrackerConfig;
use crate::core::errors::{DappError, TrackerError};
use crate::session::Session;
use crate::tracker::classify::classify_failure;
use crate::tracker::observer::StatusObserver;
use crate::tracker::scheduler::{PollHandle, PollTask};
use crate::tracker::types::{
    ActionKind, ActionStatus, ConfirmationOutcome, FailureReason, PendingAction,
};

pub struct ConfirmationTracker {
    config: TrackerConfig,
    observer: Arc<dyn StatusObserver>,
    slot: Mutex<Option<PendingAction>>,
}

impl ConfirmationTracker {
    pub fn new(config: TrackerConfig, observer: Arc<dyn StatusObserver>) -> Self {
        Self { config, observer, slot: Mutex::new(None) }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Status of the held action, `Idle` when the slot is empty.
    pub fn status(&self) -> ActionStatus {
        self.slot.lock().as_ref().map_or(ActionStatus::Idle, |a| a.status.clone())
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.slot.lock().clone()
    }

    /// True while an action occupies the slot, terminal or not.
    pub fn is_busy(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Frees the slot once the held action is terminal.
    pub fn reset(&self) -> Result<(), TrackerError> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(action) if !action.status.is_terminal() => Err(TrackerError::InFlight),
            _ => {
                *slot = None;
                Ok(())
            }
        }
    }

    /// Submits `call` through the session's wallet and waits for its outcome.
    ///
    /// Rejected with [`TrackerError::Busy`] while another action is held, and with
    /// [`TrackerError::WrongNetwork`] off the configured chain, without touching
    /// the wallet. If the session is invalidated before the outcome is
    /// known, any polling stops, the slot is cleared and
    /// [`TrackerError::SessionClosed`] is returned.
    pub async fn execute(
        &self,
        session: &Session,
        call: ContractCall,
    ) -> Result<ConfirmationOutcome, TrackerError> {
        if !session.is_active() {
            return Err(TrackerError::SessionClosed);
        }
        if let Err(DappError::NetworkMismatch { expected, actual }) =
            session.require_expected_network()
        {
            warn!(expected, actual, "Refusing write on the wrong network");
            return Err(TrackerError::WrongNetwork { expected, actual });
        }
        self.begin(call.kind)?;

        let closed = session.closed();
        let outcome = tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            outcome = self.drive(session, &call) => Some(outcome),
        };

        match outcome {
            Some(outcome) => Ok(outcome),
            None => {
                warn!(kind = ?call.kind, "Session closed before the transaction resolved");
                *self.slot.lock() = None;
                Err(TrackerError::SessionClosed)
            }
        }
    }

    fn begin(&self, kind: ActionKind) -> Result<(), TrackerError> {
        {
            let mut slot = self.slot.lock();
            if let Some(held) = slot.as_ref() {
                debug!(held = ?held.kind, requested = ?kind, "Tracker busy");
                return Err(TrackerError::Busy);
            }
            *slot = Some(PendingAction::new(kind));
        }
        self.observer.on_status(kind, &ActionStatus::Idle);
        Ok(())
    }

    async fn drive(&self, session: &Session, call: &ContractCall) -> ConfirmationOutcome {
        let wallet = session.wallet();

        self.transition(ActionStatus::AwaitingSignature);
        let start_block = self.submission_height(session, call).await;
        info!(kind = ?call.kind, function = %call.function, "Submitting transaction");
        let tx_hash = match wallet.submit(call).await {
            Ok(hash) => hash,
            Err(err) => return self.recover(session, call, err, start_block).await,
        };

        self.transition(ActionStatus::Submitted { tx_hash });
        info!(tx_hash = ?tx_hash, "Transaction sent, waiting for receipt");
        let receipt =
            match timeout(self.config.receipt_timeout(), wallet.wait_for_receipt(tx_hash)).await {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(err)) => return self.recover(session, call, err, start_block).await,
                Err(_) => {
                    warn!(tx_hash = ?tx_hash, "No receipt before the deadline");
                    return self.finish(ConfirmationOutcome::Failure(FailureReason::Timeout));
                }
            };

        if receipt.success {
            info!(tx_hash = ?tx_hash, block = receipt.block_number, "Transaction confirmed");
            self.finish(ConfirmationOutcome::Success(receipt.block_number))
        } else {
            error!(tx_hash = ?tx_hash, block = receipt.block_number, "Transaction reverted");
            self.finish(ConfirmationOutcome::Failure(FailureReason::OnChainRevert(format!(
                "Transaction reverted in block {}",
                receipt.block_number
            ))))
        }
    }

    /// Head before the wallet sees the call. The transaction cannot land below it,
    /// so quirk polling searches from here. Eventless calls skip the read.
    async fn submission_height(&self, session: &Session, call: &ContractCall) -> Option<u64> {
        if call.confirmation_event.is_none() {
            return None;
        }
        match session.chain().block_number().await {
            Ok(block) => Some(block),
            Err(e) => {
                debug!(error = %e, "Block height unavailable before submission");
                None
            }
        }
    }

    /// Handles an error from either submission or receipt wait.
    async fn recover(
        &self,
        session: &Session,
        call: &ContractCall,
        err: SubmitError,
        start_block: Option<u64>,
    ) -> ConfirmationOutcome {
        if err.is_transport_quirk(&self.config.quirk_message_substring) {
            warn!(error = %err, "Unparseable node response, watching for the confirmation event");
            return self.poll_for_event(session, call, start_block).await;
        }

        error!(code = ?err.code, error = %err, "Transaction failed");
        let reason = classify_failure(&err, session.wallet().as_ref(), &self.config).await;
        self.finish(ConfirmationOutcome::Failure(reason))
    }

    async fn poll_for_event(
        &self,
        session: &Session,
        call: &ContractCall,
        start_block: Option<u64>,
    ) -> ConfirmationOutcome {
        let Some(filter) = call.confirmation_event.clone() else {
            warn!(function = %call.function, "Call emits no event, its outcome cannot be observed");
            return self.finish(ConfirmationOutcome::Failure(FailureReason::Timeout));
        };

        let entry_block = match start_block {
            Some(block) => Some(block),
            None => match session.chain().block_number().await {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!(error = %e, "Could not read block height, the first poll will");
                    None
                }
            },
        };
        self.update(|action| {
            action.submitted_at_block = entry_block;
            action.status = ActionStatus::QuirkPolling;
        });

        let watch = EventWatch {
            chain: Arc::clone(session.chain()),
            filter,
            entry_block,
            max_polls: self.config.max_polls,
        };
        let mut poller = PollHandle::spawn(self.config.poll_interval(), watch);
        match poller.wait().await {
            Some(WatchVerdict::Found { block }) => {
                info!(block, "Confirmation event found");
                self.finish(ConfirmationOutcome::Success(block))
            }
            Some(WatchVerdict::Exhausted) | None => {
                warn!(polls = self.config.max_polls, "Confirmation event not seen");
                self.finish(ConfirmationOutcome::Failure(FailureReason::Timeout))
            }
        }
    }

    fn finish(&self, outcome: ConfirmationOutcome) -> ConfirmationOutcome {
        let status = match &outcome {
            ConfirmationOutcome::Success(block) => ActionStatus::Confirmed { block: *block },
            ConfirmationOutcome::Failure(FailureReason::Timeout) => ActionStatus::TimedOut,
            ConfirmationOutcome::Failure(reason) => ActionStatus::Failed(reason.clone()),
        };
        self.transition(status);
        outcome
    }

    fn transition(&self, status: ActionStatus) {
        self.update(|action| {
            match &status {
                ActionStatus::Submitted { tx_hash } => action.tx_hash = Some(*tx_hash),
                ActionStatus::Confirmed { block } => action.result_block = Some(*block),
                _ => {}
            }
            action.status = status.clone();
        });
    }

    /// Mutates the held action, then notifies the observer outside the lock.
    fn update(&self, f: impl FnOnce(&mut PendingAction)) {
        let notified = {
            let mut slot = self.slot.lock();
            slot.as_mut().map(|action| {
                f(action);
                (action.kind, action.status.clone())
            })
        };
        if let Some((kind, status)) = notified {
            self.observer.on_status(kind, &status);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchVerdict {
    Found { block: u64 },
    Exhausted,
}

/// One quirk-polling tick: read the head, and once it has moved past the entry
/// block, look for the confirmation event in `[entry, head]`.
struct EventWatch {
    chain: Arc<dyn ChainClient>,
    filter: EventFilter,
    entry_block: Option<u64>,
    max_polls: u32,
}

impl EventWatch {
    async fn check(&mut self) -> Result<Option<u64>, DappError> {
        let head = self.chain.block_number().await?;
        let Some(from) = self.entry_block else {
            self.entry_block = Some(head);
            return Ok(None);
        };
        if head <= from {
            return Ok(None);
        }
        let events = self.chain.query_logs(&self.filter, from, head).await?;
        Ok(events.iter().map(|e| e.id()).max().map(|(block, _)| block))
    }
}

#[async_trait]
impl PollTask for EventWatch {
    type Output = WatchVerdict;

    async fn tick(&mut self, attempt: u32) -> ControlFlow<WatchVerdict> {
        match self.check().await {
            Ok(Some(block)) => return ControlFlow::Break(WatchVerdict::Found { block }),
            Ok(None) => debug!(attempt, "Confirmation event not seen yet"),
            Err(e) => warn!(attempt, error = %e, "Poll failed"),
        }
        if attempt >= self.max_polls {
            ControlFlow::Break(WatchVerdict::Exhausted)
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::mock::{log_event, MockChain, MockWallet};
    use crate::blockchain::traits::{SubmitErrorCode, TxReceipt};
    use crate::core::abi::MotivationEvent;
    use crate::core::config::NetworkConfig;
    use crate::session::SessionManager;
    use crate::tracker::observer::StatusLog;
    use ethers::types::{Address, H256, U256};

    fn me() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn increment() -> ContractCall {
        ContractCall {
            kind: ActionKind::GenericWrite,
            function: "increment".into(),
            args: vec![],
            value: U256::zero(),
            confirmation_event: None,
        }
    }

    fn instant() -> ContractCall {
        ContractCall {
            kind: ActionKind::DirectTransfer,
            function: "instantMotivation".into(),
            args: vec![],
            value: U256::one(),
            confirmation_event: Some(EventFilter::new(MotivationEvent::InstantMotivation).sender(me())),
        }
    }

    async fn setup(
        wallet: MockWallet,
        chain: MockChain,
    ) -> (ConfirmationTracker, Arc<StatusLog>, Arc<Session>, Arc<MockChain>) {
        let log = Arc::new(StatusLog::new());
        let tracker = ConfirmationTracker::new(TrackerConfig::default(), log.clone());
        let chain = Arc::new(chain);
        let session = SessionManager::new(NetworkConfig::default())
            .connect(Arc::new(wallet), chain.clone())
            .await
            .unwrap();
        (tracker, log, session, chain)
    }

    #[tokio::test]
    async fn receipt_confirms() {
        let wallet = MockWallet::new(me());
        wallet.push_receipt(Ok(TxReceipt { tx_hash: H256::zero(), block_number: 42, success: true }));
        let (tracker, log, session, _) = setup(wallet, MockChain::new(1)).await;

        let outcome = tracker.execute(&session, increment()).await.unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Success(42));
        assert_eq!(log.entries().first(), Some(&ActionStatus::Idle));
        assert_eq!(log.entries().last(), Some(&ActionStatus::Confirmed { block: 42 }));
        assert_eq!(tracker.pending().unwrap().result_block, Some(42));
    }

    #[tokio::test]
    async fn reverted_receipt_fails() {
        let wallet = MockWallet::new(me());
        wallet.push_receipt(Ok(TxReceipt { tx_hash: H256::zero(), block_number: 8, success: false }));
        let (tracker, _, session, _) = setup(wallet, MockChain::new(1)).await;

        let outcome = tracker.execute(&session, increment()).await.unwrap();
        assert!(matches!(
            outcome,
            ConfirmationOutcome::Failure(FailureReason::OnChainRevert(_))
        ));
    }

    #[tokio::test]
    async fn quirk_on_eventless_call_times_out_without_polling() {
        let wallet = MockWallet::new(me());
        wallet.push_transport_quirk();
        let (tracker, log, session, chain) = setup(wallet, MockChain::new(1)).await;

        let outcome = tracker.execute(&session, increment()).await.unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Failure(FailureReason::Timeout));
        assert_eq!(chain.block_number_calls(), 0);
        assert!(!log.entries().contains(&ActionStatus::QuirkPolling));
    }

    #[tokio::test(start_paused = true)]
    async fn quirk_during_receipt_wait_polls() {
        let wallet = MockWallet::new(me());
        wallet.push_receipt(Err(SubmitError::new(
            SubmitErrorCode::UnknownError,
            "could not coalesce error",
        )
        .with_inner(None, "")));
        let chain = MockChain::new(50);
        chain.push_log(log_event(MotivationEvent::InstantMotivation, 51, me(), me(), U256::one()));
        let (tracker, log, session, _) = setup(wallet, chain).await;

        let outcome = tracker.execute(&session, instant()).await.unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Success(51));
        let entries = log.entries();
        assert!(matches!(entries[2], ActionStatus::Submitted { .. }));
        assert_eq!(entries[3], ActionStatus::QuirkPolling);
        assert_eq!(tracker.pending().unwrap().submitted_at_block, Some(50));
    }

    #[tokio::test]
    async fn reset_requires_terminal_state() {
        let (tracker, _, session, _) = setup(MockWallet::new(me()), MockChain::new(1)).await;
        assert!(tracker.reset().is_ok());

        tracker.execute(&session, increment()).await.unwrap();
        assert!(tracker.is_busy());
        assert_eq!(
            tracker.execute(&session, increment()).await,
            Err(TrackerError::Busy)
        );
        tracker.reset().unwrap();
        assert!(!tracker.is_busy());
        assert_eq!(tracker.status(), ActionStatus::Idle);
    }

    #[tokio::test]
    async fn wrong_network_write_is_refused() {
        let wallet = Arc::new(MockWallet::new(me()).with_chain_id(1));
        let log = Arc::new(StatusLog::new());
        let tracker = ConfirmationTracker::new(TrackerConfig::default(), log.clone());
        let session = SessionManager::new(NetworkConfig::default())
            .connect(wallet.clone(), Arc::new(MockChain::new(1)))
            .await
            .unwrap();

        assert_eq!(
            tracker.execute(&session, increment()).await,
            Err(TrackerError::WrongNetwork {
                expected: NetworkConfig::default().chain_id,
                actual: 1
            })
        );
        assert_eq!(wallet.submit_calls(), 0);
        assert!(!tracker.is_busy());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn closed_session_is_refused() {
        let (tracker, log, session, _) = setup(MockWallet::new(me()), MockChain::new(1)).await;
        session.invalidate();
        assert_eq!(
            tracker.execute(&session, increment()).await,
            Err(TrackerError::SessionClosed)
        );
        assert!(log.is_empty());
    }
}
