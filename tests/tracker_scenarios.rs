//! End-to-end confirmation scenarios against the in-memory wallet and chain.
//! Polling runs on tokio's paused clock, so elapsed times are exact.

use ethers::types::{Address, U256};
use motivate_me::actions;
use motivate_me::blockchain::mock::{log_event, MockChain, MockWallet};
use motivate_me::blockchain::{SubmitError, SubmitErrorCode};
use motivate_me::core::{DappConfig, MotivationEvent, NetworkConfig};
use motivate_me::session::{Session, SessionManager};
use motivate_me::tracker::{
    ActionStatus, ConfirmationOutcome, ConfirmationTracker, FailureReason, StatusLog,
};
use motivate_me::TrackerError;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};

fn me() -> Address {
    Address::repeat_byte(0x5e)
}

fn friend() -> Address {
    Address::repeat_byte(0xf1)
}

struct Harness {
    tracker: Arc<ConfirmationTracker>,
    log: Arc<StatusLog>,
    wallet: Arc<MockWallet>,
    chain: Arc<MockChain>,
    manager: SessionManager,
    session: Arc<Session>,
}

async fn harness(wallet: MockWallet, chain: MockChain) -> Harness {
    let log = Arc::new(StatusLog::new());
    let config = DappConfig::default();
    let tracker = Arc::new(ConfirmationTracker::new(config.tracker, log.clone()));
    let wallet = Arc::new(wallet);
    let chain = Arc::new(chain);
    let manager = SessionManager::new(NetworkConfig::ink_sepolia());
    let session = manager.connect(wallet.clone(), chain.clone()).await.unwrap();
    Harness { tracker, log, wallet, chain, manager, session }
}

fn instant_call() -> motivate_me::blockchain::ContractCall {
    actions::instant_motivation(me(), friend(), U256::exp10(16), "you got this")
}

fn instant_event(block: u64) -> motivate_me::core::LogEvent {
    log_event(MotivationEvent::InstantMotivation, block, me(), friend(), U256::exp10(16))
}

#[tokio::test]
async fn normal_submission_confirms_from_receipt() {
    let h = harness(MockWallet::new(me()), MockChain::new(100)).await;

    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Success(1));
    let statuses = h.log.entries();
    assert_eq!(statuses.len(), 4);
    assert_eq!(statuses[0], ActionStatus::Idle);
    assert_eq!(statuses[1], ActionStatus::AwaitingSignature);
    assert!(matches!(statuses[2], ActionStatus::Submitted { .. }));
    assert_eq!(statuses[3], ActionStatus::Confirmed { block: 1 });
    // only the height read taken before submitting
    assert_eq!(h.chain.block_number_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn quirk_recovers_block_from_event_log() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let chain = MockChain::new(100);
    chain.push_log(instant_event(103));
    let h = harness(wallet, chain).await;

    let start = Instant::now();
    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Success(103));
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(
        h.log.entries(),
        vec![
            ActionStatus::Idle,
            ActionStatus::AwaitingSignature,
            ActionStatus::QuirkPolling,
            ActionStatus::Confirmed { block: 103 },
        ]
    );
    assert_eq!(h.chain.log_queries(), vec![(100, 101), (100, 102), (100, 103)]);

    let pending = h.tracker.pending().unwrap();
    assert_eq!(pending.submitted_at_block, Some(100));
    assert_eq!(pending.result_block, Some(103));
}

#[tokio::test(start_paused = true)]
async fn quirk_without_event_times_out_on_sixtieth_poll() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let h = harness(wallet, MockChain::new(100)).await;

    let start = Instant::now();
    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Failure(FailureReason::Timeout));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    // one height read before submitting plus one per poll
    assert_eq!(h.chain.block_number_calls(), 61);
    assert_eq!(h.log.entries().last(), Some(&ActionStatus::TimedOut));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.chain.block_number_calls(), 61);
}

#[tokio::test(start_paused = true)]
async fn event_seen_on_last_poll_still_confirms() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let chain = MockChain::new(100);
    chain.push_log(instant_event(160));
    let h = harness(wallet, chain).await;

    let start = Instant::now();
    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Success(160));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn failed_polls_count_toward_the_budget() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let chain = MockChain::frozen(100);
    chain.fail_next(62);
    chain.push_log(instant_event(100));
    let h = harness(wallet, chain).await;

    let start = Instant::now();
    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Failure(FailureReason::Timeout));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert!(h.chain.log_queries().is_empty());
    assert_eq!(h.tracker.pending().unwrap().submitted_at_block, None);
}

#[tokio::test(start_paused = true)]
async fn entry_block_is_read_on_first_poll_when_unavailable() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let chain = MockChain::new(100);
    chain.fail_next(2);
    chain.push_log(instant_event(101));
    let h = harness(wallet, chain).await;

    let start = Instant::now();
    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    assert_eq!(outcome, ConfirmationOutcome::Success(101));
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(h.chain.log_queries(), vec![(100, 101)]);
}

#[tokio::test(start_paused = true)]
async fn receipt_quirk_searches_from_the_submission_height() {
    let gate = Arc::new(Notify::new());
    let wallet = MockWallet::new(me()).gated(gate.clone());
    wallet.push_receipt_quirk();
    let chain = MockChain::new(100);
    chain.push_log(instant_event(102));
    let h = harness(wallet, chain).await;

    let running = {
        let tracker = h.tracker.clone();
        let session = h.session.clone();
        tokio::spawn(async move { tracker.execute(&session, instant_call()).await })
    };
    while h.wallet.submit_calls() == 0 {
        tokio::task::yield_now().await;
    }
    // mined while the wallet was still answering
    h.chain.advance(5);
    gate.notify_one();

    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Success(102));
    assert_eq!(h.chain.log_queries(), vec![(100, 106)]);
    assert_eq!(h.tracker.pending().unwrap().submitted_at_block, Some(100));
    let statuses = h.log.entries();
    assert!(matches!(statuses[2], ActionStatus::Submitted { .. }));
    assert_eq!(statuses[3], ActionStatus::QuirkPolling);
}

#[tokio::test]
async fn wrong_network_session_cannot_write() {
    let wallet = MockWallet::new(me()).with_chain_id(1);
    let h = harness(wallet, MockChain::new(100)).await;
    assert_eq!(h.session.network_label(), "Wrong network (1)");

    let refused = h.tracker.execute(&h.session, instant_call()).await;
    assert_eq!(refused, Err(TrackerError::WrongNetwork { expected: 763373, actual: 1 }));
    assert_eq!(h.wallet.submit_calls(), 0);
    assert!(h.log.is_empty());
    assert!(!h.tracker.is_busy());
}

#[tokio::test]
async fn signer_rejection_fails_without_polling() {
    let wallet = MockWallet::new(me());
    wallet.push_submit(Err(SubmitError::new(
        SubmitErrorCode::ActionRejected,
        "user rejected transaction",
    )));
    let h = harness(wallet, MockChain::new(100)).await;

    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();

    let declined = FailureReason::UserDeclined("You cancelled the transaction".into());
    assert_eq!(outcome, ConfirmationOutcome::Failure(declined.clone()));
    assert_eq!(
        outcome.user_message(motivate_me::tracker::ActionKind::DirectTransfer),
        "Error: You cancelled the transaction"
    );
    assert_eq!(h.log.entries().last(), Some(&ActionStatus::Failed(declined)));
    assert_eq!(h.chain.block_number_calls(), 1);
    assert!(h.chain.log_queries().is_empty());
}

#[tokio::test]
async fn second_submission_is_rejected_while_busy() {
    let gate = Arc::new(Notify::new());
    let h = harness(MockWallet::new(me()).gated(gate.clone()), MockChain::new(100)).await;

    let first = {
        let tracker = h.tracker.clone();
        let session = h.session.clone();
        tokio::spawn(async move { tracker.execute(&session, instant_call()).await })
    };
    while h.wallet.submit_calls() == 0 {
        tokio::task::yield_now().await;
    }
    let seen = h.log.len();

    let second = h.tracker.execute(&h.session, actions::increment()).await;
    assert_eq!(second, Err(TrackerError::Busy));
    assert_eq!(h.wallet.submit_calls(), 1);
    assert_eq!(h.log.len(), seen);
    assert_eq!(h.tracker.status(), ActionStatus::AwaitingSignature);

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert_eq!(h.wallet.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn account_change_abandons_polling() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let h = harness(wallet, MockChain::new(100)).await;

    let running = {
        let tracker = h.tracker.clone();
        let session = h.session.clone();
        tokio::spawn(async move { tracker.execute(&session, instant_call()).await })
    };
    sleep(Duration::from_millis(5_500)).await;
    assert_eq!(h.tracker.status(), ActionStatus::QuirkPolling);
    let calls = h.chain.block_number_calls();
    assert_eq!(calls, 6);

    h.manager.account_changed(Some(friend()));
    assert_eq!(running.await.unwrap(), Err(TrackerError::SessionClosed));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.chain.block_number_calls(), calls);
    assert!(!h.tracker.is_busy());
    assert_eq!(h.log.entries().last(), Some(&ActionStatus::QuirkPolling));
}

#[tokio::test(start_paused = true)]
async fn tracker_is_reusable_after_reset() {
    let wallet = MockWallet::new(me());
    wallet.push_transport_quirk();
    let chain = MockChain::new(100);
    chain.push_log(instant_event(101));
    let h = harness(wallet, chain).await;

    h.tracker.execute(&h.session, instant_call()).await.unwrap();
    h.tracker.reset().unwrap();

    let outcome = h.tracker.execute(&h.session, instant_call()).await.unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Success(1));
    assert_eq!(h.wallet.submit_calls(), 2);
}
