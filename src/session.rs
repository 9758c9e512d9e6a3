//! Wallet connection context.
//!
//! A [`Session`] is created on connect and replaced whenever the account or
//! chain changes. Replacing or disconnecting invalidates the previous session,
//! which aborts any confirmation still bound to it.

use ethers::types::Address;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::blockchain::traits::{ChainClient, WalletSession};
use crate::core::config::NetworkConfig;
use crate::core::errors::DappError;
use crate::utils::short_address;

pub struct Session {
    id: u64,
    account: Address,
    chain_id: u64,
    expected_chain_id: u64,
    network_label: String,
    expected_network: bool,
    wallet: Arc<dyn WalletSession>,
    chain: Arc<dyn ChainClient>,
    closed: CancellationToken,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Chain name, or `Wrong network (<id>)`.
    pub fn network_label(&self) -> &str {
        &self.network_label
    }

    pub fn is_expected_network(&self) -> bool {
        self.expected_network
    }

    /// Writes are refused while the wallet sits on another chain.
    pub fn require_expected_network(&self) -> Result<(), DappError> {
        if self.expected_network {
            Ok(())
        } else {
            Err(DappError::NetworkMismatch {
                expected: self.expected_chain_id,
                actual: self.chain_id,
            })
        }
    }

    pub fn wallet(&self) -> &Arc<dyn WalletSession> {
        &self.wallet
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn is_active(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Token cancelled when this session is invalidated.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn invalidate(&self) {
        self.closed.cancel();
    }

    /// `0x5aAe...eAed | Ink Sepolia`
    pub fn status_line(&self) -> String {
        format!("{} | {}", short_address(&self.account), self.network_label)
    }
}

/// Holds the current session and reacts to wallet events.
pub struct SessionManager {
    network: NetworkConfig,
    current: RwLock<Option<Arc<Session>>>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network, current: RwLock::new(None), next_id: AtomicU64::new(1) }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Connects, replacing (and invalidating) any previous session. A wallet on
    /// another chain still connects; the session is labelled as wrong network.
    pub async fn connect(
        &self,
        wallet: Arc<dyn WalletSession>,
        chain: Arc<dyn ChainClient>,
    ) -> Result<Arc<Session>, DappError> {
        let account = wallet.address();
        let chain_id = wallet.chain_id().await?;
        let expected_network = chain_id == self.network.chain_id;
        let network_label = if expected_network {
            self.network.chain_name.clone()
        } else {
            warn!(
                expected = self.network.chain_id,
                actual = chain_id,
                "Wallet is on the wrong network, switch to {}",
                self.network.chain_name
            );
            format!("Wrong network ({})", chain_id)
        };

        let session = Arc::new(Session {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            account,
            chain_id,
            expected_chain_id: self.network.chain_id,
            network_label,
            expected_network,
            wallet,
            chain,
            closed: CancellationToken::new(),
        });

        if let Some(previous) = self.current.write().replace(Arc::clone(&session)) {
            previous.invalidate();
        }
        info!(session = session.id, status = %session.status_line(), "Wallet connected");
        Ok(session)
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub fn require(&self) -> Result<Arc<Session>, DappError> {
        self.current().ok_or(DappError::NotConnected)
    }

    pub fn disconnect(&self) {
        if let Some(session) = self.current.write().take() {
            session.invalidate();
            info!(session = session.id, "Wallet disconnected");
        }
    }

    /// Wallet switched accounts. The old session ends; the caller reconnects.
    pub fn account_changed(&self, account: Option<Address>) {
        let stale = self.current().map_or(false, |s| Some(s.account) != account);
        if stale {
            info!(?account, "Account changed");
            self.disconnect();
        }
    }

    /// Wallet switched chains. The old session ends; the caller reconnects.
    pub fn chain_changed(&self, chain_id: u64) {
        let stale = self.current().map_or(false, |s| s.chain_id != chain_id);
        if stale {
            info!(chain_id, "Chain changed");
            self.disconnect();
        }
    }
}
