use anyhow::Result;
use async_trait::async_trait;
use ethers::{
    abi::Token,
    middleware::SignerMiddleware,
    providers::{Http, JsonRpcError, Middleware, MiddlewareError, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Filter, TransactionRequest, H256, U256,
        U64,
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::traits::{
    ChainClient, ContractCall, SubmitError, SubmitErrorCode, TxReceipt, WalletSession,
};
use crate::core::abi::{ContractAbi, EventFilter, LogEvent};
use crate::core::config::NetworkConfig;
use crate::core::errors::DappError;

/// Top-level text used when the node's reply could not be parsed at all.
pub const UNPARSEABLE_RESPONSE: &str = "could not coalesce error";

const USER_REJECTED_CODE: i64 = 4001;
const INTERNAL_ERROR_CODE: i64 = -32603;
const EXECUTION_REVERTED_CODE: i64 = 3;

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Wallet and chain access for one contract through an ethers middleware stack.
#[derive(Clone)]
pub struct EthersClient<M: Middleware> {
    client: Arc<M>,
    sender: Address,
    contract: Address,
    abi: Arc<ContractAbi>,
    receipt_poll_interval: Duration,
}

impl EthersClient<SignerClient> {
    /// Connects to the network's first RPC endpoint and signs with `private_key`.
    pub async fn connect(
        network: &NetworkConfig,
        private_key: &str,
        contract: Address,
        abi: ContractAbi,
    ) -> Result<Self> {
        let rpc_url = network.rpc_url()?.trim();
        let parsed_url = reqwest::Url::parse(rpc_url).map_err(|e| {
            anyhow::anyhow!(
                "Invalid RPC URL '{}': {}. Please check config.toml or MOTIVATE_RPC_URL.",
                rpc_url,
                e
            )
        })?;

        info!("Connecting to {}: {}", network.chain_name, parsed_url);
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(10));
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let http =
            builder.build().map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        let provider = Provider::new(Http::new_with_client(parsed_url.clone(), http));

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get chain ID from {}: {}", parsed_url, e))?
            .as_u64();

        // never log key material
        let signer = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|_| anyhow::anyhow!("Invalid private key"))?
            .with_chain_id(chain_id);
        info!(chain_id, account = ?signer.address(), "Signer ready");

        let client = SignerMiddleware::new(provider, signer);
        Ok(Self::new(Arc::new(client), contract, abi))
    }
}

impl<M: Middleware + 'static> EthersClient<M> {
    /// Wraps an existing middleware. This is how tests plug in a `MockProvider`.
    pub fn new(client: Arc<M>, contract: Address, abi: ContractAbi) -> Self {
        let sender = client.default_sender().unwrap_or_default();
        Self {
            client,
            sender,
            contract,
            abi: Arc::new(abi),
            receipt_poll_interval: Duration::from_secs(1),
        }
    }

    /// Points the client at a user-supplied contract.
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    fn log_filter(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Filter, DappError> {
        let [topic1, topic2] = filter.topics();
        let mut log_filter = Filter::new()
            .address(self.contract)
            .topic0(self.abi.event_signature(filter.event)?)
            .from_block(from_block)
            .to_block(to_block);
        if let Some(topic) = topic1 {
            log_filter = log_filter.topic1(topic);
        }
        if let Some(topic) = topic2 {
            log_filter = log_filter.topic2(topic);
        }
        Ok(log_filter)
    }
}

#[async_trait]
impl<M> WalletSession for EthersClient<M>
where
    M: Middleware + 'static,
{
    fn address(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64, DappError> {
        let id = self
            .client
            .get_chainid()
            .await
            .map_err(|e| DappError::BlockchainError(format!("Failed to get chain ID: {}", e)))?;
        Ok(id.as_u64())
    }

    async fn balance(&self) -> Result<U256, DappError> {
        self.client
            .get_balance(self.sender, None)
            .await
            .map_err(|e| DappError::BlockchainError(format!("Failed to get balance: {}", e)))
    }

    async fn submit(&self, call: &ContractCall) -> Result<H256, SubmitError> {
        let data = self
            .abi
            .encode_call(&call.function, &call.args)
            .map_err(|e| SubmitError::new(SubmitErrorCode::Other, e.to_string()))?;
        let tx = TransactionRequest::new()
            .from(self.sender)
            .to(self.contract)
            .data(data)
            .value(call.value);

        debug!(function = %call.function, value = %call.value, "send_transaction");
        let pending =
            self.client.send_transaction(tx, None).await.map_err(|e| submit_error_from(&e))?;
        let tx_hash = pending.tx_hash();
        info!(tx_hash = %format!("0x{}", hex::encode(tx_hash.as_bytes())), "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, SubmitError> {
        let pending = PendingTransaction::new(tx_hash, self.client.provider())
            .interval(self.receipt_poll_interval);
        match pending.await {
            Ok(Some(receipt)) => Ok(TxReceipt {
                tx_hash,
                block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
                success: receipt.status == Some(U64::from(1)),
            }),
            Ok(None) => Err(SubmitError::new(
                SubmitErrorCode::Other,
                "Transaction dropped from the mempool",
            )),
            Err(e) => Err(submit_error_from(&e)),
        }
    }
}

#[async_trait]
impl<M> ChainClient for EthersClient<M>
where
    M: Middleware + 'static,
{
    async fn block_number(&self) -> Result<u64, DappError> {
        let block = self.client.get_block_number().await.map_err(|e| {
            DappError::BlockchainError(format!("Failed to get block number: {}", e))
        })?;
        Ok(block.as_u64())
    }

    async fn query_logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>, DappError> {
        let log_filter = self.log_filter(filter, from_block, to_block)?;
        let logs = self
            .client
            .get_logs(&log_filter)
            .await
            .map_err(|e| DappError::BlockchainError(format!("Failed to get logs: {}", e)))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match self.abi.decode_log(log) {
                Ok(event) if filter.matches(&event) => events.push(event),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping undecodable log"),
            }
        }
        events.sort_by_key(LogEvent::id);
        debug!(event = filter.event.name(), from_block, to_block, found = events.len(), "get_logs");
        Ok(events)
    }

    async fn call(&self, function: &str, args: Vec<Token>) -> Result<Vec<Token>, DappError> {
        let data = self.abi.encode_call(function, &args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(self.contract).data(data).into();
        let output = self.client.call(&tx, None).await.map_err(|e| {
            DappError::BlockchainError(format!("{} call failed: {}", function, e))
        })?;
        self.abi.decode_output(function, &output)
    }
}

/// Maps a middleware error to the shape the tracker reasons about.
pub fn submit_error_from<E: MiddlewareError>(err: &E) -> SubmitError {
    submit_error_from_parts(err.to_string(), err.as_error_response(), err.as_serde_error().is_some())
}

/// `display` is the error's own text, `response` the JSON-RPC error the node sent
/// (if any) and `unparseable` whether the node's reply failed to deserialize.
pub fn submit_error_from_parts(
    display: String,
    response: Option<&JsonRpcError>,
    unparseable: bool,
) -> SubmitError {
    if let Some(resp) = response {
        let code = resp.code;
        if code == USER_REJECTED_CODE {
            return SubmitError::new(SubmitErrorCode::ActionRejected, resp.message.clone())
                .with_inner(Some(code), resp.message.clone());
        }
        if resp.message.is_empty() {
            return unparseable_response(&display);
        }
        let code_class = if code == INTERNAL_ERROR_CODE {
            SubmitErrorCode::UnknownError
        } else if code == EXECUTION_REVERTED_CODE || resp.message.contains("execution reverted") {
            SubmitErrorCode::CallException
        } else if resp.message.to_lowercase().contains("timeout") {
            SubmitErrorCode::Timeout
        } else {
            SubmitErrorCode::Other
        };
        return SubmitError::new(code_class, resp.message.clone())
            .with_inner(Some(code), resp.message.clone());
    }

    if unparseable {
        return unparseable_response(&display);
    }

    let lower = display.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        SubmitError::new(SubmitErrorCode::Timeout, display)
    } else {
        SubmitError::new(SubmitErrorCode::Other, display)
    }
}

fn unparseable_response(detail: &str) -> SubmitError {
    SubmitError::new(SubmitErrorCode::UnknownError, format!("{} ({})", UNPARSEABLE_RESPONSE, detail))
        .with_inner(None, "")
}
