use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::errors::DappError;

/// Native currency descriptor advertised to wallets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self { name: "Ether".to_string(), symbol: "ETH".to_string(), decimals: 18 }
    }
}

/// Blockchain network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
    #[serde(default)]
    pub native_currency: NativeCurrency,
}

impl NetworkConfig {
    pub fn ink_sepolia() -> Self {
        Self {
            chain_id: 763373,
            chain_name: "Ink Sepolia".to_string(),
            rpc_urls: vec!["https://rpc-gel-sepolia.inkonchain.com".to_string()],
            block_explorer_urls: vec!["https://explorer-sepolia.inkonchain.com".to_string()],
            native_currency: NativeCurrency::default(),
        }
    }

    pub fn ink_mainnet() -> Self {
        Self {
            chain_id: 57073,
            chain_name: "Ink".to_string(),
            rpc_urls: vec!["https://rpc-gel.inkonchain.com".to_string()],
            block_explorer_urls: vec!["https://explorer.inkonchain.com".to_string()],
            native_currency: NativeCurrency::default(),
        }
    }

    /// Primary RPC endpoint.
    pub fn rpc_url(&self) -> Result<&str, DappError> {
        self.rpc_urls
            .first()
            .map(String::as_str)
            .ok_or_else(|| DappError::ConfigError("network.rpc_urls is empty".to_string()))
    }

    /// Explorer link for an address, when an explorer is configured.
    pub fn explorer_address_url(&self, address: &str) -> Option<String> {
        self.block_explorer_urls
            .first()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::ink_sepolia()
    }
}

/// Confirmation tracker tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay between quirk-recovery polls (milliseconds)
    #[serde(default = "TrackerConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of polls before giving up with a timeout
    #[serde(default = "TrackerConfig::default_max_polls")]
    pub max_polls: u32,

    /// Upper bound on waiting for a receipt (seconds)
    #[serde(default = "TrackerConfig::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Substring identifying an unparseable node response
    #[serde(default = "TrackerConfig::default_quirk_message_substring")]
    pub quirk_message_substring: String,

    /// Balances below this (wei) are reported as too low for gas
    #[serde(default = "TrackerConfig::default_dust_threshold_wei")]
    pub dust_threshold_wei: u64,

    /// Generic error messages are cut to this many characters
    #[serde(default = "TrackerConfig::default_max_error_message_len")]
    pub max_error_message_len: usize,
}

impl TrackerConfig {
    fn default_poll_interval_ms() -> u64 { 1_000 }
    fn default_max_polls() -> u32 { 60 }
    fn default_receipt_timeout_secs() -> u64 { 180 }
    fn default_quirk_message_substring() -> String { "could not coalesce error".to_string() }
    fn default_dust_threshold_wei() -> u64 { 100_000_000_000_000 }
    fn default_max_error_message_len() -> usize { 60 }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_polls: Self::default_max_polls(),
            receipt_timeout_secs: Self::default_receipt_timeout_secs(),
            quirk_message_substring: Self::default_quirk_message_substring(),
            dust_threshold_wei: Self::default_dust_threshold_wei(),
            max_error_message_len: Self::default_max_error_message_len(),
        }
    }
}

/// Claims panel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimsConfig {
    /// How far back to look for motivations addressed to the signer
    #[serde(default = "ClaimsConfig::default_lookback_blocks")]
    pub lookback_blocks: u64,
}

impl ClaimsConfig {
    fn default_lookback_blocks() -> u64 { 50_000 }
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self { lookback_blocks: Self::default_lookback_blocks() }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DappConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub contract_address: String,
    /// Optional JSON ABI replacing the built-in one
    #[serde(default)]
    pub abi_path: Option<PathBuf>,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub claims: ClaimsConfig,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            contract_address: String::new(),
            abi_path: None,
            tracker: TrackerConfig::default(),
            claims: ClaimsConfig::default(),
        }
    }
}

impl DappConfig {
    pub const ENV_RPC_URL: &'static str = "MOTIVATE_RPC_URL";
    pub const ENV_CONTRACT_ADDRESS: &'static str = "MOTIVATE_CONTRACT_ADDRESS";
    pub const ENV_CHAIN_ID: &'static str = "MOTIVATE_CHAIN_ID";
    pub const ENV_ABI_PATH: &'static str = "MOTIVATE_ABI_PATH";

    pub fn from_toml_str(raw: &str) -> Result<Self, DappError> {
        toml::from_str(raw).map_err(|e| DappError::ConfigError(format!("Invalid config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, DappError> {
        debug!(path = %path.display(), "Loading config file");
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DappError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the file when given (defaults otherwise), applies env overrides and the
    /// custom contract, then validates.
    pub fn load(path: Option<&Path>, custom_contract: Option<&str>) -> Result<Self, DappError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        if let Some(contract) = custom_contract {
            config.use_custom_contract(contract)?;
        }
        config.validate()?;
        info!(
            chain = %config.network.chain_name,
            chain_id = config.network.chain_id,
            contract = %config.contract_address,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), DappError> {
        if let Ok(url) = std::env::var(Self::ENV_RPC_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.network.rpc_urls = vec![url.to_string()];
            }
        }
        if let Ok(addr) = std::env::var(Self::ENV_CONTRACT_ADDRESS) {
            let addr = addr.trim();
            if !addr.is_empty() {
                self.contract_address = addr.to_string();
            }
        }
        if let Ok(id) = std::env::var(Self::ENV_CHAIN_ID) {
            self.network.chain_id = id.trim().parse().map_err(|_| {
                DappError::ConfigError(format!("{} must be an integer, got '{}'", Self::ENV_CHAIN_ID, id))
            })?;
        }
        if let Ok(path) = std::env::var(Self::ENV_ABI_PATH) {
            if !path.trim().is_empty() {
                self.abi_path = Some(PathBuf::from(path.trim()));
            }
        }
        Ok(())
    }

    /// Replaces the configured contract with a user supplied one.
    pub fn use_custom_contract(&mut self, input: &str) -> Result<Address, DappError> {
        let address = crate::core::validation::validate_contract_address(input)?;
        info!(contract = %input.trim(), "Using custom contract");
        self.contract_address = input.trim().to_string();
        Ok(address)
    }

    /// The configured contract, parsed.
    pub fn contract(&self) -> Result<Address, DappError> {
        crate::core::validation::validate_contract_address(&self.contract_address)
            .map_err(|e| DappError::ConfigError(format!("contract_address: {}", e)))
    }

    pub fn validate(&self) -> Result<(), DappError> {
        self.network.rpc_url()?;
        if self.contract_address.is_empty() {
            return Err(DappError::ConfigError(format!(
                "contract_address is not set (config file or {})",
                Self::ENV_CONTRACT_ADDRESS
            )));
        }
        self.contract()?;
        if self.tracker.max_polls == 0 {
            return Err(DappError::ConfigError("tracker.max_polls must be at least 1".to_string()));
        }
        if self.tracker.poll_interval_ms == 0 {
            return Err(DappError::ConfigError(
                "tracker.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
