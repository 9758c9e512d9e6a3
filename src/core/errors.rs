use thiserror::Error;

/// Error type for configuration, validation and chain access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DappError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Form input rejected before anything is sent to the wallet.
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Blockchain interaction errors.
    #[error("Blockchain error: {0}")]
    BlockchainError(String),
    /// ABI encoding/decoding errors.
    #[error("ABI error: {0}")]
    AbiError(String),
    /// The wallet is connected to a chain other than the configured one.
    #[error("Network mismatch: expected chain {expected}, wallet is on {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },
    /// No connected session, or the session was invalidated.
    #[error("Wallet not connected")]
    NotConnected,
    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for DappError {
    fn from(err: std::io::Error) -> Self {
        DappError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for DappError {
    fn from(err: serde_json::Error) -> Self {
        DappError::SerializationError(err.to_string())
    }
}

impl From<ethers::abi::Error> for DappError {
    fn from(err: ethers::abi::Error) -> Self {
        DappError::AbiError(err.to_string())
    }
}

/// Errors raised by the confirmation tracker itself, as opposed to the
/// outcome of the tracked transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Another action is already held by this tracker.
    #[error("a transaction is already in progress")]
    Busy,
    /// `reset` was called while the held action had not reached a terminal state.
    #[error("the current transaction has not finished yet")]
    InFlight,
    /// Writes are only sent on the configured chain.
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    /// The wallet session was closed before the action resolved.
    #[error("wallet session closed before the transaction resolved")]
    SessionClosed,
}
